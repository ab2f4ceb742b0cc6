pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod io;
pub mod normalize;
pub mod notify;
pub mod origin;
pub mod paths;
pub mod provenance;
pub mod runner;
pub mod step;
pub mod validate;

pub use error::{HatchError, Result};
