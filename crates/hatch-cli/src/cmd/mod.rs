pub mod normalize;
pub mod origin;
pub mod run;
pub mod show;
pub mod validate;
