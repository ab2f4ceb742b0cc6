mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hatch",
    about = "Record template provenance and bootstrap the repository of a generated project",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .github/ or .git/)
    #[arg(long, global = true, env = "HATCH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the post-generation pipeline
    Run {
        /// Seed context file (default: .github/context.yml)
        #[arg(long)]
        context: Option<PathBuf>,

        /// Print each step and whether it would run, without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Resolve where a template came from
    Origin {
        /// Template identifier: URL, gh:/gl:/bb: shorthand, or local path
        #[arg(long)]
        template: String,

        /// Directory relative local paths are resolved against (default: cwd)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Branch or ref the template was rendered from
        #[arg(long)]
        checkout: Option<String>,
    },

    /// Sort and deduplicate a word list in place
    Normalize {
        /// File to normalize (default: the configured dictionary)
        file: Option<PathBuf>,
    },

    /// Check a project name and slug before rendering
    Validate {
        #[arg(long)]
        name: String,

        #[arg(long)]
        slug: String,
    },

    /// Print the recorded provenance of the project
    Show,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Run { context, dry_run } => {
            cmd::run::run(&root, context.as_deref(), dry_run, cli.json)
        }
        Commands::Origin {
            template,
            output_dir,
            checkout,
        } => cmd::origin::run(
            &root,
            &template,
            output_dir.as_deref(),
            checkout.as_deref(),
            cli.json,
        ),
        Commands::Normalize { file } => cmd::normalize::run(&root, file.as_deref(), cli.json),
        Commands::Validate { name, slug } => cmd::validate::run(&name, &slug, cli.json),
        Commands::Show => cmd::show::run(&root, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
