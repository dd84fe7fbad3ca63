//! stagecache CLI - inspect and maintain a build-stage cache

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stagecache::{branch_changes, list_refs, ops, read_ref, CacheConfig, Repo};

#[derive(Parser)]
#[command(name = "stagecache")]
#[command(about = "incremental build-stage cache")]
#[command(version)]
struct Cli {
    /// cache directory (object store)
    #[arg(short, long, env = "STAGECACHE_DIR", default_value = ".")]
    cache_dir: PathBuf,

    /// read settings from a TOML file instead (overrides --cache-dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// list cached stages of a branch
    Stages {
        #[arg(short, long)]
        branch: String,
    },

    /// list paths added or modified between the init and finish stages
    Changes {
        #[arg(short, long)]
        branch: String,
    },

    /// delete objects no ref reaches
    Prune,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("stagecache=warn"),
        1 => EnvFilter::new("stagecache=info"),
        _ => EnvFilter::new("stagecache=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> stagecache::Result<()> {
    let config = match &cli.config {
        Some(path) => CacheConfig::load(path)?,
        None => CacheConfig::new(cli.cache_dir),
    };

    match cli.command {
        Commands::Stages { branch } => {
            let repo = Repo::open(&config.cache_dir)?;
            for stage in list_refs(&repo, Some(&branch))? {
                let commit = read_ref(&repo, &format!("{}/{}", branch, stage))?;
                println!("{}  {}", commit, stage);
            }
        }

        Commands::Changes { branch } => {
            let repo = Repo::open(&config.cache_dir)?;
            for path in branch_changes(&repo, &branch)? {
                println!("{}", path);
            }
        }

        Commands::Prune => {
            let repo = Repo::open(&config.cache_dir)?;
            let stats = ops::prune(&repo)?;
            println!(
                "pruned {} of {} objects, freed {} bytes",
                stats.objects_pruned, stats.objects_total, stats.bytes_pruned
            );
        }
    }

    Ok(())
}
