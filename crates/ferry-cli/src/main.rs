//! `ferry-upload-pack`: serves a git fetch or clone over stdin/stdout.
//!
//! Invoked the way git invokes `git-upload-pack`, either by `ssh` or by a
//! smart-HTTP front end with `--stateless-rpc`.

use anyhow::{Context, Result};
use clap::Parser;
use ferry_git::{upload_pack, CancellationFlag, UploadPackOptions};
use ferry_storage::{BufferPool, Repository};
use std::io::{self, BufWriter};
use std::path::PathBuf;

mod config;
mod logging;

use config::Config;
use logging::LogFormat;

/// Ferry upload-pack - send objects to a git client
#[derive(Parser, Debug)]
#[command(name = "ferry-upload-pack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serve one request/response round and exit (smart HTTP)
    #[arg(long)]
    stateless_rpc: bool,

    /// Only advertise references, then exit
    #[arg(long)]
    advertise_refs: bool,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of pack compression workers
    #[arg(long)]
    pack_workers: Option<usize>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the git directory to serve
    git_dir: PathBuf,
}

impl Cli {
    /// Loads the config file, if any, and applies command-line overrides.
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(workers) = self.pack_workers {
            config.pack_workers = workers;
        }
        match self.verbose {
            0 => {}
            1 => config.log_level = "info".to_string(),
            2 => config.log_level = "debug".to_string(),
            _ => config.log_level = "trace".to_string(),
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;
    logging::init_logging(&config.log_level, LogFormat::parse(&config.log_format));

    let pool = BufferPool::new(config.buffer_size, config.max_idle_buffers);
    let repo = Repository::open(&cli.git_dir, &pool)
        .with_context(|| format!("'{}' does not appear to be a git repository", cli.git_dir.display()))?;
    tracing::debug!(
        repo = %repo.name,
        objects = repo.objects.len(),
        "repository loaded"
    );

    let options = UploadPackOptions {
        git_protocol: std::env::var("GIT_PROTOCOL").unwrap_or_default(),
        advertise_refs: cli.advertise_refs,
        stateless_rpc: cli.stateless_rpc,
        pack_workers: config.pack_workers,
        interrupt: CancellationFlag::new(),
    };

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    upload_pack(&repo, stdin, stdout, &options, &pool)?;
    Ok(())
}
