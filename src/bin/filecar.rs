//! filecar CLI
//!
//! Packs one regular file into a CARv1 archive and prints the root CID.

use anyhow::{bail, Context};
use clap::Parser;
use filecar::{verify_archive, PackConfig, PackSummary, Packer};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "filecar", version)]
#[command(about = "Pack a single file into a content-addressed CAR archive")]
struct Args {
    /// File to pack (directories and symlinks are rejected)
    input: PathBuf,

    /// Archive to create
    output: PathBuf,

    /// TOML config file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Bytes per leaf block [default: 1048576]
    #[arg(short = 'b', long)]
    block_size: Option<u32>,

    /// Maximum children per node [default: 5]
    #[arg(short = 'f', long)]
    fan_out: Option<usize>,

    /// Directory for the staging file [default: system temp dir]
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Re-read the archive after writing and check it end to end
    #[arg(long)]
    verify: bool,
}

impl Args {
    fn pack_config(&self) -> anyhow::Result<PackConfig> {
        let mut config = match &self.config {
            Some(path) => PackConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => PackConfig::default(),
        };

        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(fan_out) = self.fan_out {
            config.fan_out = fan_out;
        }
        if let Some(dir) = &self.staging_dir {
            config.staging_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

fn verify_output(output: &Path, summary: &PackSummary) -> anyhow::Result<()> {
    let archive = File::open(output)
        .with_context(|| format!("failed to reopen {}", output.display()))?;
    let report = verify_archive(BufReader::new(archive))
        .with_context(|| format!("verification of {} failed", output.display()))?;

    if report.root != summary.root || report.file_size != summary.file_size {
        bail!(
            "verification mismatch: archive holds {} ({} bytes), packed {} ({} bytes)",
            report.root,
            report.file_size,
            summary.root,
            summary.file_size
        );
    }

    info!(
        blocks = report.blocks,
        nodes = report.nodes,
        depth = report.depth,
        "archive verified"
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the root CID
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let packer = Packer::new(args.pack_config()?)?;

    info!(
        "block_size={} fan_out={}",
        packer.config().block_size,
        packer.config().fan_out
    );

    let summary = packer
        .pack_file(&args.input, &args.output)
        .with_context(|| format!("failed to pack {}", args.input.display()))?;

    if args.verify {
        if let Err(e) = verify_output(&args.output, &summary) {
            // A failed check must not leave the archive behind
            std::fs::remove_file(&args.output).ok();
            return Err(e);
        }
    }

    println!("{}", summary.root);
    Ok(())
}
