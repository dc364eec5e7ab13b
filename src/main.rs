use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::debug;
use std::io;
use std::path::PathBuf;

use image_du::{
    DiskUsageProcessor, DockerStore, ImagesOptions, Notifier, OutputFormat, SnapshotStore,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches to text-based progress"
    )]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Disk usage by images, attributed per shared layer
    Images(ImagesArgs),
}

#[derive(Args)]
struct ImagesArgs {
    #[arg(short, long, help = "Include intermediate layers in the listing")]
    all: bool,

    #[arg(
        short,
        long,
        value_enum,
        default_value = "text",
        help = "Output format"
    )]
    format: Format,

    #[arg(
        short = 'H',
        long,
        env = "DOCKER_HOST",
        help = "Docker daemon address (e.g., unix:///var/run/docker.sock)"
    )]
    host: Option<String>,

    #[arg(
        long,
        help = "Read images from a saved `docker image inspect` JSON file instead of the daemon"
    )]
    snapshot: Option<PathBuf>,

    #[arg(long, help = "Show how many listed images share each layer")]
    references: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let notifier = Notifier::new(cli.verbose);
    notifier.init_logger();
    debug!("Verbosity: {:?}", notifier.verbosity_level());

    match cli.command {
        Commands::Images(args) => images(args, notifier),
    }
}

fn images(args: ImagesArgs, notifier: Notifier) -> Result<()> {
    let options = ImagesOptions {
        include_intermediate: args.all,
        format: args.format.into(),
        count_references: args.references,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.snapshot {
        Some(path) => {
            if args.host.is_some() {
                debug!("Reading snapshot, ignoring daemon address");
            }
            debug!("Opening snapshot {}", path.display());
            let store = SnapshotStore::open(&path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            DiskUsageProcessor::new(store, notifier).images(&options, &mut out)?;
        }
        None => {
            debug!(
                "Connecting to Docker at {}",
                args.host.as_deref().unwrap_or("default address")
            );
            let store =
                DockerStore::new(args.host).context("Failed to reach the Docker daemon")?;
            DiskUsageProcessor::new(store, notifier).images(&options, &mut out)?;
        }
    }

    Ok(())
}
