mod commands;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use genvault_core::{Organizer, OrganizerConfig};
use tracing_subscriber::EnvFilter;

/// genvault: index and organize generated images and their sidecars
#[derive(Parser)]
#[command(name = "genvault", version, about)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true, conflicts_with = "images")]
    config: Option<PathBuf>,

    /// Root image folder, when not using a config file
    #[arg(long, global = true)]
    images: Option<PathBuf>,

    /// Folder holding the index, backups and thumbnail cache
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Show debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index images and their sidecar files
    Index {
        /// Only index the images directly inside this folder
        #[arg(long)]
        folder: Option<String>,
    },
    /// Link regular images to their upscaled versions
    Link {
        /// Only consider images in this folder
        #[arg(long)]
        folder: Option<String>,
    },
    /// Show catalog status summary
    Status,
    /// List images
    Ls {
        /// Only images in this folder
        #[arg(long)]
        folder: Option<String>,
        /// Whitespace-separated search terms
        #[arg(long)]
        search: Option<String>,
    },
    /// Show all details of one image
    Show { id: String },
    /// List images whose file has disappeared
    Missing {
        /// Remove them from the index
        #[arg(long)]
        purge: bool,
    },
    /// Move an image (and its low-res versions) to another folder
    Mv { id: String, folder: String },
    /// Delete an image and its files
    Rm {
        id: String,
        /// Also delete the low-res images linking to it
        #[arg(long)]
        cascade: bool,
    },
    /// Remove empty folders from the image folder
    Cleanup,
    /// Mark an image as favorite
    Favorite {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Mark an image for the gallery
    Gallery {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Mark an image for the website
    Website {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Set an image's label (empty text clears it)
    Label { id: String, text: String },
    /// Manually link an image to its upscaled version
    LinkUpscaled { id: String, upscaled_id: String },
    /// Copy an image to the output folder
    Output { id: String },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<OrganizerConfig> {
    let config = match (&cli.config, &cli.images) {
        (Some(path), _) => OrganizerConfig::load(path)?,
        (None, Some(images)) => OrganizerConfig::new(images),
        (None, None) => bail!("either --config or --images is required"),
    };
    Ok(match &cli.storage {
        Some(storage) => config.with_storage_folder(storage),
        None => config,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    tracing::debug!(
        images = %config.image_folder().display(),
        index = %config.index_file().display(),
        "loaded config"
    );
    let mut org = Organizer::new(config);

    match cli.command {
        Commands::Index { folder } => commands::index::index(&mut org, folder.as_deref())?,
        Commands::Link { folder } => commands::index::link(&mut org, folder.as_deref())?,
        Commands::Status => commands::status::run(&mut org)?,
        Commands::Ls { folder, search } => {
            commands::ls::list(&mut org, folder.as_deref(), search.as_deref())?
        }
        Commands::Show { id } => commands::ls::show(&mut org, &id)?,
        Commands::Missing { purge } => commands::ls::missing(&mut org, purge)?,
        Commands::Mv { id, folder } => commands::files::mv(&mut org, &id, &folder)?,
        Commands::Rm { id, cascade } => commands::files::rm(&mut org, &id, cascade)?,
        Commands::Cleanup => commands::files::cleanup(&mut org)?,
        Commands::Favorite { id, off } => {
            commands::edit::flag(&mut org, &id, commands::edit::Flag::Favorite, !off)?
        }
        Commands::Gallery { id, off } => {
            commands::edit::flag(&mut org, &id, commands::edit::Flag::Gallery, !off)?
        }
        Commands::Website { id, off } => {
            commands::edit::flag(&mut org, &id, commands::edit::Flag::Website, !off)?
        }
        Commands::Label { id, text } => commands::edit::label(&mut org, &id, &text)?,
        Commands::LinkUpscaled { id, upscaled_id } => {
            commands::edit::link_upscaled(&mut org, &id, &upscaled_id)?
        }
        Commands::Output { id } => commands::files::output(&mut org, &id)?,
    }

    Ok(())
}
