//! QAVM CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use qavm_core::DiscoveryContext;
use qavm_foundation::{JsonStore, QavmConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// QAVM - discover installed creative software through signed plugins
#[derive(Parser, Debug)]
#[command(name = "qavm")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Extra search path (repeatable), added to the configured ones
    #[arg(short, long = "path", global = true)]
    paths: Vec<PathBuf>,

    /// Override the configured scan depth
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Trust user plugins for this run
    #[arg(long, global = true)]
    trust_user_plugins: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loaded, pending and rejected plugins
    Plugins,
    /// Scan search paths for installations
    Scan {
        /// Only this handler (`plugin#software`)
        software: Option<String>,
    },
    /// Workspace operations
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },
    /// Sign a built-in plugin folder, writing `<folder>.sig`
    Sign {
        /// Plugin folder
        folder: PathBuf,
        /// PKCS#8 private key (DER)
        #[arg(short, long)]
        key: PathBuf,
    },
    /// Add or remove a descriptor tag
    Tag {
        /// Descriptor UID
        uid: String,
        tag: String,
        #[arg(long)]
        remove: bool,
    },
    /// Set the notes of a descriptor
    Note {
        /// Descriptor UID
        uid: String,
        /// Short note shown next to the descriptor
        visible: String,
        /// Longer note
        #[arg(long, default_value = "")]
        note: String,
    },
    /// List tags, or descriptor UIDs carrying a tag
    Tags { tag: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceAction {
    /// List saved workspaces
    List,
    /// Show a workspace and which UIDs resolve (default: active workspace)
    Show { name: Option<String> },
    /// Save every loaded view and menu item as a workspace
    Save { name: String },
    /// Delete a saved workspace
    Remove { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Signing needs neither configuration nor plugins
    if let Command::Sign { folder, key } = &args.command {
        return commands::sign(folder, key);
    }

    // Load configuration
    let mut config = QavmConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        QavmConfig::default()
    });
    config.search_paths.extend(args.paths.iter().cloned());
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if args.trust_user_plugins {
        config.trust_user_plugins = true;
    }

    let ctx = DiscoveryContext::new(config, JsonStore::global()?)?;
    let report = ctx.bootstrap();

    match args.command {
        Command::Plugins => commands::plugins(&ctx, &report, args.json),
        Command::Scan { software } => commands::scan(ctx, software, args.json).await,
        Command::Workspace { action } => commands::workspace(&ctx, action, args.json),
        Command::Tag { uid, tag, remove } => commands::tag(&ctx, &uid, &tag, remove),
        Command::Note { uid, visible, note } => commands::note(&ctx, &uid, &visible, &note),
        Command::Tags { tag } => commands::tags(&ctx, tag.as_deref()),
        Command::Sign { .. } => Ok(()),
    }
}
