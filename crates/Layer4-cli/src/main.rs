//! FileShare CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use fileshare_foundation::OperationMode;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// FileShare - resolve file URIs and manage persistent file permissions
#[derive(Parser, Debug)]
#[command(name = "fileshare")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Calling app id (overrides config and FILESHARE_APP_ID)
    #[arg(long, global = true)]
    app: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a file URI to its sandbox path
    Resolve { uri: String },
    /// Build a file URI for a real path
    Uri { path: String },
    /// Report whether a URI points at a remote device
    IsRemote { uri: String },
    /// Persist permissions for every URI (all or nothing)
    Persist(PolicyArgs),
    /// Revoke persisted permissions
    Revoke(PolicyArgs),
    /// Re-enable persisted permissions
    Activate(PolicyArgs),
    /// Disable persisted permissions without removing them
    Deactivate(PolicyArgs),
    /// Check for active persisted permissions
    Check(PolicyArgs),
    /// List persisted permissions of the app
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Link files of this app into another app's share directory
    Share(ShareArgs),
    /// Remove share entries previously created for another app
    Unshare {
        /// Receiving app id
        #[arg(long)]
        target: String,
        #[arg(required = true)]
        uris: Vec<String>,
    },
    /// Show or update configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct ShareArgs {
    /// Receiving app id
    #[arg(long)]
    target: String,

    #[arg(required = true)]
    uris: Vec<String>,

    /// Access mode (read, write); write also creates the rw entry
    #[arg(short, long, default_value = "read")]
    mode: OperationMode,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the merged configuration as JSON
    Show,
    /// Write settings to the project (or global) config file
    Set(ConfigSetArgs),
}

#[derive(clap::Args, Debug)]
struct ConfigSetArgs {
    /// Write to the global config instead of ./.fileshare
    #[arg(long)]
    global: bool,

    #[arg(long)]
    device_type: Option<String>,

    #[arg(long)]
    sandbox_root: Option<PathBuf>,

    /// Directory holding grants.db
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    user_name: Option<String>,

    /// ACL permission held by the app (repeatable)
    #[arg(long = "permission")]
    permissions: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct PolicyArgs {
    #[arg(required = true)]
    uris: Vec<String>,

    /// Access mode (read, write)
    #[arg(short, long, default_value = "read")]
    mode: OperationMode,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = commands::run(args).await {
        commands::report(&err);
        std::process::exit(1);
    }
}
