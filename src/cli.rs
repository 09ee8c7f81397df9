// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Install, update and operate a containerized web application")]
#[command(version = keel::selfupdate::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI (only final result)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Deployment to operate on (defaults to the only or "default" deployment)
    #[arg(short, long, global = true)]
    pub name: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a new deployment
    Install(InstallArgs),

    /// Update to the newest release on a channel, or to a given version
    Update {
        /// Channel to follow (defaults to the deployment's channel)
        #[arg(long)]
        channel: Option<String>,

        /// Exact image tag to deploy instead of the newest release
        #[arg(long = "version", value_name = "TAG")]
        target: Option<String>,

        /// Only report whether an update is available
        #[arg(long)]
        check: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Break a held deploy lock
        #[arg(long)]
        force: bool,
    },

    /// Show deployment status
    Status,

    /// Show application logs
    Logs {
        /// Keep streaming new lines
        #[arg(short, long)]
        follow: bool,
    },

    /// Create a database backup
    Backup {
        /// Break a held deploy lock
        #[arg(long)]
        force: bool,
    },

    /// List backups
    Backups,

    /// Restore the database from a backup
    Restore {
        /// Backup identifier, as shown by `keel backups`
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Break a held deploy lock
        #[arg(long)]
        force: bool,
    },

    /// Roll back to the previous version
    Rollback {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Break a held deploy lock
        #[arg(long)]
        force: bool,
    },

    /// Stop the deployment, remove its volumes and forget it
    Destroy {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Break a held deploy lock
        #[arg(long)]
        force: bool,
    },

    /// Check whether a provider's requirements are met
    Prereqs {
        /// Provider to check
        #[arg(short, long, default_value = "docker")]
        provider: String,
    },

    /// Inspect keel's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Replace this binary with the newest keel release
    SelfUpdate,

    /// Print version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the deployment record
    Show,
    /// Print the path of the records file
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatabaseEngineArg {
    Mariadb,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheArg {
    Apcu,
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageArg {
    Local,
    S3,
    Azure,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Public domain, or "localhost" for a local install
    #[arg(short, long, default_value = "localhost")]
    pub domain: String,

    /// Application image, optionally with a tag
    #[arg(short, long)]
    pub image: String,

    /// Image tag (defaults to the newest release on the channel)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Release channel to follow
    #[arg(short, long, default_value = "release")]
    pub channel: String,

    /// Deployment provider
    #[arg(short, long, default_value = "docker")]
    pub provider: String,

    /// Use an external database instead of a bundled one
    #[arg(long, conflicts_with = "database_engine")]
    pub database_url: Option<String>,

    /// Bundled database engine
    #[arg(long, value_enum, default_value = "mariadb")]
    pub database_engine: DatabaseEngineArg,

    /// Cache engine
    #[arg(long, value_enum, default_value = "apcu")]
    pub cache: CacheArg,

    /// External Redis URL (implies --cache redis)
    #[arg(long)]
    pub redis_url: Option<String>,

    /// File storage backend
    #[arg(long, value_enum, default_value = "local")]
    pub storage: StorageArg,

    /// Storage settings as KEY=VALUE, e.g. s3_bucket=uploads
    #[arg(long = "storage-setting", value_name = "KEY=VALUE")]
    pub storage_settings: Vec<String>,

    /// Disable scheduled backups
    #[arg(long)]
    pub no_backups: bool,

    /// Break a held deploy lock
    #[arg(long)]
    pub force: bool,
}
