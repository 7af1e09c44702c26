use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "opm")]
#[command(about = "Package manager for OBS Studio plugins")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $OPM_CONFIG or <config dir>/opm/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// OBS plugin directory (overrides config)
    #[arg(long, global = true)]
    pub plugin_path: Option<PathBuf>,

    /// Repository manifest (overrides config)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List installed plugins
    #[command(visible_alias = "ls")]
    List,

    /// Install a plugin from the repository
    #[command(visible_aliases = ["i", "add"])]
    Install {
        /// Plugin id
        plugin_id: String,

        /// Version to install (default: newest)
        version: Option<String>,

        /// Install even when the artifact has no checksum
        #[arg(long)]
        untrusted: bool,
    },

    /// Uninstall a plugin
    #[command(visible_aliases = ["rm", "del"])]
    Remove {
        /// Plugin id
        plugin_id: String,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Upgrade installed plugins to the newest compatible version
    Update {
        /// Only update this plugin
        plugin_id: Option<String>,

        /// Only show what would be updated
        #[arg(short, long)]
        dry_run: bool,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Install updates even when the artifact has no checksum
        #[arg(long)]
        untrusted: bool,
    },

    /// List plugins available for this platform
    Available {
        /// Filter by id, name or author
        #[arg(default_value = "")]
        query: String,
    },

    /// Download the repository manifest from repository.url
    Refresh,

    /// Show the platform inferred from release asset names
    Infer {
        /// Asset file names (e.g. plugin-1.0-x64-win.zip)
        #[arg(required = true)]
        names: Vec<String>,

        /// Also show the version string derived from a release name (e.g. "v2.1")
        #[arg(long, value_name = "NAME")]
        release: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show all configuration values
    Show,

    /// Print the config file location
    Path,

    /// Create the config file with commented defaults
    Init,

    /// Get a configuration value
    Get {
        /// Key in dot notation (e.g. download.timeout_secs)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Key in dot notation (e.g. download.timeout_secs)
        key: String,

        /// New value
        value: String,
    },
}
