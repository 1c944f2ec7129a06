use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plexshare")]
#[command(version)]
#[command(
    about = "Manage library sharing and read statistics across Plex servers",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/plexshare/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Make a user's shared libraries match a selection
    Share(ShareArgs),

    /// Remove a user from every server of a group
    Remove(RemoveArgs),

    /// List pending invitations across all accounts
    Invites,

    /// Show whether a user is new, a friend or invited on each server
    InviteStatus {
        /// Email or username
        user: String,
    },

    /// Library statistics for groups with `stats = true`
    Stats,

    /// Server version, sessions and host utilization
    Resources,

    /// Most recent watch of every account
    LastWatched,

    /// Inspect the configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ShareArgs {
    /// Email or username
    pub user: String,

    /// Server group from the config
    pub group: String,

    /// JSON selection, e.g. '{"regular":["1","2"],"fourk":[]}', or - for stdin
    ///
    /// A slot left out of the selection is not touched. Pass an empty list
    /// to remove every library on that server.
    pub selection: String,

    /// Plan without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Servers reconciled at once (default: settings.max_concurrency)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Email or username
    pub user: String,

    /// Server group from the config
    pub group: String,

    /// Also withdraw pending invitations
    #[arg(long)]
    pub cancel_invite: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the loaded config with tokens masked
    Show,

    /// Check the config for problems
    Validate,

    /// Print the resolved config file path
    Path,
}
