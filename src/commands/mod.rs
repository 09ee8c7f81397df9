// ABOUTME: Command module aggregator for the keel CLI.
// ABOUTME: Re-exports one handler per subcommand.

mod backend;
mod install;
mod lifecycle;
mod self_update;
mod update;

pub use backend::parse_name;
pub use install::install;
pub use lifecycle::{
    backup, backups, config_path, config_show, destroy, logs, prereqs, restore, rollback, status,
    version,
};
pub use self_update::self_update;
pub use update::{UpdateArgs, update};
