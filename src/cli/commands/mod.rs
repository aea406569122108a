//! One module per subcommand.  Each exposes an `execute` function that
//! `main` dispatches to.

pub mod add;
pub mod backup;
pub mod backups;
pub mod delete;
pub mod get;
pub mod init;
pub mod list;
pub mod restore;
pub mod update;
pub mod verify;
