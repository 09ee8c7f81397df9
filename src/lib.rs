// ABOUTME: Library root for keel - deployment lifecycle engine behind the CLI.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod output;
pub mod provider;
pub mod registry;
pub mod runner;
pub mod selfupdate;
pub mod types;
