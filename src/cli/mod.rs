//! CLI module for the petaug binary
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod report;

pub use main_impl::{main, Cli, Command, DiffusionArgs};
