//! Library entry point for the privado CLI.

pub mod access;
pub mod commands;
pub mod config;
pub mod docker;
pub mod error;
pub mod path;
pub mod prompt;
