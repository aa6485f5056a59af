//! webgrade CLI
//!
//! Command-line front end: runs challenges across model directories with
//! nested process pools and shows the resulting scores.

pub mod commands;
pub mod config;
pub mod output;
pub mod pool;
