//! todo - a small persistent to-do list
//!
//! This library provides the task list model shared by the interactive
//! terminal UI and the one-shot CLI commands.
//!
//! # Core Concepts
//!
//! - **Task**: text, completion flag, priority and creation time under a unique id
//! - **Filter**: display-only projection (all, active, completed)
//! - **Store**: key-value blob storage that outlives the process
//! - **Confirm request**: a pending bulk removal, applied at most once
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `clock`: Time source for ids and creation stamps
//! - `config`: Configuration loading from `config.toml`
//! - `controller`: The task list controller and its operations
//! - `error`: Error types and result aliases
//! - `lock`: File locking and atomic writes
//! - `output`: Human and JSON output for CLI commands
//! - `storage`: Key-value stores and task list persistence
//! - `task`: Task records, priorities and filters
//! - `ui`: Terminal UI built on ratatui

pub mod cli;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod lock;
pub mod output;
pub mod storage;
pub mod task;
pub mod ui;

pub use error::{Error, Result};
