//! Command-line interface for todo
//!
//! This module defines the CLI structure using clap derive macros.
//! List commands live in `task`; running without a subcommand opens the UI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::storage::FileStore;
use crate::task::{Filter, TaskId};

mod task;

/// todo - a small persistent to-do list
///
/// Tasks live in a JSON file inside the data directory and are shared by the
/// interactive UI and the one-shot commands below.
#[derive(Parser, Debug)]
#[command(name = "todo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding config.toml and the task list
    #[arg(long, global = true, env = "TODO_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a task
    Add {
        /// Task text (joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,

        /// Mark the task as important
        #[arg(long)]
        important: bool,
    },

    /// List tasks
    List {
        /// Which tasks to show: all, active, completed
        #[arg(long, default_value = "all")]
        filter: String,
    },

    /// Flip a task between active and completed
    Toggle {
        /// Task ID
        id: TaskId,
    },

    /// Delete a task
    Rm {
        /// Task ID
        id: TaskId,
    },

    /// Replace a task's text
    Edit {
        /// Task ID
        id: TaskId,

        /// New text (joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Remove every completed task
    ClearCompleted {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove every task
    ClearAll {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Open the interactive list (default)
    Ui {
        /// Filter selected on start: all, active, completed
        #[arg(long, default_value = "all")]
        filter: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let dir = config::resolve_data_dir(self.dir.as_deref());
        let config = Config::load_from_dir(&dir);
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let command = self.command.unwrap_or(Commands::Ui {
            filter: Filter::All.as_str().to_string(),
        });

        match command {
            Commands::Add { text, important } => task::run_add(task::AddOptions {
                text: text.join(" "),
                important,
                dir,
                config,
                output,
            }),
            Commands::List { filter } => task::run_list(task::ListOptions {
                filter: parse_filter(&filter)?,
                dir,
                config,
                output,
            }),
            Commands::Toggle { id } => task::run_toggle(task::IdOptions {
                id,
                dir,
                config,
                output,
            }),
            Commands::Rm { id } => task::run_rm(task::IdOptions {
                id,
                dir,
                config,
                output,
            }),
            Commands::Edit { id, text } => task::run_edit(task::EditOptions {
                id,
                text: text.join(" "),
                dir,
                config,
                output,
            }),
            Commands::ClearCompleted { yes } => task::run_clear(task::ClearOptions {
                all: false,
                yes,
                dir,
                config,
                output,
            }),
            Commands::ClearAll { yes } => task::run_clear(task::ClearOptions {
                all: true,
                yes,
                dir,
                config,
                output,
            }),
            Commands::Ui { filter } => {
                if self.json {
                    return Err(Error::InvalidArgument(
                        "--json is not supported by the interactive UI".to_string(),
                    ));
                }
                let filter = parse_filter(&filter)?;
                crate::ui::run(FileStore::new(dir), &config, filter)
            }
        }
    }
}

fn parse_filter(value: &str) -> Result<Filter> {
    value.parse()
}
