//! todo list command implementations
//!
//! Each command opens the stored list, applies one controller operation and
//! reports the result through the shared output layer.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;
use crate::controller::{FixedAnswer, Prompt, TaskListController};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::FileStore;
use crate::task::{format_created, Filter, Priority, Task, TaskCounts, TaskId};

/// Options for `todo add`
pub struct AddOptions {
    pub text: String,
    pub important: bool,
    pub dir: PathBuf,
    pub config: Config,
    pub output: OutputOptions,
}

/// Options for `todo list`
pub struct ListOptions {
    pub filter: Filter,
    pub dir: PathBuf,
    pub config: Config,
    pub output: OutputOptions,
}

/// Options for `todo toggle` and `todo rm`
pub struct IdOptions {
    pub id: TaskId,
    pub dir: PathBuf,
    pub config: Config,
    pub output: OutputOptions,
}

/// Options for `todo edit`
pub struct EditOptions {
    pub id: TaskId,
    pub text: String,
    pub dir: PathBuf,
    pub config: Config,
    pub output: OutputOptions,
}

/// Options for `todo clear-completed` and `todo clear-all`
pub struct ClearOptions {
    pub all: bool,
    pub yes: bool,
    pub dir: PathBuf,
    pub config: Config,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct TaskAddedOutput<'a> {
    task: &'a Task,
    counts: TaskCounts,
}

#[derive(Serialize)]
struct TaskListOutput<'a> {
    filter: Filter,
    summary: String,
    counts: TaskCounts,
    tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
struct TaskChangeOutput<'a> {
    id: TaskId,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<&'a Task>,
    counts: TaskCounts,
}

#[derive(Serialize)]
struct ClearOutput {
    action: &'static str,
    pending: usize,
    removed: usize,
    counts: TaskCounts,
}

/// Reads a yes/no answer from stdin, asking on stderr.
struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        eprint!("{message} [y/N] ");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_yes(&answer),
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Open the list with its lock held until the command finishes.
fn open_controller(dir: PathBuf, config: &Config) -> Result<TaskListController<FileStore>> {
    let store = FileStore::new(dir).lock_key(&config.storage_key)?;
    Ok(TaskListController::open(store, config.storage_key.clone()))
}

/// Turn a write failure the controller recorded into a command error.
fn ensure_persisted(controller: &TaskListController<FileStore>) -> Result<()> {
    match controller.persist_error() {
        Some(reason) => Err(Error::OperationFailed(reason.to_string())),
        None => Ok(()),
    }
}

fn task_line(task: &Task) -> String {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let mut line = format!("{mark} {} {}", task.id, task.text);
    if task.priority.is_important() {
        line.push_str(" (important)");
    }
    line.push(' ');
    line.push_str(&format_created(task.created_at));
    line
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let mut controller = open_controller(options.dir, &options.config)?;
    let priority = if options.important {
        Priority::Important
    } else {
        options.config.default_priority
    };
    let id = controller
        .create(&options.text, priority)
        .ok_or_else(|| Error::InvalidArgument("task text cannot be empty".to_string()))?;
    ensure_persisted(&controller)?;

    let task = controller
        .task(id)
        .ok_or_else(|| Error::OperationFailed(format!("task {id} missing after create")))?;
    let output = TaskAddedOutput {
        task,
        counts: controller.counts(),
    };

    let mut human = HumanOutput::new("Task added");
    human.push_summary("ID", id.to_string());
    human.push_summary("Text", task.text.clone());
    human.push_summary("Priority", task.priority.to_string());
    human.push_next_step("todo list");

    emit_success(options.output, "add", &output, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let mut controller = open_controller(options.dir, &options.config)?;
    controller.set_filter(options.filter);

    let tasks = controller.filtered_tasks();
    let output = TaskListOutput {
        filter: options.filter,
        summary: controller.footer_summary(),
        counts: controller.counts(),
        tasks: tasks.clone(),
    };

    let mut human = HumanOutput::new(format!("Tasks ({})", options.filter.label()));
    human.push_summary(controller.footer_summary(), "");
    match controller.empty_state_message() {
        Some(message) => human.push_detail(message),
        None => {
            for task in tasks {
                human.push_detail(task_line(task));
            }
        }
    }

    emit_success(options.output, "list", &output, Some(&human))
}

pub fn run_toggle(options: IdOptions) -> Result<()> {
    let mut controller = open_controller(options.dir, &options.config)?;
    let changed = controller.toggle_complete(options.id);
    ensure_persisted(&controller)?;
    let task = controller.task(options.id);

    let header = match task {
        Some(task) if task.completed => "Task completed",
        Some(_) => "Task reopened",
        None => "No change",
    };
    emit_change(options.output, "toggle", options.id, changed, task, header, &controller)
}

pub fn run_rm(options: IdOptions) -> Result<()> {
    let mut controller = open_controller(options.dir, &options.config)?;
    let changed = controller.delete(options.id);
    ensure_persisted(&controller)?;

    let header = if changed { "Task deleted" } else { "No change" };
    emit_change(options.output, "rm", options.id, changed, None, header, &controller)
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut controller = open_controller(options.dir, &options.config)?;
    let changed = controller.edit(options.id, &options.text);
    ensure_persisted(&controller)?;

    let header = if changed { "Task updated" } else { "No change" };
    let task = controller.task(options.id);
    emit_change(options.output, "edit", options.id, changed, task, header, &controller)
}

fn emit_change(
    output: OutputOptions,
    command: &str,
    id: TaskId,
    changed: bool,
    task: Option<&Task>,
    header: &str,
    controller: &TaskListController<FileStore>,
) -> Result<()> {
    let report = TaskChangeOutput {
        id,
        changed,
        task,
        counts: controller.counts(),
    };

    let mut human = HumanOutput::new(header);
    match task {
        Some(task) if changed => human.push_detail(task_line(task)),
        None if !changed => human.push_warning(format!("no task with id {id}")),
        _ => {}
    }
    human.push_summary(controller.footer_summary(), "");

    emit_success(output, command, &report, Some(&human))
}

pub fn run_clear(options: ClearOptions) -> Result<()> {
    let mut controller = open_controller(options.dir, &options.config)?;
    let counts = controller.counts();
    let (command, action, pending) = if options.all {
        ("clear-all", "all", counts.total)
    } else {
        ("clear-completed", "completed", counts.completed)
    };

    let mut prompt: Box<dyn Prompt> = if options.yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(StdinPrompt)
    };
    let removed = if options.all {
        controller.clear_all(prompt.as_mut())
    } else {
        controller.clear_completed(prompt.as_mut())
    };
    ensure_persisted(&controller)?;

    let header = if pending == 0 {
        "Nothing to clear".to_string()
    } else if removed == 0 {
        "Cancelled".to_string()
    } else {
        format!("Removed {removed} task(s)")
    };
    let report = ClearOutput {
        action,
        pending,
        removed,
        counts: controller.counts(),
    };

    let mut human = HumanOutput::new(header);
    human.push_summary(controller.footer_summary(), "");
    if pending > 0 && removed == 0 {
        human.push_next_step(format!("todo {command} --yes"));
    }

    emit_success(options.output, command, &report, Some(&human))
}
