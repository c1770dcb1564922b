use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use tracing::debug;

use crate::config::{Config, UiConfig};
use crate::controller::TaskListController;
use crate::error::Result;
use crate::storage::{FileStore, KeyValueStore};
use crate::task::{Filter, Priority, Task, TaskId};

use super::dialog::{ConfirmDialog, DialogAction};
use super::input::LineInput;
use super::view;

const EVENT_POLL_MS: u64 = 120;
const ANIMATION_POLL_MS: u64 = 40;
const WATCH_DEBOUNCE_MS: u64 = 200;

enum UiMsg {
    StoreChanged,
    WatchError(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StatusKind {
    Error,
    Info,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Focus {
    Input,
    List,
}

/// Inline editor attached to one row.
#[derive(Debug, Clone)]
pub(crate) struct EditState {
    pub(crate) task_id: TaskId,
    pub(crate) input: LineInput,
}

#[derive(Debug, Clone, Copy)]
struct PendingRemoval {
    task_id: TaskId,
    deadline: Instant,
}

pub struct AppState<S: KeyValueStore> {
    pub(crate) controller: TaskListController<S>,
    pub(crate) input: LineInput,
    pub(crate) priority: Priority,
    pub(crate) focus: Focus,
    pub(crate) selected: usize,
    /// Row -> task bindings, rebuilt from scratch on every render.
    pub(crate) rows: Vec<TaskId>,
    pub(crate) editing: Option<EditState>,
    pub(crate) dialog: Option<ConfirmDialog>,
    /// Screen area of the open dialog, recorded by the last render.
    pub(crate) dialog_area: Option<Rect>,
    pub(crate) show_help: bool,
    shake_until: Option<Instant>,
    removals: Vec<PendingRemoval>,
    reload_pending: bool,
    status: Option<(String, StatusKind)>,
    watch_error: Option<String>,
    reload_error: Option<String>,
    ui: UiConfig,
}

impl<S: KeyValueStore> AppState<S> {
    pub fn new(controller: TaskListController<S>, config: &Config) -> Self {
        let mut app = Self {
            controller,
            input: LineInput::new(),
            priority: config.default_priority,
            focus: Focus::Input,
            selected: 0,
            rows: Vec::new(),
            editing: None,
            dialog: None,
            dialog_area: None,
            show_help: false,
            shake_until: None,
            removals: Vec::new(),
            reload_pending: false,
            status: None,
            watch_error: None,
            reload_error: None,
            ui: config.ui.clone(),
        };
        app.rebind_rows();
        app
    }

    /// Rebuild the row bindings from the current filtered view.
    pub(crate) fn rebind_rows(&mut self) {
        self.rows = self
            .controller
            .filtered_tasks()
            .iter()
            .map(|task| task.id)
            .collect();
        if self.selected >= self.rows.len() {
            self.selected = self.rows.len().saturating_sub(1);
        }
    }

    pub(crate) fn selected_id(&self) -> Option<TaskId> {
        self.rows.get(self.selected).copied()
    }

    pub(crate) fn selected_task(&self) -> Option<&Task> {
        self.selected_id().and_then(|id| self.controller.task(id))
    }

    pub(crate) fn is_shaking(&self, now: Instant) -> bool {
        self.shake_until.is_some_and(|until| now < until)
    }

    /// Elapsed share of the shake cue, used to offset the input box.
    pub(crate) fn shake_phase(&self, now: Instant) -> Option<usize> {
        let until = self.shake_until?;
        if now >= until {
            return None;
        }
        let remaining = until.duration_since(now).as_millis() as usize;
        Some(remaining / 60 % 4)
    }

    pub(crate) fn is_removing(&self, task_id: TaskId) -> bool {
        self.removals.iter().any(|pending| pending.task_id == task_id)
    }

    pub(crate) fn is_animating(&self) -> bool {
        self.shake_until.is_some() || !self.removals.is_empty()
    }

    pub(crate) fn status_line(&self) -> Option<(String, StatusKind)> {
        if let Some(err) = self.controller.persist_error() {
            return Some((format!("not saved: {err}"), StatusKind::Error));
        }
        if let Some(err) = self.reload_error.as_ref().or(self.watch_error.as_ref()) {
            return Some((err.clone(), StatusKind::Error));
        }
        self.status.clone()
    }

    pub(crate) fn footer_hint(&self) -> &'static str {
        if self.dialog.is_some() {
            return "y/enter confirm  n/esc cancel";
        }
        if self.editing.is_some() {
            return "enter save  tab save  esc cancel";
        }
        match self.focus {
            Focus::Input => "enter add  ctrl+p priority  ctrl+f filter  tab list  esc quit",
            Focus::List => {
                "j/k move  space toggle  e edit  d delete  1/2/3 filter  c/C clear  ? help  q quit"
            }
        }
    }

    fn set_info(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), StatusKind::Info));
    }

    fn submit_input(&mut self, now: Instant) {
        match self.controller.create(&self.input.value(), self.priority) {
            Some(id) => {
                self.input.clear();
                self.shake_until = None;
                self.rebind_rows();
                if let Some(index) = self.rows.iter().position(|row| *row == id) {
                    self.selected = index;
                }
                self.set_info("added");
            }
            None => {
                self.shake_until = Some(now + Duration::from_millis(self.ui.shake_ms));
            }
        }
    }

    fn toggle_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        if self.is_removing(id) {
            return;
        }
        if self.controller.toggle_complete(id) {
            let done = self.controller.task(id).is_some_and(|task| task.completed);
            self.set_info(if done { "completed" } else { "reopened" });
        }
    }

    /// Start the removal cue; the delete lands on a later tick.
    fn schedule_removal(&mut self, now: Instant) {
        let Some(id) = self.selected_id() else {
            return;
        };
        if self.is_removing(id) {
            return;
        }
        self.removals.push(PendingRemoval {
            task_id: id,
            deadline: now + Duration::from_millis(self.ui.delete_transition_ms),
        });
        self.tick(now);
    }

    fn begin_edit(&mut self) {
        let Some((task_id, text)) = self
            .selected_task()
            .map(|task| (task.id, task.text.clone()))
        else {
            return;
        };
        if self.is_removing(task_id) {
            return;
        }
        self.editing = Some(EditState {
            task_id,
            input: LineInput::with_value(&text, Some(self.ui.edit_max_len)),
        });
    }

    /// Leave edit mode, saving the input through `edit`.
    pub(crate) fn commit_edit(&mut self) {
        let Some(edit) = self.editing.take() else {
            return;
        };
        if self.controller.edit(edit.task_id, &edit.input.value()) {
            self.set_info("saved");
        }
        self.after_modal_closed();
    }

    pub(crate) fn cancel_edit(&mut self) {
        self.editing = None;
        self.after_modal_closed();
    }

    fn open_dialog(&mut self, request: Option<crate::controller::ConfirmRequest>, empty: &str) {
        match request {
            Some(request) => self.dialog = Some(ConfirmDialog::new(request)),
            None => self.set_info(empty.to_string()),
        }
    }

    pub(crate) fn resolve_dialog(&mut self, confirmed: bool) {
        let Some(dialog) = self.dialog.take() else {
            return;
        };
        self.dialog_area = None;
        if confirmed {
            let removed = self.controller.confirm(dialog.into_request());
            self.set_info(format!("removed {removed}"));
        } else {
            self.set_info("cancelled");
        }
        self.after_modal_closed();
    }

    fn set_filter(&mut self, filter: Filter) {
        self.controller.set_filter(filter);
        self.selected = 0;
    }

    /// Reload from storage unless an edit or dialog is open.
    fn on_store_changed(&mut self) {
        if self.editing.is_some() || self.dialog.is_some() {
            self.reload_pending = true;
            return;
        }
        debug!("store changed on disk, reloading");
        self.reload_pending = false;
        match self.controller.reload() {
            Ok(()) => self.reload_error = None,
            Err(err) => self.reload_error = Some(format!("reload failed, kept current list: {err}")),
        }
    }

    fn after_modal_closed(&mut self) {
        if self.reload_pending {
            self.on_store_changed();
        }
    }

    /// Advance time-based cues: expired removals are applied, shake ends.
    pub(crate) fn tick(&mut self, now: Instant) {
        if self.shake_until.is_some_and(|until| now >= until) {
            self.shake_until = None;
        }
        let (due, waiting): (Vec<PendingRemoval>, Vec<PendingRemoval>) =
            std::mem::take(&mut self.removals)
                .into_iter()
                .partition(|pending| now >= pending.deadline);
        self.removals = waiting;
        if due.is_empty() {
            return;
        }
        for pending in due {
            if let Some(edit) = self.editing.as_ref() {
                if edit.task_id == pending.task_id {
                    self.editing = None;
                }
            }
            if self.controller.delete(pending.task_id) {
                self.set_info("deleted");
            }
        }
        self.rebind_rows();
    }
}

pub fn run(store: FileStore, config: &Config, filter: Filter) -> Result<()> {
    std::fs::create_dir_all(store.dir())?;
    let (ui_tx, ui_rx) = mpsc::channel();
    spawn_watch(store.dir().to_path_buf(), ui_tx);

    let mut controller = TaskListController::open(store, config.storage_key.clone());
    controller.set_filter(filter);
    let mut app = AppState::new(controller, config);
    run_terminal(&mut app, ui_rx)
}

fn run_terminal(app: &mut AppState<FileStore>, ui_rx: Receiver<UiMsg>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app, ui_rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState<FileStore>,
    ui_rx: Receiver<UiMsg>,
) -> Result<()> {
    let mut dirty = true;
    loop {
        while let Ok(msg) = ui_rx.try_recv() {
            handle_ui_msg(app, msg);
            dirty = true;
        }

        let animating = app.is_animating();
        app.tick(Instant::now());
        if animating {
            dirty = true;
        }

        if dirty {
            terminal.draw(|frame| view::render(frame, app, Instant::now()))?;
            dirty = false;
        }

        let poll = if app.is_animating() {
            ANIMATION_POLL_MS
        } else {
            EVENT_POLL_MS
        };
        if event::poll(Duration::from_millis(poll))? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    if handle_key(app, key, Instant::now()) {
                        break;
                    }
                    dirty = true;
                }
                Event::Mouse(mouse) => {
                    handle_mouse(app, mouse);
                    dirty = true;
                }
                Event::FocusLost => {
                    app.commit_edit();
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }
    }
    Ok(())
}

fn handle_ui_msg<S: KeyValueStore>(app: &mut AppState<S>, msg: UiMsg) {
    match msg {
        UiMsg::StoreChanged => {
            app.on_store_changed();
            app.rebind_rows();
        }
        UiMsg::WatchError(err) => {
            app.watch_error = Some(format!("watch error: {err}"));
        }
    }
}

/// Route one key press. Returns true when the UI should exit.
pub(crate) fn handle_key<S: KeyValueStore>(
    app: &mut AppState<S>,
    key: KeyEvent,
    now: Instant,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    let quit = dispatch_key(app, key, now);
    app.rebind_rows();
    quit
}

fn dispatch_key<S: KeyValueStore>(app: &mut AppState<S>, key: KeyEvent, now: Instant) -> bool {
    if let Some(action) = app.dialog.as_ref().map(|dialog| dialog.handle_key(key)) {
        match action {
            DialogAction::Confirm => app.resolve_dialog(true),
            DialogAction::Cancel => app.resolve_dialog(false),
            DialogAction::None => {}
        }
        return false;
    }

    if app.editing.is_some() {
        match key.code {
            KeyCode::Enter | KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                app.commit_edit();
            }
            KeyCode::Esc => app.cancel_edit(),
            _ => {
                if let Some(edit) = app.editing.as_mut() {
                    edit.input.handle_key(key);
                }
            }
        }
        return false;
    }

    if app.consume_help_key(key) {
        return false;
    }

    match app.focus {
        Focus::Input => handle_input_key(app, key, now),
        Focus::List => handle_list_key(app, key, now),
    }
}

impl<S: KeyValueStore> AppState<S> {
    /// Any key closes the help overlay; `?` toggles it from the list.
    fn consume_help_key(&mut self, key: KeyEvent) -> bool {
        if self.show_help {
            self.show_help = false;
            return true;
        }
        if self.focus == Focus::List && key.code == KeyCode::Char('?') {
            self.show_help = true;
            return true;
        }
        false
    }
}

fn handle_input_key<S: KeyValueStore>(app: &mut AppState<S>, key: KeyEvent, now: Instant) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('p') => {
                app.priority = app.priority.next();
                return false;
            }
            KeyCode::Char('f') => {
                let next = app.controller.filter().next();
                app.set_filter(next);
                return false;
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Enter => app.submit_input(now),
        KeyCode::Tab | KeyCode::Down => app.focus = Focus::List,
        KeyCode::Esc => {
            if app.input.is_empty() {
                return true;
            }
            app.input.clear();
        }
        _ => {
            app.input.handle_key(key);
        }
    }
    false
}

fn handle_list_key<S: KeyValueStore>(app: &mut AppState<S>, key: KeyEvent, now: Instant) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('j') | KeyCode::Down => {
            if app.selected + 1 < app.rows.len() {
                app.selected += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.selected == 0 {
                app.focus = Focus::Input;
            } else {
                app.selected -= 1;
            }
        }
        KeyCode::Char('g') | KeyCode::Home => app.selected = 0,
        KeyCode::Char('G') | KeyCode::End => app.selected = app.rows.len().saturating_sub(1),
        KeyCode::Char(' ') | KeyCode::Char('x') | KeyCode::Enter => app.toggle_selected(),
        KeyCode::Char('e') => app.begin_edit(),
        KeyCode::Char('d') | KeyCode::Delete => app.schedule_removal(now),
        KeyCode::Char('1') => app.set_filter(Filter::All),
        KeyCode::Char('2') => app.set_filter(Filter::Active),
        KeyCode::Char('3') => app.set_filter(Filter::Completed),
        KeyCode::Char('f') => {
            let next = app.controller.filter().next();
            app.set_filter(next);
        }
        KeyCode::Char('p') => app.priority = app.priority.next(),
        KeyCode::Char('c') => {
            let request = app.controller.request_clear_completed();
            app.open_dialog(request, "no completed tasks");
        }
        KeyCode::Char('C') => {
            let request = app.controller.request_clear_all();
            app.open_dialog(request, "no tasks");
        }
        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Tab | KeyCode::BackTab => {
            app.focus = Focus::Input;
        }
        _ => {}
    }
    false
}

/// A press outside the dialog dismisses it without applying.
pub(crate) fn handle_mouse<S: KeyValueStore>(app: &mut AppState<S>, mouse: MouseEvent) {
    if !matches!(mouse.kind, MouseEventKind::Down(_)) {
        return;
    }
    if app.dialog.is_none() {
        return;
    }
    let inside = app.dialog_area.is_some_and(|area| {
        mouse.column >= area.x
            && mouse.column < area.x.saturating_add(area.width)
            && mouse.row >= area.y
            && mouse.row < area.y.saturating_add(area.height)
    });
    if !inside {
        app.resolve_dialog(false);
    }
}

fn spawn_watch(dir: PathBuf, ui_tx: Sender<UiMsg>) {
    if !dir.exists() {
        return;
    }

    thread::spawn(move || {
        let (event_tx, event_rx) = mpsc::channel();
        let watcher: notify::Result<RecommendedWatcher> = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(err) => {
                let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
                return;
            }
        };

        if let Err(err) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
            return;
        }

        let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
        let mut pending: Option<Instant> = None;

        loop {
            let timeout = pending
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    let data_changed = event.paths.iter().any(|path| {
                        path.extension().and_then(|ext| ext.to_str()) == Some("json")
                    });
                    if data_changed {
                        pending = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(err)) => {
                    let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if pending.take().is_some() && ui_tx.send(UiMsg::StoreChanged).is_err() {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::TaskListController;
    use crate::storage::{self, MemoryStore, DEFAULT_STORAGE_KEY};

    fn app() -> AppState<MemoryStore> {
        let controller = TaskListController::open(MemoryStore::new(), DEFAULT_STORAGE_KEY);
        AppState::new(controller, &Config::default())
    }

    fn press(app: &mut AppState<MemoryStore>, code: KeyCode, now: Instant) -> bool {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE), now)
    }

    fn ctrl(app: &mut AppState<MemoryStore>, ch: char, now: Instant) -> bool {
        handle_key(app, KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL), now)
    }

    fn type_text(app: &mut AppState<MemoryStore>, text: &str, now: Instant) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch), now);
        }
    }

    fn add(app: &mut AppState<MemoryStore>, text: &str, now: Instant) {
        type_text(app, text, now);
        press(app, KeyCode::Enter, now);
    }

    #[test]
    fn enter_adds_task_and_clears_input() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "water plants", now);
        assert_eq!(app.controller.tasks().len(), 1);
        assert_eq!(app.controller.tasks()[0].text, "water plants");
        assert!(app.input.is_empty());
        assert_eq!(app.rows.len(), 1);
        assert!(!app.is_shaking(now));
    }

    #[test]
    fn blank_submission_shakes_then_settles() {
        let mut app = app();
        let now = Instant::now();
        type_text(&mut app, "   ", now);
        press(&mut app, KeyCode::Enter, now);
        assert!(app.controller.tasks().is_empty());
        assert!(app.is_shaking(now));
        assert_eq!(app.input.value(), "   ");

        let later = now + Duration::from_millis(600);
        app.tick(later);
        assert!(!app.is_shaking(later));
        assert!(!app.is_animating());
    }

    #[test]
    fn ctrl_p_sets_priority_for_new_tasks() {
        let mut app = app();
        let now = Instant::now();
        ctrl(&mut app, 'p', now);
        add(&mut app, "file taxes", now);
        assert_eq!(app.controller.tasks()[0].priority, Priority::Important);
    }

    #[test]
    fn delete_waits_for_transition() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "one", now);
        add(&mut app, "two", now);
        press(&mut app, KeyCode::Tab, now);
        let target = app.selected_id().expect("selection");

        press(&mut app, KeyCode::Char('d'), now);
        assert!(app.is_removing(target));
        assert_eq!(app.controller.tasks().len(), 2);

        app.tick(now + Duration::from_millis(100));
        assert_eq!(app.controller.tasks().len(), 2);

        app.tick(now + Duration::from_millis(300));
        assert_eq!(app.controller.tasks().len(), 1);
        assert!(app.controller.task(target).is_none());
        assert!(!app.rows.contains(&target));
        assert!(!app.is_animating());
    }

    #[test]
    fn zero_transition_deletes_immediately() {
        let mut config = Config::default();
        config.ui.delete_transition_ms = 0;
        let controller = TaskListController::open(MemoryStore::new(), DEFAULT_STORAGE_KEY);
        let mut app = AppState::new(controller, &config);
        let now = Instant::now();
        add(&mut app, "gone", now);
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Delete, now);
        assert!(app.controller.tasks().is_empty());
    }

    #[test]
    fn space_toggles_selected_row() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "read", now);
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Char(' '), now);
        assert!(app.controller.tasks()[0].completed);
        press(&mut app, KeyCode::Char('x'), now);
        assert!(!app.controller.tasks()[0].completed);
    }

    #[test]
    fn edit_commits_on_enter_and_blur() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "draft", now);
        press(&mut app, KeyCode::Tab, now);

        press(&mut app, KeyCode::Char('e'), now);
        assert!(app.editing.is_some());
        type_text(&mut app, " v2", now);
        press(&mut app, KeyCode::Enter, now);
        assert!(app.editing.is_none());
        assert_eq!(app.controller.tasks()[0].text, "draft v2");

        press(&mut app, KeyCode::Char('e'), now);
        press(&mut app, KeyCode::Backspace, now);
        press(&mut app, KeyCode::Tab, now);
        assert!(app.editing.is_none());
        assert_eq!(app.controller.tasks()[0].text, "draft v");
    }

    #[test]
    fn edit_cancel_and_blank_leave_text_alone() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "keep me", now);
        press(&mut app, KeyCode::Tab, now);

        press(&mut app, KeyCode::Char('e'), now);
        type_text(&mut app, " changed", now);
        press(&mut app, KeyCode::Esc, now);
        assert!(app.editing.is_none());
        assert_eq!(app.controller.tasks()[0].text, "keep me");

        press(&mut app, KeyCode::Char('e'), now);
        ctrl(&mut app, 'u', now);
        press(&mut app, KeyCode::Enter, now);
        assert!(app.editing.is_none());
        assert_eq!(app.controller.tasks()[0].text, "keep me");
    }

    #[test]
    fn unchanged_commit_keeps_text_longer_than_edit_cap() {
        let controller = TaskListController::open(MemoryStore::new(), DEFAULT_STORAGE_KEY);
        let mut app = AppState::new(controller, &Config::default());
        let long = "x".repeat(150);
        let id = app
            .controller
            .create(&long, Priority::Normal)
            .expect("create");
        app.rebind_rows();
        let now = Instant::now();
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Char('e'), now);
        assert_eq!(app.editing.as_ref().map(|edit| edit.input.value()), Some(long.clone()));

        press(&mut app, KeyCode::Enter, now);
        assert!(app.editing.is_none());
        assert_eq!(app.controller.task(id).map(|task| task.text.len()), Some(150));

        press(&mut app, KeyCode::Char('e'), now);
        type_text(&mut app, "y", now);
        press(&mut app, KeyCode::Enter, now);
        assert_eq!(app.controller.task(id).map(|task| task.text.as_str()), Some(long.as_str()));
    }

    #[test]
    fn focus_lost_commits_edit() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "abc", now);
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Char('e'), now);
        type_text(&mut app, "d", now);
        app.commit_edit();
        assert_eq!(app.controller.tasks()[0].text, "abcd");
    }

    #[test]
    fn clear_completed_dialog_confirms_once() {
        let mut app = app();
        let now = Instant::now();
        for text in ["a", "b", "c"] {
            add(&mut app, text, now);
        }
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Char(' '), now);
        press(&mut app, KeyCode::Char('j'), now);
        press(&mut app, KeyCode::Char(' '), now);

        press(&mut app, KeyCode::Char('c'), now);
        press(&mut app, KeyCode::Char('c'), now);
        let dialog = app.dialog.as_ref().expect("dialog");
        assert!(dialog.message().contains('2'));

        press(&mut app, KeyCode::Char('y'), now);
        assert!(app.dialog.is_none());
        assert_eq!(app.controller.tasks().len(), 1);

        press(&mut app, KeyCode::Char('y'), now);
        assert_eq!(app.controller.tasks().len(), 1);
    }

    #[test]
    fn clear_with_nothing_to_clear_opens_no_dialog() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "open", now);
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Char('c'), now);
        assert!(app.dialog.is_none());
    }

    #[test]
    fn clear_all_dialog_declines_via_escape_and_outside_click() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "a", now);
        add(&mut app, "b", now);
        press(&mut app, KeyCode::Tab, now);

        press(&mut app, KeyCode::Char('C'), now);
        press(&mut app, KeyCode::Esc, now);
        assert!(app.dialog.is_none());
        assert_eq!(app.controller.tasks().len(), 2);

        press(&mut app, KeyCode::Char('C'), now);
        app.dialog_area = Some(Rect::new(10, 5, 20, 6));
        handle_mouse(
            &mut app,
            MouseEvent {
                kind: MouseEventKind::Down(crossterm::event::MouseButton::Left),
                column: 12,
                row: 7,
                modifiers: KeyModifiers::NONE,
            },
        );
        assert!(app.dialog.is_some());
        handle_mouse(
            &mut app,
            MouseEvent {
                kind: MouseEventKind::Down(crossterm::event::MouseButton::Left),
                column: 1,
                row: 1,
                modifiers: KeyModifiers::NONE,
            },
        );
        assert!(app.dialog.is_none());
        assert_eq!(app.controller.tasks().len(), 2);

        press(&mut app, KeyCode::Char('C'), now);
        press(&mut app, KeyCode::Enter, now);
        assert!(app.controller.tasks().is_empty());
        assert!(app.rows.is_empty());
    }

    #[test]
    fn filter_keys_rebind_rows() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "a", now);
        add(&mut app, "b", now);
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Char(' '), now);

        press(&mut app, KeyCode::Char('2'), now);
        assert_eq!(app.controller.filter(), Filter::Active);
        assert_eq!(app.rows.len(), 1);
        press(&mut app, KeyCode::Char('3'), now);
        assert_eq!(app.rows.len(), 1);
        press(&mut app, KeyCode::Char('1'), now);
        assert_eq!(app.rows.len(), 2);

        let unique: std::collections::HashSet<TaskId> = app.rows.iter().copied().collect();
        assert_eq!(unique.len(), app.rows.len());
    }

    #[test]
    fn toggling_under_active_filter_drops_row() {
        let mut app = app();
        let now = Instant::now();
        add(&mut app, "a", now);
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Char('2'), now);
        press(&mut app, KeyCode::Char(' '), now);
        assert!(app.rows.is_empty());
        assert_eq!(app.selected_id(), None);
        assert_eq!(app.controller.empty_state_message(), Some("No active tasks"));
    }

    #[test]
    fn quit_keys() {
        let mut app = app();
        let now = Instant::now();
        assert!(ctrl(&mut app, 'c', now));
        type_text(&mut app, "x", now);
        assert!(!press(&mut app, KeyCode::Esc, now));
        assert!(app.input.is_empty());
        assert!(press(&mut app, KeyCode::Esc, now));
        press(&mut app, KeyCode::Tab, now);
        assert!(press(&mut app, KeyCode::Char('q'), now));
    }

    #[test]
    fn store_change_waits_for_open_editor() {
        let store = MemoryStore::new();
        let controller = TaskListController::open(store.clone(), DEFAULT_STORAGE_KEY);
        let mut app = AppState::new(controller, &Config::default());
        let now = Instant::now();
        add(&mut app, "mine", now);
        press(&mut app, KeyCode::Tab, now);
        press(&mut app, KeyCode::Char('e'), now);

        let mut other = store.clone();
        let mut tasks = storage::load_tasks(&other, DEFAULT_STORAGE_KEY);
        tasks.push(crate::task::Task::new(
            1,
            "from elsewhere",
            Priority::Normal,
            chrono::Utc::now(),
        ));
        storage::save_tasks(&mut other, DEFAULT_STORAGE_KEY, &tasks).expect("save");

        handle_ui_msg(&mut app, UiMsg::StoreChanged);
        assert_eq!(app.controller.tasks().len(), 1);

        press(&mut app, KeyCode::Esc, now);
        assert_eq!(app.controller.tasks().len(), 2);
    }

    #[test]
    fn unreadable_store_change_keeps_session_list() {
        let store = MemoryStore::new();
        let controller = TaskListController::open(store.clone(), DEFAULT_STORAGE_KEY);
        let mut app = AppState::new(controller, &Config::default());
        let now = Instant::now();
        for text in ["a", "b", "c"] {
            add(&mut app, text, now);
        }

        let mut other = store.clone();
        other.set(DEFAULT_STORAGE_KEY, "[{\"id\":").expect("set");
        handle_ui_msg(&mut app, UiMsg::StoreChanged);
        assert_eq!(app.controller.tasks().len(), 3);
        assert_eq!(app.rows.len(), 3);
        let (status, kind) = app.status_line().expect("status");
        assert_eq!(kind, StatusKind::Error);
        assert!(status.contains("reload failed"));

        add(&mut app, "d", now);
        assert_eq!(storage::load_tasks(&store, DEFAULT_STORAGE_KEY).len(), 4);

        handle_ui_msg(&mut app, UiMsg::StoreChanged);
        assert!(app.status_line().map_or(true, |(_, kind)| kind == StatusKind::Info));
    }
}
