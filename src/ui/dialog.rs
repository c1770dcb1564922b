use crossterm::event::{KeyCode, KeyEvent};

use crate::controller::ConfirmRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    None,
    Confirm,
    Cancel,
}

/// Modal yes/no question holding the request it will apply.
///
/// The request moves out on confirm, so one dialog applies at most once.
#[derive(Debug, Clone)]
pub struct ConfirmDialog {
    request: ConfirmRequest,
}

impl ConfirmDialog {
    pub fn new(request: ConfirmRequest) -> Self {
        Self { request }
    }

    pub fn message(&self) -> &str {
        self.request.message()
    }

    pub fn into_request(self) -> ConfirmRequest {
        self.request
    }

    pub fn handle_key(&self, key: KeyEvent) -> DialogAction {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => DialogAction::Confirm,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Char('q') | KeyCode::Esc => {
                DialogAction::Cancel
            }
            _ => DialogAction::None,
        }
    }
}
