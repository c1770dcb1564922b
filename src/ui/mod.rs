//! Interactive terminal front end.

pub mod app;
pub mod dialog;
pub mod input;
pub mod view;

pub use app::{run, AppState};
