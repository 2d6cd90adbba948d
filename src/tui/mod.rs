//! Terminal runtime (crossterm + ratatui).
//!
//! Kept apart from `core`/`app` so the headless shell can back other
//! frontends without dragging in terminal crates.

pub mod runloop;
pub mod terminal_guard;

pub use runloop::run;
pub use terminal_guard::{TerminalGuard, TerminalRestorer};
