//! TUI widgets contributed by the built-in plugins.

pub mod log_console;
pub mod palette;
pub mod status_bar;
pub mod welcome;

pub use log_console::LogConsoleView;
pub use palette::PaletteView;
pub use status_bar::{StatusBarView, StatusModel};
pub use welcome::WelcomeView;
