//! atelier - plugin-extensible workbench shell
//!
//! Module structure:
//! - core: framework primitives (Token, ServiceRegistry, PluginRegistry, CommandRegistry)
//! - app: application shell, layout regions, widget trait
//! - services: built-in capability implementations behind well-known tokens
//! - builtin: the workbench's own plugins (feature "tui")
//! - views: TUI widgets (feature "tui")
//! - tui: terminal runtime (feature "tui")

pub mod app;
pub mod core;
pub mod logging;
pub mod services;

#[cfg(feature = "tui")]
pub mod builtin;
#[cfg(feature = "tui")]
pub mod tui;
#[cfg(feature = "tui")]
pub mod views;
