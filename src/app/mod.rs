//! Application layer: shell, layout regions, widgets.

pub mod layout;
pub mod shell;
pub mod widget;

pub use layout::{AddOptions, LayoutSnapshot, LayoutState, Region, RegionConfig, WidgetKey};
pub use shell::AppShell;
pub use widget::{EventResult, Widget};
