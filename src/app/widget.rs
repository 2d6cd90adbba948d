//! Widget capability trait.
//!
//! A widget is whatever a plugin contributes to a shell region. The trait is
//! a set of optional hooks rather than a hierarchy; concrete widgets
//! implement only what they need. Lifecycle hooks fire from the layout when
//! ownership changes, never from plugin code directly.

use serde_json::Value;

use super::layout::Region;
use crate::core::event::InputEvent;

pub trait Widget {
    /// Stable identifier, used for layout persistence and focus scopes.
    fn id(&self) -> &str;

    fn title(&self) -> &str {
        self.id()
    }

    fn focusable(&self) -> bool {
        true
    }

    /// Rows this widget wants when stacked in a shared region. Zero means
    /// take whatever space remains.
    fn preferred_height(&self) -> u16 {
        1
    }

    fn on_attach(&mut self, region: Region) {
        let _ = region;
    }

    fn on_detach(&mut self) {}

    fn on_activate(&mut self) {}

    fn on_resize(&mut self, width: u16, height: u16) {
        let _ = (width, height);
    }

    fn handle_input(&mut self, event: &InputEvent) -> EventResult {
        let _ = event;
        EventResult::Ignored
    }

    #[cfg(feature = "tui")]
    fn render(&mut self, frame: &mut ratatui::Frame, area: ratatui::layout::Rect) {
        let _ = (frame, area);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    Consumed,
    Ignored,
    /// The widget asks the shell to run a command on its behalf. Widgets
    /// never call other plugins' handlers directly.
    Command { id: String, args: Value },
}

impl EventResult {
    pub fn command(id: impl Into<String>) -> Self {
        EventResult::Command {
            id: id.into(),
            args: Value::Null,
        }
    }

    pub fn command_with_args(id: impl Into<String>, args: Value) -> Self {
        EventResult::Command {
            id: id.into(),
            args,
        }
    }

    pub fn is_consumed(&self) -> bool {
        !matches!(self, EventResult::Ignored)
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, EventResult::Ignored)
    }
}
