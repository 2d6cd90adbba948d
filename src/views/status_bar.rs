//! Status line: current widget plus registry counts.
//!
//! The bar renders from a shared model that observers keep up to date, so
//! drawing never reaches back into shell state mid-render.

use std::cell::{Cell, RefCell};

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::Span;
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::Widget;

pub const WIDGET_ID: &str = "status-bar";

#[derive(Default)]
pub struct StatusModel {
    pub current: RefCell<Option<String>>,
    pub plugins_active: Cell<usize>,
    pub plugins_total: Cell<usize>,
    pub commands: Cell<usize>,
}

pub struct StatusBarView {
    model: std::rc::Rc<StatusModel>,
}

impl StatusBarView {
    pub fn new(model: std::rc::Rc<StatusModel>) -> Self {
        Self { model }
    }

    fn line(&self) -> String {
        let current = self
            .model
            .current
            .borrow()
            .clone()
            .unwrap_or_else(|| "no document".to_string());
        format!(
            " {} | plugins {}/{} | commands {} | ctrl+shift+p palette",
            current,
            self.model.plugins_active.get(),
            self.model.plugins_total.get(),
            self.model.commands.get(),
        )
    }
}

impl Widget for StatusBarView {
    fn id(&self) -> &str {
        WIDGET_ID
    }

    fn title(&self) -> &str {
        "Status"
    }

    fn focusable(&self) -> bool {
        false
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let status = Paragraph::new(Span::styled(
            self.line(),
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(status, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn line_reflects_model() {
        let model = Rc::new(StatusModel::default());
        model.current.replace(Some("notes.md".to_string()));
        model.plugins_active.set(4);
        model.plugins_total.set(5);
        model.commands.set(9);

        let view = StatusBarView::new(Rc::clone(&model));
        let line = view.line();
        assert!(line.contains("notes.md"));
        assert!(line.contains("plugins 4/5"));
        assert!(line.contains("commands 9"));
    }

    #[test]
    fn status_bar_refuses_focus() {
        let view = StatusBarView::new(Rc::new(StatusModel::default()));
        assert!(!view.focusable());
    }
}
