//! Welcome widget: the default main-area document.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::Widget;

pub const WIDGET_ID: &str = "welcome";

pub struct WelcomeView;

impl Widget for WelcomeView {
    fn id(&self) -> &str {
        WIDGET_ID
    }

    fn title(&self) -> &str {
        "Welcome"
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines = vec![
            Line::from(Span::styled(
                "atelier",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("A plugin-extensible workbench shell."),
            Line::from(""),
            Line::from("  ctrl+shift+p  command palette"),
            Line::from("  ctrl+b        toggle sidebar"),
            Line::from("  ctrl+j        toggle bottom panel"),
            Line::from("  ctrl+q        quit"),
        ];

        let block = Block::default().borders(Borders::ALL).title(self.title());
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}
