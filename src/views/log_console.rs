//! Log console: drains the logging tee channel into a scrollback buffer.

use std::collections::VecDeque;
use std::sync::mpsc::Receiver;

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::Widget;

pub const WIDGET_ID: &str = "log-console";

pub struct LogConsoleView {
    rx: Option<Receiver<String>>,
    lines: VecDeque<String>,
    history: usize,
}

impl LogConsoleView {
    pub fn new(rx: Option<Receiver<String>>, history: usize) -> Self {
        Self {
            rx,
            lines: VecDeque::new(),
            history: history.max(1),
        }
    }

    fn drain(&mut self) {
        let Some(rx) = &self.rx else {
            return;
        };
        while let Ok(line) = rx.try_recv() {
            if self.lines.len() == self.history {
                self.lines.pop_front();
            }
            self.lines.push_back(line);
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

impl Widget for LogConsoleView {
    fn id(&self) -> &str {
        WIDGET_ID
    }

    fn title(&self) -> &str {
        "Logs"
    }

    fn focusable(&self) -> bool {
        false
    }

    /// Grows to fill whatever the bottom region has left.
    fn preferred_height(&self) -> u16 {
        0
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        self.drain();

        let visible = area.height.saturating_sub(2) as usize;
        let start = self.lines.len().saturating_sub(visible);
        let lines: Vec<Line> = self
            .lines
            .iter()
            .skip(start)
            .map(|line| Line::from(Span::styled(line.clone(), Style::default().fg(Color::Gray))))
            .collect();

        let block = Block::default().borders(Borders::TOP).title(self.title());
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}
