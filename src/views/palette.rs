//! Command palette: filter visible commands by label, run one by id.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use serde_json::{json, Value};

use crate::app::{EventResult, Widget};
use crate::core::{CommandRegistry, InputEvent};

pub const WIDGET_ID: &str = "palette";

pub struct PaletteView {
    commands: CommandRegistry,
    query: String,
    selected: usize,
}

impl PaletteView {
    pub fn new(commands: CommandRegistry) -> Self {
        Self {
            commands,
            query: String::new(),
            selected: 0,
        }
    }

    /// Visible commands whose label contains the query, sorted by label.
    /// Metadata comes from the registry by id; the palette never touches a
    /// handler.
    fn matches(&self) -> Vec<(String, String)> {
        let query = self.query.trim().to_ascii_lowercase();
        let mut items: Vec<(String, String)> = self
            .commands
            .ids()
            .into_iter()
            .filter(|id| {
                self.commands
                    .is_visible(id, &Value::Null)
                    .unwrap_or(false)
            })
            .filter_map(|id| {
                let label = self.commands.label(&id, &Value::Null)?;
                if query.is_empty() || label.to_ascii_lowercase().contains(&query) {
                    Some((id, label))
                } else {
                    None
                }
            })
            .collect();
        items.sort_by(|a, b| a.1.cmp(&b.1));
        items
    }

    fn reset(&mut self) {
        self.query.clear();
        self.selected = 0;
    }
}

impl Widget for PaletteView {
    fn id(&self) -> &str {
        WIDGET_ID
    }

    fn title(&self) -> &str {
        "Command Palette"
    }

    fn preferred_height(&self) -> u16 {
        0
    }

    fn on_activate(&mut self) {
        self.reset();
    }

    fn handle_input(&mut self, event: &InputEvent) -> EventResult {
        let Some(key) = event.as_key() else {
            return EventResult::Ignored;
        };

        match key.code {
            KeyCode::Esc => EventResult::command("palette:toggle"),
            KeyCode::Enter => {
                let items = self.matches();
                match items.get(self.selected.min(items.len().saturating_sub(1))) {
                    Some((id, _)) => {
                        let args = json!({ "command": id });
                        self.reset();
                        EventResult::command_with_args("palette:run", args)
                    }
                    None => EventResult::Consumed,
                }
            }
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                EventResult::Consumed
            }
            KeyCode::Down => {
                self.selected = self.selected.saturating_add(1);
                EventResult::Consumed
            }
            KeyCode::Backspace => {
                if self.query.pop().is_some() {
                    self.selected = 0;
                }
                EventResult::Consumed
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.query.push(ch);
                self.selected = 0;
                EventResult::Consumed
            }
            _ => EventResult::Ignored,
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let items = self.matches();
        if !items.is_empty() {
            self.selected = self.selected.min(items.len() - 1);
        }

        let mut lines = Vec::with_capacity(items.len() + 1);
        lines.push(Line::from(Span::styled(
            format!("> {}", self.query),
            Style::default().fg(Color::Yellow),
        )));

        let visible = area.height.saturating_sub(3) as usize;
        let offset = self.selected.saturating_sub(visible.saturating_sub(1));
        for (idx, (_, label)) in items.iter().enumerate().skip(offset).take(visible.max(1)) {
            let style = if idx == self.selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(label.clone(), style)));
        }

        let block = Block::default().borders(Borders::ALL).title(self.title());
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}
