//! Event loop: polls the terminal, dispatches keys, renders shell regions.
//!
//! Keys go to the keymap first; anything unbound falls through to the
//! focused widget. Widgets reply with command requests rather than acting
//! on the shell directly.

use std::io;
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::KeyEventKind;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::{Frame, Terminal};
use serde_json::Value;
use tokio::runtime::Runtime;

use crate::app::{AppShell, EventResult, LayoutState, Region};
use crate::core::{InputEvent, Key, KeyLookup};

use super::terminal_guard::TerminalGuard;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(shell: &Rc<AppShell>, runtime: &Runtime) -> io::Result<()> {
    let guard = TerminalGuard::new()?;

    let (sig_tx, sig_rx) = std::sync::mpsc::channel::<()>();
    #[cfg(unix)]
    let _signal_thread = super::terminal_guard::install_termination_signals(guard.restorer(), sig_tx)?;
    #[cfg(not(unix))]
    drop(sig_tx);

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    let mut pending: Vec<Key> = Vec::new();

    while !shell.quit_requested() {
        if sig_rx.try_recv().is_ok() {
            tracing::info!("termination signal received");
            break;
        }

        terminal.draw(|frame| render(shell, frame))?;

        if crossterm::event::poll(POLL_INTERVAL)? {
            let event = InputEvent::from(crossterm::event::read()?);
            handle_event(shell, runtime, &mut pending, &event);
        }
    }

    drop(guard);
    Ok(())
}

fn handle_event(shell: &AppShell, runtime: &Runtime, pending: &mut Vec<Key>, event: &InputEvent) {
    match event {
        InputEvent::Key(key_event)
            if matches!(key_event.kind, KeyEventKind::Press | KeyEventKind::Repeat) =>
        {
            let key = Key::from(*key_event);
            pending.push(key);

            let context = shell.focus_context();
            match shell.commands().lookup_key(pending, &context) {
                KeyLookup::Exact { command, args } => {
                    pending.clear();
                    execute(shell, runtime, &command, args);
                }
                KeyLookup::Pending => {}
                KeyLookup::NoMatch => {
                    let was_chord = pending.len() > 1;
                    pending.clear();
                    if was_chord {
                        // A broken chord: give its last key one more chance
                        // as a standalone binding before falling through.
                        match shell.commands().lookup_key(&[key], &context) {
                            KeyLookup::Exact { command, args } => {
                                execute(shell, runtime, &command, args);
                                return;
                            }
                            KeyLookup::Pending => {
                                pending.push(key);
                                return;
                            }
                            KeyLookup::NoMatch => {}
                        }
                    }
                    deliver_to_focused(shell, runtime, event);
                }
            }
        }
        InputEvent::Key(_) => {}
        InputEvent::Resize(_, _) => {}
        _ => deliver_to_focused(shell, runtime, event),
    }
}

fn deliver_to_focused(shell: &AppShell, runtime: &Runtime, event: &InputEvent) {
    let result = shell.with_layout(|layout| {
        let key = layout.focused()?;
        let widget = layout.widget_mut(key)?;
        Some(widget.handle_input(event))
    });

    if let Some(EventResult::Command { id, args }) = result {
        execute(shell, runtime, &id, args);
    }
}

fn execute(shell: &AppShell, runtime: &Runtime, id: &str, args: Value) {
    match runtime.block_on(shell.commands().execute(id, args)) {
        Ok(_) => tracing::debug!(command = %id, "command executed"),
        Err(err) => tracing::warn!(command = %id, error = %err, "command failed"),
    }
}

fn render(shell: &AppShell, frame: &mut Frame) {
    shell.with_layout(|layout| {
        let mut area = frame.area();

        if layout.is_region_visible(Region::Top) {
            for key in layout.widgets_in(Region::Top).to_vec() {
                let height = layout
                    .widget(key)
                    .map(|w| w.preferred_height().max(1))
                    .unwrap_or(1)
                    .min(area.height);
                let (top, rest) = split_top(area, height);
                if let Some(widget) = layout.widget_mut(key) {
                    widget.render(frame, top);
                }
                area = rest;
            }
        }

        if layout.is_region_visible(Region::Bottom)
            && !layout.widgets_in(Region::Bottom).is_empty()
        {
            let height = layout.config(Region::Bottom).size.min(area.height);
            let (rest, bottom) = split_bottom(area, height);
            render_stack(layout, frame, Region::Bottom, bottom);
            area = rest;
        }

        if layout.is_region_visible(Region::Left) && !layout.widgets_in(Region::Left).is_empty() {
            let width = layout.config(Region::Left).size.min(area.width);
            let (left, rest) = split_left(area, width);
            render_stack(layout, frame, Region::Left, left);
            area = rest;
        }

        if layout.is_region_visible(Region::Right) && !layout.widgets_in(Region::Right).is_empty()
        {
            let width = layout.config(Region::Right).size.min(area.width);
            let (rest, right) = split_right(area, width);
            render_stack(layout, frame, Region::Right, right);
            area = rest;
        }

        let main_keys = layout.widgets_in(Region::Main).to_vec();
        let shown = layout
            .current()
            .filter(|key| main_keys.contains(key))
            .or_else(|| main_keys.first().copied());
        if let Some(key) = shown {
            if let Some(widget) = layout.widget_mut(key) {
                widget.render(frame, area);
            }
        }
    });
}

/// Stacks a region's widgets vertically. A preferred height of zero means
/// the widget takes whatever remains.
fn render_stack(layout: &mut LayoutState, frame: &mut Frame, region: Region, area: Rect) {
    let keys = layout.widgets_in(region).to_vec();
    if keys.is_empty() {
        return;
    }

    let constraints: Vec<Constraint> = keys
        .iter()
        .map(|key| match layout.widget(*key).map(|w| w.preferred_height()) {
            Some(0) => Constraint::Min(1),
            Some(height) => Constraint::Length(height),
            None => Constraint::Length(1),
        })
        .collect();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (key, rect) in keys.iter().zip(chunks.iter()) {
        if let Some(widget) = layout.widget_mut(*key) {
            widget.render(frame, *rect);
        }
    }
}

fn split_top(area: Rect, height: u16) -> (Rect, Rect) {
    let height = height.min(area.height);
    (
        Rect { height, ..area },
        Rect {
            y: area.y + height,
            height: area.height - height,
            ..area
        },
    )
}

fn split_bottom(area: Rect, height: u16) -> (Rect, Rect) {
    let height = height.min(area.height);
    (
        Rect {
            height: area.height - height,
            ..area
        },
        Rect {
            y: area.y + area.height - height,
            height,
            ..area
        },
    )
}

fn split_left(area: Rect, width: u16) -> (Rect, Rect) {
    let width = width.min(area.width);
    (
        Rect { width, ..area },
        Rect {
            x: area.x + width,
            width: area.width - width,
            ..area
        },
    )
}

fn split_right(area: Rect, width: u16) -> (Rect, Rect) {
    let width = width.min(area.width);
    (
        Rect {
            width: area.width - width,
            ..area
        },
        Rect {
            x: area.x + area.width - width,
            width,
            ..area
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_partition_the_area() {
        let area = Rect::new(0, 0, 80, 24);

        let (top, rest) = split_top(area, 2);
        assert_eq!(top.height, 2);
        assert_eq!(rest.height, 22);
        assert_eq!(rest.y, 2);

        let (rest, bottom) = split_bottom(area, 8);
        assert_eq!(bottom.height, 8);
        assert_eq!(bottom.y, 16);
        assert_eq!(rest.height, 16);

        let (left, rest) = split_left(area, 32);
        assert_eq!(left.width, 32);
        assert_eq!(rest.x, 32);
        assert_eq!(rest.width, 48);
    }

    #[test]
    fn splits_clamp_to_available_space() {
        let area = Rect::new(0, 0, 10, 4);
        let (top, rest) = split_top(area, 100);
        assert_eq!(top.height, 4);
        assert_eq!(rest.height, 0);
    }
}
