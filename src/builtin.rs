//! Built-in plugins: the workbench's own extensions.
//!
//! The shell ships nothing through a side door; settings, documents, the
//! palette, the status bar, and the log console all arrive as ordinary
//! plugin descriptors using the same tokens, commands, and widget surface
//! external extensions would.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::mpsc::Receiver;

use crossterm::event::KeyCode;
use serde_json::Value;

use crate::app::{AddOptions, AppShell, LayoutSnapshot, Region};
use crate::core::event::Key;
use crate::core::{Command, CommandError, KeyBinding, PluginDescriptor};
use crate::services::config::{config_token, ConfigService, WorkbenchConfig};
use crate::services::document::{document_token, DocumentService, InMemoryDocumentStore};
use crate::views::{LogConsoleView, PaletteView, StatusBarView, StatusModel, WelcomeView};

pub struct BuiltinOptions {
    pub shell: Weak<AppShell>,
    pub log_rx: Option<Receiver<String>>,
    pub config_path: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
}

pub fn plugins(options: BuiltinOptions) -> Vec<PluginDescriptor> {
    vec![
        settings_plugin(options.config_path),
        documents_plugin(),
        workbench_plugin(options.shell.clone(), options.state_path),
        palette_plugin(options.shell.clone()),
        log_console_plugin(options.log_rx),
        status_bar_plugin(options.shell),
        welcome_plugin(),
    ]
}

fn settings_plugin(config_path: Option<PathBuf>) -> PluginDescriptor {
    PluginDescriptor::new("atelier:settings")
        .provides(config_token())
        .on_activate(move |_| {
            let config = match &config_path {
                Some(path) => WorkbenchConfig::load_or_default(path),
                None => WorkbenchConfig::default(),
            };
            Ok(Some(Rc::new(ConfigService::new(config)) as _))
        })
}

fn documents_plugin() -> PluginDescriptor {
    PluginDescriptor::new("atelier:documents")
        .provides(document_token())
        .on_activate(|_| {
            let store = Rc::new(InMemoryDocumentStore::new());
            Ok(Some(Rc::new(DocumentService::new(store)) as _))
        })
}

fn workbench_plugin(weak: Weak<AppShell>, state_path: Option<PathBuf>) -> PluginDescriptor {
    PluginDescriptor::new("atelier:workbench").on_activate(move |shell| {
        let commands = shell.commands().clone();

        let quit_weak = weak.clone();
        commands.add_command(
            Command::new("workbench:quit")
                .label("Workbench: Quit")
                .caption("Leave the workbench")
                .on_execute(move |_| {
                    let shell = upgrade(&quit_weak, "workbench:quit")?;
                    shell.request_quit();
                    Ok(Value::Null)
                }),
        )?;

        let left_weak = weak.clone();
        commands.add_command(
            Command::new("view:toggle-left")
                .label("View: Toggle Sidebar")
                .caption("Show or hide the left region")
                .on_execute(move |_| {
                    let shell = upgrade(&left_weak, "view:toggle-left")?;
                    Ok(Value::from(shell.toggle_region(Region::Left)))
                }),
        )?;

        let bottom_weak = weak.clone();
        commands.add_command(
            Command::new("view:toggle-bottom")
                .label("View: Toggle Bottom Panel")
                .caption("Show or hide the bottom region")
                .on_execute(move |_| {
                    let shell = upgrade(&bottom_weak, "view:toggle-bottom")?;
                    Ok(Value::from(shell.toggle_region(Region::Bottom)))
                }),
        )?;

        let save_weak = weak.clone();
        let save_path = state_path.clone();
        commands.add_command(
            Command::new("layout:save")
                .label("Layout: Save Arrangement")
                .is_enabled(move |_| save_path.is_some())
                .on_execute({
                    let state_path = state_path.clone();
                    move |_| {
                        let shell = upgrade(&save_weak, "layout:save")?;
                        let Some(path) = &state_path else {
                            return Err(CommandError::failed("layout:save", "no state path"));
                        };
                        save_snapshot(&shell, path)
                            .map_err(|err| CommandError::failed("layout:save", err))?;
                        Ok(Value::Null)
                    }
                }),
        )?;

        let restore_weak = weak.clone();
        let restore_path = state_path.clone();
        commands.add_command(
            Command::new("layout:restore")
                .label("Layout: Restore Arrangement")
                .is_enabled({
                    let state_path = state_path.clone();
                    move |_| state_path.as_deref().is_some_and(|p| p.exists())
                })
                .on_execute(move |_| {
                    let shell = upgrade(&restore_weak, "layout:restore")?;
                    let Some(path) = &restore_path else {
                        return Err(CommandError::failed("layout:restore", "no state path"));
                    };
                    let moved = restore_snapshot(&shell, path)
                        .map_err(|err| CommandError::failed("layout:restore", err))?;
                    Ok(Value::from(moved as u64))
                }),
        )?;

        commands.add_key_binding(KeyBinding::new(
            vec![Key::ctrl(KeyCode::Char('q'))],
            "shell",
            "workbench:quit",
        ));
        commands.add_key_binding(KeyBinding::new(
            vec![Key::ctrl(KeyCode::Char('b'))],
            "shell",
            "view:toggle-left",
        ));
        commands.add_key_binding(KeyBinding::new(
            vec![Key::ctrl(KeyCode::Char('j'))],
            "shell",
            "view:toggle-bottom",
        ));

        Ok(None)
    })
}

fn palette_plugin(weak: Weak<AppShell>) -> PluginDescriptor {
    PluginDescriptor::new("atelier:palette").on_activate(move |shell| {
        let view = PaletteView::new(shell.commands().clone());
        shell.add_widget(Box::new(view), Region::Left, AddOptions::default());
        shell.set_region_visible(Region::Left, false);

        let commands = shell.commands().clone();

        let toggle_weak = weak.clone();
        commands.add_command(
            Command::new("palette:toggle")
                .label("View: Command Palette")
                .caption("Show or hide the command palette")
                .on_execute(move |_| {
                    let shell = upgrade(&toggle_weak, "palette:toggle")?;
                    let visible = shell.toggle_region(Region::Left);
                    if visible {
                        if let Some(key) = shell.widget_key(crate::views::palette::WIDGET_ID) {
                            shell.activate_widget(key);
                        }
                    }
                    Ok(Value::from(visible))
                }),
        )?;

        let run_weak = weak.clone();
        let run_commands = commands.clone();
        commands.add_command(
            Command::new("palette:run")
                .label("Palette: Run Selected")
                .is_visible(|_| false)
                .on_execute_async(move |args| {
                    let weak = run_weak.clone();
                    let commands = run_commands.clone();
                    Box::pin(async move {
                        let Some(inner) = args
                            .get("command")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                        else {
                            return Err(CommandError::failed(
                                "palette:run",
                                "missing command argument",
                            ));
                        };
                        let inner_args = args.get("args").cloned().unwrap_or(Value::Null);
                        if let Some(shell) = weak.upgrade() {
                            shell.set_region_visible(Region::Left, false);
                        }
                        commands.execute(&inner, inner_args).await
                    })
                }),
        )?;

        commands.add_key_binding(KeyBinding::new(
            vec![Key::ctrl_shift(KeyCode::Char('p'))],
            "shell",
            "palette:toggle",
        ));

        Ok(None)
    })
}

fn log_console_plugin(log_rx: Option<Receiver<String>>) -> PluginDescriptor {
    let rx_cell = RefCell::new(log_rx);
    PluginDescriptor::new("atelier:log-console")
        .requires(config_token())
        .on_activate(move |shell| {
            let config = shell.service(config_token())?;
            let view = LogConsoleView::new(rx_cell.borrow_mut().take(), config.log_history());
            shell.add_widget(Box::new(view), Region::Bottom, AddOptions::default());
            Ok(None)
        })
}

fn status_bar_plugin(weak: Weak<AppShell>) -> PluginDescriptor {
    PluginDescriptor::new("atelier:status-bar").on_activate(move |shell| {
        let model = Rc::new(StatusModel::default());
        refresh_counts(shell, &model);

        shell.on_current_changed({
            let model = Rc::clone(&model);
            let weak = weak.clone();
            move |current| {
                model.current.replace(current.map(str::to_string));
                if let Some(shell) = weak.upgrade() {
                    refresh_counts(&shell, &model);
                }
            }
        });

        shell.add_widget(
            Box::new(StatusBarView::new(model)),
            Region::Bottom,
            AddOptions::default(),
        );
        Ok(None)
    })
}

fn welcome_plugin() -> PluginDescriptor {
    PluginDescriptor::new("atelier:welcome").on_activate(|shell| {
        shell.add_widget(
            Box::new(WelcomeView),
            Region::Main,
            AddOptions {
                activate: true,
                ..AddOptions::default()
            },
        );
        Ok(None)
    })
}

fn upgrade(weak: &Weak<AppShell>, command: &str) -> Result<Rc<AppShell>, CommandError> {
    weak.upgrade()
        .ok_or_else(|| CommandError::failed(command, "shell is gone"))
}

fn refresh_counts(shell: &AppShell, model: &StatusModel) {
    let ids = shell.plugin_ids();
    model.plugins_total.set(ids.len());
    model
        .plugins_active
        .set(ids.iter().filter(|id| shell.is_plugin_active(id)).count());
    model.commands.set(shell.commands().len());
}

fn save_snapshot(shell: &AppShell, path: &std::path::Path) -> std::io::Result<()> {
    let snapshot = shell.save_layout();
    let text = serde_json::to_string_pretty(&snapshot)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

fn restore_snapshot(shell: &AppShell, path: &std::path::Path) -> std::io::Result<usize> {
    let text = std::fs::read_to_string(path)?;
    let snapshot: LayoutSnapshot = serde_json::from_str(&text)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    Ok(shell.restore_layout(&snapshot))
}
