use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use atelier::app::AppShell;
use atelier::builtin::{self, BuiltinOptions};
use atelier::logging;
use atelier::services::config::config_token;

fn state_dir() -> PathBuf {
    match std::env::var_os("ATELIER_STATE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::temp_dir().join("atelier"),
    }
}

fn main() -> io::Result<()> {
    let mut logging_guard = logging::init();
    let log_rx = logging_guard.as_mut().and_then(|guard| guard.take_log_rx());

    let config_path = std::env::var_os("ATELIER_CONFIG")
        .map(PathBuf::from)
        .or_else(|| Some(state_dir().join("workbench.json")));
    let state_path = state_dir().join("layout.json");

    let shell = Rc::new(AppShell::new());
    let descriptors = builtin::plugins(BuiltinOptions {
        shell: Rc::downgrade(&shell),
        log_rx,
        config_path,
        state_path: Some(state_path.clone()),
    });
    shell.register_plugins(descriptors).map_err(io::Error::other)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(shell.start()).map_err(io::Error::other)?;

    let restore = shell
        .try_service(config_token())
        .map(|config| config.restore_layout())
        .unwrap_or(false);
    if restore && state_path.exists() {
        if let Err(err) = runtime.block_on(
            shell
                .commands()
                .execute("layout:restore", serde_json::Value::Null),
        ) {
            tracing::warn!(error = %err, "layout restore failed");
        }
    }

    atelier::tui::run(&shell, &runtime)?;

    if let Err(err) = runtime.block_on(
        shell
            .commands()
            .execute("layout:save", serde_json::Value::Null),
    ) {
        tracing::warn!(error = %err, "layout save on exit failed");
    }
    Ok(())
}
