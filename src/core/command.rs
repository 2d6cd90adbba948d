//! Command registry: named actions dispatched by id.
//!
//! Commands are the single indirection point for menus, keybindings, and the
//! palette. Callers hold command ids, never handler references, and treat
//! every execution as potentially asynchronous.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::event::Key;
use super::keymap::{KeyBinding, KeyLookup, Keymap};

pub type Result<T> = std::result::Result<T, CommandError>;

pub type CommandFuture = Pin<Box<dyn Future<Output = Result<Value>> + 'static>>;

#[derive(Debug)]
pub enum CommandError {
    Duplicate(String),
    Unknown(String),
    Disabled(String),
    Failed { id: String, message: String },
}

impl CommandError {
    pub fn failed(id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CommandError::Failed {
            id: id.into(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Duplicate(id) => write!(f, "command already registered: {}", id),
            CommandError::Unknown(id) => write!(f, "unknown command: {}", id),
            CommandError::Disabled(id) => write!(f, "command is disabled: {}", id),
            CommandError::Failed { id, message } => {
                write!(f, "command {} failed: {}", id, message)
            }
        }
    }
}

impl std::error::Error for CommandError {}

type ExecuteFn = Box<dyn Fn(Value) -> CommandFuture>;
type TextFn = Box<dyn Fn(&Value) -> String>;
type PredicateFn = Box<dyn Fn(&Value) -> bool>;

/// A command descriptor, built fluently and consumed by
/// [`CommandRegistry::add_command`]. Label and caption accept either fixed
/// strings or closures over the invocation args.
pub struct Command {
    id: String,
    execute: ExecuteFn,
    label: TextFn,
    caption: TextFn,
    is_enabled: PredicateFn,
    is_visible: PredicateFn,
    is_toggled: PredicateFn,
}

impl Command {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let label_id = id.clone();
        Self {
            id,
            execute: Box::new(|_| Box::pin(std::future::ready(Ok(Value::Null)))),
            label: Box::new(move |_| label_id.clone()),
            caption: Box::new(|_| String::new()),
            is_enabled: Box::new(|_| true),
            is_visible: Box::new(|_| true),
            is_toggled: Box::new(|_| false),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = Box::new(move |_| label.clone());
        self
    }

    pub fn label_fn<F: Fn(&Value) -> String + 'static>(mut self, f: F) -> Self {
        self.label = Box::new(f);
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        let caption = caption.into();
        self.caption = Box::new(move |_| caption.clone());
        self
    }

    pub fn caption_fn<F: Fn(&Value) -> String + 'static>(mut self, f: F) -> Self {
        self.caption = Box::new(f);
        self
    }

    pub fn is_enabled<F: Fn(&Value) -> bool + 'static>(mut self, f: F) -> Self {
        self.is_enabled = Box::new(f);
        self
    }

    pub fn is_visible<F: Fn(&Value) -> bool + 'static>(mut self, f: F) -> Self {
        self.is_visible = Box::new(f);
        self
    }

    pub fn is_toggled<F: Fn(&Value) -> bool + 'static>(mut self, f: F) -> Self {
        self.is_toggled = Box::new(f);
        self
    }

    /// Handler that completes synchronously.
    pub fn on_execute<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + 'static,
    {
        self.execute = Box::new(move |args| Box::pin(std::future::ready(f(args))));
        self
    }

    /// Handler that suspends at its own await points.
    pub fn on_execute_async<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> CommandFuture + 'static,
    {
        self.execute = Box::new(f);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

struct RegistryInner {
    commands: FxHashMap<String, Rc<Command>>,
    keymap: Keymap,
}

/// Registry of commands and their keybindings. Interior-mutable so widgets
/// and plugins can share it through the shell without holding locks; the
/// shell is single-threaded and borrows never cross an await point. Clones
/// are handles onto the same registry.
#[derive(Clone)]
pub struct CommandRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                commands: FxHashMap::default(),
                keymap: Keymap::new(),
            })),
        }
    }

    /// Registers a command. The returned handle removes the command and any
    /// keybindings referencing it when disposed.
    pub fn add_command(&self, command: Command) -> Result<CommandHandle> {
        let id = command.id.clone();
        let mut inner = self.inner.borrow_mut();
        if inner.commands.contains_key(&id) {
            return Err(CommandError::Duplicate(id));
        }

        tracing::debug!(command = %id, "command registered");
        inner.commands.insert(id.clone(), Rc::new(command));
        Ok(CommandHandle {
            inner: Rc::downgrade(&self.inner),
            id,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.borrow().commands.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().commands.is_empty()
    }

    /// Registered ids, sorted for stable listings.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.borrow().commands.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Runs a command. Fails without invoking the handler when the command
    /// is unknown or its `is_enabled` predicate rejects the args. Handler
    /// errors propagate to the caller unlogged; presenting them is the
    /// invoker's job.
    pub async fn execute(&self, id: &str, args: Value) -> Result<Value> {
        let command = { self.inner.borrow().commands.get(id).cloned() };
        let Some(command) = command else {
            return Err(CommandError::Unknown(id.to_string()));
        };
        if !(command.is_enabled)(&args) {
            return Err(CommandError::Disabled(id.to_string()));
        }
        (command.execute)(args).await
    }

    pub fn label(&self, id: &str, args: &Value) -> Option<String> {
        let command = { self.inner.borrow().commands.get(id).cloned() };
        command.map(|c| (c.label)(args))
    }

    pub fn caption(&self, id: &str, args: &Value) -> Option<String> {
        let command = { self.inner.borrow().commands.get(id).cloned() };
        command.map(|c| (c.caption)(args))
    }

    pub fn is_enabled(&self, id: &str, args: &Value) -> Option<bool> {
        let command = { self.inner.borrow().commands.get(id).cloned() };
        command.map(|c| (c.is_enabled)(args))
    }

    pub fn is_visible(&self, id: &str, args: &Value) -> Option<bool> {
        let command = { self.inner.borrow().commands.get(id).cloned() };
        command.map(|c| (c.is_visible)(args))
    }

    pub fn is_toggled(&self, id: &str, args: &Value) -> Option<bool> {
        let command = { self.inner.borrow().commands.get(id).cloned() };
        command.map(|c| (c.is_toggled)(args))
    }

    /// Adds a keybinding for a command id. Binding an id before its command
    /// is registered is allowed; dispatch will surface `Unknown` if it fires
    /// first. An identical chord and selector replaces the prior binding
    /// (most recently added wins).
    pub fn add_key_binding(&self, binding: KeyBinding) {
        self.inner.borrow_mut().keymap.add(binding);
    }

    pub fn key_bindings(&self) -> Vec<KeyBinding> {
        self.inner.borrow().keymap.bindings().to_vec()
    }

    pub fn lookup_key(&self, keys: &[Key], context: &[String]) -> KeyLookup {
        self.inner.borrow().keymap.lookup(keys, context)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposable registration handle. Dropping the handle keeps the command;
/// removal is always an explicit `dispose`.
pub struct CommandHandle {
    inner: Weak<RefCell<RegistryInner>>,
    id: String,
}

impl CommandHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Removes the command and every keybinding referencing it. Returns
    /// false when the command was already gone or the registry was dropped.
    pub fn dispose(&self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut inner = inner.borrow_mut();
        let removed = inner.commands.remove(&self.id).is_some();
        if removed {
            let bindings = inner.keymap.remove_command_bindings(&self.id);
            tracing::debug!(command = %self.id, bindings, "command disposed");
        }
        removed
    }
}
