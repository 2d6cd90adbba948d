//! Core framework: tokens, services, plugins, commands, keybindings.

pub mod command;
pub mod event;
pub mod keymap;
pub mod plugin;
pub mod service;
pub mod token;

pub use command::{Command, CommandError, CommandFuture, CommandHandle, CommandRegistry};
pub use event::{InputEvent, Key};
pub use keymap::{KeyBinding, KeyLookup, Keymap};
pub use plugin::{
    ActivateFuture, ActivateResult, PluginDescriptor, PluginError, PluginRegistry, PluginState,
    ProvidedService,
};
pub use service::{ServiceError, ServiceRegistry};
pub use token::{RawToken, Token};
