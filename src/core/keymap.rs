//! Keybindings: chord sequences mapped to command ids, scoped by selector.
//!
//! A binding never points at a widget or a handler, only at a command id.
//! Selectors are matched against the focus context reported by the shell,
//! ordered innermost scope first.

use serde_json::Value;

use super::event::Key;

#[derive(Clone, Debug)]
pub struct KeyBinding {
    pub keys: Vec<Key>,
    pub selector: String,
    pub command: String,
    pub args: Value,
}

impl KeyBinding {
    pub fn new(keys: Vec<Key>, selector: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            keys,
            selector: selector.into(),
            command: command.into(),
            args: Value::Null,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyLookup {
    /// The pressed chord matched a binding in scope.
    Exact { command: String, args: Value },
    /// The pressed keys are a prefix of a longer binding in scope.
    Pending,
    NoMatch,
}

#[derive(Default)]
pub struct Keymap {
    bindings: Vec<KeyBinding>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding. An identical chord and selector replaces the prior
    /// binding outright: the most recently added binding wins.
    pub fn add(&mut self, binding: KeyBinding) {
        if let Some(pos) = self
            .bindings
            .iter()
            .position(|b| b.keys == binding.keys && b.selector == binding.selector)
        {
            let replaced = self.bindings.remove(pos);
            tracing::debug!(
                command = %replaced.command,
                by = %binding.command,
                "keybinding replaced"
            );
        }
        self.bindings.push(binding);
    }

    /// Drops every binding that references `command`. Returns how many were
    /// removed.
    pub fn remove_command_bindings(&mut self, command: &str) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.command != command);
        before - self.bindings.len()
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolves the pressed keys against the active focus context. The
    /// innermost matching scope wins; within one scope the latest-added
    /// binding wins.
    pub fn lookup(&self, keys: &[Key], context: &[String]) -> KeyLookup {
        let mut best: Option<(usize, usize)> = None;
        for (idx, binding) in self.bindings.iter().enumerate() {
            if binding.keys != keys {
                continue;
            }
            let Some(scope_idx) = context.iter().position(|scope| *scope == binding.selector)
            else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_scope, best_idx)) => {
                    scope_idx < best_scope || (scope_idx == best_scope && idx > best_idx)
                }
            };
            if better {
                best = Some((scope_idx, idx));
            }
        }

        if let Some((_, idx)) = best {
            let binding = &self.bindings[idx];
            return KeyLookup::Exact {
                command: binding.command.clone(),
                args: binding.args.clone(),
            };
        }

        let pending = self.bindings.iter().any(|binding| {
            binding.keys.len() > keys.len()
                && binding.keys.starts_with(keys)
                && context.iter().any(|scope| *scope == binding.selector)
        });
        if pending {
            KeyLookup::Pending
        } else {
            KeyLookup::NoMatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyCode;

    fn ctx(scopes: &[&str]) -> Vec<String> {
        scopes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_resolves_command() {
        let mut keymap = Keymap::new();
        keymap.add(KeyBinding::new(
            vec![Key::ctrl(KeyCode::Char('s'))],
            "shell",
            "file:save",
        ));

        let lookup = keymap.lookup(&[Key::ctrl(KeyCode::Char('s'))], &ctx(&["shell"]));
        assert_eq!(
            lookup,
            KeyLookup::Exact {
                command: "file:save".to_string(),
                args: Value::Null,
            }
        );
    }

    #[test]
    fn rebinding_same_chord_and_selector_wins() {
        let mut keymap = Keymap::new();
        let chord = vec![Key::ctrl(KeyCode::Char('k'))];
        keymap.add(KeyBinding::new(chord.clone(), "shell", "first"));
        keymap.add(KeyBinding::new(chord.clone(), "shell", "second"));

        assert_eq!(keymap.len(), 1);
        match keymap.lookup(&chord, &ctx(&["shell"])) {
            KeyLookup::Exact { command, .. } => assert_eq!(command, "second"),
            other => panic!("expected exact match, got {:?}", other),
        }
    }

    #[test]
    fn innermost_scope_shadows_outer() {
        let mut keymap = Keymap::new();
        let chord = vec![Key::simple(KeyCode::Enter)];
        keymap.add(KeyBinding::new(chord.clone(), "shell", "outer"));
        keymap.add(KeyBinding::new(chord.clone(), "widget:palette", "inner"));

        match keymap.lookup(&chord, &ctx(&["widget:palette", "shell"])) {
            KeyLookup::Exact { command, .. } => assert_eq!(command, "inner"),
            other => panic!("expected exact match, got {:?}", other),
        }
    }

    #[test]
    fn out_of_scope_binding_is_ignored() {
        let mut keymap = Keymap::new();
        keymap.add(KeyBinding::new(
            vec![Key::simple(KeyCode::Enter)],
            "widget:palette",
            "palette:run",
        ));

        let lookup = keymap.lookup(&[Key::simple(KeyCode::Enter)], &ctx(&["shell"]));
        assert_eq!(lookup, KeyLookup::NoMatch);
    }

    #[test]
    fn chord_prefix_reports_pending() {
        let mut keymap = Keymap::new();
        keymap.add(KeyBinding::new(
            vec![Key::ctrl(KeyCode::Char('k')), Key::ctrl(KeyCode::Char('s'))],
            "shell",
            "keys:show",
        ));

        let lookup = keymap.lookup(&[Key::ctrl(KeyCode::Char('k'))], &ctx(&["shell"]));
        assert_eq!(lookup, KeyLookup::Pending);
    }

    #[test]
    fn remove_command_bindings_drops_all_references() {
        let mut keymap = Keymap::new();
        keymap.add(KeyBinding::new(
            vec![Key::ctrl(KeyCode::Char('p'))],
            "shell",
            "palette:toggle",
        ));
        keymap.add(KeyBinding::new(
            vec![Key::ctrl_shift(KeyCode::Char('p'))],
            "shell",
            "palette:toggle",
        ));
        keymap.add(KeyBinding::new(
            vec![Key::ctrl(KeyCode::Char('q'))],
            "shell",
            "workbench:quit",
        ));

        assert_eq!(keymap.remove_command_bindings("palette:toggle"), 2);
        assert_eq!(keymap.len(), 1);
    }
}
