//! Plugin registry: descriptors, registration validation, activation order.
//!
//! The registry stores descriptors and computes a deterministic topological
//! activation order over provider/consumer edges. Invoking the activation
//! functions is the shell's job, the registry never calls back into itself.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::service::{ServiceError, ServiceRegistry};
use super::token::{RawToken, Token};
use crate::app::AppShell;

pub type Result<T> = std::result::Result<T, PluginError>;

/// Value produced by an activation function. When the plugin declares a
/// `provides` token, the shell registers this value under it.
pub type ProvidedService = Rc<dyn Any>;

pub type ActivateResult = std::result::Result<Option<ProvidedService>, Box<dyn Error>>;

pub type ActivateFuture<'a> = Pin<Box<dyn Future<Output = ActivateResult> + 'a>>;

pub(crate) type ActivateFn = Rc<dyn for<'a> Fn(&'a AppShell) -> ActivateFuture<'a>>;

#[derive(Debug)]
pub enum PluginError {
    DuplicateId(String),
    UnknownPlugin(String),
    InvalidDescriptor { id: String, reason: String },
    MissingDependency { plugin: String, token: String },
    DependencyCycle(Vec<String>),
    ActivationFailed { plugin: String, message: String },
    Service(ServiceError),
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginError::DuplicateId(id) => write!(f, "plugin already registered: {}", id),
            PluginError::UnknownPlugin(id) => write!(f, "unknown plugin: {}", id),
            PluginError::InvalidDescriptor { id, reason } => {
                write!(f, "invalid plugin descriptor {}: {}", id, reason)
            }
            PluginError::MissingDependency { plugin, token } => write!(
                f,
                "plugin {} requires token {} but no provider is available",
                plugin, token
            ),
            PluginError::DependencyCycle(cycle) => {
                write!(f, "plugin dependency cycle: {}", cycle.join(" -> "))
            }
            PluginError::ActivationFailed { plugin, message } => {
                write!(f, "activation of {} failed: {}", plugin, message)
            }
            PluginError::Service(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PluginError {}

impl From<ServiceError> for PluginError {
    fn from(err: ServiceError) -> Self {
        PluginError::Service(err)
    }
}

/// Describes one unit of extension: what it depends on, what it provides,
/// and the function that wires it into the shell. Built with the fluent
/// methods below; plugins auto-start unless opted out.
pub struct PluginDescriptor {
    id: String,
    requires: Vec<RawToken>,
    optional: Vec<RawToken>,
    provides: Option<RawToken>,
    auto_start: bool,
    activate: ActivateFn,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            requires: Vec::new(),
            optional: Vec::new(),
            provides: None,
            auto_start: true,
            activate: Rc::new(|_| Box::pin(std::future::ready(Ok(None)))),
        }
    }

    pub fn requires<T: ?Sized>(mut self, token: &Token<T>) -> Self {
        self.requires.push(token.raw().clone());
        self
    }

    pub fn optional<T: ?Sized>(mut self, token: &Token<T>) -> Self {
        self.optional.push(token.raw().clone());
        self
    }

    pub fn provides<T: ?Sized>(mut self, token: &Token<T>) -> Self {
        self.provides = Some(token.raw().clone());
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Synchronous activation body. The closure runs once, after every
    /// required token has an activated provider.
    pub fn on_activate<F>(mut self, f: F) -> Self
    where
        F: Fn(&AppShell) -> ActivateResult + 'static,
    {
        self.activate = Rc::new(move |shell| {
            let out = f(shell);
            Box::pin(std::future::ready(out))
        });
        self
    }

    /// Activation body that suspends at its own await points. The driver
    /// awaits the returned future before activating dependents.
    pub fn on_activate_async<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a AppShell) -> ActivateFuture<'a> + 'static,
    {
        self.activate = Rc::new(f);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_auto_start(&self) -> bool {
        self.auto_start
    }

    pub fn required_tokens(&self) -> &[RawToken] {
        &self.requires
    }

    pub fn optional_tokens(&self) -> &[RawToken] {
        &self.optional
    }

    pub fn provided_token(&self) -> Option<&RawToken> {
        self.provides.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Registered,
    Activating,
    Active,
    Failed,
}

struct PluginEntry {
    descriptor: PluginDescriptor,
    index: usize,
    state: PluginState,
    failure: Option<String>,
}

pub struct PluginRegistry {
    plugins: FxHashMap<String, PluginEntry>,
    order: Vec<String>,
    providers: FxHashMap<u64, String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: FxHashMap::default(),
            order: Vec::new(),
            providers: FxHashMap::default(),
        }
    }

    /// Validates and stores a descriptor. On any error the registry is left
    /// exactly as it was before the call.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> Result<()> {
        let id = descriptor.id.clone();

        if id.is_empty() {
            return Err(PluginError::InvalidDescriptor {
                id,
                reason: "empty id".to_string(),
            });
        }
        if self.plugins.contains_key(&id) {
            return Err(PluginError::DuplicateId(id));
        }

        for token in &descriptor.requires {
            if descriptor.optional.contains(token) {
                return Err(PluginError::InvalidDescriptor {
                    id,
                    reason: format!("token {} listed as both required and optional", token.name()),
                });
            }
        }

        if let Some(provided) = &descriptor.provides {
            if descriptor.requires.contains(provided) || descriptor.optional.contains(provided) {
                return Err(PluginError::InvalidDescriptor {
                    id,
                    reason: format!("plugin depends on its own provided token {}", provided.name()),
                });
            }
            if let Some(owner) = self.providers.get(&provided.id()) {
                return Err(PluginError::InvalidDescriptor {
                    id,
                    reason: format!(
                        "token {} already provided by plugin {}",
                        provided.name(),
                        owner
                    ),
                });
            }
        }

        if let Some(provided) = &descriptor.provides {
            self.providers.insert(provided.id(), id.clone());
        }

        tracing::debug!(plugin = %id, auto_start = descriptor.auto_start, "plugin registered");
        let index = self.order.len();
        self.order.push(id.clone());
        self.plugins.insert(
            id,
            PluginEntry {
                descriptor,
                index,
                state: PluginState::Registered,
                failure: None,
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugin ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn state(&self, id: &str) -> Option<PluginState> {
        self.plugins.get(id).map(|entry| entry.state)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.state(id) == Some(PluginState::Active)
    }

    pub fn provider_of(&self, token: &RawToken) -> Option<&str> {
        self.providers.get(&token.id()).map(String::as_str)
    }

    pub fn descriptor(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(id).map(|entry| &entry.descriptor)
    }

    pub(crate) fn activate_fn(&self, id: &str) -> Option<ActivateFn> {
        self.plugins
            .get(id)
            .map(|entry| Rc::clone(&entry.descriptor.activate))
    }

    pub(crate) fn set_state(&mut self, id: &str, state: PluginState) {
        if let Some(entry) = self.plugins.get_mut(id) {
            entry.state = state;
        }
    }

    pub(crate) fn record_failure(&mut self, id: &str, message: String) {
        if let Some(entry) = self.plugins.get_mut(id) {
            entry.state = PluginState::Failed;
            entry.failure = Some(message);
        }
    }

    pub(crate) fn failure(&self, id: &str) -> Option<&str> {
        self.plugins
            .get(id)
            .and_then(|entry| entry.failure.as_deref())
    }

    /// Activation order for every auto-start plugin plus the transitive
    /// dependencies they pull in, auto-start or not.
    pub fn startup_order(&self, services: &ServiceRegistry) -> Result<Vec<String>> {
        let roots: Vec<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|id| {
                self.plugins
                    .get(*id)
                    .is_some_and(|entry| entry.descriptor.auto_start)
            })
            .collect();
        self.order_from_roots(&roots, services)
    }

    /// Activation order for one plugin and its not-yet-active dependencies.
    pub fn activation_order(&self, id: &str, services: &ServiceRegistry) -> Result<Vec<String>> {
        if !self.plugins.contains_key(id) {
            return Err(PluginError::UnknownPlugin(id.to_string()));
        }
        self.order_from_roots(&[id], services)
    }

    /// Topological order over the dependency closure of `roots`, skipping
    /// already-active plugins. Required tokens must have a providing plugin
    /// or an already-registered service; optional tokens order the consumer
    /// after the provider only when one exists. Ties resolve in registration
    /// order, so a fixed registration sequence always replays the same walk.
    fn order_from_roots(&self, roots: &[&str], services: &ServiceRegistry) -> Result<Vec<String>> {
        let mut target: FxHashSet<&str> = FxHashSet::default();
        let mut stack: Vec<&str> = roots.to_vec();

        while let Some(id) = stack.pop() {
            let entry = match self.plugins.get(id) {
                Some(entry) => entry,
                None => return Err(PluginError::UnknownPlugin(id.to_string())),
            };
            if entry.state == PluginState::Active || !target.insert(id) {
                continue;
            }

            for token in &entry.descriptor.requires {
                match self.providers.get(&token.id()) {
                    Some(provider) => {
                        if !self.is_active(provider) {
                            stack.push(provider.as_str());
                        }
                    }
                    None if services.has_raw(token) => {}
                    None => {
                        return Err(PluginError::MissingDependency {
                            plugin: id.to_string(),
                            token: token.name().to_string(),
                        })
                    }
                }
            }
            for token in &entry.descriptor.optional {
                if let Some(provider) = self.providers.get(&token.id()) {
                    if !self.is_active(provider) {
                        stack.push(provider.as_str());
                    }
                }
            }
        }

        let mut dependents: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        let mut indegree: FxHashMap<&str, usize> = FxHashMap::default();
        for id in &target {
            indegree.entry(*id).or_insert(0);
            let Some(entry) = self.plugins.get(*id) else {
                continue;
            };
            let deps = entry
                .descriptor
                .requires
                .iter()
                .chain(entry.descriptor.optional.iter());
            for token in deps {
                let Some(provider) = self.providers.get(&token.id()) else {
                    continue;
                };
                if target.contains(provider.as_str()) {
                    dependents.entry(provider.as_str()).or_default().push(*id);
                    *indegree.entry(*id).or_insert(0) += 1;
                }
            }
        }

        let registration_index =
            |id: &str| self.plugins.get(id).map(|entry| entry.index).unwrap_or(0);

        let mut ready: BinaryHeap<Reverse<(usize, &str)>> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| Reverse((registration_index(*id), *id)))
            .collect();

        let mut ordered = Vec::with_capacity(target.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            ordered.push(id.to_string());
            for dependent in dependents.get(id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(degree) = indegree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((registration_index(*dependent), *dependent)));
                    }
                }
            }
        }

        if ordered.len() != target.len() {
            let done: FxHashSet<&str> = ordered.iter().map(String::as_str).collect();
            let remaining: FxHashSet<&str> = target
                .iter()
                .copied()
                .filter(|id| !done.contains(*id))
                .collect();
            return Err(PluginError::DependencyCycle(self.find_cycle(&remaining)));
        }

        Ok(ordered)
    }

    /// Walks dependency edges inside `remaining` until a plugin repeats;
    /// the slice between the two visits is the reported cycle.
    fn find_cycle(&self, remaining: &FxHashSet<&str>) -> Vec<String> {
        let start = remaining
            .iter()
            .min_by_key(|id| self.plugins.get(**id).map(|entry| entry.index).unwrap_or(0))
            .copied()
            .unwrap_or_default();

        let mut path: Vec<&str> = Vec::new();
        let mut current = start;
        loop {
            if let Some(pos) = path.iter().position(|id| *id == current) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|id| id.to_string()).collect();
                cycle.push(current.to_string());
                return cycle;
            }
            path.push(current);

            let Some(entry) = self.plugins.get(current) else {
                return path.iter().map(|id| id.to_string()).collect();
            };
            let next = entry
                .descriptor
                .requires
                .iter()
                .chain(entry.descriptor.optional.iter())
                .filter_map(|token| self.providers.get(&token.id()))
                .find(|provider| remaining.contains(provider.as_str()));
            match next {
                Some(provider) => current = provider.as_str(),
                None => return path.iter().map(|id| id.to_string()).collect(),
            }
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Svc;

    fn registry_with(descriptors: Vec<PluginDescriptor>) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        for descriptor in descriptors {
            registry.register(descriptor).unwrap();
        }
        registry
    }

    #[test]
    fn duplicate_id_rejected_without_side_effects() {
        let token: Token<Svc> = Token::new("svc");
        let mut registry = PluginRegistry::new();
        registry
            .register(PluginDescriptor::new("a").provides(&token))
            .unwrap();

        let other: Token<Svc> = Token::new("other");
        let result = registry.register(PluginDescriptor::new("a").provides(&other));

        assert!(matches!(result, Err(PluginError::DuplicateId(_))));
        assert_eq!(registry.len(), 1);
        assert!(registry.provider_of(other.raw()).is_none());
    }

    #[test]
    fn second_provider_for_token_rejected() {
        let token: Token<Svc> = Token::new("svc");
        let mut registry = PluginRegistry::new();
        registry
            .register(PluginDescriptor::new("a").provides(&token))
            .unwrap();

        let result = registry.register(PluginDescriptor::new("b").provides(&token));

        assert!(matches!(
            result,
            Err(PluginError::InvalidDescriptor { .. })
        ));
        assert_eq!(registry.provider_of(token.raw()), Some("a"));
    }

    #[test]
    fn descriptor_depending_on_own_token_rejected() {
        let token: Token<Svc> = Token::new("svc");
        let result = PluginRegistry::new()
            .register(PluginDescriptor::new("a").provides(&token).requires(&token));

        assert!(matches!(result, Err(PluginError::InvalidDescriptor { .. })));
    }

    #[test]
    fn token_in_both_dependency_lists_rejected() {
        let token: Token<Svc> = Token::new("svc");
        let result = PluginRegistry::new()
            .register(PluginDescriptor::new("a").requires(&token).optional(&token));

        assert!(matches!(result, Err(PluginError::InvalidDescriptor { .. })));
    }

    #[test]
    fn startup_order_puts_providers_first() {
        let token: Token<Svc> = Token::new("svc");
        let registry = registry_with(vec![
            PluginDescriptor::new("consumer").requires(&token),
            PluginDescriptor::new("provider").provides(&token),
        ]);

        let order = registry.startup_order(&ServiceRegistry::new()).unwrap();
        assert_eq!(order, ["provider", "consumer"]);
    }

    #[test]
    fn independent_plugins_keep_registration_order() {
        let registry = registry_with(vec![
            PluginDescriptor::new("c"),
            PluginDescriptor::new("b"),
            PluginDescriptor::new("a"),
        ]);

        let order = registry.startup_order(&ServiceRegistry::new()).unwrap();
        assert_eq!(order, ["c", "b", "a"]);
    }

    #[test]
    fn startup_order_is_reproducible() {
        let token: Token<Svc> = Token::new("svc");
        let other: Token<Svc> = Token::new("other");
        let build = || {
            registry_with(vec![
                PluginDescriptor::new("ui").requires(&token).optional(&other),
                PluginDescriptor::new("store").provides(&token),
                PluginDescriptor::new("extras").provides(&other),
                PluginDescriptor::new("standalone"),
            ])
        };

        let first = build().startup_order(&ServiceRegistry::new()).unwrap();
        let second = build().startup_order(&ServiceRegistry::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_required_provider_fails() {
        let token: Token<Svc> = Token::new("svc");
        let registry = registry_with(vec![PluginDescriptor::new("consumer").requires(&token)]);

        let result = registry.startup_order(&ServiceRegistry::new());
        assert!(matches!(
            result,
            Err(PluginError::MissingDependency { .. })
        ));
    }

    #[test]
    fn externally_registered_service_satisfies_requirement() {
        let token: Token<Svc> = Token::new("svc");
        let registry = registry_with(vec![PluginDescriptor::new("consumer").requires(&token)]);

        let mut services = ServiceRegistry::new();
        services.register(&token, Rc::new(Svc)).unwrap();

        let order = registry.startup_order(&services).unwrap();
        assert_eq!(order, ["consumer"]);
    }

    #[test]
    fn missing_optional_provider_does_not_block() {
        let token: Token<Svc> = Token::new("svc");
        let registry = registry_with(vec![PluginDescriptor::new("consumer").optional(&token)]);

        let order = registry.startup_order(&ServiceRegistry::new()).unwrap();
        assert_eq!(order, ["consumer"]);
    }

    #[test]
    fn optional_provider_orders_before_consumer() {
        let token: Token<Svc> = Token::new("svc");
        let registry = registry_with(vec![
            PluginDescriptor::new("consumer").optional(&token),
            PluginDescriptor::new("provider").provides(&token),
        ]);

        let order = registry.startup_order(&ServiceRegistry::new()).unwrap();
        assert_eq!(order, ["provider", "consumer"]);
    }

    #[test]
    fn cycle_is_reported_with_its_members() {
        let a_token: Token<Svc> = Token::new("a");
        let b_token: Token<Svc> = Token::new("b");
        let registry = registry_with(vec![
            PluginDescriptor::new("a").provides(&a_token).requires(&b_token),
            PluginDescriptor::new("b").provides(&b_token).requires(&a_token),
        ]);

        let result = registry.startup_order(&ServiceRegistry::new());
        match result {
            Err(PluginError::DependencyCycle(cycle)) => {
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            other => panic!("expected cycle error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn non_auto_start_plugins_skipped_unless_required() {
        let token: Token<Svc> = Token::new("svc");
        let registry = registry_with(vec![
            PluginDescriptor::new("lazy").auto_start(false),
            PluginDescriptor::new("store").provides(&token).auto_start(false),
            PluginDescriptor::new("ui").requires(&token),
        ]);

        let order = registry.startup_order(&ServiceRegistry::new()).unwrap();
        assert_eq!(order, ["store", "ui"]);
    }

    #[test]
    fn activation_order_for_unknown_plugin_fails() {
        let registry = PluginRegistry::new();
        assert!(matches!(
            registry.activation_order("ghost", &ServiceRegistry::new()),
            Err(PluginError::UnknownPlugin(_))
        ));
    }
}
