//! Service registry: singleton values keyed by capability token.
//!
//! The registry holds the sole owning reference to every service; consumers
//! resolve shared handles through typed tokens and never re-register them.
//! Registration here is a plain map insert, activation ordering lives in the
//! plugin registry.

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::token::{RawToken, Token};

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    NotFound(String),
    AlreadyRegistered(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::NotFound(name) => write!(f, "no service registered for token: {}", name),
            ServiceError::AlreadyRegistered(name) => {
                write!(f, "token already has a provider: {}", name)
            }
        }
    }
}

impl std::error::Error for ServiceError {}

struct ServiceEntry {
    token: RawToken,
    service: Rc<dyn Any>,
}

pub struct ServiceRegistry {
    services: FxHashMap<u64, ServiceEntry>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: FxHashMap::default(),
        }
    }

    pub fn register<T: 'static>(&mut self, token: &Token<T>, service: Rc<T>) -> Result<()> {
        self.register_raw(token.raw().clone(), service)
    }

    /// Type-erased registration path used by the activation driver, which
    /// receives services as `Rc<dyn Any>` from plugin activation.
    pub fn register_raw(&mut self, token: RawToken, service: Rc<dyn Any>) -> Result<()> {
        if self.services.contains_key(&token.id()) {
            return Err(ServiceError::AlreadyRegistered(token.name().to_string()));
        }

        tracing::debug!(token = token.name(), "service registered");
        self.services
            .insert(token.id(), ServiceEntry { token, service });
        Ok(())
    }

    /// Resolves a required dependency. Callers holding an optional token
    /// should use [`try_get`](Self::try_get) instead.
    pub fn get<T: 'static>(&self, token: &Token<T>) -> Result<Rc<T>> {
        self.try_get(token)
            .ok_or_else(|| ServiceError::NotFound(token.name().to_string()))
    }

    pub fn try_get<T: 'static>(&self, token: &Token<T>) -> Option<Rc<T>> {
        self.services
            .get(&token.raw().id())
            .and_then(|entry| entry.service.clone().downcast::<T>().ok())
    }

    pub fn has<T: ?Sized>(&self, token: &Token<T>) -> bool {
        self.has_raw(token.raw())
    }

    pub fn has_raw(&self, token: &RawToken) -> bool {
        self.services.contains_key(&token.id())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &RawToken> {
        self.services.values().map(|entry| &entry.token)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
