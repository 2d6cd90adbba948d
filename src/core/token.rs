//! Capability tokens: typed identities used as service keys.
//!
//! Two tokens are equal only when they are the same identity. Names are
//! diagnostic labels and may repeat across independently created tokens.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Typed capability identifier. `T` is the service type resolved through
/// this token.
pub struct Token<T: ?Sized> {
    raw: RawToken,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized> Token<T> {
    /// Creates a token with a fresh identity. Calling this twice with the
    /// same name yields two distinct tokens.
    pub fn new(name: &str) -> Self {
        Self {
            raw: RawToken {
                id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
                name: Arc::from(name),
            },
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    pub fn raw(&self) -> &RawToken {
        &self.raw
    }
}

impl<T: ?Sized> Clone for Token<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: ?Sized> Eq for Token<T> {}

impl<T: ?Sized> Hash for Token<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.raw.id)
            .field("name", &self.raw.name)
            .finish()
    }
}

/// Type-erased token, used as the key type inside registries and in plugin
/// descriptors where tokens of different service types mix.
#[derive(Clone, Debug)]
pub struct RawToken {
    id: u64,
    name: Arc<str>,
}

impl RawToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for RawToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RawToken {}

impl Hash for RawToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
