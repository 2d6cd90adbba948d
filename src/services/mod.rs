//! Service layer: capability implementations behind well-known tokens.

pub mod config;
pub mod document;

pub use config::{config_token, ConfigService, WorkbenchConfig};
pub use document::{
    document_token, DocumentChange, DocumentError, DocumentService, DocumentSync,
    InMemoryDocumentStore, SharedDocument,
};
