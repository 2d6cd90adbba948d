//! Document synchronization interface.
//!
//! The shell treats document sync as an opaque token-addressed service:
//! open a path, receive a shared handle, observe change notifications. The
//! synchronization transport behind the trait is somebody else's problem;
//! the in-memory store here backs tests and the built-in plugin.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::core::Token;

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug)]
pub enum DocumentError {
    Unavailable(String),
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::Unavailable(reason) => {
                write!(f, "document service unavailable: {}", reason)
            }
        }
    }
}

impl std::error::Error for DocumentError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub path: PathBuf,
    pub revision: u64,
}

struct ChangeFanout {
    senders: RefCell<Vec<Sender<DocumentChange>>>,
}

impl ChangeFanout {
    fn new() -> Self {
        Self {
            senders: RefCell::new(Vec::new()),
        }
    }

    fn subscribe(&self) -> Receiver<DocumentChange> {
        let (tx, rx) = mpsc::channel();
        self.senders.borrow_mut().push(tx);
        rx
    }

    fn broadcast(&self, change: DocumentChange) {
        self.senders
            .borrow_mut()
            .retain(|sender| sender.send(change.clone()).is_ok());
    }
}

/// Handle to one shared document. Edits bump the revision and notify every
/// subscriber of the owning store.
pub struct SharedDocument {
    path: PathBuf,
    text: RefCell<String>,
    revision: Cell<u64>,
    fanout: Rc<ChangeFanout>,
}

impl SharedDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn apply(&self, text: String) {
        *self.text.borrow_mut() = text;
        let revision = self.revision.get() + 1;
        self.revision.set(revision);
        self.fanout.broadcast(DocumentChange {
            path: self.path.clone(),
            revision,
        });
    }
}

pub trait DocumentSync {
    /// Opens the document at `path`, creating a shared handle on first use.
    fn open(&self, path: &Path) -> Result<Rc<SharedDocument>>;

    /// Stream of change notifications across every open document.
    fn subscribe(&self) -> Receiver<DocumentChange>;
}

/// Sized wrapper stored in the service registry; consumers resolve this and
/// stay ignorant of the concrete transport.
pub struct DocumentService {
    inner: Rc<dyn DocumentSync>,
}

impl DocumentService {
    pub fn new(inner: Rc<dyn DocumentSync>) -> Self {
        Self { inner }
    }

    pub fn open(&self, path: &Path) -> Result<Rc<SharedDocument>> {
        self.inner.open(path)
    }

    pub fn subscribe(&self) -> Receiver<DocumentChange> {
        self.inner.subscribe()
    }
}

/// Single-process store: good enough for tests and for running the shell
/// without a collaboration backend.
pub struct InMemoryDocumentStore {
    docs: RefCell<FxHashMap<PathBuf, Rc<SharedDocument>>>,
    fanout: Rc<ChangeFanout>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RefCell::new(FxHashMap::default()),
            fanout: Rc::new(ChangeFanout::new()),
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSync for InMemoryDocumentStore {
    fn open(&self, path: &Path) -> Result<Rc<SharedDocument>> {
        let mut docs = self.docs.borrow_mut();
        let doc = docs.entry(path.to_path_buf()).or_insert_with(|| {
            tracing::debug!(path = %path.display(), "document opened");
            Rc::new(SharedDocument {
                path: path.to_path_buf(),
                text: RefCell::new(String::new()),
                revision: Cell::new(0),
                fanout: Rc::clone(&self.fanout),
            })
        });
        Ok(Rc::clone(doc))
    }

    fn subscribe(&self) -> Receiver<DocumentChange> {
        self.fanout.subscribe()
    }
}

/// Well-known token the shell and extensions use to locate document sync.
pub fn document_token() -> &'static Token<DocumentService> {
    static TOKEN: OnceLock<Token<DocumentService>> = OnceLock::new();
    TOKEN.get_or_init(|| Token::new("atelier:documents"))
}
