#![forbid(unsafe_code)]

//! Persisted per-anchor state: starred ids, collapsed ids, and levels.
//!
//! A [`PersistenceBackend`] stores opaque string sets and string maps. The
//! engine only talks to it through [`StateStore`], which namespaces keys per
//! content session (`scrollmark:<kind>:<session>`) and turns every failure
//! into an empty result plus a `warn!` log.
//!
//! Backends:
//! - [`MemoryBackend`]: in-process; clones share storage.
//! - `JsonFileBackend` (feature `state-persistence`): one JSON document on
//!   disk, written atomically.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use tracing::warn;

use crate::anchor::{AnchorId, Level};
use crate::error::PersistError;

/// Key-value storage for string sets and string maps.
pub trait PersistenceBackend {
    fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>, PersistError>;

    fn set_string_set(&mut self, key: &str, set: &BTreeSet<String>) -> Result<(), PersistError>;

    fn get_string_map(&self, key: &str) -> Result<BTreeMap<String, String>, PersistError>;

    fn set_string_map(
        &mut self,
        key: &str,
        map: &BTreeMap<String, String>,
    ) -> Result<(), PersistError>;
}

#[derive(Debug, Default)]
struct MemoryData {
    sets: BTreeMap<String, BTreeSet<String>>,
    maps: BTreeMap<String, BTreeMap<String, String>>,
}

/// In-process backend. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Rc<RefCell<MemoryData>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let data = self.data.borrow();
        data.sets.len() + data.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistenceBackend for MemoryBackend {
    fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>, PersistError> {
        Ok(self.data.borrow().sets.get(key).cloned().unwrap_or_default())
    }

    fn set_string_set(&mut self, key: &str, set: &BTreeSet<String>) -> Result<(), PersistError> {
        self.data
            .borrow_mut()
            .sets
            .insert(key.to_string(), set.clone());
        Ok(())
    }

    fn get_string_map(&self, key: &str) -> Result<BTreeMap<String, String>, PersistError> {
        Ok(self.data.borrow().maps.get(key).cloned().unwrap_or_default())
    }

    fn set_string_map(
        &mut self,
        key: &str,
        map: &BTreeMap<String, String>,
    ) -> Result<(), PersistError> {
        self.data
            .borrow_mut()
            .maps
            .insert(key.to_string(), map.clone());
        Ok(())
    }
}

/// Per-anchor state loaded for a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub starred: AHashSet<AnchorId>,
    pub collapsed: AHashSet<AnchorId>,
    pub levels: AHashMap<AnchorId, Level>,
}

/// What a key holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Starred,
    Collapsed,
    Levels,
}

impl StateKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starred => "starred",
            Self::Collapsed => "collapsed",
            Self::Levels => "levels",
        }
    }
}

/// Namespaced, failure-tolerant access to a backend.
pub struct StateStore {
    backend: Box<dyn PersistenceBackend>,
    session: String,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    #[must_use]
    pub fn new(backend: Box<dyn PersistenceBackend>, session: impl Into<String>) -> Self {
        Self {
            backend,
            session: session.into(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub fn key(&self, kind: StateKind) -> String {
        format!("scrollmark:{}:{}", kind.as_str(), self.session)
    }

    /// Load everything; unreadable parts come back empty.
    #[must_use]
    pub fn load(&self) -> PersistedState {
        let starred = self.load_set(StateKind::Starred);
        let collapsed = self.load_set(StateKind::Collapsed);
        let key = self.key(StateKind::Levels);
        let levels = match self.backend.get_string_map(&key) {
            Ok(map) => map
                .into_iter()
                .filter_map(|(id, raw)| Level::parse(&raw).map(|l| (AnchorId::new(id), l)))
                .collect(),
            Err(error) => {
                warn!(%key, %error, "failed to load levels; using defaults");
                AHashMap::new()
            }
        };
        PersistedState {
            starred,
            collapsed,
            levels,
        }
    }

    /// Save an id set. Returns `false` if the backend failed.
    pub fn save_set(&mut self, kind: StateKind, ids: &AHashSet<AnchorId>) -> bool {
        let key = self.key(kind);
        let set: BTreeSet<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        match self.backend.set_string_set(&key, &set) {
            Ok(()) => true,
            Err(error) => {
                warn!(%key, %error, "failed to save anchor state");
                false
            }
        }
    }

    /// Save levels; top-level anchors are not stored.
    pub fn save_levels(&mut self, levels: &AHashMap<AnchorId, Level>) -> bool {
        let key = self.key(StateKind::Levels);
        let map: BTreeMap<String, String> = levels
            .iter()
            .filter(|(_, level)| **level != Level::TOP)
            .map(|(id, level)| (id.as_str().to_string(), level.get().to_string()))
            .collect();
        match self.backend.set_string_map(&key, &map) {
            Ok(()) => true,
            Err(error) => {
                warn!(%key, %error, "failed to save levels");
                false
            }
        }
    }

    fn load_set(&self, kind: StateKind) -> AHashSet<AnchorId> {
        let key = self.key(kind);
        match self.backend.get_string_set(&key) {
            Ok(set) => set.into_iter().map(AnchorId::new).collect(),
            Err(error) => {
                warn!(%key, %error, "failed to load anchor state; using empty set");
                AHashSet::new()
            }
        }
    }
}

#[cfg(feature = "state-persistence")]
pub use file::JsonFileBackend;

#[cfg(feature = "state-persistence")]
mod file {
    //! JSON document backend.
    //!
    //! ```json
    //! {
    //!   "version": 1,
    //!   "sets": { "scrollmark:starred:chat-1": ["a3f0…"] },
    //!   "maps": { "scrollmark:levels:chat-1": { "a3f0…": "2" } }
    //! }
    //! ```

    use std::collections::{BTreeMap, BTreeSet};
    use std::io;
    use std::path::{Path, PathBuf};

    use serde::{Deserialize, Serialize};

    use super::PersistenceBackend;
    use crate::error::PersistError;

    const FORMAT_VERSION: u64 = 1;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Document {
        version: u64,
        #[serde(default)]
        sets: BTreeMap<String, BTreeSet<String>>,
        #[serde(default)]
        maps: BTreeMap<String, BTreeMap<String, String>>,
    }

    /// Stores all keys in one JSON file.
    ///
    /// A missing file reads as empty. Writes go to a temp file that is then
    /// renamed over the target.
    #[derive(Debug, Clone)]
    pub struct JsonFileBackend {
        path: PathBuf,
    }

    impl JsonFileBackend {
        #[must_use]
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn read(&self) -> Result<Document, PersistError> {
            let contents = match std::fs::read_to_string(&self.path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Document {
                        version: FORMAT_VERSION,
                        ..Document::default()
                    });
                }
                Err(e) => return Err(e.into()),
            };
            let doc: Document = serde_json::from_str(&contents)
                .map_err(|e| PersistError::Encoding(format!("failed to parse state file: {e}")))?;
            if doc.version != FORMAT_VERSION {
                return Err(PersistError::Encoding(format!(
                    "unsupported state file version: {} (expected {FORMAT_VERSION})",
                    doc.version
                )));
            }
            Ok(doc)
        }

        fn write(&self, doc: &Document) -> Result<(), PersistError> {
            let json = serde_json::to_string_pretty(doc)
                .map_err(|e| PersistError::Encoding(format!("failed to serialize state: {e}")))?;
            let temp = self.path.with_extension("json.tmp");
            std::fs::write(&temp, json)?;
            std::fs::rename(&temp, &self.path)?;
            Ok(())
        }
    }

    impl PersistenceBackend for JsonFileBackend {
        fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>, PersistError> {
            Ok(self.read()?.sets.remove(key).unwrap_or_default())
        }

        fn set_string_set(
            &mut self,
            key: &str,
            set: &BTreeSet<String>,
        ) -> Result<(), PersistError> {
            let mut doc = self.read()?;
            doc.sets.insert(key.to_string(), set.clone());
            self.write(&doc)
        }

        fn get_string_map(&self, key: &str) -> Result<BTreeMap<String, String>, PersistError> {
            Ok(self.read()?.maps.remove(key).unwrap_or_default())
        }

        fn set_string_map(
            &mut self,
            key: &str,
            map: &BTreeMap<String, String>,
        ) -> Result<(), PersistError> {
            let mut doc = self.read()?;
            doc.maps.insert(key.to_string(), map.clone());
            self.write(&doc)
        }
    }
}
