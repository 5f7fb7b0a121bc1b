//! Persistence of the predicate source text
//!
//! The predicate source is the only state that outlives a run. Stores keep
//! the text byte-for-byte; validation happens before anything is written.

use crate::predicate::Predicate;
use crate::SweeperError;
use std::io;
use std::path::{Path, PathBuf};

/// A place the predicate source text is kept between runs
pub trait PredicateStore {
    /// Returns the stored source, or `None` if nothing has been saved yet
    fn get(&self) -> io::Result<Option<String>>;

    /// Replaces the stored source
    fn set(&mut self, source: &str) -> io::Result<()>;
}

/// Validates `source` and persists it only if it compiles
pub fn save_predicate(
    store: &mut dyn PredicateStore,
    source: &str,
) -> Result<Predicate, SweeperError> {
    let predicate = Predicate::compile(source)?;
    store.set(source)?;
    tracing::info!("Saved predicate {}", predicate.fingerprint());
    Ok(predicate)
}

/// Stores the predicate in a plain text file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PredicateStore for FileStore {
    fn get(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(source) => Ok(Some(source)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, source: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write-then-rename so a crash never leaves a truncated predicate
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        std::fs::write(&staging, source.as_bytes())?;
        std::fs::rename(&staging, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::PredicateInput;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MemoryStore {
        source: Option<String>,
    }

    impl PredicateStore for MemoryStore {
        fn get(&self) -> io::Result<Option<String>> {
            Ok(self.source.clone())
        }

        fn set(&mut self, source: &str) -> io::Result<()> {
            self.source = Some(source.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_file_store_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("predicate.txt"));
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_save_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path().join("rules").join("predicate.txt"));

        let source = "// Block low-follower accounts\r\n\treturn profile.followers_count < 100;  \n";
        let saved = save_predicate(&mut store, source).unwrap();

        let reloaded = store.get().unwrap().unwrap();
        assert_eq!(reloaded.as_bytes(), source.as_bytes());

        let reloaded = Predicate::compile(&reloaded).unwrap();
        for followers in [5, 500] {
            let input = PredicateInput {
                profile: json!({"followers_count": followers}),
                tweet: json!({}),
                following_users: vec![],
            };
            assert_eq!(saved.should_block(&input), reloaded.should_block(&input));
        }
    }

    #[test]
    fn test_invalid_predicate_is_not_saved() {
        let mut store = MemoryStore::default();
        store.set("return true").unwrap();

        let result = save_predicate(&mut store, "return (");
        assert!(matches!(result, Err(SweeperError::Predicate(_))));
        assert_eq!(store.get().unwrap().as_deref(), Some("return true"));
    }
}
