use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::RagError;
use crate::vector_entry::MetadataRecord;

pub type MetadataMap = BTreeMap<String, MetadataRecord>;

/// Flat JSON file mapping vector id to its source text.
///
/// Single writer, single process: `save` rewrites the whole file.
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// A missing file yields an empty map.
    pub fn load(&self) -> Result<MetadataMap, RagError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    path = %self.path.display(),
                    "Metadata file not found; run `store` first to populate it"
                );
                return Ok(MetadataMap::new());
            }
            Err(e) => {
                return Err(RagError::Metadata(format!(
                    "failed to read '{}': {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let map: MetadataMap = serde_json::from_str(&raw).map_err(|e| {
            RagError::Metadata(format!("'{}' is not valid JSON: {}", self.path.display(), e))
        })?;
        debug!(entries = map.len(), "Loaded metadata");
        Ok(map)
    }

    pub fn save(&self, map: &MetadataMap) -> Result<(), RagError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(RagError::metadata)?;
        }
        let json = serde_json::to_string_pretty(map).map_err(RagError::metadata)?;
        fs::write(&self.path, json).map_err(|e| {
            RagError::Metadata(format!("failed to write '{}': {}", self.path.display(), e))
        })?;
        debug!(entries = map.len(), path = %self.path.display(), "Saved metadata");
        Ok(())
    }
}
