//! Item sources: where the worklist's items come from.
//!
//! The engine treats work items as externally owned. A source is re-read on
//! every assembly so lifecycle changes made elsewhere show up next pass.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::model::WorkItem;

pub trait ItemSource {
    fn fetch(&self) -> Result<Vec<WorkItem>>;
}

/// A JSON file holding an array of work items.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ItemSource for JsonFileSource {
    fn fetch(&self) -> Result<Vec<WorkItem>> {
        let content = std::fs::read_to_string(&self.path)?;
        let items: Vec<WorkItem> = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), count = items.len(), "loaded work items");
        Ok(items)
    }
}

/// Fixed in-memory items.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    items: Vec<WorkItem>,
}

impl StaticSource {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self { items }
    }
}

impl ItemSource for StaticSource {
    fn fetch(&self) -> Result<Vec<WorkItem>> {
        Ok(self.items.clone())
    }
}
