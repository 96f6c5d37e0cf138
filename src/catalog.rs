//! The external course catalog, as far as this crate needs it.
use std::collections::BTreeMap;

use crate::config::CatalogConfig;

/// Credit weights live in the catalog, not in the ledger's course rows.
pub trait CourseCatalog: Send + Sync {
    fn credits(&self, course_id: &str) -> Option<u32>;
}

/// A fixed credit table, typically loaded from `[catalog.credits]`.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    credits: BTreeMap<String, u32>,
}

impl StaticCatalog {
    pub fn new(credits: BTreeMap<String, u32>) -> Self {
        Self { credits }
    }
}

impl From<&CatalogConfig> for StaticCatalog {
    fn from(value: &CatalogConfig) -> Self {
        Self::new(value.credits.clone())
    }
}

impl CourseCatalog for StaticCatalog {
    fn credits(&self, course_id: &str) -> Option<u32> {
        self.credits.get(course_id).copied()
    }
}
