//! The process-lifetime document registry.
//!
//! Append-only: entries are created lazily on first request and never
//! invalidated within a run. Population happens with the map lock held, so
//! a logical name is fetched and parsed at most once per process and a
//! concurrent second caller always observes either nothing or the complete
//! entry, never a partial one.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use codebook_ingest::{Archetype, DatasetDocument, DocumentSource};

use crate::archetype::ArchetypeRecord;
use crate::error::Result;

type DatasetKey = (String, String, String);

pub struct Registry {
    source: Arc<dyn DocumentSource>,
    datasets: Mutex<BTreeMap<DatasetKey, Arc<DatasetDocument>>>,
    archetypes: Mutex<BTreeMap<String, Arc<ArchetypeRecord>>>,
}

impl Registry {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self {
            source,
            datasets: Mutex::new(BTreeMap::new()),
            archetypes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Parsed dataset document for one (codebook, dataset, language),
    /// fetched and parsed on first request only.
    pub fn dataset(
        &self,
        codebook: &str,
        dataset_id: &str,
        language: &str,
    ) -> Result<Arc<DatasetDocument>> {
        let key = (
            codebook.to_string(),
            dataset_id.to_string(),
            language.to_string(),
        );
        let mut cache = lock(&self.datasets);
        if let Some(document) = cache.get(&key) {
            return Ok(Arc::clone(document));
        }
        debug!(codebook, dataset_id, language, "loading dataset document");
        let xml = self.source.dataset_xml(codebook, dataset_id, language)?;
        let document = Arc::new(DatasetDocument::parse(&xml)?);
        cache.insert(key, Arc::clone(&document));
        Ok(document)
    }

    /// Flattened archetype record by id, fetched and parsed on first
    /// request only.
    pub fn archetype(&self, archetype_id: &str) -> Result<Arc<ArchetypeRecord>> {
        let mut cache = lock(&self.archetypes);
        if let Some(record) = cache.get(archetype_id) {
            return Ok(Arc::clone(record));
        }
        debug!(archetype_id, "loading flattened archetype");
        let json = self.source.flattened_archetype(archetype_id)?;
        let record = Arc::new(ArchetypeRecord::new(Archetype::parse(archetype_id, &json)?));
        cache.insert(archetype_id.to_string(), Arc::clone(&record));
        Ok(record)
    }
}

// Entries are append-only Arcs, so data behind a poisoned lock is still
// coherent; recover the guard instead of propagating the panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use codebook_ingest::{IngestError, Result as IngestResult};

    struct CountingSource {
        dataset_fetches: AtomicUsize,
        archetype_fetches: AtomicUsize,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                dataset_fetches: AtomicUsize::new(0),
                archetype_fetches: AtomicUsize::new(0),
            }
        }
    }

    impl DocumentSource for CountingSource {
        fn dataset_xml(
            &self,
            _codebook: &str,
            dataset_id: &str,
            _language: &str,
        ) -> IngestResult<String> {
            self.dataset_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(format!("<dataset id=\"{dataset_id}\"/>"))
        }

        fn flattened_archetype(&self, archetype_id: &str) -> IngestResult<String> {
            self.archetype_fetches.fetch_add(1, Ordering::SeqCst);
            if archetype_id == "missing" {
                return Err(IngestError::MissingDocument {
                    identifier: archetype_id.to_string(),
                });
            }
            Ok(format!(
                r#"{{
                    "archetype_id": "{archetype_id}",
                    "original_language": "en",
                    "definition": {{
                        "_type": "C_COMPLEX_OBJECT",
                        "rm_type_name": "CLUSTER",
                        "node_id": "at0000",
                        "attributes": []
                    }}
                }}"#
            ))
        }
    }

    #[test]
    fn dataset_fetched_once_per_key() {
        let source = Arc::new(CountingSource::new());
        let registry = Registry::new(Arc::clone(&source) as Arc<dyn DocumentSource>);

        let first = registry.dataset("zib", "1.2.3", "nl-NL").expect("first");
        let second = registry.dataset("zib", "1.2.3", "nl-NL").expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.dataset_fetches.load(Ordering::SeqCst), 1);

        registry.dataset("zib", "1.2.3", "en-US").expect("other key");
        assert_eq!(source.dataset_fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn archetype_fetched_once_per_id() {
        let source = Arc::new(CountingSource::new());
        let registry = Registry::new(Arc::clone(&source) as Arc<dyn DocumentSource>);

        registry.archetype("openEHR-EHR-CLUSTER.a.v1").expect("first");
        registry.archetype("openEHR-EHR-CLUSTER.a.v1").expect("second");
        assert_eq!(source.archetype_fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_fetch_is_not_cached_as_success() {
        let source = Arc::new(CountingSource::new());
        let registry = Registry::new(Arc::clone(&source) as Arc<dyn DocumentSource>);

        assert!(registry.archetype("missing").is_err());
        assert!(registry.archetype("missing").is_err());
        // Failures retry; only successes are memoized.
        assert_eq!(source.archetype_fetches.load(Ordering::SeqCst), 2);
    }
}
