//! In-memory object store for tests.
//!
//! Behaves like the remote store everywhere the pipeline can tell the
//! difference: listings are always served from current state, property
//! patches merge instead of replacing, and copies are linked to their
//! source only through the properties the caller sets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::error::{Result, StoreError};
use super::object::StoredObject;
use super::ObjectStore;

struct Entry {
    object: StoredObject,
    parent: String,
    content: Vec<u8>,
    restrict_downloads: bool,
}

/// [`ObjectStore`] backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn mint_id(&self) -> String {
        format!("mem-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn view_link(id: &str) -> String {
        format!("memory://view/{id}")
    }

    /// Places an object directly into a folder, for arranging fixtures.
    pub fn seed_object(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        properties: HashMap<String, String>,
        content: Vec<u8>,
    ) -> StoredObject {
        let id = self.mint_id();
        let object = StoredObject {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            app_properties: properties,
            web_view_link: Some(Self::view_link(&id)),
        };

        self.guard().push(Entry {
            object: object.clone(),
            parent: folder_id.to_string(),
            content,
            restrict_downloads: false,
        });

        object
    }

    /// Current metadata of one object.
    pub fn object(&self, id: &str) -> Option<StoredObject> {
        self.guard()
            .iter()
            .find(|entry| entry.object.id == id)
            .map(|entry| entry.object.clone())
    }

    /// Current content of one object.
    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.guard()
            .iter()
            .find(|entry| entry.object.id == id)
            .map(|entry| entry.content.clone())
    }

    /// Whether an object was stored with downloads restricted.
    pub fn download_restricted(&self, id: &str) -> Option<bool> {
        self.guard()
            .iter()
            .find(|entry| entry.object.id == id)
            .map(|entry| entry.restrict_downloads)
    }

    /// All objects currently in a folder, in insertion order.
    pub fn objects_in(&self, folder_id: &str) -> Vec<StoredObject> {
        self.guard()
            .iter()
            .filter(|entry| entry.parent == folder_id)
            .map(|entry| entry.object.clone())
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.guard().len()
    }
}

fn not_found(id: &str) -> StoreError {
    StoreError::Api {
        status: 404,
        message: format!("object not found: {id}"),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_folder(
        &self,
        folder_id: &str,
        mime_type: Option<&str>,
    ) -> Result<Vec<StoredObject>> {
        Ok(self
            .guard()
            .iter()
            .filter(|entry| entry.parent == folder_id)
            .filter(|entry| mime_type.map_or(true, |mime| entry.object.mime_type == mime))
            .map(|entry| entry.object.clone())
            .collect())
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        self.content(id).ok_or_else(|| not_found(id))
    }

    async fn copy_into(
        &self,
        source_id: &str,
        folder_id: &str,
        name: &str,
        properties: HashMap<String, String>,
    ) -> Result<StoredObject> {
        let new_id = self.mint_id();
        let mut entries = self.guard();

        let source = entries
            .iter()
            .find(|entry| entry.object.id == source_id)
            .ok_or_else(|| not_found(source_id))?;

        let object = StoredObject {
            id: new_id.clone(),
            name: name.to_string(),
            mime_type: source.object.mime_type.clone(),
            app_properties: properties,
            web_view_link: Some(Self::view_link(&new_id)),
        };
        let content = source.content.clone();

        entries.push(Entry {
            object: object.clone(),
            parent: folder_id.to_string(),
            content,
            restrict_downloads: true,
        });

        Ok(object)
    }

    async fn upload(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        properties: HashMap<String, String>,
        content: Vec<u8>,
        restrict_downloads: bool,
    ) -> Result<StoredObject> {
        let id = self.mint_id();
        let object = StoredObject {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            app_properties: properties,
            web_view_link: Some(Self::view_link(&id)),
        };

        self.guard().push(Entry {
            object: object.clone(),
            parent: folder_id.to_string(),
            content,
            restrict_downloads,
        });

        Ok(object)
    }

    async fn update_content(
        &self,
        id: &str,
        name: &str,
        mime_type: &str,
        properties: HashMap<String, String>,
        content: Vec<u8>,
        restrict_downloads: bool,
    ) -> Result<StoredObject> {
        let mut entries = self.guard();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.object.id == id)
            .ok_or_else(|| not_found(id))?;

        entry.object.name = name.to_string();
        entry.object.mime_type = mime_type.to_string();
        entry.object.app_properties.extend(properties);
        entry.content = content;
        entry.restrict_downloads = restrict_downloads;

        Ok(entry.object.clone())
    }

    async fn patch_properties(
        &self,
        id: &str,
        properties: HashMap<String, String>,
    ) -> Result<StoredObject> {
        let mut entries = self.guard();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.object.id == id)
            .ok_or_else(|| not_found(id))?;

        entry.object.app_properties.extend(properties);

        Ok(entry.object.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::object::{props, MIME_PDF, MIME_TEXT};

    fn props_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_list_folder_filters_by_parent_and_mime() {
        let store = MemoryStore::new();
        store.seed_object("in", "a.pdf", MIME_PDF, HashMap::new(), vec![1]);
        store.seed_object("in", "b.txt", MIME_TEXT, HashMap::new(), vec![2]);
        store.seed_object("other", "c.pdf", MIME_PDF, HashMap::new(), vec![3]);

        let pdfs = store.list_folder("in", Some(MIME_PDF)).await.unwrap();
        assert_eq!(pdfs.len(), 1);
        assert_eq!(pdfs[0].name, "a.pdf");

        let all = store.list_folder("in", None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_copy_preserves_content_and_sets_given_properties() {
        let store = MemoryStore::new();
        let source = store.seed_object("in", "a.pdf", MIME_PDF, HashMap::new(), vec![9, 9]);

        let copy = store
            .copy_into(
                &source.id,
                "out",
                "renamed.pdf",
                props_of(&[(props::COPIED_FROM, source.id.as_str())]),
            )
            .await
            .unwrap();

        assert_ne!(copy.id, source.id);
        assert_eq!(store.content(&copy.id).unwrap(), vec![9, 9]);
        assert_eq!(copy.prop(props::COPIED_FROM), Some(source.id.as_str()));
        assert_eq!(store.download_restricted(&copy.id), Some(true));
    }

    #[tokio::test]
    async fn test_patch_properties_merges_instead_of_replacing() {
        let store = MemoryStore::new();
        let object = store.seed_object(
            "out",
            "a.pdf",
            MIME_PDF,
            props_of(&[(props::COPIED_FROM, "src")]),
            vec![],
        );

        let patched = store
            .patch_properties(&object.id, props_of(&[(props::OCR_TEXT_FILE_ID, "txt")]))
            .await
            .unwrap();

        assert_eq!(patched.prop(props::COPIED_FROM), Some("src"));
        assert_eq!(patched.prop(props::OCR_TEXT_FILE_ID), Some("txt"));
    }

    #[tokio::test]
    async fn test_update_content_keeps_existing_properties() {
        let store = MemoryStore::new();
        let object = store.seed_object(
            "out",
            "index.html",
            "text/html",
            props_of(&[(props::IS_INDEX, props::MARKER)]),
            b"old".to_vec(),
        );

        let updated = store
            .update_content(
                &object.id,
                "index.html",
                "text/html",
                props_of(&[(props::IS_INDEX, props::MARKER)]),
                b"new".to_vec(),
                true,
            )
            .await
            .unwrap();

        assert_eq!(store.content(&updated.id).unwrap(), b"new".to_vec());
        assert!(updated.has_props(&[props::IS_INDEX]));
    }

    #[tokio::test]
    async fn test_download_missing_object_is_api_error() {
        let store = MemoryStore::new();

        match store.download("missing").await {
            Err(StoreError::Api { status: 404, .. }) => {}
            other => panic!("Expected 404, got {:?}", other),
        }
    }
}
