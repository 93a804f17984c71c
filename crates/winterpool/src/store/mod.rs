//! Remote object store abstraction.
//!
//! The pipeline never touches the wire API directly: every stage goes
//! through [`ObjectStore`], which the Drive-backed [`DriveStore`] implements
//! in production and [`MemoryStore`] implements for tests.

pub mod drive;
pub mod error;
pub mod memory;
pub mod object;

use std::collections::HashMap;

use async_trait::async_trait;

pub use drive::DriveStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use object::{StoredObject, MIME_CSV, MIME_HTML, MIME_PDF, MIME_TEXT};

/// Folder-scoped object operations the pipeline needs.
///
/// Listings are always served fresh from the backing store. Property
/// patches merge into the existing property set; absent keys are left
/// untouched and there is no way to delete a key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All non-trashed objects directly inside `folder_id`, optionally
    /// narrowed to one MIME type. Drains every page of the listing.
    async fn list_folder(
        &self,
        folder_id: &str,
        mime_type: Option<&str>,
    ) -> Result<Vec<StoredObject>, StoreError>;

    /// Full content of an object.
    async fn download(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Copy of `source_id` placed in `folder_id` under a new name, with
    /// the given properties already set. Downloading the copy is blocked
    /// for non-writers.
    async fn copy_into(
        &self,
        source_id: &str,
        folder_id: &str,
        name: &str,
        properties: HashMap<String, String>,
    ) -> Result<StoredObject, StoreError>;

    /// New object in `folder_id` with the given content and properties.
    /// `restrict_downloads` blocks copy and download for non-writers.
    async fn upload(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        properties: HashMap<String, String>,
        content: Vec<u8>,
        restrict_downloads: bool,
    ) -> Result<StoredObject, StoreError>;

    /// Replace the content (and name) of an existing object, merging the
    /// given properties.
    async fn update_content(
        &self,
        id: &str,
        name: &str,
        mime_type: &str,
        properties: HashMap<String, String>,
        content: Vec<u8>,
        restrict_downloads: bool,
    ) -> Result<StoredObject, StoreError>;

    /// Merge properties into an existing object.
    async fn patch_properties(
        &self,
        id: &str,
        properties: HashMap<String, String>,
    ) -> Result<StoredObject, StoreError>;
}
