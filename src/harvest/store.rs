use crate::error::HarvestError;

pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub status: u16,
    pub file_id: Option<String>,
}

impl UploadReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The durable side of the archive: folders addressed by (name, parent id)
/// and additive object uploads. Ids are opaque strings owned by the store.
pub trait RemoteStore {
    /// Non-trashed folders named exactly `name` directly under `parent_id`,
    /// in the store's stable order.
    fn find_folders(&mut self, name: &str, parent_id: &str) -> Result<Vec<String>, HarvestError>;

    fn create_folder(&mut self, name: &str, parent_id: &str) -> Result<String, HarvestError>;

    fn upload(
        &mut self,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        parent_id: &str,
    ) -> Result<UploadReceipt, HarvestError>;
}

#[cfg(test)]
pub mod memory {
    use super::*;

    #[derive(Debug, Clone)]
    pub struct MemoryFolder {
        pub id: String,
        pub name: String,
        pub parent: String,
    }

    #[derive(Debug, Clone)]
    pub struct MemoryObject {
        pub name: String,
        pub parent: String,
        pub bytes: usize,
    }

    /// In-process store used by unit tests.
    #[derive(Debug)]
    pub struct MemoryStore {
        pub folders: Vec<MemoryFolder>,
        pub objects: Vec<MemoryObject>,
        pub upload_status: u16,
        pub fail_uploads: bool,
        pub fail_queries: bool,
        /// Fail this many folder queries, then answer normally.
        pub query_failures_left: usize,
        /// Reject this many uploads with status 503, then accept.
        pub rejected_uploads_left: usize,
        pub creates: usize,
        next_id: usize,
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self {
                folders: Vec::new(),
                objects: Vec::new(),
                upload_status: 200,
                fail_uploads: false,
                fail_queries: false,
                query_failures_left: 0,
                rejected_uploads_left: 0,
                creates: 0,
                next_id: 1,
            }
        }
    }

    impl MemoryStore {
        pub fn with_folder(mut self, name: &str, parent: &str) -> Self {
            let id = self.mint_id();
            self.folders.push(MemoryFolder {
                id,
                name: name.to_string(),
                parent: parent.to_string(),
            });
            self
        }

        pub fn children_named(&self, name: &str, parent: &str) -> usize {
            self.folders
                .iter()
                .filter(|f| f.name == name && f.parent == parent)
                .count()
        }

        pub fn folder_names(&self) -> Vec<String> {
            self.folders.iter().map(|f| f.name.clone()).collect()
        }

        fn mint_id(&mut self) -> String {
            let id = format!("fld-{}", self.next_id);
            self.next_id += 1;
            id
        }
    }

    impl RemoteStore for MemoryStore {
        fn find_folders(
            &mut self,
            name: &str,
            parent_id: &str,
        ) -> Result<Vec<String>, HarvestError> {
            if self.query_failures_left > 0 {
                self.query_failures_left -= 1;
                return Err(HarvestError::RemoteStore("query rejected".into()));
            }
            if self.fail_queries {
                return Err(HarvestError::RemoteStore("query rejected".into()));
            }
            Ok(self
                .folders
                .iter()
                .filter(|f| f.name == name && f.parent == parent_id)
                .map(|f| f.id.clone())
                .collect())
        }

        fn create_folder(&mut self, name: &str, parent_id: &str) -> Result<String, HarvestError> {
            let id = self.mint_id();
            self.creates += 1;
            self.folders.push(MemoryFolder {
                id: id.clone(),
                name: name.to_string(),
                parent: parent_id.to_string(),
            });
            Ok(id)
        }

        fn upload(
            &mut self,
            name: &str,
            _mime_type: &str,
            bytes: Vec<u8>,
            parent_id: &str,
        ) -> Result<UploadReceipt, HarvestError> {
            if self.fail_uploads {
                return Err(HarvestError::RemoteStore("connection reset".into()));
            }
            let status = if self.rejected_uploads_left > 0 {
                self.rejected_uploads_left -= 1;
                503
            } else {
                self.upload_status
            };
            let ok = (200..300).contains(&status);
            if ok {
                self.objects.push(MemoryObject {
                    name: name.to_string(),
                    parent: parent_id.to_string(),
                    bytes: bytes.len(),
                });
            }
            Ok(UploadReceipt {
                status,
                file_id: ok.then(|| format!("obj-{}", self.objects.len())),
            })
        }
    }
}
