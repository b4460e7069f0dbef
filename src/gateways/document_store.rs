use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

/// Object storage for uploaded identity documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores `bytes` under the owner's folder and returns the object URL.
    async fn put(&self, owner: &Uuid, file_name: &str, bytes: Vec<u8>) -> Result<String>;
}

pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn put(&self, owner: &Uuid, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let dir = self.root.join(owner.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Failed to create upload directory: {}", e)))?;

        let object_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        tokio::fs::write(dir.join(&object_name), bytes)
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Failed to store document: {}", e)))?;

        Ok(format!("/uploads/{}/{}", owner, object_name))
    }
}

/// Keeps alphanumerics, dots, dashes and underscores; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_components_are_stripped() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\my id.png"), "my_id.png");
        assert_eq!(sanitize_file_name(".."), "document");
    }

    #[tokio::test]
    async fn local_store_writes_under_owner_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDocumentStore::new(dir.path());
        let owner = Uuid::new_v4();

        let url = store.put(&owner, "passport.jpg", b"jpeg-bytes".to_vec()).await.unwrap();
        assert!(url.starts_with(&format!("/uploads/{}/", owner)));
        assert!(url.ends_with("-passport.jpg"));

        let object = url.rsplit('/').next().unwrap();
        let written = std::fs::read(dir.path().join(owner.to_string()).join(object)).unwrap();
        assert_eq!(written, b"jpeg-bytes");
    }
}
