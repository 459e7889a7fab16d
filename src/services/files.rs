use crate::domain::model::{collections, Fields, UploadedFile};
use crate::domain::ports::{DocumentStore, Storage};
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{require_text, validate_file_extension};
use chrono::Utc;
use serde_json::Value;

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &["pdf", "doc", "docx", "xls", "xlsx", "csv", "png", "jpg", "jpeg"];
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub allowed_extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// 檔名只保留英數與 `.-_`，其餘換成底線
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

pub struct FileService<S: Storage, D: DocumentStore> {
    storage: S,
    store: D,
    policy: UploadPolicy,
}

impl<S: Storage, D: DocumentStore> FileService<S, D> {
    pub fn new(storage: S, store: D, policy: UploadPolicy) -> Self {
        Self {
            storage,
            store,
            policy,
        }
    }

    pub async fn upload(
        &self,
        port_id: &str,
        file_name: &str,
        bytes: &[u8],
        uploaded_by: Option<&str>,
    ) -> Result<UploadedFile> {
        require_text("Port", port_id)?;
        let allowed: Vec<&str> = self
            .policy
            .allowed_extensions
            .iter()
            .map(String::as_str)
            .collect();
        validate_file_extension("file", file_name, &allowed)?;
        if bytes.is_empty() {
            return Err(PortalError::validation("Uploaded file is empty"));
        }
        if bytes.len() as u64 > self.policy.max_bytes {
            return Err(PortalError::validation(format!(
                "File is {} bytes, the limit is {} bytes",
                bytes.len(),
                self.policy.max_bytes
            )));
        }

        let now = Utc::now();
        let safe_port = sanitize_file_name(port_id);
        let storage_path = format!(
            "{}/{}/{}_{}",
            collections::FILE_UPLOADS,
            safe_port,
            now.timestamp_millis(),
            sanitize_file_name(file_name)
        );

        self.storage.write_file(&storage_path, bytes).await?;

        let mut file = UploadedFile {
            id: String::new(),
            file_name: file_name.to_string(),
            storage_path: storage_path.clone(),
            content_type: Some(content_type_for(file_name).to_string()),
            size: bytes.len() as u64,
            port_id: Some(port_id.to_string()),
            uploaded_by: uploaded_by.map(str::to_string),
            uploaded_at: Some(now.to_rfc3339()),
        };
        let mut data = match serde_json::to_value(&file)? {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        data.remove("id");

        // metadata 寫入失敗時移除已上傳的檔案
        match self.store.add(collections::FILE_UPLOADS, data).await {
            Ok(id) => file.id = id,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete_file(&storage_path).await {
                    tracing::warn!("Could not remove orphaned upload {}: {}", storage_path, cleanup);
                }
                return Err(e);
            }
        }

        tracing::info!("📎 Uploaded {} ({} bytes) to {}", file.file_name, file.size, storage_path);
        Ok(file)
    }

    pub async fn get(&self, id: &str) -> Result<UploadedFile> {
        let doc = self
            .store
            .get(collections::FILE_UPLOADS, id)
            .await?
            .ok_or_else(|| PortalError::not_found(collections::FILE_UPLOADS, id))?;
        UploadedFile::from_document(&doc)
    }

    pub async fn download(&self, id: &str) -> Result<(UploadedFile, Vec<u8>)> {
        let file = self.get(id).await?;
        let bytes = self.storage.read_file(&file.storage_path).await?;
        Ok((file, bytes))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let file = self.get(id).await?;
        self.storage.delete_file(&file.storage_path).await?;
        self.store.delete(collections::FILE_UPLOADS, id).await?;
        tracing::info!("🗑️ Deleted upload {} ({})", id, file.file_name);
        Ok(())
    }

    /// 列出上傳檔案，`port_id` 為 None 時列出全部
    pub async fn list(&self, port_id: Option<&str>) -> Result<Vec<UploadedFile>> {
        let mut files = Vec::new();
        for doc in self.store.list(collections::FILE_UPLOADS).await? {
            match UploadedFile::from_document(&doc) {
                Ok(file) => {
                    if port_id.is_none_or(|p| file.port_id.as_deref() == Some(p)) {
                        files.push(file);
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed upload record {}: {}", doc.id, e),
            }
        }
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::adapters::storage::LocalStorage;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> FileService<LocalStorage, MemoryStore> {
        FileService::new(
            LocalStorage::new(dir.path()),
            MemoryStore::new(),
            UploadPolicy {
                allowed_extensions: vec!["pdf".to_string(), "xlsx".to_string()],
                max_bytes: 16,
            },
        )
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Manifest March 2024.pdf"), "Manifest_March_2024.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..."), "file");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.PDF"), "application/pdf");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_upload_download_delete() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let file = service
            .upload("lae", "Crew List.pdf", b"%PDF-1.4", Some("uid-1"))
            .await
            .unwrap();
        assert!(file.storage_path.starts_with("fileUploads/lae/"));
        assert!(file.storage_path.ends_with("_Crew_List.pdf"));
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));

        let (meta, bytes) = service.download(&file.id).await.unwrap();
        assert_eq!(meta.file_name, "Crew List.pdf");
        assert_eq!(bytes, b"%PDF-1.4");

        assert_eq!(service.list(Some("lae")).await.unwrap().len(), 1);
        assert!(service.list(Some("madang")).await.unwrap().is_empty());

        service.delete(&file.id).await.unwrap();
        assert!(service.list(None).await.unwrap().is_empty());
        assert!(!dir.path().join(&file.storage_path).exists());
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        assert!(service.upload("lae", "script.exe", b"MZ", None).await.is_err());
        assert!(service.upload("lae", "big.pdf", &[0u8; 17], None).await.is_err());
        assert!(service.upload("lae", "empty.pdf", b"", None).await.is_err());
        assert!(service.upload("  ", "a.pdf", b"x", None).await.is_err());
    }

    #[tokio::test]
    async fn test_download_unknown_id() {
        let dir = TempDir::new().unwrap();
        let err = service(&dir).download("missing").await.unwrap_err();
        assert!(matches!(err, PortalError::NotFound { .. }));
    }
}
