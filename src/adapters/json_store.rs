use crate::adapters::generate_document_id;
use crate::domain::model::{Document, Fields};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Offline store backed by a directory of `<collection>.json` exports.
///
/// Each file holds a JSON array of objects carrying their own `id` field, the
/// shape produced by exporting a collection from the admin console.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        if collection.is_empty()
            || collection.contains(['/', '\\', '\0'])
            || collection.starts_with('.')
        {
            return Err(PortalError::validation(format!(
                "Invalid collection name '{}'",
                collection
            )));
        }
        Ok(self.root.join(format!("{}.json", collection)))
    }

    async fn read_collection(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let items: Vec<Value> = serde_json::from_slice(&bytes)?;

        let mut documents = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let Value::Object(mut data) = item else {
                tracing::warn!("Skipping non-object entry #{} in {}", index, path.display());
                continue;
            };
            let id = match data.remove("id") {
                Some(Value::String(id)) => id,
                Some(Value::Number(n)) => n.to_string(),
                _ => format!("row-{}", index),
            };
            documents.push(Document::new(id, data));
        }
        Ok(documents)
    }

    async fn write_collection(&self, path: &Path, documents: &[Document]) -> Result<()> {
        let items: Vec<Value> = documents.iter().map(Document::to_json_with_id).collect();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(&items)?).await?;
        Ok(())
    }

    async fn modify<F>(&self, collection: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Document>) -> Result<()> + Send,
    {
        let path = self.collection_path(collection)?;
        let _guard = self.write_lock.lock().await;
        let mut documents = self.read_collection(&path).await?;
        change(&mut documents)?;
        self.write_collection(&path, &documents).await
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let path = self.collection_path(collection)?;
        self.read_collection(&path).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .list(collection)
            .await?
            .into_iter()
            .find(|doc| doc.id == id))
    }

    async fn add(&self, collection: &str, data: Fields) -> Result<String> {
        let id = generate_document_id();
        let doc = Document::new(id.clone(), data);
        self.modify(collection, |docs| {
            docs.push(doc);
            Ok(())
        })
        .await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        self.modify(collection, |docs| {
            match docs.iter_mut().find(|d| d.id == id) {
                Some(existing) => existing.data = data,
                None => docs.push(Document::new(id, data)),
            }
            Ok(())
        })
        .await
    }

    async fn update(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        self.modify(collection, |docs| {
            let existing = docs
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| PortalError::not_found(collection, id))?;
            existing.data.extend(data);
            Ok(())
        })
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.modify(collection, |docs| {
            docs.retain(|d| d.id != id);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_exported_collection() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("vessels.json"),
            r#"[{"id": "a1", "vesselName": "MV Kumul"}, {"vesselName": "No Id"}, 42]"#,
        )
        .unwrap();

        let store = JsonFileStore::new(dir.path());
        let docs = store.list("vessels").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a1");
        assert_eq!(docs[1].id, "row-1");
        assert!(!docs[0].data.contains_key("id"));
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.list("hods").await.unwrap().is_empty());
        assert!(store.get("hods", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_update_delete_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());

        let mut fields = Fields::new();
        fields.insert("portName".to_string(), json!("Wewak"));
        let id = store.add("ports", fields).await.unwrap();

        let mut patch = Fields::new();
        patch.insert("status".to_string(), json!("active"));
        store.update("ports", &id, patch).await.unwrap();

        let reopened = JsonFileStore::new(dir.path());
        let doc = reopened.get("ports", &id).await.unwrap().unwrap();
        assert_eq!(doc.data["portName"], json!("Wewak"));
        assert_eq!(doc.data["status"], json!("active"));

        reopened.delete("ports", &id).await.unwrap();
        assert!(reopened.list("ports").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_like_collection_names() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.list("../secrets").await.is_err());
    }
}
