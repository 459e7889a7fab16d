// Adapters layer: concrete implementations of the domain ports (document store, blob storage,
// email, identity).

pub mod email;
pub mod firestore;
pub mod identity;
pub mod json_store;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;
pub mod storage;

use crate::domain::model::{Document, Fields};
use crate::domain::ports::{DocumentStore, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// 與 Firestore 自動 id 相同長度的隨機英數字串
pub fn generate_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

/// 依設定選用的文件資料庫
#[derive(Debug)]
pub enum AnyStore {
    Firestore(firestore::FirestoreStore),
    JsonFiles(json_store::JsonFileStore),
}

#[async_trait]
impl DocumentStore for AnyStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        match self {
            Self::Firestore(s) => s.list(collection).await,
            Self::JsonFiles(s) => s.list(collection).await,
        }
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        match self {
            Self::Firestore(s) => s.get(collection, id).await,
            Self::JsonFiles(s) => s.get(collection, id).await,
        }
    }

    async fn add(&self, collection: &str, data: Fields) -> Result<String> {
        match self {
            Self::Firestore(s) => s.add(collection, data).await,
            Self::JsonFiles(s) => s.add(collection, data).await,
        }
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        match self {
            Self::Firestore(s) => s.set(collection, id, data).await,
            Self::JsonFiles(s) => s.set(collection, id, data).await,
        }
    }

    async fn update(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        match self {
            Self::Firestore(s) => s.update(collection, id, data).await,
            Self::JsonFiles(s) => s.update(collection, id, data).await,
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        match self {
            Self::Firestore(s) => s.delete(collection, id).await,
            Self::JsonFiles(s) => s.delete(collection, id).await,
        }
    }
}

/// 依設定選用的檔案儲存
#[derive(Debug, Clone)]
pub enum AnyStorage {
    Local(storage::LocalStorage),
    #[cfg(feature = "s3")]
    S3(s3::S3Storage),
}

impl Storage for AnyStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            Self::Local(s) => s.read_file(path).await,
            #[cfg(feature = "s3")]
            Self::S3(s) => s.read_file(path).await,
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        match self {
            Self::Local(s) => s.write_file(path, data).await,
            #[cfg(feature = "s3")]
            Self::S3(s) => s.write_file(path, data).await,
        }
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        match self {
            Self::Local(s) => s.delete_file(path).await,
            #[cfg(feature = "s3")]
            Self::S3(s) => s.delete_file(path).await,
        }
    }
}
