use crate::domain::model::{Document, Fields};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Blob storage for uploaded documents and generated reports, addressed by path.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn delete_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Hosted document database: collections of schemaless documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, collection: &str) -> Result<Vec<Document>>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;
    /// 新增文件，回傳產生的 id
    async fn add(&self, collection: &str, data: Fields) -> Result<String>;
    /// 以指定 id 寫入 (覆蓋)
    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()>;
    /// 只更新給定欄位，文件必須存在
    async fn update(&self, collection: &str, id: &str, data: Fields) -> Result<()>;
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        (**self).list(collection).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        (**self).get(collection, id).await
    }

    async fn add(&self, collection: &str, data: Fields) -> Result<String> {
        (**self).add(collection, data).await
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        (**self).set(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        (**self).update(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        (**self).delete(collection, id).await
    }
}

/// Transactional email API (template + parameter bag).
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, template_id: &str, params: Fields) -> Result<()>;
}

/// Fetch → filter/aggregate → render. 每種報表各自實作
#[async_trait]
pub trait ReportPipeline: Send + Sync {
    type Output: Send;

    async fn extract(&self) -> Result<Vec<Document>>;
    async fn transform(&self, documents: Vec<Document>) -> Result<Self::Output>;
    /// 輸出報表，回傳儲存路徑
    async fn load(&self, output: Self::Output) -> Result<Vec<String>>;
}
