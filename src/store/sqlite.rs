use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::{Map, Value};

use super::{Document, DocumentList, DocumentStore, FileStorage, Query, StoredFile, UploadPayload};
use crate::db::queries;

/// Document store and file storage backed by the local SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }

    fn file_url(file_id: &str) -> String {
        format!("/api/files/{file_id}")
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create_document(
        &self,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> anyhow::Result<Document> {
        let db = self.conn()?;
        queries::insert_document(&db, collection_id, document_id, data)
    }

    async fn get_document(
        &self,
        collection_id: &str,
        document_id: &str,
    ) -> anyhow::Result<Option<Document>> {
        let db = self.conn()?;
        queries::get_document(&db, collection_id, document_id)
    }

    async fn list_documents(
        &self,
        collection_id: &str,
        queries: &[Query],
    ) -> anyhow::Result<DocumentList> {
        let db = self.conn()?;
        queries::list_documents(&db, collection_id, queries)
    }

    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        patch: Map<String, Value>,
    ) -> anyhow::Result<Option<Document>> {
        let db = self.conn()?;
        queries::update_document(&db, collection_id, document_id, patch)
    }
}

#[async_trait]
impl FileStorage for SqliteStore {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        upload: UploadPayload,
    ) -> anyhow::Result<StoredFile> {
        let db = self.conn()?;
        queries::insert_file(&db, file_id, bucket_id, &upload.file_name, &upload.blob_file)?;

        Ok(StoredFile {
            id: file_id.to_string(),
            bucket_id: bucket_id.to_string(),
            name: upload.file_name,
            size: upload.blob_file.len() as u64,
            url: Self::file_url(file_id),
        })
    }

    async fn get_file(
        &self,
        bucket_id: &str,
        file_id: &str,
    ) -> anyhow::Result<Option<(StoredFile, Vec<u8>)>> {
        let db = self.conn()?;
        let file = queries::get_file(&db, bucket_id, file_id)?.map(|row| {
            let meta = StoredFile {
                url: Self::file_url(&row.id),
                id: row.id,
                bucket_id: row.bucket_id,
                name: row.name,
                size: row.size,
            };
            (meta, row.data)
        });
        Ok(file)
    }
}
