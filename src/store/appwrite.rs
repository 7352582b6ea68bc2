use anyhow::Context;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};

use super::{Document, DocumentList, DocumentStore, FileStorage, Query, StoredFile, UploadPayload};

/// Document store and file storage backed by the Appwrite REST API.
pub struct AppwriteStore {
    endpoint: String,
    project_id: String,
    api_key: String,
    database_id: String,
    client: reqwest::Client,
}

impl AppwriteStore {
    pub fn new(endpoint: String, project_id: String, api_key: String, database_id: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id,
            api_key,
            database_id,
            client: reqwest::Client::new(),
        }
    }

    fn documents_url(&self, collection_id: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint, self.database_id, collection_id
        )
    }

    fn file_view_url(&self, bucket_id: &str, file_id: &str) -> String {
        format!(
            "{}/storage/buckets/{}/files/{}/view?project={}",
            self.endpoint, bucket_id, file_id, self.project_id
        )
    }

    /// `StoredFile` from an Appwrite file object, falling back to what the caller knows.
    fn stored_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        meta: &Value,
        name: &str,
        size: u64,
    ) -> StoredFile {
        let id = meta["$id"].as_str().unwrap_or(file_id).to_string();
        StoredFile {
            url: self.file_view_url(bucket_id, &id),
            id,
            bucket_id: bucket_id.to_string(),
            name: meta["name"].as_str().unwrap_or(name).to_string(),
            size: meta["sizeOriginal"].as_u64().unwrap_or(size),
        }
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
    }

    /// Maps 404 to `None` and any other failure status to an error.
    async fn optional_json<T: serde::de::DeserializeOwned>(
        resp: Response,
        what: &str,
    ) -> anyhow::Result<Option<T>> {
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check(resp, what).await?;
        let body = resp
            .json()
            .await
            .with_context(|| format!("failed to parse Appwrite {what} response"))?;
        Ok(Some(body))
    }

    async fn check(resp: Response, what: &str) -> anyhow::Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Appwrite {what} failed ({status}): {body}")
    }
}

#[async_trait]
impl DocumentStore for AppwriteStore {
    async fn create_document(
        &self,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> anyhow::Result<Document> {
        let resp = self
            .authed(self.client.post(self.documents_url(collection_id)))
            .json(&json!({ "documentId": document_id, "data": data }))
            .send()
            .await
            .context("failed to call Appwrite createDocument")?;

        Self::check(resp, "createDocument")
            .await?
            .json()
            .await
            .context("failed to parse Appwrite createDocument response")
    }

    async fn get_document(
        &self,
        collection_id: &str,
        document_id: &str,
    ) -> anyhow::Result<Option<Document>> {
        let url = format!("{}/{}", self.documents_url(collection_id), document_id);
        let resp = self
            .authed(self.client.get(url))
            .send()
            .await
            .context("failed to call Appwrite getDocument")?;

        Self::optional_json(resp, "getDocument").await
    }

    async fn list_documents(
        &self,
        collection_id: &str,
        queries: &[Query],
    ) -> anyhow::Result<DocumentList> {
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|q| ("queries[]", q.to_appwrite_json()))
            .collect();

        let resp = self
            .authed(self.client.get(self.documents_url(collection_id)))
            .query(&params)
            .send()
            .await
            .context("failed to call Appwrite listDocuments")?;

        Self::check(resp, "listDocuments")
            .await?
            .json()
            .await
            .context("failed to parse Appwrite listDocuments response")
    }

    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        patch: Map<String, Value>,
    ) -> anyhow::Result<Option<Document>> {
        let url = format!("{}/{}", self.documents_url(collection_id), document_id);
        let resp = self
            .authed(self.client.patch(url))
            .json(&json!({ "data": patch }))
            .send()
            .await
            .context("failed to call Appwrite updateDocument")?;

        Self::optional_json(resp, "updateDocument").await
    }
}

#[async_trait]
impl FileStorage for AppwriteStore {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        upload: UploadPayload,
    ) -> anyhow::Result<StoredFile> {
        let size = upload.blob_file.len() as u64;
        let part = reqwest::multipart::Part::bytes(upload.blob_file).file_name(upload.file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("fileId", file_id.to_string())
            .part("file", part);

        let url = format!("{}/storage/buckets/{}/files", self.endpoint, bucket_id);
        let resp = self
            .authed(self.client.post(url))
            .multipart(form)
            .send()
            .await
            .context("failed to call Appwrite createFile")?;
        let body: Value = Self::check(resp, "createFile")
            .await?
            .json()
            .await
            .context("failed to parse Appwrite createFile response")?;

        Ok(self.stored_file(bucket_id, file_id, &body, &upload.file_name, size))
    }

    async fn get_file(
        &self,
        bucket_id: &str,
        file_id: &str,
    ) -> anyhow::Result<Option<(StoredFile, Vec<u8>)>> {
        let url = format!("{}/storage/buckets/{}/files/{}", self.endpoint, bucket_id, file_id);
        let resp = self
            .authed(self.client.get(url))
            .send()
            .await
            .context("failed to call Appwrite getFile")?;
        let Some(meta) = Self::optional_json::<Value>(resp, "getFile").await? else {
            return Ok(None);
        };

        let resp = self
            .authed(self.client.get(self.file_view_url(bucket_id, file_id)))
            .send()
            .await
            .context("failed to call Appwrite getFileView")?;
        let bytes = Self::check(resp, "getFileView")
            .await?
            .bytes()
            .await
            .context("failed to read Appwrite file contents")?
            .to_vec();

        let file = self.stored_file(bucket_id, file_id, &meta, file_id, bytes.len() as u64);
        Ok(Some((file, bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AppwriteStore {
        AppwriteStore::new("https://cloud.example/v1/".into(), "proj".into(), "key".into(), "db".into())
    }

    #[test]
    fn test_stored_file_from_file_object() {
        let meta = json!({ "$id": "f1", "name": "passport.png", "sizeOriginal": 2048 });
        let file = store().stored_file("ids", "f1", &meta, "upload.bin", 10);
        assert_eq!(file.name, "passport.png");
        assert_eq!(file.size, 2048);
        assert_eq!(file.url, "https://cloud.example/v1/storage/buckets/ids/files/f1/view?project=proj");
    }

    #[test]
    fn test_stored_file_falls_back_to_known_values() {
        let file = store().stored_file("ids", "f1", &Value::Null, "upload.bin", 10);
        assert_eq!(file.id, "f1");
        assert_eq!(file.name, "upload.bin");
        assert_eq!(file.size, 10);
    }
}
