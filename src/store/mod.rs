pub mod appwrite;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Page size applied to `list` when no `Query::Limit` is given.
pub const DEFAULT_LIMIT: usize = 25;

/// A stored document: system attributes plus the caller's data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$collectionId", default)]
    pub collection_id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    /// Deserialize the document, system attributes included, into a model type.
    pub fn into_model<T: DeserializeOwned>(self) -> anyhow::Result<T> {
        let id = self.id.clone();
        let value = serde_json::to_value(self)?;
        serde_json::from_value(value)
            .map_err(|e| anyhow::anyhow!("document {id} does not match model: {e}"))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentList {
    pub total: usize,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal(String, Vec<Value>),
    OrderAsc(String),
    OrderDesc(String),
    Limit(usize),
    Offset(usize),
    /// Documents after this id in the current sort order.
    CursorAfter(String),
}

impl Query {
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Query::Equal(attribute.to_string(), vec![value.into()])
    }

    pub fn order_desc(attribute: &str) -> Self {
        Query::OrderDesc(attribute.to_string())
    }

    pub fn order_asc(attribute: &str) -> Self {
        Query::OrderAsc(attribute.to_string())
    }

    /// Wire form used by the Appwrite REST API (`queries[]` parameters).
    pub fn to_appwrite_json(&self) -> String {
        let value = match self {
            Query::Equal(attribute, values) => {
                json!({ "method": "equal", "attribute": attribute, "values": values })
            }
            Query::OrderAsc(attribute) => json!({ "method": "orderAsc", "attribute": attribute }),
            Query::OrderDesc(attribute) => {
                json!({ "method": "orderDesc", "attribute": attribute })
            }
            Query::Limit(n) => json!({ "method": "limit", "values": [n] }),
            Query::Offset(n) => json!({ "method": "offset", "values": [n] }),
            Query::CursorAfter(id) => json!({ "method": "cursorAfter", "values": [id] }),
        };
        value.to_string()
    }
}

/// Attribute names are interpolated into SQL and URLs, so only a safe alphabet is accepted.
pub fn is_valid_attribute(attribute: &str) -> bool {
    !attribute.is_empty()
        && attribute
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Unique id in the shape the document store accepts.
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(
        &self,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> anyhow::Result<Document>;

    async fn get_document(
        &self,
        collection_id: &str,
        document_id: &str,
    ) -> anyhow::Result<Option<Document>>;

    async fn list_documents(
        &self,
        collection_id: &str,
        queries: &[Query],
    ) -> anyhow::Result<DocumentList>;

    /// Returns `None` when the document does not exist.
    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        patch: Map<String, Value>,
    ) -> anyhow::Result<Option<Document>>;
}

/// An upload repackaged from a form's file field.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPayload {
    pub blob_file: Vec<u8>,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: String,
    pub bucket_id: String,
    pub name: String,
    pub size: u64,
    pub url: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        upload: UploadPayload,
    ) -> anyhow::Result<StoredFile>;

    /// Metadata and contents, or `None` when the bucket has no such file.
    async fn get_file(
        &self,
        bucket_id: &str,
        file_id: &str,
    ) -> anyhow::Result<Option<(StoredFile, Vec<u8>)>>;
}
