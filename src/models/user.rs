use serde::{Deserialize, Serialize};

use crate::store::Document;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl TryFrom<Document> for User {
    type Error = anyhow::Error;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        doc.into_model()
    }
}
