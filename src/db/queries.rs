use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::store::{is_valid_attribute, Document, DocumentList, Query, DEFAULT_LIMIT};

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_document_row(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let data_json: String = row.get(2)?;
    let data: Map<String, Value> = serde_json::from_str(&data_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;

    Ok(Document {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        data,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// SQL expression for a query attribute. System attributes map to columns,
/// everything else is read out of the JSON body.
fn attribute_expr(attribute: &str) -> anyhow::Result<String> {
    anyhow::ensure!(
        is_valid_attribute(attribute),
        "invalid query attribute: {attribute:?}"
    );
    Ok(match attribute {
        "$id" => "id".to_string(),
        "$createdAt" => "created_at".to_string(),
        "$updatedAt" => "updated_at".to_string(),
        other => format!("json_extract(data, '$.{other}')"),
    })
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

// ── Documents ──

pub fn insert_document(
    conn: &Connection,
    collection_id: &str,
    document_id: &str,
    data: Map<String, Value>,
) -> anyhow::Result<Document> {
    let now = Utc::now();
    let data_json = serde_json::to_string(&data)?;

    conn.execute(
        "INSERT INTO documents (id, collection_id, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![document_id, collection_id, data_json, timestamp(&now)],
    )
    .with_context(|| format!("failed to insert document {collection_id}/{document_id}"))?;

    Ok(Document {
        id: document_id.to_string(),
        collection_id: collection_id.to_string(),
        created_at: now,
        updated_at: now,
        data,
    })
}

pub fn get_document(
    conn: &Connection,
    collection_id: &str,
    document_id: &str,
) -> anyhow::Result<Option<Document>> {
    let doc = conn
        .query_row(
            "SELECT id, collection_id, data, created_at, updated_at
             FROM documents WHERE collection_id = ?1 AND id = ?2",
            params![collection_id, document_id],
            parse_document_row,
        )
        .optional()?;
    Ok(doc)
}

pub fn list_documents(
    conn: &Connection,
    collection_id: &str,
    queries: &[Query],
) -> anyhow::Result<DocumentList> {
    let mut filters = vec!["collection_id = ?".to_string()];
    let mut binds = vec![SqlValue::Text(collection_id.to_string())];
    let mut order: Vec<(String, bool)> = Vec::new();
    let mut limit = DEFAULT_LIMIT;
    let mut offset = 0;
    let mut cursor = None;

    for query in queries {
        match query {
            Query::Equal(attribute, values) => {
                let expr = attribute_expr(attribute)?;
                if values.is_empty() {
                    filters.push("0".to_string());
                    continue;
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                filters.push(format!("{expr} IN ({placeholders})"));
                binds.extend(values.iter().map(to_sql_value));
            }
            Query::OrderAsc(attribute) => order.push((attribute_expr(attribute)?, false)),
            Query::OrderDesc(attribute) => order.push((attribute_expr(attribute)?, true)),
            Query::Limit(n) => limit = *n,
            Query::Offset(n) => offset = *n,
            Query::CursorAfter(id) => cursor = Some(id.as_str()),
        }
    }

    // The total ignores the cursor, like limit and offset.
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM documents WHERE {}", filters.join(" AND ")),
        params_from_iter(binds.iter()),
        |row| row.get(0),
    )?;

    // rowid breaks ties between documents created within the same millisecond
    let descending = order.last().map(|(_, desc)| *desc).unwrap_or(false);
    order.push(("rowid".to_string(), descending));

    if let Some(cursor_id) = cursor {
        anyhow::ensure!(
            order.iter().all(|(_, desc)| *desc == descending),
            "cursor paging needs a single sort direction"
        );
        anyhow::ensure!(
            get_document(conn, collection_id, cursor_id)?.is_some(),
            "cursor document not found: {cursor_id}"
        );
        // Keyset: rows strictly after the cursor row in the sort order.
        let keys = order
            .iter()
            .map(|(expr, _)| expr.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let op = if descending { "<" } else { ">" };
        filters.push(format!(
            "({keys}) {op} (SELECT {keys} FROM documents WHERE collection_id = ? AND id = ?)"
        ));
        binds.push(SqlValue::Text(collection_id.to_string()));
        binds.push(SqlValue::Text(cursor_id.to_string()));
    }

    let order_by = order
        .iter()
        .map(|(expr, desc)| format!("{expr} {}", if *desc { "DESC" } else { "ASC" }))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT id, collection_id, data, created_at, updated_at FROM documents
         WHERE {} ORDER BY {order_by} LIMIT {limit} OFFSET {offset}",
        filters.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(binds.iter()), parse_document_row)?;

    let mut documents = vec![];
    for row in rows {
        documents.push(row?);
    }

    Ok(DocumentList {
        total: total as usize,
        documents,
    })
}

pub fn update_document(
    conn: &Connection,
    collection_id: &str,
    document_id: &str,
    patch: Map<String, Value>,
) -> anyhow::Result<Option<Document>> {
    let Some(mut doc) = get_document(conn, collection_id, document_id)? else {
        return Ok(None);
    };

    for (key, value) in patch {
        doc.data.insert(key, value);
    }
    doc.updated_at = Utc::now();

    let data_json = serde_json::to_string(&doc.data)?;
    conn.execute(
        "UPDATE documents SET data = ?1, updated_at = ?2 WHERE collection_id = ?3 AND id = ?4",
        params![data_json, timestamp(&doc.updated_at), collection_id, document_id],
    )?;

    Ok(Some(doc))
}

// ── Files ──

pub struct FileRow {
    pub id: String,
    pub bucket_id: String,
    pub name: String,
    pub size: u64,
    pub data: Vec<u8>,
}

pub fn insert_file(
    conn: &Connection,
    file_id: &str,
    bucket_id: &str,
    name: &str,
    data: &[u8],
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO files (id, bucket_id, name, size, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            file_id,
            bucket_id,
            name,
            data.len() as i64,
            data,
            timestamp(&Utc::now())
        ],
    )
    .with_context(|| format!("failed to store file {name}"))?;
    Ok(())
}

pub fn get_file(
    conn: &Connection,
    bucket_id: &str,
    file_id: &str,
) -> anyhow::Result<Option<FileRow>> {
    let file = conn
        .query_row(
            "SELECT id, bucket_id, name, size, data FROM files WHERE id = ?1 AND bucket_id = ?2",
            params![file_id, bucket_id],
            |row| {
                Ok(FileRow {
                    id: row.get(0)?,
                    bucket_id: row.get(1)?,
                    name: row.get(2)?,
                    size: row.get::<_, i64>(3)? as u64,
                    data: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(file)
}
