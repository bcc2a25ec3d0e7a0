//! Payload schema for Qdrant points

use super::{IndexRow, QueryHit, RowMetadata, StoredMetadata};
use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Point ids must be UUIDs or integers, so row ids are mapped through UUID v5
pub fn point_uuid(row_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, row_id.as_bytes())
}

/// Payload stored with each chunk in Qdrant
#[derive(Debug, Clone, PartialEq)]
pub struct RowPayload {
    /// The string row id (`doc_<run>_<file>_<chunk>`)
    pub row_id: String,

    /// Originating note path
    pub source: Option<String>,

    /// Note mtime when the chunk was written
    pub last_modified: Option<f64>,

    /// Chunk index within the note
    pub chunk_index: i64,

    /// Chunk text
    pub document: String,
}

impl RowPayload {
    pub fn from_row(row: &IndexRow) -> Self {
        Self {
            row_id: row.id.clone(),
            source: Some(row.metadata.source.clone()),
            last_modified: Some(row.metadata.last_modified),
            chunk_index: row.chunk_index as i64,
            document: row.document.clone(),
        }
    }

    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(&self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("row_id".to_string(), string_to_qdrant(&self.row_id));
        map.insert("chunk_index".to_string(), int_to_qdrant(self.chunk_index));
        map.insert("document".to_string(), string_to_qdrant(&self.document));

        if let Some(ref source) = self.source {
            map.insert("source".to_string(), string_to_qdrant(source));
        }
        if let Some(last_modified) = self.last_modified {
            map.insert("last_modified".to_string(), double_to_qdrant(last_modified));
        }

        map
    }

    /// Read a payload back, tolerating missing or mistyped fields
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            row_id: text("row_id").unwrap_or_default(),
            source: text("source"),
            last_modified: map.get("last_modified").and_then(Value::as_f64),
            chunk_index: map.get("chunk_index").and_then(Value::as_i64).unwrap_or(0),
            document: text("document").unwrap_or_default(),
        }
    }

    pub fn stored_metadata(&self) -> StoredMetadata {
        StoredMetadata {
            source: self.source.clone(),
            last_modified: self.last_modified,
        }
    }

    pub fn into_hit(self, score: f32) -> QueryHit {
        QueryHit {
            id: self.row_id,
            document: self.document,
            metadata: RowMetadata {
                source: self.source.unwrap_or_default(),
                last_modified: self.last_modified.unwrap_or(0.0),
            },
            score,
        }
    }
}

/// Build the Qdrant point for an index row
pub fn row_to_point(row: IndexRow) -> PointStruct {
    let payload = RowPayload::from_row(&row).to_qdrant_payload();
    PointStruct::new(point_uuid(&row.id).to_string(), row.embedding, payload)
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(s.to_string())),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)),
    }
}

fn double_to_qdrant(d: f64) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::DoubleValue(d)),
    }
}

/// Convert Qdrant value to serde_json Value
pub(crate) fn json_from_qdrant_value(v: QdrantValue) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}

/// Collect a Qdrant payload map into JSON
pub(crate) fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload
        .into_iter()
        .map(|(k, v)| (k, json_from_qdrant_value(v)))
        .collect()
}
