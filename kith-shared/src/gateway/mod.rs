//! Remote data gateway contract.
//!
//! The sync engine never talks to a concrete backend; every store is written
//! against this trait. A backend exposes point reads/writes on documents
//! addressed by collection + id, filtered/ordered queries, and a subscribe
//! primitive that pushes the complete current match set on every change until
//! the returned handle is cancelled.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::{AppError, AppResult};

pub mod memory;

pub use memory::MemoryGateway;

// --- Documents ---

/// A stored document: a string id plus a JSON field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Decode into a typed model. The document id is injected into the field
    /// map under `"id"` so models can carry it as a plain field.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::decode(format!("document {}: {}", self.id, e)))
    }
}

/// Decode a full snapshot, logging and skipping documents that fail to
/// decode rather than poisoning the whole result set.
pub fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(doc_id = %doc.id, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}

/// Convert a `json!` object literal into a document field map.
pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// --- Queries ---

/// A single query predicate on a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    ArrayContains(String, Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains(field.into(), value.into())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq(field, value) => doc.field(field) == Some(value),
            Self::Gte(field, value) => doc
                .field(field)
                .and_then(|v| compare_values(v, value))
                .map(|ord| ord != Ordering::Less)
                .unwrap_or(false),
            Self::Lte(field, value) => doc
                .field(field)
                .and_then(|v| compare_values(v, value))
                .map(|ord| ord != Ordering::Greater)
                .unwrap_or(false),
            Self::ArrayContains(field, value) => doc
                .field(field)
                .and_then(Value::as_array)
                .map(|arr| arr.contains(value))
                .unwrap_or(false),
        }
    }
}

/// Ordering comparison over the JSON scalar types the engine queries on.
/// Timestamps are RFC 3339 strings, so lexicographic string order is
/// chronological order.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

// --- Subscriptions ---

/// Callback invoked with the complete current match set on every change.
pub type SnapshotHandler = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// Handle to a live subscription. Cancelling (explicitly or by drop)
/// detaches the listener; every call site that replaces "what is currently
/// being watched" must cancel the prior handle before opening the next one.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// --- The gateway contract ---

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Point read. `NotFound` error when the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> AppResult<Document>;

    /// Filtered, optionally ordered and capped query.
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<OrderBy>,
        limit: Option<usize>,
    ) -> AppResult<Vec<Document>>;

    /// Live query. The handler fires with the current match set immediately
    /// and again on every change until the handle is cancelled.
    fn subscribe(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<OrderBy>,
        limit: Option<usize>,
        on_change: SnapshotHandler,
    ) -> Subscription;

    /// Insert a new document; the gateway assigns the id.
    async fn insert(&self, collection: &str, fields: Map<String, Value>) -> AppResult<String>;

    /// Merge partial fields into an existing document.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> AppResult<()>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> AppResult<()>;

    /// Store a blob and return a retrievable URL.
    async fn upload_blob(&self, path: &str, bytes: &[u8]) -> AppResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        match fields {
            Value::Object(map) => Document::new(id, map),
            _ => panic!("fields must be an object"),
        }
    }

    #[test]
    fn eq_filter_matches_exact_values() {
        let d = doc("1", json!({"user_id": "A", "friend_id": "B"}));
        assert!(Filter::eq("user_id", "A").matches(&d));
        assert!(!Filter::eq("user_id", "B").matches(&d));
        assert!(!Filter::eq("missing", "A").matches(&d));
    }

    #[test]
    fn eq_filter_matches_arrays() {
        // Conversation lookup relies on whole-array equality of the sorted
        // participant pair.
        let d = doc("c1", json!({"participants": ["A", "B"]}));
        assert!(Filter::eq("participants", json!(["A", "B"])).matches(&d));
        assert!(!Filter::eq("participants", json!(["B", "A"])).matches(&d));
    }

    #[test]
    fn range_filters_cover_prefix_search() {
        let d = doc("u1", json!({"username": "bob"}));
        assert!(Filter::gte("username", "bo").matches(&d));
        assert!(Filter::lte("username", format!("bo{}", '\u{f8ff}')).matches(&d));
        assert!(!Filter::gte("username", "bp").matches(&d));
    }

    #[test]
    fn array_contains_filter() {
        let d = doc("c1", json!({"participants": ["A", "B"]}));
        assert!(Filter::array_contains("participants", "A").matches(&d));
        assert!(!Filter::array_contains("participants", "C").matches(&d));
    }

    #[test]
    fn decode_injects_id() {
        #[derive(serde::Deserialize)]
        struct Edge {
            id: String,
            user_id: String,
        }
        let d = doc("e1", json!({"user_id": "A", "friend_id": "B"}));
        let edge: Edge = d.decode().unwrap();
        assert_eq!(edge.id, "e1");
        assert_eq!(edge.user_id, "A");
    }

    #[test]
    fn subscription_cancel_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = count.clone();
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
