//! In-memory gateway.
//!
//! Backs the engine in tests and in-process demos: collections are plain
//! vectors of documents, and every successful mutation synchronously fans the
//! new match set out to the watchers registered on that collection. A
//! write-failure switch lets tests exercise the optimistic-rollback paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

use super::{Document, Filter, Gateway, OrderBy, SnapshotHandler, Subscription};

struct Watcher {
    id: u64,
    collection: String,
    filters: Vec<Filter>,
    order: Option<OrderBy>,
    limit: Option<usize>,
    handler: SnapshotHandler,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    blobs: HashMap<String, Vec<u8>>,
    watchers: Vec<Watcher>,
    next_watcher_id: u64,
    fail_writes: bool,
}

impl Inner {
    fn snapshot(
        &self,
        collection: &str,
        filters: &[Filter],
        order: &Option<OrderBy>,
        limit: Option<usize>,
    ) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filters.iter().all(|f| f.matches(doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            docs.sort_by(|a, b| {
                let ord = match (a.field(&order.field), b.field(&order.field)) {
                    (Some(a), Some(b)) => {
                        super::compare_values(a, b).unwrap_or(std::cmp::Ordering::Equal)
                    }
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                match order.direction {
                    super::Direction::Asc => ord,
                    super::Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = limit {
            docs.truncate(limit);
        }
        docs
    }
}

#[derive(Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every write (insert/update/delete/upload) fails with an
    /// `Unavailable` error and no watcher fires. Reads keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }

    /// Number of documents currently stored in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.inner.lock().unwrap().fail_writes {
            return Err(AppError::unavailable("gateway unavailable"));
        }
        Ok(())
    }

    /// Fan the new state of `collection` out to its watchers. Snapshots are
    /// computed under the lock; handlers run after it is released so a
    /// handler may freely touch store state or drop subscriptions.
    fn notify(&self, collection: &str) {
        let pending: Vec<(SnapshotHandler, Vec<Document>)> = {
            let inner = self.inner.lock().unwrap();
            inner
                .watchers
                .iter()
                .filter(|w| w.collection == collection)
                .map(|w| {
                    (
                        w.handler.clone(),
                        inner.snapshot(&w.collection, &w.filters, &w.order, w.limit),
                    )
                })
                .collect()
        };
        for (handler, snapshot) in pending {
            handler(snapshot);
        }
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Document> {
        let inner = self.inner.lock().unwrap();
        inner
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("{collection}/{id} not found")))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<OrderBy>,
        limit: Option<usize>,
    ) -> AppResult<Vec<Document>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.snapshot(collection, filters, &order, limit))
    }

    fn subscribe(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<OrderBy>,
        limit: Option<usize>,
        on_change: SnapshotHandler,
    ) -> Subscription {
        let (watcher_id, initial) = {
            let mut inner = self.inner.lock().unwrap();
            let watcher_id = inner.next_watcher_id;
            inner.next_watcher_id += 1;
            inner.watchers.push(Watcher {
                id: watcher_id,
                collection: collection.to_string(),
                filters: filters.to_vec(),
                order: order.clone(),
                limit,
                handler: on_change.clone(),
            });
            let initial = inner.snapshot(collection, filters, &order, limit);
            (watcher_id, initial)
        };

        // Initial fire with the current match set, outside the lock.
        on_change(initial);

        let inner = self.inner.clone();
        Subscription::new(move || {
            inner.lock().unwrap().watchers.retain(|w| w.id != watcher_id);
        })
    }

    async fn insert(&self, collection: &str, fields: Map<String, Value>) -> AppResult<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(Document::new(id.clone(), fields));
        }
        self.notify(collection);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> AppResult<()> {
        self.check_writable()?;
        {
            let mut inner = self.inner.lock().unwrap();
            let doc = inner
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| AppError::not_found(format!("{collection}/{id} not found")))?;
            for (key, value) in fields {
                doc.fields.insert(key, value);
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        self.check_writable()?;
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .collections
                .get_mut(collection)
                .map(|docs| {
                    let before = docs.len();
                    docs.retain(|d| d.id != id);
                    docs.len() != before
                })
                .unwrap_or(false)
        };
        if removed {
            self.notify(collection);
        }
        Ok(())
    }

    async fn upload_blob(&self, path: &str, bytes: &[u8]) -> AppResult<String> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        inner.blobs.insert(path.to_string(), bytes.to_vec());
        Ok(format!("mem://{path}"))
    }
}
