//! Island Quest Storage Traits
//!
//! Document-style persistence for the Island Quest backend: per-(collection,
//! key) get/set, an atomic read-modify-write transaction primitive, and an
//! ordered-query capability used by the leaderboard.
//!
//! The trait is object-safe so services can hold an `Arc<dyn DocumentStore>`;
//! typed accessors are layered on top via [`DocumentStoreExt`]. The only
//! implementation in-tree is [`MemoryStore`]; durable backends plug in behind
//! the same trait.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StorageError {
    /// A transactional read-modify-write lost a race and may be retried.
    #[error("transaction conflict on {collection}/{key}")]
    Conflict { collection: String, key: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Closure run inside [`DocumentStore::transact`]. Receives the current
/// document (if any) and returns the document to commit; returning `None`
/// deletes it.
pub type TransactFn<'a> = &'a mut dyn FnMut(Option<Value>) -> Result<Option<Value>, StorageError>;

/// Field comparison for [`Query`] filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
}

#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Filter + sort + limit, the query shape the leaderboard reads need.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<FieldFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn filtered(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Query {
            filter: Some(FieldFilter {
                field: field.into(),
                op,
                value,
            }),
            order_by: None,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A stored document together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub value: Value,
}

/// Core document persistence interface.
pub trait DocumentStore: Send + Sync {
    /// Get a document by key.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store a document, replacing any existing one.
    fn set(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete a document. Returns whether one existed.
    fn delete(&self, collection: &str, key: &str) -> Result<bool, StorageError>;

    /// Atomic read-modify-write on a single document. The closure observes
    /// the committed state and its result is committed as one unit; no other
    /// transaction interleaves. Returns the committed document.
    fn transact(
        &self,
        collection: &str,
        key: &str,
        op: TransactFn<'_>,
    ) -> Result<Option<Value>, StorageError>;

    /// Filtered, ordered, limited read over a collection.
    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError>;

    /// Check if a document exists.
    fn exists(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(collection, key)?.is_some())
    }
}

/// Typed convenience layer over [`DocumentStore`].
pub trait DocumentStoreExt: DocumentStore {
    fn get_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.get(collection, key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn set_as<T: Serialize>(
        &self,
        collection: &str,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        self.set(collection, key, serde_json::to_value(value)?)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// Total order over JSON scalars used for query filtering and sorting.
/// Numbers compare numerically, strings lexicographically; mixed or missing
/// fields sort as null, first.
pub fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
