//! In-memory document store.
//!
//! Collections are maps guarded by one mutex, so `transact` closures run
//! fully serialized: the read, the closure, and the write commit as a single
//! critical section. This is the semantics durable backends must preserve,
//! possibly with optimistic retries surfaced as `StorageError::Conflict`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::Value;

use crate::{compare_values, Document, DocumentStore, FilterOp, Query, StorageError};

type Collections = HashMap<String, BTreeMap<String, Value>>;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Collections>, StorageError> {
        self.collections
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    fn set(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let mut collections = self.lock()?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        let mut collections = self.lock()?;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(key).is_some())
            .unwrap_or(false))
    }

    fn transact(
        &self,
        collection: &str,
        key: &str,
        op: crate::TransactFn<'_>,
    ) -> Result<Option<Value>, StorageError> {
        let mut collections = self.lock()?;
        let docs = collections.entry(collection.to_string()).or_default();
        let current = docs.get(key).cloned();
        let next = op(current)?;
        match &next {
            Some(value) => {
                docs.insert(key.to_string(), value.clone());
            }
            None => {
                docs.remove(key);
            }
        }
        Ok(next)
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError> {
        let collections = self.lock()?;
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };

        let mut results: Vec<Document> = docs
            .iter()
            .filter(|(_, value)| match &query.filter {
                Some(filter) => {
                    let field = value.get(&filter.field).unwrap_or(&Value::Null);
                    let ord = compare_values(field, &filter.value);
                    match filter.op {
                        FilterOp::Eq => ord == std::cmp::Ordering::Equal,
                        FilterOp::Gt => ord == std::cmp::Ordering::Greater,
                        FilterOp::Gte => ord != std::cmp::Ordering::Less,
                    }
                }
                None => true,
            })
            .map(|(key, value)| Document {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        if let Some(order) = &query.order_by {
            // Stable sort keeps key order among ties.
            results.sort_by(|a, b| {
                let x = a.value.get(&order.field).unwrap_or(&Value::Null);
                let y = b.value.get(&order.field).unwrap_or(&Value::Null);
                let ord = compare_values(x, y);
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_get_delete_round_trip() {
        let store = MemoryStore::new();
        store.set("users", "u1", json!({"name": "ada"})).unwrap();
        assert_eq!(
            store.get("users", "u1").unwrap(),
            Some(json!({"name": "ada"}))
        );
        assert!(store.delete("users", "u1").unwrap());
        assert!(!store.delete("users", "u1").unwrap());
        assert_eq!(store.get("users", "u1").unwrap(), None);
    }

    #[test]
    fn transact_commits_closure_result() {
        let store = MemoryStore::new();
        let committed = store
            .transact("counters", "c", &mut |current| {
                let next = current
                    .and_then(|v| v.get("value").and_then(Value::as_u64))
                    .unwrap_or(0)
                    + 1;
                Ok(Some(json!({ "value": next })))
            })
            .unwrap();
        assert_eq!(committed, Some(json!({"value": 1})));

        store
            .transact("counters", "c", &mut |current| {
                assert_eq!(current, Some(json!({"value": 1})));
                Ok(None)
            })
            .unwrap();
        assert_eq!(store.get("counters", "c").unwrap(), None);
    }

    #[test]
    fn query_filters_sorts_and_limits() {
        let store = MemoryStore::new();
        for (key, period, points) in [
            ("a", "w1", 10),
            ("b", "w1", 30),
            ("c", "w2", 99),
            ("d", "w1", 20),
        ] {
            store
                .set(
                    "leaderboard",
                    key,
                    json!({"period": period, "points": points}),
                )
                .unwrap();
        }

        let query = Query::filtered("period", FilterOp::Eq, json!("w1"))
            .order_by("points", true)
            .limit(2);
        let results = store.query("leaderboard", &query).unwrap();
        let keys: Vec<&str> = results.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "d"]);
    }

    #[test]
    fn query_gt_filter() {
        let store = MemoryStore::new();
        for (key, points) in [("a", 5), ("b", 15), ("c", 25)] {
            store.set("scores", key, json!({ "points": points })).unwrap();
        }
        let over_ten = store
            .query("scores", &Query::filtered("points", FilterOp::Gt, json!(10)))
            .unwrap();
        assert_eq!(over_ten.len(), 2);
    }
}
