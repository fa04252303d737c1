// src/pool/mod.rs

//! Per-pass resource pool.
//!
//! The pool is the only channel through which nodes exchange data. Entries
//! are keyed by `(producer id, port)` and follow a single-assignment
//! discipline: each key is written at most once per pass and may be read
//! any number of times.
//!
//! The pool does not order writes against reads; the scheduler guarantees
//! that a consumer is only dispatched after all of its producers returned.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::trace;

use crate::errors::PoolError;
use crate::types::NodeId;
use crate::value::{Payload, Value, ValueType};

/// Thread-safe single-assignment store.
#[derive(Debug, Default)]
pub struct ResourcePool {
    entries: RwLock<HashMap<NodeId, HashMap<String, Value>>>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `(node, port)`.
    ///
    /// Fails with [`PoolError::AlreadyAssigned`] if the key was written
    /// before; the stored value is left untouched in that case.
    pub fn set(&self, node: NodeId, port: &str, value: impl Into<Value>) -> Result<(), PoolError> {
        let value = value.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let ports = entries.entry(node).or_default();

        if ports.contains_key(port) {
            return Err(PoolError::AlreadyAssigned {
                node,
                port: port.to_string(),
            });
        }

        trace!(node = %node, port, ty = %value.value_type(), "pool: value published");
        ports.insert(port.to_string(), value);
        Ok(())
    }

    /// Typed lookup that never fails loudly.
    ///
    /// Returns `None` both when the key is absent and when the stored value
    /// has a different type than `T`.
    pub fn try_get<T: Payload>(&self, node: NodeId, port: &str) -> Option<T> {
        self.with_entry(node, port, |v| v.and_then(T::from_value))
    }

    /// Typed lookup.
    pub fn get<T: Payload>(&self, node: NodeId, port: &str) -> Result<T, PoolError> {
        let value = self.get_as(node, port, T::TYPE)?;
        // `get_as` already checked the tag.
        T::from_value(&value).ok_or_else(|| PoolError::TypeMismatch {
            node,
            port: port.to_string(),
            expected: T::TYPE,
            actual: value.value_type(),
        })
    }

    /// Lookup checked against a tag only known at run time.
    pub fn get_as(&self, node: NodeId, port: &str, expected: ValueType) -> Result<Value, PoolError> {
        self.with_entry(node, port, |v| match v {
            None => Err(PoolError::NotFound {
                node,
                port: port.to_string(),
            }),
            Some(v) if v.value_type() != expected => Err(PoolError::TypeMismatch {
                node,
                port: port.to_string(),
                expected,
                actual: v.value_type(),
            }),
            Some(v) => Ok(v.clone()),
        })
    }

    /// Untyped inspection, for result consumers that branch on the tag.
    pub fn value(&self, node: NodeId, port: &str) -> Option<Value> {
        self.with_entry(node, port, |v| v.cloned())
    }

    pub fn contains(&self, node: NodeId, port: &str) -> bool {
        self.with_entry(node, port, |v| v.is_some())
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted by node id then port.
    pub fn keys(&self) -> Vec<(NodeId, String)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<(NodeId, String)> = entries
            .iter()
            .flat_map(|(node, ports)| ports.keys().map(move |p| (*node, p.clone())))
            .collect();
        keys.sort();
        keys
    }

    /// BLAKE3 digest of the whole pool in sorted key order.
    ///
    /// Two pools with bit-identical contents under the same keys have the
    /// same fingerprint, independent of the order entries were written in.
    pub fn fingerprint(&self) -> blake3::Hash {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let mut keys: Vec<(&NodeId, &String, &Value)> = entries
            .iter()
            .flat_map(|(node, ports)| ports.iter().map(move |(p, v)| (node, p, v)))
            .collect();
        keys.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut hasher = blake3::Hasher::new();
        for (node, port, value) in keys {
            hasher.update(&node.get().to_le_bytes());
            hasher.update(port.as_bytes());
            hasher.update(&[0]);
            value.digest_into(&mut hasher);
        }
        hasher.finalize()
    }

    fn with_entry<R>(&self, node: NodeId, port: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f(entries.get(&node).and_then(|ports| ports.get(port)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::types::OUTPUT_PORT;
    use crate::value::{Matrix, Point};

    #[test]
    fn get_returns_the_published_value_repeatedly() {
        let pool = ResourcePool::new();
        let id = NodeId::next();
        pool.set(id, OUTPUT_PORT, Point::new(1.0, 2.0)).unwrap();

        let first: Point = pool.get(id, OUTPUT_PORT).unwrap();
        let second: Point = pool.get(id, OUTPUT_PORT).unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn missing_key_is_not_found() {
        let pool = ResourcePool::new();
        let id = NodeId::next();
        assert_eq!(
            pool.get::<i64>(id, OUTPUT_PORT),
            Err(PoolError::NotFound {
                node: id,
                port: OUTPUT_PORT.into()
            })
        );
        assert_eq!(pool.try_get::<i64>(id, OUTPUT_PORT), None);
    }

    #[test]
    fn wrong_type_is_a_mismatch_not_a_coercion() {
        let pool = ResourcePool::new();
        let id = NodeId::next();
        pool.set(id, OUTPUT_PORT, 7_i64).unwrap();

        match pool.get::<f64>(id, OUTPUT_PORT) {
            Err(PoolError::TypeMismatch {
                node,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(node, id);
                assert_eq!(expected, ValueType::Float);
                assert_eq!(actual, ValueType::Int);
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
        assert_eq!(pool.try_get::<f64>(id, OUTPUT_PORT), None);
        assert_eq!(pool.try_get::<i64>(id, OUTPUT_PORT), Some(7));
    }

    #[test]
    fn second_write_is_rejected_and_keeps_first_value() {
        let pool = ResourcePool::new();
        let id = NodeId::next();
        pool.set(id, OUTPUT_PORT, 1_i64).unwrap();

        let err = pool.set(id, OUTPUT_PORT, 2_i64).unwrap_err();
        assert!(matches!(err, PoolError::AlreadyAssigned { .. }));
        assert_eq!(pool.get::<i64>(id, OUTPUT_PORT), Ok(1));
    }

    #[test]
    fn ports_scope_values_of_one_node() {
        let pool = ResourcePool::new();
        let id = NodeId::next();
        pool.set(id, "left", 1_i64).unwrap();
        pool.set(id, "right", true).unwrap();

        assert_eq!(pool.get::<i64>(id, "left"), Ok(1));
        assert_eq!(pool.get::<bool>(id, "right"), Ok(true));
        assert_eq!(pool.keys(), vec![(id, "left".to_string()), (id, "right".to_string())]);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let pool = Arc::new(ResourcePool::new());
        let ids: Vec<NodeId> = (0..16).map(|_| NodeId::next()).collect();

        let handles: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    pool.set(id, OUTPUT_PORT, Matrix::filled(8, 8, i as f32)).unwrap();
                    let back: Matrix = pool.get(id, OUTPUT_PORT).unwrap();
                    assert_eq!(back.at(0, 0), Some(i as f32));
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.len(), ids.len());
    }

    #[test]
    fn fingerprint_ignores_write_order() {
        let a = NodeId::next();
        let b = NodeId::next();

        let first = ResourcePool::new();
        first.set(a, OUTPUT_PORT, 1_i64).unwrap();
        first.set(b, OUTPUT_PORT, "x".to_string()).unwrap();

        let second = ResourcePool::new();
        second.set(b, OUTPUT_PORT, "x".to_string()).unwrap();
        second.set(a, OUTPUT_PORT, 1_i64).unwrap();

        assert_eq!(first.fingerprint(), second.fingerprint());

        let third = ResourcePool::new();
        third.set(a, OUTPUT_PORT, 2_i64).unwrap();
        third.set(b, OUTPUT_PORT, "x".to_string()).unwrap();
        assert_ne!(first.fingerprint(), third.fingerprint());
    }
}
