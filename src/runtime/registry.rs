//! Case-insensitive keyword tables
//!
//! Actions, known events and controllers are all bound by short keyword.
//! `Registry` stores bindings as an immutable snapshot that is replaced
//! wholesale on `register`, so `resolve` only has to clone an `Arc` and
//! never waits on a writer for longer than a pointer swap.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Shared keyword → value table with snapshot-replace writes.
pub struct Registry<V> {
    /// Label used in log output ("action", "event", "controller")
    label: &'static str,
    /// Serialises writers so no concurrent registration is lost
    write_lock: Mutex<()>,
    entries: RwLock<Arc<Vec<(String, Arc<V>)>>>,
}

impl<V> Registry<V> {
    /// Create an empty registry
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            write_lock: Mutex::new(()),
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Bind `name` to `value`, replacing any binding that matches
    /// case-insensitively. Returns `true` when a binding was replaced.
    pub fn register(&self, name: impl Into<String>, value: V) -> bool {
        let name = name.into();
        let _writer = self.write_lock.lock();

        let current = self.snapshot();
        let mut next: Vec<(String, Arc<V>)> = Vec::with_capacity(current.len() + 1);
        let mut replaced = false;
        for (key, existing) in current.iter() {
            if key.eq_ignore_ascii_case(&name) {
                replaced = true;
            } else {
                next.push((key.clone(), Arc::clone(existing)));
            }
        }
        if replaced {
            tracing::debug!("{} '{}' re-registered, previous binding dropped", self.label, name);
        }
        next.push((name, Arc::new(value)));

        *self.entries.write() = Arc::new(next);
        replaced
    }

    /// Look up a binding case-insensitively
    pub fn resolve(&self, name: &str) -> Option<Arc<V>> {
        self.snapshot()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| Arc::clone(value))
    }

    /// Whether a binding exists for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label used in diagnostics
    pub fn label(&self) -> &'static str {
        self.label
    }

    fn snapshot(&self) -> Arc<Vec<(String, Arc<V>)>> {
        Arc::clone(&self.entries.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn resolve_ignores_case() {
        let registry = Registry::new("test");
        registry.register("Move", 1);
        assert_eq!(registry.resolve("move").as_deref(), Some(&1));
        assert_eq!(registry.resolve("MOVE").as_deref(), Some(&1));
        assert!(registry.resolve("gravity").is_none());
    }

    #[test]
    fn register_overwrites_case_insensitively() {
        let registry = Registry::new("test");
        assert!(!registry.register("chat", 1));
        assert!(registry.register("CHAT", 2));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("chat").as_deref(), Some(&2));
        assert_eq!(registry.names(), vec!["CHAT".to_string()]);
    }

    #[test]
    fn concurrent_registration_loses_nothing() {
        let registry = Arc::new(Registry::new("test"));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..50 {
                        registry.register(format!("k{t}-{i}"), i);
                        assert!(registry.resolve(&format!("K{t}-{i}")).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 400);
    }
}
