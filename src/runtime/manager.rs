//! Live actor set
//!
//! The manager owns every actor the runtime has spawned. The live set is an
//! insertion-ordered `Arc<Vec<_>>` that writers rebuild and swap; readers
//! clone the current `Arc` and iterate a point-in-time snapshot without
//! holding any lock.

use parking_lot::{Mutex, RwLock};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::actor::{ActorFactory, ActorInstance, EntityKind};
use super::codec::Location;
use super::error::{ActorError, ActorResult};
use super::host::Host;

/// Point-in-time view of the live set, in creation order
pub type ActorSnapshot = Arc<Vec<Arc<ActorInstance>>>;

/// Outcome of [`ActorManager::shutdown`]
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Instances whose teardown was attempted
    pub attempted: usize,
    /// Per-instance failures; the remaining instances were still torn down
    pub failures: Vec<ActorError>,
}

impl TeardownReport {
    /// Whether every teardown succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owner of all live actor instances
pub struct ActorManager {
    factory: Arc<dyn ActorFactory>,
    host: Arc<dyn Host>,
    enforce_unique_ids: bool,
    write_lock: Mutex<()>,
    closed: AtomicBool,
    live: RwLock<ActorSnapshot>,
}

impl ActorManager {
    /// Create an empty manager
    pub fn new(factory: Arc<dyn ActorFactory>, host: Arc<dyn Host>) -> Self {
        Self {
            factory,
            host,
            enforce_unique_ids: false,
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            live: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Reject instances whose unique id is already live
    pub fn with_unique_ids_enforced(mut self, enforce: bool) -> Self {
        self.enforce_unique_ids = enforce;
        self
    }

    /// Host used for observer enumeration and controller ticks
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Construct, initialise and register a new actor.
    ///
    /// `viewers` defaults to every observer the host reports for `location`.
    /// The instance only becomes visible to readers once `initializer` has
    /// returned. Once [`ActorManager::shutdown`] has run, the new instance is
    /// torn down again and [`ActorError::ShutDown`] is returned.
    pub fn create<F>(
        &self,
        kind: &EntityKind,
        location: &Location,
        viewers: Option<Vec<String>>,
        initializer: F,
    ) -> ActorResult<Arc<ActorInstance>>
    where
        F: FnOnce(&mut ActorInstance),
    {
        let viewers = viewers.unwrap_or_else(|| self.host.observers(location));
        let mut instance = self.factory.construct(kind, location, viewers)?;
        initializer(&mut instance);
        let instance = Arc::new(instance);

        {
            let writer = self.write_lock.lock();
            if self.closed.load(Ordering::Acquire) {
                drop(writer);
                discard(&instance);
                return Err(ActorError::ShutDown);
            }
            let current = self.list();
            if current
                .iter()
                .any(|live| live.unique_id() == instance.unique_id())
            {
                if self.enforce_unique_ids {
                    drop(writer);
                    discard(&instance);
                    return Err(ActorError::DuplicateUniqueId(
                        instance.unique_id().to_string(),
                    ));
                }
                tracing::warn!(
                    "Actor unique id {} is already live; keeping both instances",
                    instance.unique_id()
                );
            }
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&instance));
            *self.live.write() = Arc::new(next);
        }

        tracing::debug!(
            "Created actor {} ({}) at {}",
            instance.unique_id(),
            instance.id(),
            location
        );
        Ok(instance)
    }

    /// Drop an instance from the live set without tearing it down.
    ///
    /// Returns `false` if it was not live.
    pub fn remove(&self, instance: &ActorInstance) -> bool {
        let _writer = self.write_lock.lock();
        let current = self.list();
        let next: Vec<_> = current
            .iter()
            .filter(|live| !std::ptr::eq(Arc::as_ptr(live), instance))
            .cloned()
            .collect();
        if next.len() == current.len() {
            return false;
        }
        *self.live.write() = Arc::new(next);
        tracing::debug!("Removed actor {}", instance.unique_id());
        true
    }

    /// Destroy every live instance, empty the set and refuse further creates.
    ///
    /// A failing (or panicking) teardown is recorded and the loop moves on.
    pub fn shutdown(&self) -> TeardownReport {
        let drained = {
            let _writer = self.write_lock.lock();
            self.closed.store(true, Ordering::Release);
            std::mem::replace(&mut *self.live.write(), Arc::new(Vec::new()))
        };

        let mut report = TeardownReport::default();
        for instance in drained.iter() {
            report.attempted += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| instance.destroy()))
                .unwrap_or_else(|_| {
                    Err(ActorError::Teardown {
                        unique_id: instance.unique_id().to_string(),
                        detail: "teardown panicked".to_string(),
                    })
                });
            if let Err(err) = outcome {
                tracing::error!("Failed to destroy actor {}: {}", instance.unique_id(), err);
                report.failures.push(err);
            }
        }

        tracing::info!(
            "Actor manager shut down: {} destroyed, {} failed",
            report.attempted - report.failures.len(),
            report.failures.len()
        );
        report
    }

    /// Whether [`ActorManager::shutdown`] has run
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Snapshot of all live instances in creation order
    pub fn list(&self) -> ActorSnapshot {
        Arc::clone(&self.live.read())
    }

    /// All live instances whose logical id equals `id`
    pub fn find_by_id(&self, id: &str) -> Vec<Arc<ActorInstance>> {
        self.list()
            .iter()
            .filter(|instance| instance.id() == id)
            .cloned()
            .collect()
    }

    /// All live instances whose unique id equals `unique_id`
    pub fn find_by_unique_id(&self, unique_id: &str) -> Vec<Arc<ActorInstance>> {
        self.list()
            .iter()
            .filter(|instance| instance.unique_id() == unique_id)
            .cloned()
            .collect()
    }

    /// Run one controller tick on every live instance
    pub fn tick_all(&self) {
        let host = self.host.as_ref();
        for instance in self.list().iter() {
            instance.tick(host);
        }
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    /// Whether no instance is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tear down an instance that never made it into the live set
fn discard(instance: &ActorInstance) {
    let outcome = catch_unwind(AssertUnwindSafe(|| instance.destroy()));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!("Discarded actor failed to tear down: {}", err),
        Err(_) => tracing::warn!(
            "Discarded actor {} panicked during teardown",
            instance.unique_id()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actor::{ActorHandle, DefaultActorFactory};

    struct Nobody;

    impl Host for Nobody {
        fn observers(&self, _location: &Location) -> Vec<String> {
            vec!["watcher".to_string()]
        }

        fn player_location(&self, _player: &str) -> Option<Location> {
            None
        }
    }

    struct FixedIdFactory;

    struct Noop;

    impl ActorHandle for Noop {
        fn destroy(&self, _unique_id: &str) -> ActorResult<()> {
            Ok(())
        }
    }

    impl ActorFactory for FixedIdFactory {
        fn construct(
            &self,
            kind: &EntityKind,
            location: &Location,
            viewers: Vec<String>,
        ) -> ActorResult<ActorInstance> {
            Ok(ActorInstance::with_unique_id(
                "fixed",
                kind.clone(),
                location.clone(),
                viewers,
                Box::new(Noop),
            ))
        }
    }

    fn manager() -> ActorManager {
        ActorManager::new(Arc::new(DefaultActorFactory), Arc::new(Nobody))
    }

    #[test]
    fn viewers_default_to_host_observers() {
        let manager = manager();
        let kind = EntityKind::new("villager");
        let loc = Location::new("world", 0.0, 0.0, 0.0);
        let a = manager.create(&kind, &loc, None, |_| {}).unwrap();
        let b = manager
            .create(&kind, &loc, Some(vec!["alex".into()]), |_| {})
            .unwrap();
        assert_eq!(a.viewers(), vec!["watcher"]);
        assert_eq!(b.viewers(), vec!["alex"]);
    }

    #[test]
    fn snapshot_is_stable_across_writes() {
        let manager = manager();
        let kind = EntityKind::new("villager");
        let first = manager
            .create(&kind, &Location::default(), None, |_| {})
            .unwrap();
        let snapshot = manager.list();
        manager.remove(&first);
        manager
            .create(&kind, &Location::default(), None, |_| {})
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].unique_id(), first.unique_id());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn remove_is_noop_when_absent() {
        let manager = manager();
        let actor = manager
            .create(&EntityKind::new("cow"), &Location::default(), None, |_| {})
            .unwrap();
        assert!(manager.remove(&actor));
        assert!(!manager.remove(&actor));
        assert!(!actor.is_destroyed());
    }

    #[test]
    fn create_after_shutdown_is_refused() {
        let manager = manager();
        let kind = EntityKind::new("villager");
        let before = manager
            .create(&kind, &Location::default(), None, |_| {})
            .unwrap();
        assert_eq!(manager.shutdown().attempted, 1);
        assert!(before.is_destroyed());
        assert!(manager.is_shut_down());

        let mut late = None;
        let err = manager
            .create(&kind, &Location::default(), None, |a| {
                late = Some(a.unique_id().to_string())
            })
            .unwrap_err();
        assert_eq!(err, ActorError::ShutDown);
        assert!(manager.is_empty());
        assert!(late.is_some());
    }

    #[test]
    fn duplicate_unique_ids_are_permitted_by_default() {
        let manager = ActorManager::new(Arc::new(FixedIdFactory), Arc::new(Nobody));
        let kind = EntityKind::new("cow");
        manager.create(&kind, &Location::default(), None, |_| {}).unwrap();
        manager.create(&kind, &Location::default(), None, |_| {}).unwrap();
        assert_eq!(manager.find_by_unique_id("fixed").len(), 2);
    }

    #[test]
    fn duplicate_unique_ids_can_be_rejected() {
        let manager = ActorManager::new(Arc::new(FixedIdFactory), Arc::new(Nobody))
            .with_unique_ids_enforced(true);
        let kind = EntityKind::new("cow");
        manager.create(&kind, &Location::default(), None, |_| {}).unwrap();
        let err = manager
            .create(&kind, &Location::default(), None, |_| {})
            .unwrap_err();
        assert_eq!(err, ActorError::DuplicateUniqueId("fixed".into()));
        assert_eq!(manager.len(), 1);
    }
}
