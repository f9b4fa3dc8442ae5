//! Live actor set tests
//!
//! Exercises the actor manager from several threads at once and verifies
//! that shutdown tears down every instance even when some teardowns fail.

use marionette::runtime::actor::{
    ActorFactory, ActorHandle, ActorInstance, DefaultActorFactory, EntityKind,
};
use marionette::runtime::codec::Location;
use marionette::runtime::error::{ActorError, ActorResult};
use marionette::runtime::host::DetachedHost;
use marionette::runtime::manager::ActorManager;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn spawn_point() -> Location {
    Location::new("world", 0.5, 64.0, 0.5)
}

fn manager_with(factory: Arc<dyn ActorFactory>) -> ActorManager {
    ActorManager::new(factory, Arc::new(DetachedHost))
}

#[test]
fn concurrent_create_and_remove_keep_exact_accounting() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let manager = Arc::new(manager_with(Arc::new(DefaultActorFactory)));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut kept = Vec::new();
                for n in 0..PER_THREAD {
                    let actor = manager
                        .create(&EntityKind::new("villager"), &spawn_point(), None, |a| {
                            a.set_id(format!("w{worker}"))
                        })
                        .unwrap();
                    // Readers racing the writers must always see a consistent list.
                    let snapshot = manager.list();
                    assert!(snapshot.iter().all(|a| !a.unique_id().is_empty()));
                    if n % 2 == 0 {
                        assert!(manager.remove(&actor));
                    } else {
                        kept.push(actor.unique_id().to_string());
                    }
                }
                kept
            })
        })
        .collect();

    let expected: HashSet<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    let live: HashSet<String> = manager
        .list()
        .iter()
        .map(|a| a.unique_id().to_string())
        .collect();
    assert_eq!(live, expected);
    assert_eq!(manager.len(), THREADS * PER_THREAD / 2);
    for worker in 0..THREADS {
        assert_eq!(manager.find_by_id(&format!("w{worker}")).len(), PER_THREAD / 2);
    }
}

#[test]
fn find_by_id_returns_instances_in_creation_order() {
    let manager = manager_with(Arc::new(DefaultActorFactory));
    let mut goblins = Vec::new();
    for _ in 0..3 {
        goblins.push(
            manager
                .create(&EntityKind::new("zombie"), &spawn_point(), None, |a| {
                    a.set_id("goblin")
                })
                .unwrap(),
        );
        manager
            .create(&EntityKind::new("zombie"), &spawn_point(), None, |a| {
                a.set_id("wolf")
            })
            .unwrap();
    }

    let found = manager.find_by_id("goblin");
    assert_eq!(found.len(), 3);
    for (found, created) in found.iter().zip(&goblins) {
        assert!(Arc::ptr_eq(found, created));
    }
    assert!(manager.find_by_id("GOBLIN").is_empty());
}

#[test]
fn snapshot_is_unaffected_by_later_writes() {
    let manager = manager_with(Arc::new(DefaultActorFactory));
    let first = manager
        .create(&EntityKind::new("cow"), &spawn_point(), None, |_| {})
        .unwrap();
    let before = manager.list();

    manager
        .create(&EntityKind::new("cow"), &spawn_point(), None, |_| {})
        .unwrap();
    manager.remove(&first);

    assert_eq!(before.len(), 1);
    assert!(Arc::ptr_eq(&before[0], &first));
    assert_eq!(manager.len(), 1);
}

/// Fails or panics on teardown depending on the actor's position
struct Flaky {
    index: usize,
    attempts: Arc<AtomicUsize>,
}

impl ActorHandle for Flaky {
    fn destroy(&self, unique_id: &str) -> ActorResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.index % 4 {
            1 => Err(ActorError::Teardown {
                unique_id: unique_id.to_string(),
                detail: "entity already gone".to_string(),
            }),
            3 => panic!("despawn packet rejected"),
            _ => Ok(()),
        }
    }
}

struct FlakyFactory {
    created: AtomicUsize,
    attempts: Arc<AtomicUsize>,
}

impl ActorFactory for FlakyFactory {
    fn construct(
        &self,
        kind: &EntityKind,
        location: &Location,
        viewers: Vec<String>,
    ) -> ActorResult<ActorInstance> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(ActorInstance::with_unique_id(
            format!("flaky-{index}"),
            kind.clone(),
            location.clone(),
            viewers,
            Box::new(Flaky {
                index,
                attempts: Arc::clone(&self.attempts),
            }),
        ))
    }
}

#[test]
fn shutdown_attempts_every_teardown_once() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let manager = manager_with(Arc::new(FlakyFactory {
        created: AtomicUsize::new(0),
        attempts: Arc::clone(&attempts),
    }));
    let actors: Vec<_> = (0..8)
        .map(|_| {
            manager
                .create(&EntityKind::new("pig"), &spawn_point(), None, |_| {})
                .unwrap()
        })
        .collect();

    let report = manager.shutdown();

    assert_eq!(report.attempted, 8);
    assert_eq!(attempts.load(Ordering::SeqCst), 8);
    assert_eq!(report.failures.len(), 4);
    assert!(!report.is_clean());
    assert!(manager.is_empty());
    assert!(actors.iter().all(|a| a.is_destroyed()));

    // A second shutdown has nothing left to do.
    let again = manager.shutdown();
    assert_eq!(again.attempted, 0);
    assert_eq!(attempts.load(Ordering::SeqCst), 8);
}

#[test]
fn create_after_shutdown_tears_the_newcomer_down() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let manager = manager_with(Arc::new(FlakyFactory {
        created: AtomicUsize::new(0),
        attempts: Arc::clone(&attempts),
    }));
    manager
        .create(&EntityKind::new("pig"), &spawn_point(), None, |_| {})
        .unwrap();
    assert!(manager.shutdown().is_clean());

    let late = manager.create(&EntityKind::new("pig"), &spawn_point(), None, |_| {});

    assert_eq!(late.unwrap_err(), ActorError::ShutDown);
    assert!(manager.is_empty());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

struct Rejecting;

impl ActorFactory for Rejecting {
    fn construct(
        &self,
        kind: &EntityKind,
        _location: &Location,
        _viewers: Vec<String>,
    ) -> ActorResult<ActorInstance> {
        Err(ActorError::Construction {
            kind: kind.to_string(),
            detail: "unsupported entity type".to_string(),
        })
    }
}

#[test]
fn failed_construction_leaves_set_unchanged() {
    let manager = manager_with(Arc::new(Rejecting));
    let result = manager.create(&EntityKind::new("ender_dragon"), &spawn_point(), None, |_| {
        panic!("initializer must not run")
    });
    assert!(matches!(result, Err(ActorError::Construction { .. })));
    assert!(manager.is_empty());
}
