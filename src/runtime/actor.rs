//! Actor instances and the factory seam that constructs them
//!
//! An [`ActorInstance`] is one live simulated actor. Its identity (`id`,
//! `unique_id`, kind, spawn location) is fixed once it is handed to the
//! manager; its behavioural state lives behind a lock so controllers and
//! script actions can mutate it from any thread.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::codec::Location;
use super::controller::Controller;
use super::error::{ActorError, ActorResult};
use super::host::Host;

/// Host entity type (e.g. `VILLAGER`, `ARMOR_STAND`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKind(String);

impl EntityKind {
    /// Create a kind, normalised to upper case
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_uppercase())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Teardown hook supplied by the actor factory.
pub trait ActorHandle: Send + Sync {
    /// Release host-side resources (despawn packets, tasks, ...)
    fn destroy(&self, unique_id: &str) -> ActorResult<()>;
}

/// Handle with nothing to release
#[derive(Debug, Default)]
pub struct NoopHandle;

impl ActorHandle for NoopHandle {
    fn destroy(&self, _unique_id: &str) -> ActorResult<()> {
        Ok(())
    }
}

/// Constructs actor instances for [`ActorManager`](super::manager::ActorManager).
pub trait ActorFactory: Send + Sync {
    /// Build a new, not yet registered, instance
    fn construct(
        &self,
        kind: &EntityKind,
        location: &Location,
        viewers: Vec<String>,
    ) -> ActorResult<ActorInstance>;
}

/// Factory producing instances with random unique ids and no host resources.
#[derive(Debug, Default)]
pub struct DefaultActorFactory;

impl ActorFactory for DefaultActorFactory {
    fn construct(
        &self,
        kind: &EntityKind,
        location: &Location,
        viewers: Vec<String>,
    ) -> ActorResult<ActorInstance> {
        Ok(ActorInstance::new(
            kind.clone(),
            location.clone(),
            viewers,
            Box::new(NoopHandle),
        ))
    }
}

/// Mutable behavioural state of an actor
#[derive(Default)]
pub struct ActorState {
    /// Current location, including head rotation
    pub location: Location,
    /// Destination of an in-progress move
    pub move_target: Option<Location>,
    /// Blocks per tick used when walking towards `move_target`
    pub move_speed: f64,
    /// Point the head is turning towards
    pub look_target: Option<Location>,
    /// Vertical velocity applied by gravity
    pub fall_velocity: f64,
    /// Persistent string tags
    pub tags: BTreeMap<String, String>,
    /// Free-form entity metadata
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Unique ids of riding actors, in mount order
    pub passengers: Vec<String>,
    /// Last played animations, oldest first
    pub animations: Vec<String>,
    /// Whether the sleeping pose is active
    pub sleeping: bool,
    /// Attached behaviour controllers
    pub controllers: Vec<Box<dyn Controller>>,
}

impl fmt::Debug for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorState")
            .field("location", &self.location)
            .field("move_target", &self.move_target)
            .field("look_target", &self.look_target)
            .field("tags", &self.tags)
            .field("passengers", &self.passengers)
            .field("sleeping", &self.sleeping)
            .field(
                "controllers",
                &self.controllers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// One live simulated actor
pub struct ActorInstance {
    id: String,
    unique_id: String,
    kind: EntityKind,
    spawn_location: Location,
    viewers: RwLock<Vec<String>>,
    state: RwLock<ActorState>,
    handle: Box<dyn ActorHandle>,
    destroyed: AtomicBool,
}

impl ActorInstance {
    /// Create an instance with a fresh random unique id
    pub fn new(
        kind: EntityKind,
        location: Location,
        viewers: Vec<String>,
        handle: Box<dyn ActorHandle>,
    ) -> Self {
        Self::with_unique_id(uuid::Uuid::new_v4().to_string(), kind, location, viewers, handle)
    }

    /// Create an instance with a caller-chosen unique id
    pub fn with_unique_id(
        unique_id: impl Into<String>,
        kind: EntityKind,
        location: Location,
        mut viewers: Vec<String>,
        handle: Box<dyn ActorHandle>,
    ) -> Self {
        dedup_in_order(&mut viewers);
        Self {
            id: kind.as_str().to_ascii_lowercase(),
            unique_id: unique_id.into(),
            kind,
            spawn_location: location.clone(),
            viewers: RwLock::new(viewers),
            state: RwLock::new(ActorState {
                location,
                move_speed: 0.2,
                ..ActorState::default()
            }),
            handle,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Logical name; shared by any number of instances
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rename the instance; only possible before it is shared
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Per-instance unique id
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Host entity type
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Location the instance was created at
    pub fn spawn_location(&self) -> &Location {
        &self.spawn_location
    }

    /// Current location
    pub fn location(&self) -> Location {
        self.state.read().location.clone()
    }

    /// Observers entitled to perceive this actor
    pub fn viewers(&self) -> Vec<String> {
        self.viewers.read().clone()
    }

    /// Add a viewer; returns `false` if already present
    pub fn add_viewer(&self, viewer: &str) -> bool {
        let mut viewers = self.viewers.write();
        if viewers.iter().any(|v| v == viewer) {
            return false;
        }
        viewers.push(viewer.to_string());
        true
    }

    /// Remove a viewer; returns `false` if absent
    pub fn remove_viewer(&self, viewer: &str) -> bool {
        let mut viewers = self.viewers.write();
        let before = viewers.len();
        viewers.retain(|v| v != viewer);
        viewers.len() != before
    }

    /// Read the behavioural state
    pub fn with_state<R>(&self, f: impl FnOnce(&ActorState) -> R) -> R {
        f(&self.state.read())
    }

    /// Mutate the behavioural state
    pub fn update<R>(&self, f: impl FnOnce(&mut ActorState) -> R) -> R {
        f(&mut self.state.write())
    }

    /// Attach a controller, replacing one with the same name
    pub fn attach_controller(&self, controller: Box<dyn Controller>) {
        self.update(|state| {
            state
                .controllers
                .retain(|existing| !existing.name().eq_ignore_ascii_case(controller.name()));
            state.controllers.push(controller);
        });
    }

    /// Detach a controller by name; returns `true` if one was removed
    pub fn detach_controller(&self, name: &str) -> bool {
        self.update(|state| {
            let before = state.controllers.len();
            state
                .controllers
                .retain(|existing| !existing.name().eq_ignore_ascii_case(name));
            state.controllers.len() != before
        })
    }

    /// Names of attached controllers
    pub fn controller_names(&self) -> Vec<String> {
        self.with_state(|state| {
            state
                .controllers
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        })
    }

    /// Run one tick of every attached controller.
    ///
    /// Controllers are taken out of the state while they run so that they can
    /// lock the state themselves.
    pub fn tick(&self, host: &dyn Host) {
        if self.is_destroyed() {
            return;
        }
        let mut controllers = self.update(|state| std::mem::take(&mut state.controllers));
        for controller in controllers.iter_mut() {
            if controller.should_execute(self, host) {
                controller.execute(self, host);
            }
        }
        self.update(|state| {
            // Controllers attached while we were running win over ours.
            controllers.retain(|ours| {
                !state
                    .controllers
                    .iter()
                    .any(|new| new.name().eq_ignore_ascii_case(ours.name()))
            });
            controllers.append(&mut state.controllers);
            state.controllers = controllers;
        });
    }

    /// Tear down host resources. Only the first call reaches the handle.
    pub fn destroy(&self) -> ActorResult<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.handle
            .destroy(&self.unique_id)
            .map_err(|err| match err {
                ActorError::Teardown { .. } => err,
                other => ActorError::Teardown {
                    unique_id: self.unique_id.clone(),
                    detail: other.to_string(),
                },
            })
    }

    /// Whether `destroy` has been called
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ActorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorInstance")
            .field("id", &self.id)
            .field("unique_id", &self.unique_id)
            .field("kind", &self.kind)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandle(Arc<AtomicUsize>);

    impl ActorHandle for CountingHandle {
        fn destroy(&self, _unique_id: &str) -> ActorResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn destroy_reaches_handle_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let actor = ActorInstance::new(
            EntityKind::new("villager"),
            Location::new("world", 0.0, 64.0, 0.0),
            Vec::new(),
            Box::new(CountingHandle(Arc::clone(&calls))),
        );
        actor.destroy().unwrap();
        actor.destroy().unwrap();
        assert!(actor.is_destroyed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn viewers_are_deduplicated() {
        let actor = ActorInstance::new(
            EntityKind::new("zombie"),
            Location::default(),
            vec!["alex".into(), "steve".into(), "alex".into()],
            Box::new(NoopHandle),
        );
        assert_eq!(actor.viewers(), vec!["alex", "steve"]);
        assert!(!actor.add_viewer("steve"));
        assert!(actor.remove_viewer("alex"));
        assert!(!actor.remove_viewer("alex"));
    }

    #[test]
    fn default_id_follows_kind() {
        let mut actor = DefaultActorFactory
            .construct(&EntityKind::new("Wolf"), &Location::default(), Vec::new())
            .unwrap();
        assert_eq!(actor.kind().as_str(), "WOLF");
        assert_eq!(actor.id(), "wolf");
        actor.set_id("guard");
        assert_eq!(actor.id(), "guard");
        assert_eq!(actor.unique_id().len(), 36);
    }
}
