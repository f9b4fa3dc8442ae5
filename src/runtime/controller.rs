//! Behaviour controllers and the controller table
//!
//! A controller is a small per-actor strategy ticked by
//! [`ActorInstance::tick`]. Scripts attach them by name
//! (`controller add RandomStrollLand`), so every built-in controller is
//! reachable through a [`ControllerRegistry`] binding.

use rand::Rng;
use std::sync::Arc;

use super::actor::ActorInstance;
use super::codec::{Location, Position};
use super::error::{RegistryError, RegistryResult};
use super::host::Host;
use super::registry::Registry;

/// Per-actor behaviour strategy
pub trait Controller: Send + Sync {
    /// Name the controller is registered under
    fn name(&self) -> &str;

    /// Decide whether to run this tick
    fn should_execute(&mut self, actor: &ActorInstance, host: &dyn Host) -> bool;

    /// Run one step
    fn execute(&mut self, actor: &ActorInstance, host: &dyn Host);
}

/// Builds a controller bound to an actor
pub type ControllerFactory = Arc<dyn Fn(&ActorInstance) -> Box<dyn Controller> + Send + Sync>;

/// A registered controller type
#[derive(Clone)]
pub struct KnownController {
    factory: ControllerFactory,
}

impl KnownController {
    /// Wrap a factory function
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&ActorInstance) -> Box<dyn Controller> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Construct a controller for `actor`
    pub fn create(&self, actor: &ActorInstance) -> Box<dyn Controller> {
        (self.factory)(actor)
    }
}

/// Controller name → factory
pub type ControllerRegistry = Registry<KnownController>;

impl Registry<KnownController> {
    /// Empty controller table
    pub fn controllers() -> Self {
        Registry::new("controller")
    }

    /// Resolve `name`, reporting a lookup miss as an error
    pub fn resolve_controller(&self, name: &str) -> RegistryResult<Arc<KnownController>> {
        self.resolve(name)
            .ok_or_else(|| RegistryError::UnknownController(name.to_string()))
    }

    /// Construct the named controller and attach it to `actor`
    pub fn attach(&self, name: &str, actor: &ActorInstance) -> RegistryResult<()> {
        let known = self.resolve_controller(name)?;
        actor.attach_controller(known.create(actor));
        Ok(())
    }
}

/// Register the built-in controller vocabulary
pub fn register_builtin_controllers(registry: &ControllerRegistry) {
    registry.register("Move", KnownController::new(|_| Box::new(GeneralMove)));
    registry.register("Gravity", KnownController::new(|_| Box::new(GeneralGravity)));
    registry.register(
        "SmoothLook",
        KnownController::new(|_| Box::new(GeneralSmoothLook::default())),
    );
    registry.register(
        "LookAtPlayer",
        KnownController::new(|_| Box::new(LookAtPlayer::new(0.02))),
    );
    registry.register(
        "LookAtPlayerAlways",
        KnownController::new(|_| Box::new(LookAtPlayerAlways)),
    );
    registry.register(
        "RandomLookGround",
        KnownController::new(|_| Box::new(RandomLookGround::new(0.02))),
    );
    registry.register(
        "RandomStrollLand",
        KnownController::new(|_| Box::new(RandomStrollLand::new(1.0 / 120.0))),
    );
}

const LOOK_RANGE: f64 = 8.0;
const STROLL_RANGE: f64 = 10.0;
const GRAVITY: f64 = 0.08;
const TERMINAL_VELOCITY: f64 = 3.92;

/// Walks towards `move_target` at `move_speed` blocks per tick
#[derive(Debug, Default)]
pub struct GeneralMove;

impl Controller for GeneralMove {
    fn name(&self) -> &str {
        "Move"
    }

    fn should_execute(&mut self, actor: &ActorInstance, _host: &dyn Host) -> bool {
        actor.with_state(|state| state.move_target.is_some() && !state.sleeping)
    }

    fn execute(&mut self, actor: &ActorInstance, _host: &dyn Host) {
        actor.update(|state| {
            let Some(target) = state.move_target.clone() else {
                return;
            };
            let Some(distance) = state.location.distance(&target) else {
                // Cross-world moves are a teleport, not a walk.
                state.move_target = None;
                return;
            };
            if distance <= state.move_speed || distance == 0.0 {
                state.location.x = target.x;
                state.location.y = target.y;
                state.location.z = target.z;
                state.move_target = None;
                return;
            }
            let step = state.move_speed / distance;
            let (dx, dy, dz) = (
                target.x - state.location.x,
                target.y - state.location.y,
                target.z - state.location.z,
            );
            let (yaw, _) = direction_angles(dx, dy, dz);
            state.location.x += dx * step;
            state.location.y += dy * step;
            state.location.z += dz * step;
            state.location.yaw = yaw;
        });
    }
}

/// Pulls the actor down until it rests on a solid block
#[derive(Debug, Default)]
pub struct GeneralGravity;

impl Controller for GeneralGravity {
    fn name(&self) -> &str {
        "Gravity"
    }

    fn should_execute(&mut self, actor: &ActorInstance, _host: &dyn Host) -> bool {
        actor.with_state(|state| !state.sleeping)
    }

    fn execute(&mut self, actor: &ActorInstance, host: &dyn Host) {
        actor.update(|state| {
            let world = state.location.world.clone();
            let resting = state.location.y == state.location.y.floor()
                && host.is_solid(&world, below(&state.location));
            if resting {
                state.fall_velocity = 0.0;
                return;
            }

            state.fall_velocity = (state.fall_velocity + GRAVITY).min(TERMINAL_VELOCITY);
            let next_y = state.location.y - state.fall_velocity;
            let column = state.location.block();
            // Check every block passed through so fast falls cannot tunnel.
            let landing = (next_y.floor() as i32..column.y)
                .rev()
                .find(|&y| host.is_solid(&world, Position::new(column.x, y, column.z)));
            match landing {
                Some(y) => {
                    state.location.y = f64::from(y) + 1.0;
                    state.fall_velocity = 0.0;
                }
                None => state.location.y = next_y,
            }
        });
    }
}

/// Turns the head towards `look_target` a few degrees per tick
#[derive(Debug)]
pub struct GeneralSmoothLook {
    max_yaw_step: f32,
    max_pitch_step: f32,
}

impl Default for GeneralSmoothLook {
    fn default() -> Self {
        Self {
            max_yaw_step: 20.0,
            max_pitch_step: 10.0,
        }
    }
}

impl Controller for GeneralSmoothLook {
    fn name(&self) -> &str {
        "SmoothLook"
    }

    fn should_execute(&mut self, actor: &ActorInstance, _host: &dyn Host) -> bool {
        actor.with_state(|state| state.look_target.is_some())
    }

    fn execute(&mut self, actor: &ActorInstance, _host: &dyn Host) {
        let (max_yaw, max_pitch) = (self.max_yaw_step, self.max_pitch_step);
        actor.update(|state| {
            let Some(target) = state.look_target.clone() else {
                return;
            };
            let (yaw, pitch) = direction_angles(
                target.x - state.location.x,
                target.y - state.location.y,
                target.z - state.location.z,
            );
            state.location.yaw = approach_angle(state.location.yaw, yaw, max_yaw);
            state.location.pitch = approach_angle(state.location.pitch, pitch, max_pitch);
            if state.location.yaw == yaw && state.location.pitch == pitch {
                state.look_target = None;
            }
        });
    }
}

/// Occasionally glances at the nearest viewing player
#[derive(Debug)]
pub struct LookAtPlayer {
    chance: f64,
}

impl LookAtPlayer {
    /// Look with probability `chance` per tick
    pub fn new(chance: f64) -> Self {
        Self { chance }
    }
}

impl Controller for LookAtPlayer {
    fn name(&self) -> &str {
        "LookAtPlayer"
    }

    fn should_execute(&mut self, actor: &ActorInstance, _host: &dyn Host) -> bool {
        let idle = actor.with_state(|state| state.move_target.is_none());
        idle && rand::thread_rng().gen_bool(self.chance.clamp(0.0, 1.0))
    }

    fn execute(&mut self, actor: &ActorInstance, host: &dyn Host) {
        if let Some(target) = nearest_player(actor, host) {
            actor.update(|state| state.look_target = Some(target));
        }
    }
}

/// Tracks the nearest viewing player every tick
#[derive(Debug, Default)]
pub struct LookAtPlayerAlways;

impl Controller for LookAtPlayerAlways {
    fn name(&self) -> &str {
        "LookAtPlayerAlways"
    }

    fn should_execute(&mut self, actor: &ActorInstance, _host: &dyn Host) -> bool {
        actor.with_state(|state| state.move_target.is_none())
    }

    fn execute(&mut self, actor: &ActorInstance, host: &dyn Host) {
        if let Some(target) = nearest_player(actor, host) {
            actor.update(|state| state.look_target = Some(target));
        }
    }
}

/// Occasionally looks at a random point on the ground nearby
#[derive(Debug)]
pub struct RandomLookGround {
    chance: f64,
}

impl RandomLookGround {
    /// Look around with probability `chance` per tick
    pub fn new(chance: f64) -> Self {
        Self { chance }
    }
}

impl Controller for RandomLookGround {
    fn name(&self) -> &str {
        "RandomLookGround"
    }

    fn should_execute(&mut self, actor: &ActorInstance, _host: &dyn Host) -> bool {
        let idle = actor
            .with_state(|state| state.move_target.is_none() && state.look_target.is_none());
        idle && rand::thread_rng().gen_bool(self.chance.clamp(0.0, 1.0))
    }

    fn execute(&mut self, actor: &ActorInstance, _host: &dyn Host) {
        let mut rng = rand::thread_rng();
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let reach = rng.gen_range(2.0..LOOK_RANGE);
        actor.update(|state| {
            let mut target = state.location.clone();
            target.x += angle.cos() * reach;
            target.z += angle.sin() * reach;
            target.y = state.location.y.floor();
            state.look_target = Some(target);
        });
    }
}

/// Occasionally wanders to a random standable spot nearby
#[derive(Debug)]
pub struct RandomStrollLand {
    chance: f64,
}

impl RandomStrollLand {
    /// Start a stroll with probability `chance` per tick
    pub fn new(chance: f64) -> Self {
        Self { chance }
    }
}

impl Controller for RandomStrollLand {
    fn name(&self) -> &str {
        "RandomStrollLand"
    }

    fn should_execute(&mut self, actor: &ActorInstance, _host: &dyn Host) -> bool {
        let idle = actor.with_state(|state| state.move_target.is_none() && !state.sleeping);
        idle && rand::thread_rng().gen_bool(self.chance.clamp(0.0, 1.0))
    }

    fn execute(&mut self, actor: &ActorInstance, host: &dyn Host) {
        let origin = actor.location();
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let mut candidate = origin.clone();
            candidate.x = (origin.x + rng.gen_range(-STROLL_RANGE..=STROLL_RANGE)).floor() + 0.5;
            candidate.z = (origin.z + rng.gen_range(-STROLL_RANGE..=STROLL_RANGE)).floor() + 0.5;
            candidate.y = origin.y.floor();
            if host.is_solid(&candidate.world, below(&candidate))
                && !host.is_solid(&candidate.world, candidate.block())
            {
                actor.update(|state| state.move_target = Some(candidate));
                return;
            }
        }
    }
}

fn below(location: &Location) -> Position {
    let block = location.block();
    Position::new(block.x, block.y - 1, block.z)
}

/// Yaw/pitch in degrees facing along (dx, dy, dz)
fn direction_angles(dx: f64, dy: f64, dz: f64) -> (f32, f32) {
    let horizontal = (dx * dx + dz * dz).sqrt();
    let yaw = (-dx).atan2(dz).to_degrees();
    let pitch = -dy.atan2(horizontal).to_degrees();
    (yaw as f32, pitch as f32)
}

/// Move `current` towards `target` by at most `max_step` degrees
fn approach_angle(current: f32, target: f32, max_step: f32) -> f32 {
    let mut delta = (target - current) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}

fn nearest_player(actor: &ActorInstance, host: &dyn Host) -> Option<Location> {
    let here = actor.location();
    actor
        .viewers()
        .iter()
        .filter_map(|viewer| host.player_location(viewer))
        .filter_map(|loc| here.distance(&loc).map(|d| (d, loc)))
        .filter(|(d, _)| *d <= LOOK_RANGE)
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, mut loc)| {
            // Eye height
            loc.y += 1.62;
            loc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actor::{EntityKind, NoopHandle};

    struct FlatWorld {
        ground: i32,
        player: Option<Location>,
    }

    impl Host for FlatWorld {
        fn observers(&self, _location: &Location) -> Vec<String> {
            Vec::new()
        }

        fn player_location(&self, player: &str) -> Option<Location> {
            (player == "alex").then(|| self.player.clone()).flatten()
        }

        fn is_solid(&self, _world: &str, position: Position) -> bool {
            position.y <= self.ground
        }
    }

    fn actor_at(location: Location) -> ActorInstance {
        ActorInstance::new(
            EntityKind::new("villager"),
            location,
            vec!["alex".into()],
            Box::new(NoopHandle),
        )
    }

    fn registry() -> ControllerRegistry {
        let registry = ControllerRegistry::controllers();
        register_builtin_controllers(&registry);
        registry
    }

    #[test]
    fn builtin_names_resolve_case_insensitively() {
        let registry = registry();
        for name in [
            "Move",
            "Gravity",
            "SmoothLook",
            "LookAtPlayer",
            "LookAtPlayerAlways",
            "RandomLookGround",
            "RandomStrollLand",
        ] {
            assert!(registry.contains(&name.to_lowercase()), "{name} missing");
        }
        let upper = registry.resolve("Move").unwrap();
        let lower = registry.resolve("move").unwrap();
        assert!(Arc::ptr_eq(&upper, &lower));
        assert_eq!(
            registry.resolve_controller("fly").err(),
            Some(RegistryError::UnknownController("fly".into()))
        );
    }

    #[test]
    fn move_reaches_target() {
        let host = FlatWorld { ground: 63, player: None };
        let actor = actor_at(Location::new("world", 0.5, 64.0, 0.5));
        registry().attach("move", &actor).unwrap();
        actor.update(|state| {
            state.move_speed = 0.5;
            state.move_target = Some(Location::new("world", 0.5, 64.0, 2.5));
        });
        for _ in 0..5 {
            actor.tick(&host);
        }
        let loc = actor.location();
        assert_eq!((loc.x, loc.z), (0.5, 2.5));
        assert!(actor.with_state(|s| s.move_target.is_none()));
    }

    #[test]
    fn gravity_lands_on_ground() {
        let host = FlatWorld { ground: 63, player: None };
        let actor = actor_at(Location::new("world", 0.5, 70.0, 0.5));
        registry().attach("gravity", &actor).unwrap();
        for _ in 0..100 {
            actor.tick(&host);
        }
        assert_eq!(actor.location().y, 64.0);
        assert_eq!(actor.with_state(|s| s.fall_velocity), 0.0);
    }

    #[test]
    fn always_look_targets_nearest_viewer() {
        let host = FlatWorld {
            ground: 63,
            player: Some(Location::new("world", 3.0, 64.0, 0.0)),
        };
        let actor = actor_at(Location::new("world", 0.0, 64.0, 0.0));
        let registry = registry();
        registry.attach("LookAtPlayerAlways", &actor).unwrap();
        registry.attach("SmoothLook", &actor).unwrap();
        actor.tick(&host);
        let target = actor.with_state(|s| s.look_target.clone()).unwrap();
        assert_eq!(target.x, 3.0);
        assert_eq!(actor.controller_names().len(), 2);
    }

    #[test]
    fn stroll_picks_standable_target() {
        let host = FlatWorld { ground: 63, player: None };
        let actor = actor_at(Location::new("world", 0.5, 64.0, 0.5));
        let mut stroll = RandomStrollLand::new(1.0);
        assert!(stroll.should_execute(&actor, &host));
        stroll.execute(&actor, &host);
        let target = actor.with_state(|s| s.move_target.clone()).unwrap();
        assert_eq!(target.y, 64.0);
        assert!((target.x - 0.5).abs() <= STROLL_RANGE + 1.0);
    }

    #[test]
    fn approach_angle_wraps() {
        assert_eq!(approach_angle(170.0, -170.0, 30.0), -170.0);
        assert_eq!(approach_angle(0.0, 90.0, 20.0), 20.0);
        assert_eq!(approach_angle(0.0, -90.0, 20.0), -20.0);
    }

    #[test]
    fn detach_by_name() {
        let actor = actor_at(Location::default());
        registry().attach("gravity", &actor).unwrap();
        assert!(actor.detach_controller("GRAVITY"));
        assert!(actor.controller_names().is_empty());
    }
}
