//! Host-side collaborators
//!
//! The runtime never talks to a game server directly. Everything it needs to
//! know about the world comes through [`Host`], and host-originated events
//! arrive as the plain structs below, which the event table exposes to
//! scripts field by field.

use std::any::Any;

use super::codec::{Location, Position};

/// World queries the runtime issues against the embedding server.
pub trait Host: Send + Sync {
    /// Observers currently able to perceive `location`
    fn observers(&self, location: &Location) -> Vec<String>;

    /// Current location of an online player
    fn player_location(&self, player: &str) -> Option<Location>;

    /// Whether an external plugin/system is installed (used by migrations)
    fn has_dependency(&self, _name: &str) -> bool {
        false
    }

    /// Whether the block at `position` in `world` can be stood on
    fn is_solid(&self, _world: &str, _position: Position) -> bool {
        false
    }
}

/// Host with no world attached: nobody observes anything and no player is
/// online. Used by the command-line tools and as a placeholder while
/// embedding.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedHost;

impl Host for DetachedHost {
    fn observers(&self, _location: &Location) -> Vec<String> {
        Vec::new()
    }

    fn player_location(&self, _player: &str) -> Option<Location> {
        None
    }
}

/// Marker for host event objects the event table can bind to.
pub trait HostEvent: Any + Send + Sync {
    /// Short type name used in diagnostics
    fn type_name(&self) -> &'static str;

    /// Upcast for downcasting to the concrete event type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for field setters
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

macro_rules! host_event {
    ($ty:ident) => {
        impl HostEvent for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

/// A player joined the server
#[derive(Debug, Clone, Default)]
pub struct PlayerJoinEvent {
    /// Player name
    pub player: String,
    /// Broadcast join message
    pub join_message: Option<String>,
}

/// A player left the server
#[derive(Debug, Clone, Default)]
pub struct PlayerQuitEvent {
    /// Player name
    pub player: String,
    /// Broadcast quit message
    pub quit_message: Option<String>,
}

/// A player sent a chat message
#[derive(Debug, Clone, Default)]
pub struct PlayerChatEvent {
    /// Player name
    pub player: String,
    /// Chat message
    pub message: String,
    /// Whether delivery is suppressed
    pub cancelled: bool,
}

/// A player issued a command, before the server handles it
#[derive(Debug, Clone, Default)]
pub struct PlayerCommandEvent {
    /// Player name
    pub player: String,
    /// Full command line including the leading slash
    pub message: String,
    /// Whether the command is suppressed
    pub cancelled: bool,
}

/// A player damaged a runtime actor
#[derive(Debug, Clone, Default)]
pub struct ActorDamageEvent {
    /// Attacking player
    pub player: String,
    /// Logical id of the actor
    pub actor_id: String,
    /// Unique id of the actor
    pub actor_unique_id: String,
    /// Whether the damage is suppressed
    pub cancelled: bool,
}

/// A player interacted with a runtime actor
#[derive(Debug, Clone, Default)]
pub struct ActorInteractEvent {
    /// Interacting player
    pub player: String,
    /// Logical id of the actor
    pub actor_id: String,
    /// Unique id of the actor
    pub actor_unique_id: String,
    /// Whether the main hand was used
    pub main_hand: bool,
    /// Whether the interaction is suppressed
    pub cancelled: bool,
}

host_event!(PlayerJoinEvent);
host_event!(PlayerQuitEvent);
host_event!(PlayerChatEvent);
host_event!(PlayerCommandEvent);
host_event!(ActorDamageEvent);
host_event!(ActorInteractEvent);
