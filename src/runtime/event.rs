//! Known events: named, typed views over host events
//!
//! A [`KnownEvent`] exposes a fixed set of fields of one host event type to
//! scripts. Every field has a getter; writable fields also carry a setter
//! that coerces the script value into the host representation.

use serde_json::Value;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use super::error::{RegistryError, RegistryResult};
use super::host::{
    ActorDamageEvent, ActorInteractEvent, HostEvent, PlayerChatEvent, PlayerCommandEvent,
    PlayerJoinEvent, PlayerQuitEvent,
};
use super::registry::Registry;

type Getter = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Any, &Value) -> bool + Send + Sync>;

#[derive(Clone)]
struct EventField {
    name: String,
    get: Getter,
    set: Option<Setter>,
}

/// Descriptor of one host event type and its script-visible fields
#[derive(Clone)]
pub struct KnownEvent {
    event_type: &'static str,
    fields: Vec<EventField>,
}

impl KnownEvent {
    /// Start describing host event type `E`
    pub fn builder<E: HostEvent>() -> EventBuilder<E> {
        EventBuilder {
            fields: Vec::new(),
            _event: PhantomData,
        }
    }

    /// Short name of the host event type
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Whether `field` exists and has a setter
    pub fn is_writable(&self, field: &str) -> bool {
        self.field(field).is_some_and(|f| f.set.is_some())
    }

    /// Read `field` from `event`
    pub fn read(&self, event: &dyn HostEvent, field: &str) -> RegistryResult<Value> {
        let descriptor = self.field_or_err(field)?;
        (descriptor.get)(event.as_any()).ok_or_else(|| self.mismatch(event.type_name()))
    }

    /// Write `value` into `field` of `event`
    pub fn write(&self, event: &mut dyn HostEvent, field: &str, value: &Value) -> RegistryResult<()> {
        let descriptor = self.field_or_err(field)?;
        let setter = descriptor
            .set
            .as_ref()
            .ok_or_else(|| RegistryError::ReadOnlyField {
                event: self.event_type.to_string(),
                field: descriptor.name.clone(),
            })?;
        let found = event.type_name();
        if setter(event.as_any_mut(), value) {
            Ok(())
        } else {
            Err(self.mismatch(found))
        }
    }

    fn field(&self, name: &str) -> Option<&EventField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    fn field_or_err(&self, name: &str) -> RegistryResult<&EventField> {
        self.field(name).ok_or_else(|| RegistryError::UnknownField {
            event: self.event_type.to_string(),
            field: name.to_string(),
        })
    }

    fn mismatch(&self, found: &'static str) -> RegistryError {
        RegistryError::EventTypeMismatch {
            expected: self.event_type,
            found,
        }
    }
}

/// Typed builder for [`KnownEvent`]
pub struct EventBuilder<E> {
    fields: Vec<EventField>,
    _event: PhantomData<fn(E)>,
}

impl<E: HostEvent> EventBuilder<E> {
    /// Add a read-only field
    pub fn field<G>(mut self, name: &str, get: G) -> Self
    where
        G: Fn(&E) -> Value + Send + Sync + 'static,
    {
        self.fields.push(EventField {
            name: name.to_string(),
            get: erase_getter(get),
            set: None,
        });
        self
    }

    /// Add a read-write field
    pub fn field_mut<G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        G: Fn(&E) -> Value + Send + Sync + 'static,
        S: Fn(&mut E, &Value) + Send + Sync + 'static,
    {
        let set: Setter = Arc::new(move |event: &mut dyn Any, value: &Value| {
            match event.downcast_mut::<E>() {
                Some(event) => {
                    set(event, value);
                    true
                }
                None => false,
            }
        });
        self.fields.push(EventField {
            name: name.to_string(),
            get: erase_getter(get),
            set: Some(set),
        });
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> KnownEvent {
        KnownEvent {
            event_type: std::any::type_name::<E>()
                .rsplit("::")
                .next()
                .unwrap_or("event"),
            fields: self.fields,
        }
    }
}

fn erase_getter<E, G>(get: G) -> Getter
where
    E: HostEvent,
    G: Fn(&E) -> Value + Send + Sync + 'static,
{
    Arc::new(move |event: &dyn Any| event.downcast_ref::<E>().map(&get))
}

/// Lenient boolean coercion for script values
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "on" | "1"
        ),
        _ => false,
    }
}

/// Text form of a script value; strings are used verbatim
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Event name → descriptor
pub type EventRegistry = Registry<KnownEvent>;

impl Registry<KnownEvent> {
    /// Empty event table
    pub fn events() -> Self {
        Registry::new("event")
    }

    /// Resolve `name`, reporting a lookup miss as an error
    pub fn resolve_event(&self, name: &str) -> RegistryResult<Arc<KnownEvent>> {
        self.resolve(name)
            .ok_or_else(|| RegistryError::UnknownEvent(name.to_string()))
    }
}

/// Register the built-in known events
pub fn register_builtin_events(registry: &EventRegistry) {
    registry.register(
        "join",
        KnownEvent::builder::<PlayerJoinEvent>()
            .field("player", |e| Value::from(e.player.clone()))
            .field_mut(
                "message",
                |e| Value::from(e.join_message.clone()),
                |e, v| e.join_message = Some(coerce_text(v)),
            )
            .build(),
    );

    registry.register(
        "quit",
        KnownEvent::builder::<PlayerQuitEvent>()
            .field("player", |e| Value::from(e.player.clone()))
            .field_mut(
                "message",
                |e| Value::from(e.quit_message.clone()),
                |e, v| e.quit_message = Some(coerce_text(v)),
            )
            .build(),
    );

    registry.register(
        "chat",
        KnownEvent::builder::<PlayerChatEvent>()
            .field("player", |e| Value::from(e.player.clone()))
            .field_mut(
                "message",
                |e| Value::from(e.message.clone()),
                |e, v| e.message = coerce_text(v),
            )
            .field_mut(
                "cancelled",
                |e| Value::from(e.cancelled),
                |e, v| e.cancelled = coerce_bool(v),
            )
            .build(),
    );

    registry.register(
        "command",
        KnownEvent::builder::<PlayerCommandEvent>()
            .field("player", |e| Value::from(e.player.clone()))
            .field_mut(
                "command",
                |e| Value::from(e.message.clone()),
                |e, v| e.message = coerce_text(v),
            )
            .field_mut(
                "cancelled",
                |e| Value::from(e.cancelled),
                |e, v| e.cancelled = coerce_bool(v),
            )
            .build(),
    );

    registry.register(
        "npc_damage",
        KnownEvent::builder::<ActorDamageEvent>()
            .field("player", |e| Value::from(e.player.clone()))
            .field("id", |e| Value::from(e.actor_id.clone()))
            .field("uniqueId", |e| Value::from(e.actor_unique_id.clone()))
            .field_mut(
                "cancelled",
                |e| Value::from(e.cancelled),
                |e, v| e.cancelled = coerce_bool(v),
            )
            .build(),
    );

    registry.register(
        "npc_interact",
        KnownEvent::builder::<ActorInteractEvent>()
            .field("player", |e| Value::from(e.player.clone()))
            .field("id", |e| Value::from(e.actor_id.clone()))
            .field("uniqueId", |e| Value::from(e.actor_unique_id.clone()))
            .field("action", |e| {
                Value::from(if e.main_hand { "HAND" } else { "OFF_HAND" })
            })
            .field_mut(
                "cancelled",
                |e| Value::from(e.cancelled),
                |e, v| e.cancelled = coerce_bool(v),
            )
            .build(),
    );
}
