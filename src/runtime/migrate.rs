//! One-shot imports from other NPC systems
//!
//! Each strategy is keyed by the name of the system it imports from and
//! materialises actors through the [`ActorManager`]. The table is fixed at
//! construction; strategies run independently and one failing strategy never
//! stops another.

use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::actor::{ActorInstance, EntityKind};
use super::codec;
use super::error::{MigrationError, MigrationResult};
use super::host::Host;
use super::manager::ActorManager;

/// Tag recording which system an actor was imported from
pub const MIGRATED_FROM_TAG: &str = "migrated_from";
/// Tag recording the actor's key in the source system
pub const SOURCE_KEY_TAG: &str = "source_key";

/// An actor as described by the source system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalActorRecord {
    /// Key in the source system
    pub key: String,
    /// Display name, used as the logical id
    pub name: String,
    /// Entity type; strategies supply a default when absent
    #[serde(default)]
    pub kind: Option<String>,
    /// Location in `world,x,y,z[,yaw,pitch]` form
    pub location: String,
}

/// Reads actor records out of an external system
pub trait MigrationSource: Send + Sync {
    /// Every record the source currently holds
    fn records(&self) -> anyhow::Result<Vec<ExternalActorRecord>>;
}

/// What a strategy gets to work with
pub struct MigrationContext<'a> {
    /// Live actor set to import into
    pub manager: &'a ActorManager,
    /// Host the actors are created in
    pub host: &'a dyn Host,
}

/// Summary of one strategy run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Actors created by this run
    pub imported: usize,
    /// Records already present from an earlier run
    pub already_imported: usize,
    /// Records skipped as invalid, with the reason
    pub skipped: Vec<String>,
}

/// A named import procedure
pub trait MigrationStrategy: Send + Sync {
    /// External system this strategy imports from
    fn dependency_name(&self) -> &str;

    /// Import every record not imported yet
    fn migrate(&self, context: &MigrationContext<'_>) -> MigrationResult<MigrationReport>;
}

/// Result of running one strategy inside [`MigrationRegistry::migrate_all`]
#[derive(Debug)]
pub struct MigrationOutcome {
    /// Strategy's dependency name
    pub dependency: String,
    /// What happened
    pub result: MigrationResult<MigrationReport>,
}

/// Fixed dependency name → strategy table
pub struct MigrationRegistry {
    strategies: Vec<Box<dyn MigrationStrategy>>,
}

impl MigrationRegistry {
    /// The built-in strategies reading from the given sources
    pub fn builtin(citizens: Arc<dyn MigrationSource>, server_npc: Arc<dyn MigrationSource>) -> Self {
        Self::with_strategies(vec![
            Box::new(RecordMigration::citizens(citizens)),
            Box::new(RecordMigration::server_npc(server_npc)),
        ])
    }

    /// A table over arbitrary strategies
    pub fn with_strategies(strategies: Vec<Box<dyn MigrationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Dependency names in table order
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.dependency_name()).collect()
    }

    /// Strategy for `dependency`, matched case-insensitively
    pub fn get(&self, dependency: &str) -> Option<&dyn MigrationStrategy> {
        self.strategies
            .iter()
            .find(|s| s.dependency_name().eq_ignore_ascii_case(dependency))
            .map(|s| &**s)
    }

    /// Run every strategy whose dependency the host reports as installed.
    ///
    /// A strategy that fails or panics only affects its own outcome.
    pub fn migrate_all(&self, context: &MigrationContext<'_>) -> Vec<MigrationOutcome> {
        self.strategies
            .iter()
            .filter(|s| context.host.has_dependency(s.dependency_name()))
            .map(|strategy| {
                let dependency = strategy.dependency_name().to_string();
                let result = catch_unwind(AssertUnwindSafe(|| strategy.migrate(context)))
                    .unwrap_or_else(|_| {
                        Err(MigrationError::Panicked {
                            dependency: dependency.clone(),
                        })
                    });
                match &result {
                    Ok(report) => tracing::info!(
                        "Migrated {} actors from {} ({} already present, {} skipped)",
                        report.imported,
                        dependency,
                        report.already_imported,
                        report.skipped.len()
                    ),
                    Err(err) => tracing::error!("Migration from {} failed: {}", dependency, err),
                }
                MigrationOutcome { dependency, result }
            })
            .collect()
    }
}

/// Imports records from one external system, filling in `default_kind`
/// when a record names no entity type
pub struct RecordMigration {
    dependency: String,
    default_kind: EntityKind,
    source: Arc<dyn MigrationSource>,
}

impl RecordMigration {
    /// Strategy importing from `dependency` through `source`
    pub fn new(
        dependency: impl Into<String>,
        default_kind: EntityKind,
        source: Arc<dyn MigrationSource>,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            default_kind,
            source,
        }
    }

    /// Citizens NPCs; untyped records are player NPCs
    pub fn citizens(source: Arc<dyn MigrationSource>) -> Self {
        Self::new("Citizens", EntityKind::new("PLAYER"), source)
    }

    /// ServerNPC NPCs, which are always player NPCs
    pub fn server_npc(source: Arc<dyn MigrationSource>) -> Self {
        Self::new("ServerNPC", EntityKind::new("PLAYER"), source)
    }

    /// Kind used for records without one
    pub fn default_kind(&self) -> &EntityKind {
        &self.default_kind
    }
}

impl MigrationStrategy for RecordMigration {
    fn dependency_name(&self) -> &str {
        &self.dependency
    }

    fn migrate(&self, context: &MigrationContext<'_>) -> MigrationResult<MigrationReport> {
        import_records(&self.dependency, self.source.as_ref(), &self.default_kind, context)
    }
}

fn import_records(
    dependency: &str,
    source: &dyn MigrationSource,
    default_kind: &EntityKind,
    context: &MigrationContext<'_>,
) -> MigrationResult<MigrationReport> {
    let records = source
        .records()
        .map_err(|err| MigrationError::SourceUnavailable {
            dependency: dependency.to_string(),
            detail: format!("{err:#}"),
        })?;

    let mut report = MigrationReport::default();
    for record in records {
        if is_imported(context.manager, dependency, &record.key) {
            report.already_imported += 1;
            continue;
        }

        let location = match codec::to_location(&record.location) {
            Ok(location) => location,
            Err(err) => {
                let invalid = MigrationError::InvalidRecord {
                    dependency: dependency.to_string(),
                    record: record.key.clone(),
                    detail: err.to_string(),
                };
                tracing::warn!("{}", invalid);
                report.skipped.push(invalid.to_string());
                continue;
            }
        };
        let kind = record
            .kind
            .as_deref()
            .map(EntityKind::new)
            .unwrap_or_else(|| default_kind.clone());

        context
            .manager
            .create(&kind, &location, None, |instance: &mut ActorInstance| {
                instance.set_id(record.name.clone());
                instance.update(|state| {
                    state
                        .tags
                        .insert(MIGRATED_FROM_TAG.to_string(), dependency.to_string());
                    state
                        .tags
                        .insert(SOURCE_KEY_TAG.to_string(), record.key.clone());
                });
            })
            .map_err(|source| MigrationError::Actor {
                dependency: dependency.to_string(),
                source,
            })?;
        report.imported += 1;
    }

    Ok(report)
}

fn is_imported(manager: &ActorManager, dependency: &str, key: &str) -> bool {
    manager.list().iter().any(|actor| {
        actor.with_state(|state| {
            state.tags.get(MIGRATED_FROM_TAG).map(String::as_str) == Some(dependency)
                && state.tags.get(SOURCE_KEY_TAG).map(String::as_str) == Some(key)
        })
    })
}
