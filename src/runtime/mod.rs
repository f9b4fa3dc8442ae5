//! Runtime orchestrator and public API
//!
//! This module provides the main `Runtime` struct that owns the keyword
//! tables, the live actor set, the script library and the migrations, and
//! exposes the public interface for embedding the runtime in a host server.
//!
//! The action and controller tables are populated once in [`Runtime::new`].
//! After that only the event table accepts registrations, so extensions can
//! bind their own host events late.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Submodules
pub mod action;
pub mod actor;
pub mod codec;
pub mod controller;
pub mod error;
pub mod event;
pub mod host;
pub mod manager;
pub mod migrate;
pub mod registry;
pub mod script;
pub mod storage;

/// Configuration for the Marionette runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root directory for runtime storage (default: .marionette/)
    pub root: PathBuf,

    /// Script directory, relative to `root`
    pub scripts_dir: PathBuf,

    /// Seconds between script reloads
    pub reload_interval_secs: u64,

    /// Refuse to register a second live actor with the same unique id
    pub enforce_unique_ids: bool,

    /// Enable debug tracing
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".marionette"),
            scripts_dir: PathBuf::from("scripts"),
            reload_interval_secs: 60,
            enforce_unique_ids: false,
            debug: false,
        }
    }
}

use action::{ActionRegistry, register_builtin_actions};
use actor::{ActorFactory, DefaultActorFactory};
use controller::{ControllerRegistry, register_builtin_controllers};
use event::{EventRegistry, KnownEvent, register_builtin_events};
use host::{DetachedHost, Host};
use manager::{ActorManager, TeardownReport};
use migrate::{MigrationContext, MigrationOutcome, MigrationRegistry};
use script::{Diagnostic, ScriptLibrary};
use storage::{DirectoryStore, Storage};

/// The main runtime orchestrator
///
/// Coordinates the keyword tables, the actor manager, the script library
/// and the migrations.
pub struct Runtime {
    config: RuntimeConfig,
    storage: Storage,
    actions: ActionRegistry,
    events: EventRegistry,
    controllers: ControllerRegistry,
    manager: ActorManager,
    migrations: Option<MigrationRegistry>,
    scripts: Arc<ScriptLibrary>,
}

impl Runtime {
    /// Create a new runtime with the given configuration
    ///
    /// Populates the built-in tables and performs an initial script load. A
    /// failed load is logged and leaves the library empty.
    pub fn new(
        config: RuntimeConfig,
        host: Arc<dyn Host>,
        factory: Arc<dyn ActorFactory>,
    ) -> anyhow::Result<Self> {
        if config.reload_interval_secs == 0 {
            return Err(error::RuntimeError::Config(
                "reload_interval_secs must be at least 1".to_string(),
            )
            .into());
        }

        let storage = Storage::new(config.root.clone());

        let actions = ActionRegistry::actions();
        register_builtin_actions(&actions);
        let events = EventRegistry::events();
        register_builtin_events(&events);
        let controllers = ControllerRegistry::controllers();
        register_builtin_controllers(&controllers);

        let manager =
            ActorManager::new(factory, host).with_unique_ids_enforced(config.enforce_unique_ids);

        let store = DirectoryStore::new(storage.scripts_dir(&config));
        let scripts = Arc::new(ScriptLibrary::new(Arc::new(store)));
        scripts.tick();

        if config.debug {
            tracing::debug!(
                "Runtime ready: {} actions, {} events, {} controllers, {} scripts",
                actions.len(),
                events.len(),
                controllers.len(),
                scripts.len()
            );
        }

        Ok(Self {
            config,
            storage,
            actions,
            events,
            controllers,
            manager,
            migrations: None,
            scripts,
        })
    }

    /// Runtime with no world attached and the default actor factory
    pub fn detached(config: RuntimeConfig) -> anyhow::Result<Self> {
        Self::new(config, Arc::new(DetachedHost), Arc::new(DefaultActorFactory))
    }

    /// Initialize runtime storage directories and metadata
    pub fn init(config: RuntimeConfig) -> anyhow::Result<()> {
        storage::init_storage(&config)?;
        storage::write_config(&config)?;
        Ok(())
    }

    /// Load an existing runtime from storage
    pub fn load(
        root: PathBuf,
        host: Arc<dyn Host>,
        factory: Arc<dyn ActorFactory>,
    ) -> anyhow::Result<Self> {
        let config = storage::load_config(&root)?;
        Self::new(config, host, factory)
    }

    /// Install the migration table run by [`Runtime::run_migrations`]
    pub fn with_migrations(mut self, migrations: MigrationRegistry) -> Self {
        self.migrations = Some(migrations);
        self
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the storage manager
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Action keyword table
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Event table
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    /// Controller table
    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Live actor set
    pub fn manager(&self) -> &ActorManager {
        &self.manager
    }

    /// Loaded scripts
    pub fn scripts(&self) -> &Arc<ScriptLibrary> {
        &self.scripts
    }

    /// Bind a host event under `name`, replacing any previous binding.
    ///
    /// Returns whether a binding was replaced.
    pub fn register_event(&self, name: &str, event: KnownEvent) -> bool {
        self.events.register(name, event)
    }

    /// Run every installed migration strategy whose source is present
    pub fn run_migrations(&self) -> Vec<MigrationOutcome> {
        let Some(migrations) = &self.migrations else {
            return Vec::new();
        };
        let host = Arc::clone(self.manager.host());
        migrations.migrate_all(&MigrationContext {
            manager: &self.manager,
            host: host.as_ref(),
        })
    }

    /// Compile every loaded script against the action table
    pub fn check_scripts(&self) -> Vec<Diagnostic> {
        self.scripts
            .names()
            .iter()
            .filter_map(|name| self.scripts.get(name))
            .filter_map(|script| script.compile(&self.actions).err())
            .flatten()
            .collect()
    }

    /// Reload scripts every `reload_interval_secs` on the current tokio runtime
    pub fn spawn_reload_task(&self) -> tokio::task::JoinHandle<()> {
        Arc::clone(&self.scripts)
            .spawn_reload_task(Duration::from_secs(self.config.reload_interval_secs))
    }

    /// Tear down every live actor
    pub fn shutdown(&self) -> TeardownReport {
        let report = self.manager.shutdown();
        tracing::info!(
            "Runtime shut down: {} actors torn down, {} failures",
            report.attempted,
            report.failures.len()
        );
        report
    }
}

// Re-export commonly used types
pub use action::ActionNode;
pub use actor::{ActorInstance, EntityKind};
pub use codec::{EulerAngle, Location, Position};
pub use error::RuntimeError;
