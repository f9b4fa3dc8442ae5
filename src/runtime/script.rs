//! Script sources and the periodically reloaded script library
//!
//! The library keeps the last successfully loaded set of scripts. A reload
//! that fails (store unavailable, malformed file) is logged and leaves the
//! previous set in place until the next attempt.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::action::{ActionNode, ActionRegistry};
use super::error::StorageResult;
use super::storage::ScriptStore;

/// One stored script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptSource {
    /// Script name (file stem)
    pub name: String,
    /// Raw script text
    pub body: String,
    /// blake3 digest of `body`, hex encoded
    pub digest: String,
}

impl ScriptSource {
    /// Wrap script text, computing its digest
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let digest = blake3::hash(body.as_bytes()).to_hex().to_string();
        Self {
            name: name.into(),
            body,
            digest,
        }
    }

    /// Statements with the line they start on.
    ///
    /// A statement ends at a newline unless a `{ ... }` block is still open.
    /// Blank lines and `#` comments are skipped.
    pub fn statements(&self) -> Vec<(usize, String)> {
        let mut statements = Vec::new();
        let mut current = String::new();
        let mut start_line = 0;
        let mut depth = 0i32;

        for (index, line) in self.body.lines().enumerate() {
            let trimmed = line.trim();
            if current.is_empty() {
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                start_line = index + 1;
            } else {
                current.push('\n');
            }
            current.push_str(trimmed);
            depth += brace_delta(trimmed);
            if depth <= 0 {
                statements.push((start_line, std::mem::take(&mut current)));
                depth = 0;
            }
        }
        if !current.is_empty() {
            statements.push((start_line, current));
        }
        statements
    }

    /// Parse every statement, collecting a diagnostic per failing statement
    pub fn compile(&self, actions: &ActionRegistry) -> Result<Vec<ActionNode>, Vec<Diagnostic>> {
        let mut nodes = Vec::new();
        let mut diagnostics = Vec::new();
        for (line, statement) in self.statements() {
            match actions.parse(&statement) {
                Ok(node) => nodes.push(node),
                Err(err) => diagnostics.push(Diagnostic {
                    script: self.name.clone(),
                    line,
                    message: err.to_string(),
                }),
            }
        }
        if diagnostics.is_empty() {
            Ok(nodes)
        } else {
            Err(diagnostics)
        }
    }
}

fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in line.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => delta += 1,
            '}' if !in_string => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// A compile problem located in a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Script name
    pub script: String,
    /// 1-based line the statement starts on
    pub line: usize,
    /// What went wrong
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.script, self.line, self.message)
    }
}

/// Changes applied by a successful reload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Scripts now loaded
    pub loaded: usize,
    /// Scripts that were not loaded before
    pub added: Vec<String>,
    /// Scripts whose text changed
    pub changed: Vec<String>,
    /// Scripts that disappeared from the store
    pub removed: Vec<String>,
    /// Scripts dropped because a later one has the same name ignoring case
    pub shadowed: Vec<String>,
}

type ScriptMap = BTreeMap<String, ScriptSource>;

/// Last known good set of scripts
pub struct ScriptLibrary {
    store: Arc<dyn ScriptStore>,
    scripts: RwLock<Arc<ScriptMap>>,
    last_success: RwLock<Option<DateTime<Utc>>>,
}

impl ScriptLibrary {
    /// Empty library backed by `store`
    pub fn new(store: Arc<dyn ScriptStore>) -> Self {
        Self {
            store,
            scripts: RwLock::new(Arc::new(BTreeMap::new())),
            last_success: RwLock::new(None),
        }
    }

    /// Initialise the store and replace the library with its contents.
    ///
    /// On error nothing is replaced.
    pub fn reload(&self) -> StorageResult<ReloadSummary> {
        self.store.init()?;
        let loaded = self.store.load_all()?;

        let previous = self.snapshot();
        let mut next = ScriptMap::new();
        let mut summary = ReloadSummary::default();
        for script in loaded {
            let key = script.name.to_ascii_lowercase();
            if let Some(earlier) = next.get(&key).map(|s| s.name.clone()) {
                tracing::warn!(
                    "Script {} replaces {}: names only differ in case",
                    script.name,
                    earlier
                );
                summary.added.retain(|name| *name != earlier);
                summary.changed.retain(|name| *name != earlier);
                summary.shadowed.push(earlier);
            }
            match previous.get(&key) {
                None => summary.added.push(script.name.clone()),
                Some(old) if old.digest != script.digest => {
                    summary.changed.push(script.name.clone())
                }
                Some(_) => {}
            }
            next.insert(key, script);
        }
        summary.removed = previous
            .iter()
            .filter(|(key, _)| !next.contains_key(*key))
            .map(|(_, script)| script.name.clone())
            .collect();
        summary.loaded = next.len();

        *self.scripts.write() = Arc::new(next);
        *self.last_success.write() = Some(Utc::now());
        Ok(summary)
    }

    /// Reload, logging instead of propagating failures.
    ///
    /// Returns whether the reload succeeded.
    pub fn tick(&self) -> bool {
        match self.reload() {
            Ok(summary) => {
                if !(summary.added.is_empty()
                    && summary.changed.is_empty()
                    && summary.removed.is_empty())
                {
                    tracing::info!(
                        "Scripts reloaded: {} loaded, {} added, {} changed, {} removed",
                        summary.loaded,
                        summary.added.len(),
                        summary.changed.len(),
                        summary.removed.len()
                    );
                }
                true
            }
            Err(err) => {
                tracing::error!(
                    "Script reload failed, keeping {} previously loaded scripts: {}",
                    self.len(),
                    err
                );
                false
            }
        }
    }

    /// Reload every `interval` on the current tokio runtime
    pub fn spawn_reload_task(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let library = Arc::clone(&self);
                // Directory reads block; keep them off the async workers.
                if let Err(err) = tokio::task::spawn_blocking(move || library.tick()).await {
                    tracing::error!("Script reload task panicked: {}", err);
                }
            }
        })
    }

    /// Script by name, case-insensitively
    pub fn get(&self, name: &str) -> Option<ScriptSource> {
        self.snapshot().get(&name.to_ascii_lowercase()).cloned()
    }

    /// Loaded script names, sorted
    pub fn names(&self) -> Vec<String> {
        self.snapshot().values().map(|s| s.name.clone()).collect()
    }

    /// Number of loaded scripts
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether no script is loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time of the last successful reload
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read()
    }

    fn snapshot(&self) -> Arc<ScriptMap> {
        Arc::clone(&self.scripts.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::action::register_builtin_actions;

    #[test]
    fn statements_join_open_blocks() {
        let script = ScriptSource::new(
            "greeter",
            "# greet players\nselect guard\n\nlisten join {\n  log \"hi }\"\n}\nwait 20\n",
        );
        let statements = script.statements();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], (2, "select guard".to_string()));
        assert_eq!(statements[1].0, 4);
        assert!(statements[1].1.starts_with("listen join {"));
        assert_eq!(statements[2], (7, "wait 20".to_string()));
    }

    #[test]
    fn compile_reports_unknown_keywords_with_lines() {
        let actions = ActionRegistry::actions();
        register_builtin_actions(&actions);
        let script = ScriptSource::new("broken", "log ok\nfly away\nmove world,x\n");
        let diagnostics = script.compile(&actions).unwrap_err();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].line, 2);
        assert!(diagnostics[0].message.contains("fly"));
        assert_eq!(diagnostics[1].line, 3);
        assert_eq!(
            diagnostics[0].to_string(),
            "broken:2: unknown action 'fly'"
        );
    }

    struct Fixed(Vec<ScriptSource>);

    impl ScriptStore for Fixed {
        fn init(&self) -> StorageResult<()> {
            Ok(())
        }

        fn load_all(&self) -> StorageResult<Vec<ScriptSource>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn names_differing_in_case_shadow_each_other() {
        let library = ScriptLibrary::new(Arc::new(Fixed(vec![
            ScriptSource::new("Guard", "log upper"),
            ScriptSource::new("guard", "log lower"),
        ])));
        let summary = library.reload().unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.shadowed, vec!["Guard"]);
        assert_eq!(summary.added, vec!["guard"]);
        assert_eq!(library.get("GUARD").unwrap().body, "log lower");
    }

    #[test]
    fn digest_tracks_body() {
        let a = ScriptSource::new("a", "log 1");
        let b = ScriptSource::new("a", "log 2");
        assert_ne!(a.digest, b.digest);
        assert_eq!(a.digest, ScriptSource::new("other", "log 1").digest);
    }
}
