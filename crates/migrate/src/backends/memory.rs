//! In-memory backend for development and testing
//!
//! The tracking set and the log of executed scripts live in a shared
//! [`MemoryDatabase`], so the state outlives each driver session the way a
//! real database would. Failures can be injected per script or per name.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use url::Url;

use crate::driver::{or_default, ConnectionParams, Driver, DriverFactory, TrackingTable};
use crate::error::{MigrateError, MigrateResult, ScriptError};
use crate::registry::DriverRegistry;

/// Provider name the memory backend is usually registered under
pub const PROVIDER: &str = "memory";

#[derive(Debug, Default)]
struct MemoryState {
    applied: BTreeSet<String>,
    executed: Vec<String>,
    failing_scripts: Vec<String>,
    failing_marks: HashSet<String>,
    refuse_connections: bool,
    tracking: Option<TrackingTable>,
    last_url: Option<Url>,
    open_sessions: usize,
    total_sessions: usize,
}

/// Shared state behind every memory driver session
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database whose tracking table already holds `names`
    pub fn with_applied<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let database = Self::new();
        database
            .state
            .lock()
            .applied
            .extend(names.into_iter().map(Into::into));
        database
    }

    /// Fail every script containing `fragment`
    pub fn fail_scripts_containing(&self, fragment: impl Into<String>) {
        self.state.lock().failing_scripts.push(fragment.into());
    }

    /// Fail when `name` is marked as applied
    pub fn fail_marking(&self, name: impl Into<String>) {
        self.state.lock().failing_marks.insert(name.into());
    }

    /// Reject every new connection
    pub fn refuse_connections(&self) {
        self.state.lock().refuse_connections = true;
    }

    /// Recorded migration names, ascending
    pub fn applied(&self) -> Vec<String> {
        self.state.lock().applied.iter().cloned().collect()
    }

    /// Every script run so far, in execution order
    pub fn executed_scripts(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Sessions opened and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions
    }

    /// Sessions opened since creation
    pub fn total_sessions(&self) -> usize {
        self.state.lock().total_sessions
    }

    /// Tracking table requested by the last session
    pub fn tracking(&self) -> Option<TrackingTable> {
        self.state.lock().tracking.clone()
    }

    /// URL handed to the last session
    pub fn last_url(&self) -> Option<Url> {
        self.state.lock().last_url.clone()
    }
}

/// Factory opening sessions against one [`MemoryDatabase`]
#[derive(Debug, Clone)]
pub struct MemoryDriverFactory {
    database: MemoryDatabase,
}

impl MemoryDriverFactory {
    pub fn new(database: MemoryDatabase) -> Self {
        Self { database }
    }
}

/// Register a memory backend bound to `database` under [`PROVIDER`]
pub fn register(registry: &DriverRegistry, database: MemoryDatabase) {
    registry.register(PROVIDER, Arc::new(MemoryDriverFactory::new(database)));
}

#[async_trait]
impl DriverFactory for MemoryDriverFactory {
    fn build_url(&self, params: &ConnectionParams) -> MigrateResult<Url> {
        let name = or_default(&params.database, "default");
        let mut url = Url::parse(&format!("{}://{}", PROVIDER, name))
            .map_err(|e| MigrateError::Configuration(format!("invalid database name: {}", e)))?;
        params.append_tracking(&mut url)?;
        Ok(url)
    }

    async fn open(&self, url: &Url, tracking: &TrackingTable) -> MigrateResult<Box<dyn Driver>> {
        let mut state = self.database.state.lock();
        if state.refuse_connections {
            return Err(MigrateError::Connection {
                provider: PROVIDER.to_string(),
                message: "connection refused".to_string(),
            });
        }

        state.tracking = Some(tracking.clone());
        state.last_url = Some(url.clone());
        state.open_sessions += 1;
        state.total_sessions += 1;

        Ok(Box::new(MemoryDriver {
            database: self.database.clone(),
        }))
    }
}

/// One session against a [`MemoryDatabase`]
#[derive(Debug)]
pub struct MemoryDriver {
    database: MemoryDatabase,
}

#[async_trait]
impl Driver for MemoryDriver {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn run(&mut self, script: &str) -> MigrateResult<()> {
        let mut state = self.database.state.lock();
        if let Some(fragment) = state
            .failing_scripts
            .iter()
            .find(|fragment| script.contains(fragment.as_str()))
        {
            let line = script
                .lines()
                .position(|l| l.contains(fragment.as_str()))
                .map_or(1, |i| i as u32 + 1);
            return Err(ScriptError::new(script, "migration failed")
                .with_line(line)
                .with_detail(format!("injected failure on \"{}\"", fragment))
                .into());
        }

        state.executed.push(script.to_string());
        Ok(())
    }

    async fn applied_migrations(&mut self) -> MigrateResult<Vec<String>> {
        Ok(self.database.applied())
    }

    async fn mark_applied(&mut self, name: &str) -> MigrateResult<()> {
        let mut state = self.database.state.lock();
        if state.failing_marks.contains(name) {
            return Err(MigrateError::StateUpdate {
                name: name.to_string(),
                message: "connection lost".to_string(),
            });
        }
        if !state.applied.insert(name.to_string()) {
            return Err(MigrateError::StateUpdate {
                name: name.to_string(),
                message: "duplicate key violates unique constraint".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_applied(&mut self, name: &str) -> MigrateResult<()> {
        self.database.state.lock().applied.remove(name);
        Ok(())
    }

    async fn close(self: Box<Self>) -> MigrateResult<()> {
        let mut state = self.database.state.lock();
        state.open_sessions = state.open_sessions.saturating_sub(1);
        Ok(())
    }
}
