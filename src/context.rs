// Deck Gate - Process Context
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// GatewayContext is built once at startup and owned by the Dispatcher:
// configuration, session store, staging manager and template search path.
// Never reset while the process lives.
//
// ToolContext is the borrowed slice of it a tool callable sees for one call.

use crate::config::GatewayConfig;
use crate::deck::Deck;
use crate::error::Result;
use crate::paths;
use crate::session::SessionStore;
use crate::staging::StagingManager;
use crate::storage::{self, StorageAdapter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct GatewayContext {
    pub config: GatewayConfig,
    pub sessions: SessionStore,
    pub staging: StagingManager,
    pub template_dirs: Vec<PathBuf>,
    pub cwd: PathBuf,
}

impl GatewayContext {
    /// Open the configured storage backend and build the context
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let storage = storage::open(&config)?;
        let cwd = std::env::current_dir()?;
        Self::with_storage(config, storage, &cwd)
    }

    pub fn with_storage(config: GatewayConfig, storage: Arc<dyn StorageAdapter>, cwd: &Path) -> Result<Self> {
        let staging = StagingManager::new(storage, &config.scratch_prefix)?;
        let template_dirs = paths::template_search_dirs(&config, cwd);
        log::debug!("Template search: {:?}", template_dirs);
        Ok(Self {
            sessions: SessionStore::new(config.sessions.max_sessions),
            staging,
            template_dirs,
            cwd: cwd.to_path_buf(),
            config,
        })
    }

    pub fn tool_context(&mut self, tool_count: usize) -> ToolContext<'_> {
        ToolContext {
            sessions: &mut self.sessions,
            config: &self.config,
            template_dirs: &self.template_dirs,
            tool_count,
        }
    }
}

pub struct ToolContext<'a> {
    pub sessions: &'a mut SessionStore,
    pub config: &'a GatewayConfig,
    pub template_dirs: &'a [PathBuf],
    /// Registered tools, for server info
    pub tool_count: usize,
}

impl ToolContext<'_> {
    /// Explicit presentation id if given, else the current one
    pub fn resolve(&self, id: Option<&str>) -> Option<String> {
        self.sessions.resolve(id)
    }

    pub fn deck(&self, id: &str) -> anyhow::Result<&Deck> {
        self.sessions
            .get(id)
            .map(|s| &s.deck)
            .ok_or_else(|| anyhow::anyhow!("presentation {} is not open", id))
    }

    pub fn deck_mut(&mut self, id: &str) -> anyhow::Result<&mut Deck> {
        self.sessions
            .get_mut(id)
            .map(|s| &mut s.deck)
            .ok_or_else(|| anyhow::anyhow!("presentation {} is not open", id))
    }

    /// A template path as given, else its file name in the search dirs
    pub fn find_template(&self, template_path: &str) -> Option<PathBuf> {
        let direct = Path::new(template_path);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }
        let name = paths::basename(template_path)?;
        paths::find_in_dirs(name, self.template_dirs)
    }
}
