// CLI command handlers
// Thin wrappers over the coordination core; printing only, no logic.

pub mod lock;
pub mod overlap;
pub mod plan;
pub mod queue;

use crate::config::CoordConfig;
use crate::error::CoordResult;
use crate::matcher::KeywordFileMatcher;
use crate::storage::Store;
use std::path::PathBuf;

/// Shared context every command handler works against
pub struct CommandContext {
    pub store: Store,
    pub config: CoordConfig,
    pub repo_root: PathBuf,
}

impl CommandContext {
    pub fn new(store_dir: PathBuf, repo_root: PathBuf) -> CoordResult<Self> {
        let store = Store::new(store_dir);
        let config = CoordConfig::load(&store)?;
        Ok(Self {
            store,
            config,
            repo_root,
        })
    }

    /// Keyword matcher rooted at the repository this store coordinates
    pub fn matcher(&self) -> KeywordFileMatcher {
        KeywordFileMatcher::new(&self.repo_root)
    }
}
