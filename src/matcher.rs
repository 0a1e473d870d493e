//! File matching collaborator
//!
//! Maps a task to the set of repository files it is likely to touch.
//! This is a best-effort keyword classifier behind a narrow interface;
//! its accuracy is a separate concern from the coordination core, which
//! only consumes the resulting file sets.

use crate::models::Task;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Narrow interface the overlap analyzer depends on
pub trait FileMatcher {
    fn files_touched_by(&self, task: &Task) -> BTreeSet<String>;
}

/// Matcher that always returns the empty set. Used when no repository
/// root is available; tasks with explicit file sets are unaffected.
#[derive(Debug, Default)]
pub struct NoopFileMatcher;

impl FileMatcher for NoopFileMatcher {
    fn files_touched_by(&self, _task: &Task) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Words too generic to identify a file
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "that", "this", "all",
    "add", "fix", "new", "update", "implement", "support", "create",
    "remove", "refactor", "improve",
];

/// Keyword classifier: tokenizes the task title and tags, drops stop
/// words and short tokens, then matches the remaining keywords against
/// lowercased paths under the repository root.
pub struct KeywordFileMatcher {
    repo_root: PathBuf,
    word: Regex,
}

impl KeywordFileMatcher {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            word: Regex::new(r"[A-Za-z0-9_]+").expect("constant pattern"),
        }
    }

    /// Keywords extracted from a task's title and tags
    pub fn keywords(&self, task: &Task) -> BTreeSet<String> {
        let mut source = task.title.clone();
        for tag in &task.tags {
            source.push(' ');
            source.push_str(tag);
        }

        self.word
            .find_iter(&source)
            .map(|m| m.as_str().to_lowercase())
            .filter(|w| w.len() >= 3 && !STOP_WORDS.contains(&w.as_str()))
            .collect()
    }

    fn is_scannable(entry: &walkdir::DirEntry) -> bool {
        // Skip hidden directories (including the store itself) and
        // common dependency/build trees
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            return !name.starts_with('.') && name != "node_modules" && name != "target";
        }
        true
    }
}

impl FileMatcher for KeywordFileMatcher {
    fn files_touched_by(&self, task: &Task) -> BTreeSet<String> {
        let keywords = self.keywords(task);
        if keywords.is_empty() {
            return BTreeSet::new();
        }

        let mut matched = BTreeSet::new();
        for entry in WalkDir::new(&self.repo_root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || Self::is_scannable(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = entry
                .path()
                .strip_prefix(&self.repo_root)
                .unwrap_or_else(|_| entry.path());
            let haystack = relative.to_string_lossy().to_lowercase();
            if keywords.iter().any(|k| haystack.contains(k.as_str())) {
                matched.insert(relative.to_string_lossy().replace('\\', "/"));
            }
        }

        log::debug!(
            "[FileMatcher] Task {} matched {} file(s) from {} keyword(s)",
            task.id,
            matched.len(),
            keywords.len()
        );
        matched
    }
}

/// Resolve a task's file set: explicit files win, the matcher is the
/// fallback for tasks without one.
pub fn file_set(task: &Task, matcher: &dyn FileMatcher) -> BTreeSet<String> {
    if !task.files.is_empty() {
        return task.files.iter().cloned().collect();
    }
    matcher.files_touched_by(task)
}
