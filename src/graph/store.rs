//! Versioned module store.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::graph::module::{MarkProps, ModuleRecord, Version};
use crate::observability::metrics;
use crate::specifier::is_remote;

/// In-memory record of every module compiled in this process.
#[derive(Debug)]
pub struct DependencyGraph {
    modules: DashMap<String, ModuleRecord>,
    /// Token for modules not yet marked in this process.
    initial_version: Version,
    /// Last version handed out; every mark takes a strictly larger one.
    clock: AtomicU64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl DependencyGraph {
    /// Create an empty graph. The baseline version is captured now.
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            modules: DashMap::new(),
            initial_version: Version::new(now),
            clock: AtomicU64::new(now),
        }
    }

    /// Rebuild a graph from a snapshot written by a previous build.
    pub fn from_modules(records: impl IntoIterator<Item = ModuleRecord>) -> Self {
        let graph = Self::new();
        let mut latest = graph.initial_version.as_u64();
        for record in records {
            latest = latest.max(record.version.as_u64());
            graph.modules.insert(record.specifier.clone(), record);
        }
        graph.clock.store(latest, Ordering::SeqCst);
        graph
    }

    pub fn initial_version(&self) -> Version {
        self.initial_version
    }

    fn next_version(&self) -> Version {
        let now = now_millis();
        let prev = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)))
            .unwrap_or_else(|prev| prev);
        Version::new(now.max(prev + 1))
    }

    pub fn get(&self, specifier: &str) -> Option<ModuleRecord> {
        self.modules.get(specifier).map(|r| r.value().clone())
    }

    /// Version used to cache-bust `specifier`: its own, or the baseline.
    pub fn version_of(&self, specifier: &str) -> Version {
        self.modules
            .get(specifier)
            .map(|r| r.version)
            .unwrap_or(self.initial_version)
    }

    /// Create or overwrite the record for `specifier` and advance its version.
    ///
    /// The version advances on every call, even if `props` match the
    /// current record.
    pub fn mark(&self, specifier: &str, props: MarkProps) -> ModuleRecord {
        // The entry guard holds the shard lock, so concurrent marks on the
        // same key take clock values in the order they are applied.
        let mut entry = self
            .modules
            .entry(specifier.to_string())
            .or_insert_with(|| ModuleRecord::new(specifier, Version::default()));
        entry.version = self.next_version();
        entry.deps = props.deps;
        entry.inline_css = props.inline_css;
        let record = entry.value().clone();
        drop(entry);

        metrics::record_graph_size(self.modules.len());
        tracing::trace!(specifier = %specifier, version = %record.version, "Module marked");
        record
    }

    /// Advance the version of an existing record, keeping its contents.
    pub fn update(&self, specifier: &str) -> Option<ModuleRecord> {
        let mut entry = self.modules.get_mut(specifier)?;
        entry.version = self.next_version();
        Some(entry.value().clone())
    }

    /// Specifiers whose dependency list references `specifier`.
    ///
    /// Scans every record; fine at dev-server scale.
    pub fn dependents(&self, specifier: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .modules
            .iter()
            .filter(|r| r.value().depends_on(specifier))
            .map(|r| r.key().clone())
            .collect();
        out.sort();
        out
    }

    /// Every module that transitively depends on `specifier`.
    pub fn affected(&self, specifier: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([specifier.to_string()]);
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(&current) {
                if dependent != specifier && seen.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        let mut out: Vec<String> = seen.into_iter().collect();
        out.sort();
        out
    }

    /// Versions of every other local module, as handed to the script transform.
    ///
    /// Remote modules never get local versions baked in, so the map is empty
    /// when `specifier` itself is remote.
    pub fn versions_except(&self, specifier: &str) -> BTreeMap<String, String> {
        if is_remote(specifier) {
            return BTreeMap::new();
        }
        self.modules
            .iter()
            .filter(|r| r.key() != specifier && !is_remote(r.key()))
            .map(|r| (r.key().clone(), r.value().version.token()))
            .collect()
    }

    /// All records, ordered by specifier.
    pub fn modules(&self) -> Vec<ModuleRecord> {
        let mut out: Vec<ModuleRecord> = self.modules.iter().map(|r| r.value().clone()).collect();
        out.sort_by(|a, b| a.specifier.cmp(&b.specifier));
        out
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_then_get() {
        let graph = DependencyGraph::new();
        assert!(graph.get("./a.ts").is_none());

        let first = graph.mark("./a.ts", MarkProps::deps(vec!["./b.ts".into()]));
        let got = graph.get("./a.ts").unwrap();
        assert_eq!(got.deps, vec!["./b.ts".to_string()]);
        assert_eq!(got.inline_css, None);
        assert!(first.version > graph.initial_version());

        let second = graph.mark(
            "./a.ts",
            MarkProps::deps(vec![]).with_inline_css(Some(".x{}".into())),
        );
        let got = graph.get("./a.ts").unwrap();
        assert!(got.deps.is_empty());
        assert_eq!(got.inline_css.as_deref(), Some(".x{}"));
        assert!(second.version > first.version);
    }

    #[test]
    fn test_identical_marks_still_advance() {
        let graph = DependencyGraph::new();
        let mut last = graph.mark("./a.ts", MarkProps::default()).version;
        for _ in 0..50 {
            let next = graph.mark("./a.ts", MarkProps::default()).version;
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_dependents_and_affected() {
        let graph = DependencyGraph::new();
        graph.mark("./a.ts", MarkProps::deps(vec!["./b.ts".into()]));
        graph.mark("./b.ts", MarkProps::deps(vec!["./c.ts".into()]));
        graph.mark("./c.ts", MarkProps::deps(vec!["./a.ts".into()]));
        graph.mark("./d.ts", MarkProps::deps(vec!["./c.ts".into()]));

        assert_eq!(graph.dependents("./c.ts"), vec!["./b.ts", "./d.ts"]);
        assert_eq!(graph.affected("./c.ts"), vec!["./a.ts", "./b.ts", "./d.ts"]);
    }

    #[test]
    fn test_versions_except() {
        let graph = DependencyGraph::new();
        graph.mark("./a.ts", MarkProps::default());
        graph.mark("./b.ts", MarkProps::default());
        graph.mark("https://esm.sh/react", MarkProps::default());

        let versions = graph.versions_except("./a.ts");
        assert_eq!(versions.keys().collect::<Vec<_>>(), vec!["./b.ts"]);
        assert!(graph.versions_except("https://esm.sh/react").is_empty());
    }

    #[test]
    fn test_update_and_from_modules() {
        let graph = DependencyGraph::new();
        assert!(graph.update("./missing.ts").is_none());
        let marked = graph.mark("./a.ts", MarkProps::deps(vec!["./b.ts".into()]));
        let updated = graph.update("./a.ts").unwrap();
        assert!(updated.version > marked.version);
        assert_eq!(updated.deps, marked.deps);

        let restored = DependencyGraph::from_modules(graph.modules());
        assert_eq!(restored.get("./a.ts"), Some(updated.clone()));
        let again = restored.mark("./a.ts", MarkProps::default());
        assert!(again.version > updated.version);
    }
}
