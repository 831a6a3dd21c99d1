//! Config hot reload.
//!
//! Watches the rule path and swaps freshly loaded rule sets into the store.
//! Editor save bursts (write + rename + chmod in quick succession) are
//! absorbed by a 500 ms trailing debounce: the first event arms the timer,
//! every further event re-arms it, and the reload runs once when it
//! elapses. Events that arrive while a reload is running queue up and
//! trigger one follow-up cycle. Delete events are ignored so a
//! rename-over-write can never blank the active rules; a failed reload
//! keeps the previous rule set.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::loader::{has_yaml_extension, load_rules};
use crate::store::RuleStore;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the underlying filesystem watcher alive; dropping this stops
/// event delivery and ends the reload task.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Watch `path` (a rule file, or a directory watched recursively for
    /// `.yaml`/`.yml` mutations) and hot-swap the store on change.
    pub fn spawn(path: PathBuf, store: Arc<RuleStore>) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watching_dir = path.is_dir();

        let mut watcher =
            notify::recommended_watcher(move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if is_relevant(&event, watching_dir) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => warn!("config watch error: {}", e),
            })?;

        let mode = if watching_dir {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&path, mode)?;
        info!("watching {} for rule changes", path.display());

        tokio::spawn(debounce_loop(path, store, rx));

        Ok(ConfigWatcher { _watcher: watcher })
    }
}

/// Only create and modify events count; directory watches additionally
/// require a YAML path.
fn is_relevant(event: &Event, watching_dir: bool) -> bool {
    if !(event.kind.is_create() || event.kind.is_modify()) {
        return false;
    }
    if watching_dir {
        event.paths.iter().any(|p| has_yaml_extension(p))
    } else {
        true
    }
}

/// idle -> pending (timer armed) -> reloading -> idle.
async fn debounce_loop(
    path: PathBuf,
    store: Arc<RuleStore>,
    mut events: mpsc::UnboundedReceiver<()>,
) {
    while events.recv().await.is_some() {
        // Pending: trail the burst until the path has been quiet for the
        // full debounce window.
        loop {
            match tokio::time::timeout(DEBOUNCE, events.recv()).await {
                Ok(Some(())) => {
                    debug!("coalescing config change event");
                }
                Ok(None) => return,
                Err(_) => break,
            }
        }
        reload(&path, &store);
        // Events received during the reload are still queued and start
        // the next cycle.
    }
}

fn reload(path: &Path, store: &Arc<RuleStore>) {
    match load_rules(path) {
        Ok(rules) => {
            info!(
                "reloaded {} rules from {} ({} mock, {} proxy)",
                rules.len(),
                path.display(),
                rules.mock_count(),
                rules.proxy_count()
            );
            store.replace(rules);
        }
        Err(e) => {
            warn!("reload failed, keeping current rules: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleSet;
    use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        let mut e = Event::new(kind);
        e = e.add_path(PathBuf::from(path));
        e
    }

    #[test]
    fn delete_events_are_ignored() {
        let remove = event(EventKind::Remove(RemoveKind::File), "/tmp/rules.yaml");
        assert!(!is_relevant(&remove, false));
        assert!(!is_relevant(&remove, true));
    }

    #[test]
    fn modify_and_create_are_relevant_for_file_watches() {
        let modify = event(EventKind::Modify(ModifyKind::Any), "/tmp/rules.yaml");
        assert!(is_relevant(&modify, false));
        let create = event(EventKind::Create(CreateKind::File), "/tmp/rules.yaml");
        assert!(is_relevant(&create, false));
    }

    #[test]
    fn directory_watches_only_react_to_yaml_paths() {
        let yaml = event(EventKind::Modify(ModifyKind::Any), "/tmp/conf/a.yml");
        assert!(is_relevant(&yaml, true));
        let other = event(EventKind::Modify(ModifyKind::Any), "/tmp/conf/notes.txt");
        assert!(!is_relevant(&other, true));
    }

    // End-to-end: touch a real file and observe the store swap.

    const RULE_A: &str = "request:\n  path: /a\n  method: GET\nresponse:\n  body: a\n";
    const RULE_TWO: &str = "- request:\n    path: /a\n    method: GET\n  response:\n    body: a\n- request:\n    path: /b\n    method: GET\n  response:\n    body: b\n";

    async fn wait_for_count(store: &RuleStore, expected: usize) -> bool {
        for _ in 0..100 {
            if store.count() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reloads_after_file_change() {
        let dir = std::env::temp_dir().join(format!("popshop-watch-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("rules.yaml");
        std::fs::write(&file, RULE_A).unwrap();

        let store = Arc::new(RuleStore::new(load_rules(&file).unwrap()));
        assert_eq!(store.count(), 1);

        let _watcher = ConfigWatcher::spawn(file.clone(), Arc::clone(&store)).unwrap();
        // Give the watcher a moment to register before mutating.
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&file, RULE_TWO).unwrap();
        assert!(
            wait_for_count(&store, 2).await,
            "store never observed the reload"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_reload_keeps_current_rules() {
        let dir = std::env::temp_dir().join(format!("popshop-watch-bad-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("rules.yaml");
        std::fs::write(&file, RULE_A).unwrap();

        let store = Arc::new(RuleStore::new(load_rules(&file).unwrap()));
        let _watcher = ConfigWatcher::spawn(file.clone(), Arc::clone(&store)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&file, "request: [broken").unwrap();
        // Wait past the debounce plus reload; the old rules must survive.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
