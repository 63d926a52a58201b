// ============================================================================
// paracoder-core/src/process/registry.rs
// ============================================================================
//
// CHILD REGISTRY: Tracking Spawned Pipeline Stages
//
// Every pipeline stage started by the runner is registered here until it
// has been reaped. The process-wide registry is what the shutdown hook and
// the worker pool use to kill transcoders that are still running, so an
// interrupted batch leaves no orphans behind.
//
// KEY COMPONENTS:
// - ChildRegistry: Id keyed map of shared child handles, optionally scoped
//   to one batch
// - global_children: The process-wide registry

// ---- External crate imports ----
use log::{debug, warn};
use once_cell::sync::Lazy;

// ---- Standard library imports ----
use std::collections::HashMap;
use std::process::Child;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A child process shared between its runner and the registry.
pub type SharedChild = Arc<Mutex<Child>>;

static GLOBAL_CHILDREN: Lazy<Arc<ChildRegistry>> = Lazy::new(|| Arc::new(ChildRegistry::new()));

/// The registry shared by every runner of this process.
pub fn global_children() -> Arc<ChildRegistry> {
    Arc::clone(&GLOBAL_CHILDREN)
}

/// Locks a shared child, recovering the guard from a poisoned lock.
pub fn lock_child(child: &SharedChild) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct TrackedChild {
    child: SharedChild,
    /// Id of the same child in the parent registry
    parent_id: Option<u64>,
}

/// Children spawned by runners, keyed by a registry-local id.
///
/// A scoped registry forwards every child to its parent as well, so the
/// process-wide registry sees all children while a batch can kill only
/// its own.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    next_id: AtomicU64,
    children: Mutex<HashMap<u64, TrackedChild>>,
    parent: Option<Arc<ChildRegistry>>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose children are also tracked by `parent`.
    pub fn scoped(parent: Arc<ChildRegistry>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Takes ownership of a freshly spawned child.
    pub fn register(&self, child: Child) -> (u64, SharedChild) {
        let shared = Arc::new(Mutex::new(child));
        let id = self.track(Arc::clone(&shared));
        (id, shared)
    }

    fn track(&self, child: SharedChild) -> u64 {
        let parent_id = self.parent.as_ref().map(|parent| parent.track(Arc::clone(&child)));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries().insert(id, TrackedChild { child, parent_id });
        id
    }

    /// Forgets a child once it has been reaped.
    pub fn deregister(&self, id: u64) {
        let removed = self.entries().remove(&id);
        if let Some(tracked) = removed {
            self.release_from_parent(&tracked);
        }
    }

    fn release_from_parent(&self, tracked: &TrackedChild) {
        if let (Some(parent), Some(parent_id)) = (&self.parent, tracked.parent_id) {
            parent.deregister(parent_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kills every child of this registry and returns how many were
    /// signalled. Children registered elsewhere are left alone.
    ///
    /// Runners still waiting on a killed child observe its exit and reap it.
    pub fn terminate_all(&self) -> usize {
        let children: Vec<(u64, TrackedChild)> = self.entries().drain().collect();
        let mut killed = 0;
        for (id, tracked) in children {
            self.release_from_parent(&tracked);
            let mut child = lock_child(&tracked.child);
            match child.try_wait() {
                Ok(Some(_)) => {}
                _ => match child.kill() {
                    Ok(()) => {
                        debug!("Killed child process {} (pid {})", id, child.id());
                        killed += 1;
                    }
                    Err(e) => warn!("Failed to kill child process {}: {}", child.id(), e),
                },
            }
        }
        killed
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, TrackedChild>> {
        self.children.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_terminate_all_kills_running_children() -> Result<(), Box<dyn std::error::Error>> {
        let registry = ChildRegistry::new();
        let (_, sleeper) = registry.register(Command::new("sleep").arg("30").spawn()?);
        let (done_id, _) = registry.register(Command::new("true").spawn()?);
        assert_eq!(registry.len(), 2);

        // Give `true` a moment to exit so only the sleeper needs a signal
        std::thread::sleep(std::time::Duration::from_millis(200));
        let killed = registry.terminate_all();
        assert!(killed >= 1);
        assert!(registry.is_empty());

        let status = lock_child(&sleeper).wait()?;
        assert!(!status.success());

        registry.deregister(done_id);
        Ok(())
    }

    #[test]
    fn test_scoped_registry_kills_only_its_children() -> Result<(), Box<dyn std::error::Error>> {
        let global = Arc::new(ChildRegistry::new());
        let first = ChildRegistry::scoped(Arc::clone(&global));
        let second = ChildRegistry::scoped(Arc::clone(&global));

        let (first_id, first_child) = first.register(Command::new("sleep").arg("30").spawn()?);
        let (second_id, second_child) = second.register(Command::new("sleep").arg("30").spawn()?);
        assert_eq!(global.len(), 2);

        assert_eq!(first.terminate_all(), 1);
        assert!(first.is_empty());
        assert_eq!(global.len(), 1);
        assert!(!lock_child(&first_child).wait()?.success());
        assert!(matches!(lock_child(&second_child).try_wait(), Ok(None)));
        first.deregister(first_id);

        // The process-wide registry still reaches the other batch's child
        assert_eq!(global.terminate_all(), 1);
        assert!(!lock_child(&second_child).wait()?.success());
        second.deregister(second_id);
        assert!(second.is_empty());
        assert!(global.is_empty());
        Ok(())
    }
}
