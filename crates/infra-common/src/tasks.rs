//! Supervised background tasks.
//!
//! Every timer, subscription pump, and heartbeat in the coordination core is
//! spawned through a [`TaskSet`] so that teardown cancels all of them in one
//! call. Leaked timers from a previous session identity double-fire events,
//! so the owning service must hold exactly one `TaskSet` and tear it down
//! when the identity changes or the session ends.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A bag of named task handles with a shared cancellation token.
///
/// Tasks spawned here run until they finish, the token fires, or
/// [`TaskSet::teardown`] aborts them. Dropping the set tears it down.
pub struct TaskSet {
    name: String,
    cancel: CancellationToken,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
    closed: AtomicBool,
}

impl TaskSet {
    /// Create a task set owned by the named component
    pub fn new(name: impl Into<String>) -> Self {
        TaskSet {
            name: name.into(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Spawn a tracked task.
    ///
    /// The future is raced against the set's cancellation token. Spawning
    /// after teardown is a logged no-op rather than an error: late spawns
    /// happen when an event arrives while the session is closing.
    pub fn spawn<F>(&self, task_name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_name = task_name.into();
        if self.closed.load(Ordering::SeqCst) {
            warn!(set = %self.name, task = %task_name, "task set torn down, dropping task");
            return;
        }

        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = future => {}
            }
        });

        let mut tasks = self.tasks.lock().expect("task list poisoned");
        tasks.retain(|(_, h)| !h.is_finished());
        tasks.push((task_name, handle));
    }

    /// Token shared by all tasks in this set, for cooperative loops
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of tracked tasks that have not finished
    pub fn active(&self) -> usize {
        self.tasks
            .lock()
            .expect("task list poisoned")
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .count()
    }

    /// Cancel and abort every tracked task.
    ///
    /// Idempotent; the set refuses new work afterwards.
    pub fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        let mut tasks = self.tasks.lock().expect("task list poisoned");
        let count = tasks.len();
        for (task_name, handle) in tasks.drain(..) {
            if !handle.is_finished() {
                debug!(set = %self.name, task = %task_name, "aborting task");
            }
            handle.abort();
        }
        debug!(set = %self.name, count, "task set torn down");
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Spawn a fire-and-forget write whose failure is logged and swallowed.
///
/// The coordination core never lets a persistence failure block or roll back
/// a local state transition; this helper is the one place that policy lives.
pub fn best_effort<F, E>(label: impl Into<String>, future: F) -> JoinHandle<()>
where
    F: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let label = label.into();
    tokio::spawn(async move {
        if let Err(e) = future.await {
            warn!(op = %label, error = %e, "best-effort operation failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn teardown_aborts_running_tasks() {
        let set = TaskSet::new("test");
        set.spawn("forever", async {
            std::future::pending::<()>().await;
        });
        assert_eq!(set.active(), 1);

        set.teardown();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(set.active(), 0);
    }

    #[tokio::test]
    async fn spawn_after_teardown_is_a_no_op() {
        let set = TaskSet::new("test");
        set.teardown();

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        set.spawn("late", async move {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(set.active(), 0);
    }

    #[tokio::test]
    async fn cooperative_loops_observe_the_token() {
        let set = TaskSet::new("test");
        let token = set.cancel_token();
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_clone = ticks.clone();
        set.spawn("ticker", async move {
            loop {
                tokio::time::sleep(Duration::from_millis(5)).await;
                ticks_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        set.teardown();
        assert!(token.is_cancelled());
        let after = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn best_effort_swallows_errors() {
        let handle = best_effort("doomed write", async { Err::<(), _>("store unavailable") });
        handle.await.expect("task panicked");
    }
}
