//! Task ownership for a single page load.

use std::future::Future;
use tokio::task::JoinHandle;

/// Owns every timer and subscription task started for one page load.
///
/// [`teardown`](Self::teardown) aborts them all. It runs on every exit path:
/// explicitly after navigation and implicitly on drop.
#[derive(Debug, Default)]
pub struct PageScope {
    tasks: Vec<JoinHandle<()>>,
}

impl PageScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(task));
    }

    /// Number of tasks still owned by the scope.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn teardown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for PageScope {
    fn drop(&mut self) {
        self.teardown();
    }
}
