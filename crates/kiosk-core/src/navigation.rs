//! Pages and navigation targets.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// The page a device is currently displaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Pairing page: identity resolution, then the code-waiting screen
    Pairing,
    /// Assigned content route
    Assigned(String),
}

impl Page {
    pub fn assigned_path(&self) -> Option<&str> {
        match self {
            Page::Assigned(path) => Some(path),
            Page::Pairing => None,
        }
    }

    /// URL path of this page.
    pub fn route<'a>(&'a self, pairing_path: &'a str) -> &'a str {
        self.assigned_path().unwrap_or(pairing_path)
    }

    /// Page loaded after navigating to `destination` from this page.
    pub fn next(&self, destination: &Destination) -> Page {
        match destination {
            Destination::Assigned(path) => Page::Assigned(path.clone()),
            Destination::Pairing => Page::Pairing,
            Destination::Reload => self.clone(),
        }
    }
}

/// A full page transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Assigned(String),
    Pairing,
    /// Reload the current page in place
    Reload,
}

impl Destination {
    /// URL path this navigation loads, or `None` for an in-place reload.
    pub fn route<'a>(&'a self, pairing_path: &'a str) -> Option<&'a str> {
        match self {
            Destination::Assigned(path) => Some(path),
            Destination::Pairing => Some(pairing_path),
            Destination::Reload => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Assigned(path) => write!(f, "{}", path),
            Destination::Pairing => f.write_str("pairing page"),
            Destination::Reload => f.write_str("reload"),
        }
    }
}

/// One-shot navigation trigger for a page load.
///
/// The first call to [`navigate`](Self::navigate) wins; every later call is
/// a no-op and returns `false`.
#[derive(Debug, Clone)]
pub struct NavigationLatch {
    tx: Arc<watch::Sender<Option<Destination>>>,
}

impl Default for NavigationLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationLatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn navigate(&self, destination: Destination) -> bool {
        self.tx.send_if_modified(move |slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(destination);
            true
        })
    }

    pub fn destination(&self) -> Option<Destination> {
        self.tx.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until some caller navigates.
    pub async fn wait(&self) -> Destination {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(destination) = rx.borrow_and_update().clone() {
                return destination;
            }
            // The sender lives in `self`, so this only errors if it is gone.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_navigation_wins() {
        let latch = NavigationLatch::new();
        assert!(!latch.is_set());

        assert!(latch.navigate(Destination::Assigned("/x".into())));
        assert!(!latch.navigate(Destination::Pairing));
        assert!(!latch.navigate(Destination::Assigned("/x".into())));

        assert_eq!(latch.destination(), Some(Destination::Assigned("/x".into())));
    }

    #[tokio::test]
    async fn test_wait_wakes_on_navigation() {
        let latch = NavigationLatch::new();
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.wait().await })
        };
        tokio::task::yield_now().await;

        latch.navigate(Destination::Reload);
        assert_eq!(waiter.await.unwrap(), Destination::Reload);
        // Already set: returns immediately.
        assert_eq!(latch.wait().await, Destination::Reload);
    }

    #[test]
    fn test_next_page() {
        let assigned = Page::Assigned("/rides".into());
        assert_eq!(assigned.next(&Destination::Reload), assigned);
        assert_eq!(assigned.next(&Destination::Pairing), Page::Pairing);
        assert_eq!(
            Page::Pairing.next(&Destination::Assigned("/queues".into())),
            Page::Assigned("/queues".into())
        );
    }

    #[test]
    fn test_routes_use_configured_pairing_path() {
        assert_eq!(Page::Pairing.route("/kiosk"), "/kiosk");
        assert_eq!(Page::Assigned("/rides".into()).route("/kiosk"), "/rides");
        assert_eq!(Destination::Pairing.route("/kiosk"), Some("/kiosk"));
        assert_eq!(Destination::Reload.route("/kiosk"), None);
    }
}
