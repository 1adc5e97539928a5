//! Assignment reconciliation.
//!
//! The heartbeat and the push feed both observe the same `assigned_path`
//! column. Each observation goes through [`AssignmentReconciler::apply_assignment`];
//! whichever arrives first navigates, and the navigation latch turns every
//! later observation on the same page load into a no-op.

use std::fmt;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, LocalIdentity};
use crate::config::DEFAULT_PAIRING_PATH;
use crate::navigation::{Destination, NavigationLatch, Page};

/// Where an observation came from. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Heartbeat,
    Push,
    HealthMonitor,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Heartbeat => f.write_str("heartbeat"),
            Source::Push => f.write_str("push"),
            Source::HealthMonitor => f.write_str("health monitor"),
        }
    }
}

/// The content route an observed `assigned_path` asks for.
///
/// Pointing a screen at the pairing route is the same as unassigning it.
pub fn effective_assignment<'a>(observed: Option<&'a str>, pairing_path: &str) -> Option<&'a str> {
    observed.filter(|path| *path != pairing_path)
}

/// Decide whether an observed assignment requires leaving `page`.
///
/// - waiting for pairing, assignment present: go to it
/// - on assigned content, assignment changed: go to the new path
/// - on assigned content, assignment cleared: back to pairing, never a reload in place
/// - anything else: stay
pub fn decide(page: &Page, observed: Option<&str>) -> Option<Destination> {
    match (page, observed) {
        (Page::Pairing, Some(path)) => Some(Destination::Assigned(path.to_string())),
        (Page::Pairing, None) => None,
        (Page::Assigned(current), Some(path)) if current != path => {
            Some(Destination::Assigned(path.to_string()))
        }
        (Page::Assigned(_), Some(_)) => None,
        (Page::Assigned(_), None) => Some(Destination::Pairing),
    }
}

/// Applies observations for one page load.
#[derive(Debug)]
pub struct AssignmentReconciler {
    page: Page,
    latch: NavigationLatch,
    cache: LocalIdentity,
    pairing_path: String,
}

impl AssignmentReconciler {
    pub fn new(page: Page, latch: NavigationLatch, cache: LocalIdentity) -> Self {
        Self {
            page,
            latch,
            cache,
            pairing_path: DEFAULT_PAIRING_PATH.to_string(),
        }
    }

    pub fn with_pairing_path(mut self, path: impl Into<String>) -> Self {
        self.pairing_path = path.into();
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn has_navigated(&self) -> bool {
        self.latch.is_set()
    }

    /// Act on an observed `assigned_path`. Returns `true` if this call
    /// started navigation; calling it twice with the same value is safe.
    pub fn apply_assignment(&self, observed: Option<&str>, source: Source) -> bool {
        if self.latch.is_set() {
            debug!(source = %source, "navigation already started; ignoring observation");
            return false;
        }
        let observed = effective_assignment(observed, &self.pairing_path);
        let Some(destination) = decide(&self.page, observed) else {
            return false;
        };
        if !self.latch.navigate(destination.clone()) {
            return false;
        }

        match &destination {
            Destination::Assigned(path) => self.cache.write(CacheKey::AssignedPath, path),
            Destination::Pairing => self.cache.forget(CacheKey::AssignedPath),
            Destination::Reload => {}
        }
        info!(source = %source, destination = %destination, "assignment changed; navigating");
        true
    }

    /// Remember the pairing code the store holds for this screen.
    pub fn remember_code(&self, code: &str) {
        self.cache.write(CacheKey::ScreenCode, code);
    }

    /// The screen row no longer exists: drop the cached identity and return
    /// to the pairing page, which re-registers.
    pub fn row_absent(&self, source: Source) -> bool {
        if self.latch.is_set() {
            return false;
        }
        warn!(source = %source, "screen row is gone; purging local identity");
        self.cache.purge();
        self.latch.navigate(Destination::Pairing)
    }

    /// Reload the current page in place.
    pub fn force_reload(&self, source: Source) -> bool {
        let started = self.latch.navigate(Destination::Reload);
        if started {
            warn!(source = %source, "forcing page reload");
        }
        started
    }
}
