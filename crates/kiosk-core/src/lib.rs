//! Identity recovery and assignment reconciliation for kiosk displays.
//!
//! A kiosk is an unattended display that boots into one URL with no durable
//! storage guarantees. This crate decides, on every page load, which screen
//! row the device is, whether it should show assigned content or a pairing
//! code, and keeps the row's liveness fields current while watching for
//! reassignment over both the periodic heartbeat and the push feed.

pub mod assignment;
pub mod cache;
pub mod channel;
pub mod code;
pub mod config;
pub mod device;
pub mod env;
pub mod error;
pub mod health;
pub mod navigation;
pub mod resolver;
pub mod scope;

/// Core result type used throughout the kiosk protocol.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kiosk operations.
pub use error::Error;

/// Single decision point shared by the pull and push paths.
pub use assignment::{decide, effective_assignment, AssignmentReconciler, Source};

/// Local identity cache.
pub use cache::{CacheKey, CachedIdentity, IdentityCache, LocalIdentity, MemoryCache};

/// Heartbeat and push delivery.
pub use channel::AssignmentChannel;

/// Pairing code generation.
pub use code::{generate_code, generate_code_with, CodeSource, CODE_LENGTH, PAIRING_ALPHABET};

/// Protocol timings and limits.
pub use config::{KioskConfig, DEFAULT_PAIRING_PATH};

/// Page-load runtime.
pub use device::{Device, DeviceStatus};

/// Launch environment supplied with the initial page request.
pub use env::LaunchEnv;

/// Push channel liveness backstop.
pub use health::{DisconnectTracker, HealthVerdict};

/// Pages and navigation targets.
pub use navigation::{Destination, NavigationLatch, Page};

/// Tiered identity recovery.
pub use resolver::{IdentityResolver, Resolution, Tier, TierOutcome, WaitingScreen};

/// Task ownership for a single page load.
pub use scope::PageScope;
