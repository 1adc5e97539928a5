//! Identity recovery against the in-memory store.

use kiosk_api_contract::validate_pairing_code;
use kiosk_client_api::StoreError;
use kiosk_core::{
    generate_code, CacheKey, CodeSource, IdentityResolver, KioskConfig, LaunchEnv, LocalIdentity,
    MemoryCache, Resolution, Tier, TierOutcome, WaitingScreen,
};
use kiosk_local_db::Database;
use kiosk_rest_client_mock::{MockStore, Operation};
use std::sync::Arc;
use std::time::Duration;

struct Boot {
    store: Arc<MockStore>,
    cache: Arc<MemoryCache>,
    identity: LocalIdentity,
    config: KioskConfig,
}

impl Boot {
    fn new() -> Self {
        let cache = Arc::new(MemoryCache::new());
        Self {
            store: Arc::new(MockStore::new()),
            identity: LocalIdentity::new(cache.clone()),
            cache,
            config: KioskConfig::default(),
        }
    }

    fn cached(&self, key: CacheKey) -> Option<String> {
        self.identity.read(key)
    }

    async fn resolve(&self, env: &LaunchEnv, codes: &mut dyn CodeSource) -> Resolution {
        IdentityResolver::new(self.store.as_ref(), &self.identity, env, &self.config, codes)
            .resolve()
            .await
    }

    async fn resolve_random(&self, env: &LaunchEnv) -> Resolution {
        let mut codes = generate_code;
        self.resolve(env, &mut codes).await
    }
}

fn scripted(codes: &[&str]) -> impl CodeSource {
    let mut codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
    codes.reverse();
    move || codes.pop().unwrap_or_else(generate_code)
}

fn gate(hostname: &str) -> LaunchEnv {
    LaunchEnv::new().with_hostname(Some(hostname.to_string()))
}

#[tokio::test]
async fn test_hostname_recovery_navigates_without_pairing() {
    let boot = Boot::new();
    let id = boot
        .store
        .seed_screen("K7QX", Some("gate-4"), Some("/rides/coaster"));

    let resolution = boot.resolve_random(&gate("gate-4")).await;

    assert_eq!(resolution, Resolution::Navigate("/rides/coaster".into()));
    assert_eq!(boot.store.calls(Operation::Insert), 0);
    assert_eq!(boot.cached(CacheKey::ScreenId).as_deref(), Some(id.as_str()));
    assert_eq!(boot.cached(CacheKey::ScreenCode).as_deref(), Some("K7QX"));
    assert_eq!(boot.cached(CacheKey::ScreenName).as_deref(), Some("gate-4"));
    assert_eq!(
        boot.cached(CacheKey::AssignedPath).as_deref(),
        Some("/rides/coaster")
    );
    assert_eq!(boot.store.heartbeats_for(&id).len(), 1);
}

#[tokio::test]
async fn test_hostname_recovery_unassigned_waits_with_recovered_code() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", Some("gate-4"), None);

    let resolution = boot.resolve_random(&gate("gate-4")).await;

    assert_eq!(
        resolution,
        Resolution::Waiting(WaitingScreen {
            screen_id: id,
            code: Some("K7QX".into()),
        })
    );
    assert_eq!(boot.store.calls(Operation::Insert), 0);
}

#[tokio::test]
async fn test_hostname_lookup_failure_falls_through_to_cache() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", Some("gate-4"), Some("/queues"));
    boot.identity.write(CacheKey::ScreenId, id.as_str());
    boot.identity.write(CacheKey::AssignedPath, "/queues");
    boot.store.fail_next(
        Operation::FindByName,
        StoreError::Transport("connection reset".into()),
    );

    let resolution = boot.resolve_random(&gate("gate-4")).await;

    assert_eq!(resolution, Resolution::Navigate("/queues".into()));
    assert_eq!(boot.store.calls(Operation::FindByName), 1);
}

#[tokio::test]
async fn test_hostname_recovery_tags_hostname_on_heartbeat() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", Some("gate-4"), None);

    boot.resolve_random(&gate("gate-4")).await;

    let beats = boot.store.heartbeats_for(&id);
    assert_eq!(beats[0].name.as_deref(), Some("gate-4"));
}

#[tokio::test]
async fn test_cached_assignment_takes_one_round_trip() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", None, Some("/rides/coaster"));
    boot.identity.write(CacheKey::ScreenId, id.as_str());
    boot.identity.write(CacheKey::AssignedPath, "/rides/coaster");

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert_eq!(resolution, Resolution::Navigate("/rides/coaster".into()));
    assert_eq!(boot.store.total_calls(), 1);
}

#[tokio::test]
async fn test_cached_path_is_replaced_by_current_assignment() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", None, Some("/queues"));
    boot.identity.write(CacheKey::ScreenId, id.as_str());
    boot.identity.write(CacheKey::AssignedPath, "/rides/coaster");

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert_eq!(resolution, Resolution::Navigate("/queues".into()));
    assert_eq!(boot.cached(CacheKey::AssignedPath).as_deref(), Some("/queues"));
}

#[tokio::test]
async fn test_cached_path_is_degraded_fallback_on_transport_error() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", None, Some("/queues"));
    boot.identity.write(CacheKey::ScreenId, id.as_str());
    boot.identity.write(CacheKey::AssignedPath, "/rides/coaster");
    boot.store
        .fail_next(Operation::Heartbeat, StoreError::Transport("timeout".into()));

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert_eq!(resolution, Resolution::Navigate("/rides/coaster".into()));
    assert_eq!(boot.store.calls(Operation::Insert), 0);
}

#[tokio::test]
async fn test_cached_id_only_navigates_when_assigned() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", None, Some("/queues"));
    boot.identity.write(CacheKey::ScreenId, id.as_str());

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert_eq!(resolution, Resolution::Navigate("/queues".into()));
    assert_eq!(boot.cached(CacheKey::AssignedPath).as_deref(), Some("/queues"));
}

#[tokio::test]
async fn test_cached_id_only_resumes_waiting_with_row_code() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", None, None);
    boot.identity.write(CacheKey::ScreenId, id.as_str());

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert_eq!(
        resolution,
        Resolution::Waiting(WaitingScreen {
            screen_id: id,
            code: Some("K7QX".into()),
        })
    );
    assert_eq!(boot.cached(CacheKey::ScreenCode).as_deref(), Some("K7QX"));
    assert_eq!(boot.store.calls(Operation::Insert), 0);
}

#[tokio::test]
async fn test_cached_id_only_keeps_identity_on_transport_error() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", None, None);
    boot.identity.write(CacheKey::ScreenId, id.as_str());
    boot.identity.write(CacheKey::ScreenCode, "K7QX");
    boot.store
        .fail_next(Operation::Heartbeat, StoreError::Transport("timeout".into()));

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert_eq!(
        resolution,
        Resolution::Waiting(WaitingScreen {
            screen_id: id,
            code: Some("K7QX".into()),
        })
    );
    assert_eq!(boot.store.calls(Operation::Insert), 0);
}

#[tokio::test]
async fn test_missing_row_purges_cache_and_registers() {
    let boot = Boot::new();
    boot.identity.write(CacheKey::ScreenId, "ghost");
    boot.identity.write(CacheKey::ScreenCode, "ZZZZ");
    boot.identity.write(CacheKey::AssignedPath, "/old");

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    let waiting = match resolution {
        Resolution::Waiting(waiting) => waiting,
        other => panic!("expected waiting state, got {other:?}"),
    };
    let code = waiting.code.expect("registered screens have a code");
    assert!(validate_pairing_code(&code).is_ok());
    assert_ne!(waiting.screen_id.as_str(), "ghost");

    assert_eq!(boot.cached(CacheKey::ScreenId).as_deref(), Some(waiting.screen_id.as_str()));
    assert_eq!(boot.cached(CacheKey::ScreenCode).as_deref(), Some(code.as_str()));
    assert_eq!(boot.cached(CacheKey::AssignedPath), None);
    assert_eq!(boot.store.calls(Operation::Insert), 1);
}

#[tokio::test]
async fn test_missing_row_tier_clears_every_identity_key() {
    let boot = Boot::new();
    boot.identity.write(CacheKey::ScreenId, "ghost");
    boot.identity.write(CacheKey::ScreenCode, "ZZZZ");
    boot.identity.write(CacheKey::AssignedPath, "/old");
    let env = LaunchEnv::new();
    let mut codes = generate_code;

    let outcome = IdentityResolver::new(
        boot.store.as_ref(),
        &boot.identity,
        &env,
        &boot.config,
        &mut codes,
    )
    .run_tier(Tier::LocalCache)
    .await;

    assert_eq!(outcome, TierOutcome::FallThrough);
    for key in CacheKey::IDENTITY {
        assert_eq!(boot.cached(key), None, "{key} survived the purge");
    }
}

#[tokio::test]
async fn test_unique_violation_retries_with_new_code() {
    let boot = Boot::new();
    boot.store.seed_screen("AAAA", None, None);
    let mut codes = scripted(&["AAAA", "BBBB"]);

    let resolution = boot.resolve(&LaunchEnv::new(), &mut codes).await;

    let waiting = match resolution {
        Resolution::Waiting(waiting) => waiting,
        other => panic!("expected waiting state, got {other:?}"),
    };
    assert_eq!(waiting.code.as_deref(), Some("BBBB"));
    assert_eq!(boot.store.attempted_codes(), vec!["AAAA", "BBBB"]);
}

#[tokio::test]
async fn test_concurrent_registrations_get_distinct_codes() {
    let store = Arc::new(MockStore::new());
    let first = Boot {
        store: store.clone(),
        ..Boot::new()
    };
    let second = Boot {
        store: store.clone(),
        ..Boot::new()
    };
    let env = LaunchEnv::new();
    let mut codes_a = scripted(&["AAAA", "CCCC"]);
    let mut codes_b = scripted(&["AAAA", "DDDD"]);

    let (a, b) = tokio::join!(
        first.resolve(&env, &mut codes_a),
        second.resolve(&env, &mut codes_b)
    );

    let (Resolution::Waiting(a), Resolution::Waiting(b)) = (a, b) else {
        panic!("both devices should reach the waiting state");
    };
    assert_ne!(a.code, b.code);
    assert_ne!(a.screen_id, b.screen_id);
    assert_eq!(store.screens().len(), 2);
}

#[tokio::test]
async fn test_registration_records_hostname_and_user_agent() {
    let boot = Boot::new();
    let env = gate("gate-9").with_user_agent("kiosk-test/1.0");

    let Resolution::Waiting(waiting) = boot.resolve_random(&env).await else {
        panic!("expected waiting state");
    };

    let row = boot.store.screen(&waiting.screen_id).unwrap();
    assert_eq!(row.name.as_deref(), Some("gate-9"));
    assert_eq!(row.user_agent.as_deref(), Some("kiosk-test/1.0"));
}

#[tokio::test(start_paused = true)]
async fn test_store_errors_retry_after_delay() {
    let boot = Boot::new();
    boot.store
        .fail_times(Operation::Insert, 2, StoreError::Transport("timeout".into()));
    let start = tokio::time::Instant::now();

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert!(matches!(resolution, Resolution::Waiting(_)));
    assert_eq!(boot.store.calls(Operation::Insert), 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_registration_stalls() {
    let boot = Boot::new();
    boot.store
        .fail_times(Operation::Insert, 10, StoreError::Transport("timeout".into()));

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert_eq!(resolution, Resolution::Stalled { attempts: 10 });
    assert_eq!(boot.store.calls(Operation::Insert), 10);
    assert_eq!(boot.cached(CacheKey::ScreenId), None);
}

#[tokio::test(start_paused = true)]
async fn test_conflicts_and_failures_share_one_counter() {
    let boot = Boot::new();
    boot.store
        .fail_times(Operation::Insert, 5, StoreError::UniqueViolation("taken".into()));
    boot.store
        .fail_times(Operation::Insert, 5, StoreError::Transport("timeout".into()));

    let resolution = boot.resolve_random(&LaunchEnv::new()).await;

    assert_eq!(resolution, Resolution::Stalled { attempts: 10 });
    assert_eq!(boot.store.calls(Operation::Insert), 10);
}

#[tokio::test]
async fn test_unavailable_cache_does_not_block_boot() {
    let boot = Boot::new();
    boot.cache.set_unavailable(true);

    let resolution = boot.resolve_random(&gate("gate-4")).await;

    assert!(matches!(resolution, Resolution::Waiting(_)));
}

#[tokio::test]
async fn test_registration_survives_reboot_with_disk_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiosk.db");
    let store = Arc::new(MockStore::new());
    let config = KioskConfig::default();
    let env = LaunchEnv::new();

    let first = {
        let identity = LocalIdentity::new(Arc::new(Database::open(&path).unwrap()));
        let mut codes = scripted(&["K7QX"]);
        IdentityResolver::new(store.as_ref(), &identity, &env, &config, &mut codes)
            .resolve()
            .await
    };
    let Resolution::Waiting(waiting) = first else {
        panic!("expected a fresh registration to wait for pairing");
    };

    let identity = LocalIdentity::new(Arc::new(Database::open(&path).unwrap()));
    let mut codes = scripted(&["ZZZZ"]);
    let second = IdentityResolver::new(store.as_ref(), &identity, &env, &config, &mut codes)
        .resolve()
        .await;

    assert_eq!(second, Resolution::Waiting(waiting));
    assert_eq!(store.calls(Operation::Insert), 1);
}

#[tokio::test]
async fn test_row_pointing_at_pairing_route_waits_for_assignment() {
    let boot = Boot::new();
    let id = boot.store.seed_screen("K7QX", Some("gate-4"), Some("/screen"));

    let resolution = boot.resolve_random(&gate("gate-4")).await;

    assert_eq!(
        resolution,
        Resolution::Waiting(WaitingScreen {
            screen_id: id,
            code: Some("K7QX".into()),
        })
    );
    assert_eq!(boot.cached(CacheKey::AssignedPath), None);
}
