//! End-to-end tests for the presence service against in-memory ports.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use parley_infra_common::testing::FanoutFeed;
use parley_infra_common::{ChangeEvent, ChangeFeed};
use parley_presence_core::testing::{ChannelPresenceBus, InMemoryStatusStore};
use parley_presence_core::{
    PersistedStatus, PresenceConfig, PresenceEvent, PresenceRecord, PresenceService, StatusRow,
    UserStatus,
};

const USER: &str = "alice";

fn fast_config() -> PresenceConfig {
    PresenceConfig::default()
        .with_heartbeat(Duration::from_millis(40))
        .with_stale_after(Duration::from_millis(120))
        .with_sweep_interval(Duration::from_millis(30))
        .with_hidden_offline_after(Duration::from_millis(60))
}

async fn start_with_store(
    store: Arc<InMemoryStatusStore>,
) -> (
    PresenceService,
    Arc<ChannelPresenceBus>,
    Arc<FanoutFeed<StatusRow>>,
) {
    let bus = ChannelPresenceBus::new();
    let feed = Arc::new(FanoutFeed::new());
    let service = PresenceService::start(
        USER,
        fast_config(),
        store,
        bus.clone(),
        feed.clone() as Arc<dyn ChangeFeed<StatusRow>>,
    )
    .await
    .expect("service start");
    (service, bus, feed)
}

#[tokio::test]
async fn cold_start_with_no_row_goes_online() {
    let store = InMemoryStatusStore::new();
    let (service, _bus, _feed) = start_with_store(store.clone()).await;

    assert_eq!(service.status(), UserStatus::Online);
    assert_eq!(store.writes_for(USER), vec![PersistedStatus::Online]);
}

#[tokio::test]
async fn cold_start_with_offline_row_goes_online() {
    let store = InMemoryStatusStore::with_row(USER, PersistedStatus::Offline);
    let (service, _bus, _feed) = start_with_store(store.clone()).await;

    assert_eq!(service.status(), UserStatus::Online);
    assert_eq!(store.writes_for(USER), vec![PersistedStatus::Online]);
}

#[tokio::test]
async fn persisted_away_rehydrates_as_online_without_a_write() {
    let store = InMemoryStatusStore::with_row(USER, PersistedStatus::Away);
    let (service, _bus, _feed) = start_with_store(store.clone()).await;

    assert_eq!(service.status(), UserStatus::Online);
    assert!(store.writes_for(USER).is_empty());
}

#[tokio::test]
async fn persisted_invisible_is_adopted() {
    let store = InMemoryStatusStore::with_row(USER, PersistedStatus::Invisible);
    let (service, _bus, _feed) = start_with_store(store.clone()).await;

    assert_eq!(service.status(), UserStatus::Invisible);
    assert!(store.writes_for(USER).is_empty());
}

#[tokio::test]
async fn subscribe_confirmation_publishes_the_initial_record() {
    let (_service, bus, _feed) = start_with_store(InMemoryStatusStore::new()).await;
    sleep(Duration::from_millis(30)).await;

    let published = bus.published();
    assert!(!published.is_empty(), "no record published after subscribe");
    assert_eq!(published[0].user_id, USER);
    assert_eq!(published[0].status, UserStatus::Online);
}

#[tokio::test]
async fn heartbeat_republishes_the_record() {
    let (_service, bus, _feed) = start_with_store(InMemoryStatusStore::new()).await;
    sleep(Duration::from_millis(150)).await;

    assert!(
        bus.published().len() >= 3,
        "expected several heartbeat publishes, got {}",
        bus.published().len()
    );
}

#[tokio::test]
async fn update_status_is_synchronous_locally_and_collapses_when_persisted() {
    let store = InMemoryStatusStore::new();
    let (service, bus, _feed) = start_with_store(store.clone()).await;

    service.update_status(UserStatus::Busy);
    assert_eq!(service.status(), UserStatus::Busy);
    assert_eq!(service.status_of(USER), UserStatus::Busy);

    sleep(Duration::from_millis(30)).await;
    let published = bus.published();
    assert_eq!(published.last().unwrap().status, UserStatus::Busy);
    assert_eq!(
        store.writes_for(USER).last(),
        Some(&PersistedStatus::Away),
        "busy must persist as away"
    );
}

#[tokio::test]
async fn join_and_leave_drive_the_roster() {
    let store = InMemoryStatusStore::new();
    let (service, bus, _feed) = start_with_store(store.clone()).await;

    bus.emit(PresenceEvent::Join {
        entries: vec![PresenceRecord::now("bob", UserStatus::Dnd)],
    })
    .await;
    sleep(Duration::from_millis(20)).await;
    assert_eq!(service.status_of("bob"), UserStatus::Dnd);

    bus.emit(PresenceEvent::Leave {
        user_ids: vec!["bob".to_string()],
    })
    .await;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(service.status_of("bob"), UserStatus::Offline);
    assert_eq!(store.writes_for("bob"), vec![PersistedStatus::Offline]);
}

#[tokio::test]
async fn sync_replaces_the_roster() {
    let (service, bus, _feed) = start_with_store(InMemoryStatusStore::new()).await;

    bus.emit(PresenceEvent::Join {
        entries: vec![PresenceRecord::now("carol", UserStatus::Online)],
    })
    .await;
    sleep(Duration::from_millis(20)).await;

    bus.emit(PresenceEvent::Sync {
        roster: vec![PresenceRecord::now("bob", UserStatus::Online)],
    })
    .await;
    sleep(Duration::from_millis(20)).await;

    assert_eq!(service.status_of("bob"), UserStatus::Online);
    assert_eq!(service.status_of("carol"), UserStatus::Offline);
    // our own entry survives the snapshot
    assert_eq!(service.status_of(USER), UserStatus::Online);
}

#[tokio::test]
async fn change_feed_rows_merge_after_expansion() {
    let (service, _bus, feed) = start_with_store(InMemoryStatusStore::new()).await;

    feed.emit(ChangeEvent::Update {
        new: StatusRow {
            user_id: "bob".to_string(),
            status: PersistedStatus::Away,
        },
        old: None,
    })
    .await;
    sleep(Duration::from_millis(20)).await;

    // persisted away is ambiguous and rehydrates as online
    assert_eq!(service.status_of("bob"), UserStatus::Online);

    feed.emit(ChangeEvent::Insert {
        new: StatusRow {
            user_id: "dave".to_string(),
            status: PersistedStatus::Invisible,
        },
    })
    .await;
    sleep(Duration::from_millis(20)).await;
    assert_eq!(service.status_of("dave"), UserStatus::Invisible);
}

#[tokio::test]
async fn quiet_peers_are_evicted_and_persisted_offline() {
    let store = InMemoryStatusStore::new();
    let (service, bus, _feed) = start_with_store(store.clone()).await;

    bus.emit(PresenceEvent::Join {
        entries: vec![PresenceRecord::now("bob", UserStatus::Online)],
    })
    .await;
    sleep(Duration::from_millis(20)).await;
    assert_eq!(service.status_of("bob"), UserStatus::Online);

    // no liveness signal for longer than the staleness threshold
    sleep(Duration::from_millis(250)).await;
    assert_eq!(service.status_of("bob"), UserStatus::Offline);
    assert_eq!(store.writes_for("bob"), vec![PersistedStatus::Offline]);
}

#[tokio::test]
async fn a_fresh_join_resets_the_staleness_clock() {
    let (service, bus, _feed) = start_with_store(InMemoryStatusStore::new()).await;

    bus.emit(PresenceEvent::Join {
        entries: vec![PresenceRecord::now("bob", UserStatus::Online)],
    })
    .await;
    sleep(Duration::from_millis(80)).await;

    bus.emit(PresenceEvent::Join {
        entries: vec![PresenceRecord::now("bob", UserStatus::Online)],
    })
    .await;
    sleep(Duration::from_millis(80)).await;

    assert_eq!(service.status_of("bob"), UserStatus::Online);
}

#[tokio::test]
async fn hidden_tab_goes_offline_then_returns_online() {
    let store = InMemoryStatusStore::new();
    let (service, _bus, _feed) = start_with_store(store.clone()).await;

    service.visibility_changed(false);
    sleep(Duration::from_millis(120)).await;
    assert_eq!(service.status(), UserStatus::Offline);
    assert_eq!(store.writes_for(USER).last(), Some(&PersistedStatus::Offline));

    service.visibility_changed(true);
    assert_eq!(service.status(), UserStatus::Online);
    sleep(Duration::from_millis(30)).await;
    assert_eq!(store.writes_for(USER).last(), Some(&PersistedStatus::Online));
}

#[tokio::test]
async fn returning_before_the_threshold_cancels_the_hidden_timer() {
    let store = InMemoryStatusStore::new();
    let (service, _bus, _feed) = start_with_store(store.clone()).await;

    service.visibility_changed(false);
    sleep(Duration::from_millis(20)).await;
    service.visibility_changed(true);

    sleep(Duration::from_millis(120)).await;
    assert_eq!(service.status(), UserStatus::Online);
    assert!(
        !store.writes_for(USER).contains(&PersistedStatus::Offline),
        "a cancelled hidden timer must not persist offline"
    );
}

#[tokio::test]
async fn shutdown_persists_offline_and_stops_all_tasks() {
    let store = InMemoryStatusStore::new();
    let (service, bus, _feed) = start_with_store(store.clone()).await;

    service.shutdown().await;
    sleep(Duration::from_millis(30)).await;

    assert_eq!(store.writes_for(USER).last(), Some(&PersistedStatus::Offline));
    assert_eq!(bus.subscriber_count(), 0);

    let published = bus.published().len();
    sleep(Duration::from_millis(120)).await;
    assert_eq!(bus.published().len(), published, "heartbeat survived teardown");
}
