//! Integration tests for `RealmHost` on the in-memory backends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use realm::prelude::*;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::time::timeout;

// =========================================================================
// A player that counts visits
// =========================================================================

struct Visitor {
    id: PlayerId,
    visits: AtomicU64,
    events: PlayerEvents,
}

impl Player for Visitor {
    fn from_snapshot(snapshot: PlayerSnapshot) -> Self {
        let visits = snapshot.data.get("visits").and_then(Value::as_u64).unwrap_or(0);
        Self {
            id: snapshot.player_id,
            visits: AtomicU64::new(visits),
            events: PlayerEvents::new(),
        }
    }

    fn id(&self) -> &PlayerId {
        &self.id
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot::new(
            self.id.clone(),
            json!({ "visits": self.visits.load(Ordering::Relaxed) }),
        )
    }

    fn events(&self) -> &PlayerEvents {
        &self.events
    }

    async fn start(&self) -> Result<(), PlayerError> {
        self.visits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct Closed;

impl AreaLogic for Closed {
    type Player = Visitor;

    async fn on_start(&mut self, _area_id: &AreaId) -> Result<(), AreaError> {
        Err(AreaError::PreconditionFailed("closed for maintenance".into()))
    }
}

/// Holds `on_start` until released.
struct Gated {
    entered: Option<oneshot::Sender<()>>,
    release: Option<oneshot::Receiver<()>>,
}

impl AreaLogic for Gated {
    type Player = Visitor;

    async fn on_start(&mut self, _area_id: &AreaId) -> Result<(), AreaError> {
        if let Some(entered) = self.entered.take() {
            let _ = entered.send(());
        }
        if let Some(release) = self.release.take() {
            let _ = release.await;
        }
        Ok(())
    }
}

fn pid(id: &str) -> PlayerId {
    PlayerId::new(id)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_open_area_starts_and_registers() {
    let host = RealmHost::in_memory().build();

    let handle = host
        .open_area(NoHooks::<Visitor>::new(), AreaOptions::with_id("plaza"))
        .await
        .unwrap();

    assert_eq!(handle.info().await.unwrap().state, AreaState::Running);
    assert_eq!(host.area_ids().await, vec![AreaId::new("plaza")]);
    assert!(host.groups().group_exists("area:plaza").await);
}

#[tokio::test]
async fn test_open_area_duplicate_id_returns_precondition_failed() {
    let host = RealmHost::in_memory().build();
    host.open_area(NoHooks::<Visitor>::new(), AreaOptions::with_id("plaza"))
        .await
        .unwrap();

    let result = host
        .open_area(NoHooks::<Visitor>::new(), AreaOptions::with_id("plaza"))
        .await;

    assert!(matches!(
        result,
        Err(RealmError::Area(AreaError::PreconditionFailed(_)))
    ));
}

#[tokio::test]
async fn test_open_area_start_failure_unregisters() {
    let host = RealmHost::in_memory().build();

    let result = host.open_area(Closed, AreaOptions::with_id("vault")).await;

    assert!(matches!(
        result,
        Err(RealmError::Area(AreaError::PreconditionFailed(_)))
    ));
    assert!(host.area(&AreaId::new("vault")).await.is_none());
}

#[tokio::test]
async fn test_open_area_slow_start_does_not_block_host() {
    let host = RealmHost::in_memory().build();
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let gated = Gated {
        entered: Some(entered_tx),
        release: Some(release_rx),
    };

    let (opened, (ids, duplicate)) = tokio::join!(
        host.open_area(gated, AreaOptions::with_id("gate")),
        async {
            entered_rx.await.unwrap();
            let ids = timeout(Duration::from_secs(1), host.area_ids()).await;
            let duplicate = timeout(
                Duration::from_secs(1),
                host.open_area(NoHooks::<Visitor>::new(), AreaOptions::with_id("gate")),
            )
            .await;
            release_tx.send(()).unwrap();
            (ids, duplicate)
        }
    );

    assert_eq!(ids.unwrap(), Vec::<AreaId>::new());
    assert!(matches!(
        duplicate.unwrap(),
        Err(RealmError::Area(AreaError::PreconditionFailed(_)))
    ));
    opened.unwrap();
    assert_eq!(host.area_ids().await, vec![AreaId::new("gate")]);
}

#[tokio::test]
async fn test_close_area_saves_and_releases_players() {
    let host = RealmHost::in_memory().build();
    let handle = host
        .open_area(NoHooks::<Visitor>::new(), AreaOptions::with_id("plaza"))
        .await
        .unwrap();
    handle.join(pid("ada")).await.unwrap();
    handle.join(pid("bo")).await.unwrap();

    let document = host.close_area(&AreaId::new("plaza")).await.unwrap();

    assert_eq!(document.area_id, Some(AreaId::new("plaza")));
    assert!(host.area_ids().await.is_empty());
    assert_eq!(host.ledger().owner_of(&pid("ada")).await, None);
    let saved = host.ledger().snapshot(&pid("ada")).await.unwrap();
    assert_eq!(saved.data["visits"], json!(1));
    assert!(!host.groups().group_exists("area:plaza").await);
}

#[tokio::test]
async fn test_players_move_between_areas_after_close() {
    let host = RealmHost::in_memory().build();
    let plaza = host
        .open_area(NoHooks::<Visitor>::new(), AreaOptions::with_id("plaza"))
        .await
        .unwrap();
    let market = host
        .open_area(NoHooks::<Visitor>::new(), AreaOptions::with_id("market"))
        .await
        .unwrap();
    plaza.join(pid("ada")).await.unwrap();

    assert!(matches!(
        market.join(pid("ada")).await,
        Err(AreaError::LockConflict { .. })
    ));

    host.close_area(&AreaId::new("plaza")).await.unwrap();
    market.join(pid("ada")).await.unwrap();

    let saved = host.ledger().snapshot(&pid("ada")).await.unwrap();
    assert_eq!(saved.data["visits"], json!(1));
    assert!(market.has_player(pid("ada")).await.unwrap());
}

#[tokio::test]
async fn test_close_unknown_area_returns_area_not_open() {
    let host = RealmHost::in_memory().build();

    let result = host.close_area(&AreaId::new("nowhere")).await;

    assert!(matches!(result, Err(RealmError::AreaNotOpen(_))));
}

#[tokio::test]
async fn test_shutdown_closes_every_area() {
    let host = RealmHost::in_memory().build();
    for id in ["a", "b", "c"] {
        let handle = host
            .open_area(NoHooks::<Visitor>::new(), AreaOptions::with_id(id))
            .await
            .unwrap();
        handle.join(pid(&format!("{id}-1"))).await.unwrap();
    }

    host.shutdown().await;

    assert!(host.area_ids().await.is_empty());
    assert_eq!(host.ledger().owner_of(&pid("b-1")).await, None);
}
