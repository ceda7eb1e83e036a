use std::sync::atomic::{AtomicU64, Ordering};

use realm::prelude::*;
use serde_json::{Value, json};
use tracing::info;

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Someone hanging around the square. Remembers how often they came by.
struct Resident {
    id: PlayerId,
    visits: AtomicU64,
    events: PlayerEvents,
}

impl Player for Resident {
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
        let visits = self.visits.fetch_add(1, Ordering::Relaxed) + 1;
        info!(player_id = %self.id, visits, "resident arrived");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Area logic
// ---------------------------------------------------------------------------

/// Counts everyone who ever entered, across restarts.
#[derive(Default)]
struct TownSquare {
    visitors: u64,
}

impl AreaLogic for TownSquare {
    type Player = Resident;

    async fn on_join(&mut self, _area_id: &AreaId, _player_id: &PlayerId) -> Result<(), AreaError> {
        self.visitors += 1;
        Ok(())
    }

    async fn on_serialize(
        &mut self,
        _area_id: &AreaId,
        document: &mut AreaDocument,
    ) -> Result<(), AreaError> {
        document.set("visitors", json!(self.visitors));
        Ok(())
    }

    async fn on_deserialize(
        &mut self,
        _area_id: &AreaId,
        document: &AreaDocument,
    ) -> Result<(), AreaError> {
        self.visitors = document.get("visitors").and_then(Value::as_u64).unwrap_or(0);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), RealmError> {
    realm::logging::init("info");

    let host = RealmHost::in_memory().build();
    let square_id = AreaId::new("town-square");
    let square = host
        .open_area(TownSquare::default(), AreaOptions::with_id(square_id.clone()))
        .await?;

    let mut inboxes = Vec::new();
    for name in ["ada", "bo", "cy"] {
        let player_id = PlayerId::new(name);
        square.join(player_id.clone()).await?;
        let (connection, inbox) = host.groups().connect().await;
        square.connect_player(player_id.clone(), connection).await?;
        inboxes.push((player_id, inbox));
    }

    square
        .notify(NotifyTarget::All, "chat", json!({ "from": "ada", "text": "good morning" }))
        .await?;
    square
        .notify(PlayerId::new("bo"), "whisper", json!({ "from": "cy", "text": "meet at the well" }))
        .await?;
    square.disconnect_player(PlayerId::new("cy")).await?;
    square
        .notify(NotifyTarget::All, "chat", json!({ "from": "bo", "text": "where did cy go?" }))
        .await?;

    for (player_id, inbox) in &mut inboxes {
        while let Ok(delivery) = inbox.try_recv() {
            info!(%player_id, route = %delivery.route, message = %delivery.message, "delivered");
        }
    }

    let document = host.close_area(&square_id).await?;
    info!(
        document = %serde_json::to_string(&document).unwrap_or_default(),
        "town square closed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_whisper_reaches_only_its_target() {
        let host = RealmHost::in_memory().build();
        let square = host
            .open_area(TownSquare::default(), AreaOptions::with_id("sq"))
            .await
            .unwrap();
        let mut inboxes = Vec::new();
        for name in ["ada", "bo"] {
            square.join(PlayerId::new(name)).await.unwrap();
            let (connection, inbox) = host.groups().connect().await;
            square.connect_player(PlayerId::new(name), connection).await.unwrap();
            inboxes.push(inbox);
        }

        square
            .notify(PlayerId::new("bo"), "whisper", json!("psst"))
            .await
            .unwrap();

        assert!(inboxes[0].try_recv().is_err());
        assert_eq!(inboxes[1].try_recv().unwrap().message, json!("psst"));
    }

    #[tokio::test]
    async fn test_close_records_visitors_and_visits() {
        let host = RealmHost::in_memory().build();
        let square = host
            .open_area(TownSquare::default(), AreaOptions::with_id("sq"))
            .await
            .unwrap();
        square.join(PlayerId::new("ada")).await.unwrap();
        square.join(PlayerId::new("bo")).await.unwrap();

        let document = host.close_area(&AreaId::new("sq")).await.unwrap();

        assert_eq!(document.get("visitors"), Some(&json!(2)));
        let ada = host.ledger().snapshot(&PlayerId::new("ada")).await.unwrap();
        assert_eq!(ada.data["visits"], json!(1));
    }

    #[tokio::test]
    async fn test_reopened_square_restores_visitor_count() {
        let mut logic = TownSquare::default();
        let mut document = AreaDocument::new();
        document.set("visitors", json!(41));

        logic.on_deserialize(&AreaId::new("sq"), &document).await.unwrap();
        logic.on_join(&AreaId::new("sq"), &PlayerId::new("ada")).await.unwrap();

        assert_eq!(logic.visitors, 42);
    }
}
