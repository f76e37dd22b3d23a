//! Card game payloads, destinations and the typed layer over a session.
//!
//! [`GameIntents`] turns user intents into publishes; [`GameFeed`]
//! subscribes the per-user queues and turns inbound frames back into
//! typed [`GameEvent`]s.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::messages::{Message, Payload};
use crate::session::{Session, Subscription};
use crate::store::SnapshotSink;

/// Destination paths used by the game server.
pub mod destinations {
    pub const START_GAME: &str = "/app/game/start";
    pub const DESK: &str = "/app/game/desk";
    pub const DRAW_DECK: &str = "/app/game/draw";
    pub const SUBMIT_SCORE: &str = "/app/game/score";
    pub const SAVE_LEADERBOARD: &str = "/leaderboard/save";

    pub const SEND_MESSAGE: &str = "/app/sendMessage";
    pub const JOIN_ROOM: &str = "/app/joinRoom";
    pub const LEAVE_ROOM: &str = "/app/leaveRoom";

    pub const GAME_QUEUE: &str = "/user/queue/game";
    pub const DESK_QUEUE: &str = "/user/queue/game/desk";
    pub const DRAW_QUEUE: &str = "/user/queue/game/draw";
    pub const SCORE_QUEUE: &str = "/user/queue/game/score";
    pub const LEADERBOARD_SAVE_QUEUE: &str = "/user/queue/leaderboard/save";
    pub const ERROR_QUEUE: &str = "/queue/errors";

    pub const MESSAGES: &str = "/topic/messages";
    pub const USER_CONNECTED: &str = "/topic/user-connected";
    pub const USER_DISCONNECTED: &str = "/topic/user-disconnected";
    pub const NOTIFICATIONS: &str = "/topic/notifications";

    pub fn room(room_id: &str) -> String {
        format!("/topic/room/{room_id}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardType {
    Vowel,
    Consonant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KoreanCard {
    pub id: String,
    pub card_type: CardType,
    /// Two-digit glyph code, e.g. "01".
    pub value: String,
    pub point: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPile {
    #[serde(default)]
    pub cards: Vec<KoreanCard>,
}

/// Server view of one player's game: the body of the game-start, desk and
/// draw responses, which share one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub desk: CardPile,
    #[serde(default)]
    pub deck_cards_count: u32,
    #[serde(default)]
    pub hand: CardPile,
    #[serde(default)]
    pub total_score: i64,
    #[serde(default)]
    pub last_modified_at: String,
}

impl GameSnapshot {
    pub fn find_in_hand(&self, card_id: &str) -> Option<&KoreanCard> {
        self.hand.cards.iter().find(|c| c.id == card_id)
    }

    pub fn find_on_desk(&self, card_id: &str) -> Option<&KoreanCard> {
        self.desk.cards.iter().find(|c| c.id == card_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeskAction {
    Put,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeskRequest {
    #[serde(rename = "type")]
    pub action: DeskAction,
    pub card_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_name: String,
    pub score: i64,
    #[serde(default)]
    pub rank: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    #[serde(default)]
    pub ranks: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveScoreRequest<'a> {
    user_name: &'a str,
    score: i64,
}

/// Publishing side of the game. Every method returns whether the intent
/// was written, `false` meaning "not connected".
#[derive(Clone)]
pub struct GameIntents {
    session: Session,
}

impl GameIntents {
    pub fn new(session: Session) -> Self {
        GameIntents { session }
    }

    pub fn start_game(&self) -> bool {
        self.session.publish_json(destinations::START_GAME, &json!({}))
    }

    pub fn put_card(&self, card_id: &str) -> bool {
        self.desk(DeskAction::Put, card_id)
    }

    pub fn remove_card(&self, card_id: &str) -> bool {
        self.desk(DeskAction::Remove, card_id)
    }

    fn desk(&self, action: DeskAction, card_id: &str) -> bool {
        let request = DeskRequest {
            action,
            card_id: card_id.to_string(),
        };
        self.session.publish_json(destinations::DESK, &request)
    }

    pub fn draw_deck(&self) -> bool {
        self.session.publish_json(destinations::DRAW_DECK, &json!({}))
    }

    pub fn submit_score(&self) -> bool {
        self.session.publish_json(destinations::SUBMIT_SCORE, &json!({}))
    }

    pub fn save_leaderboard(&self, user_name: &str, score: i64) -> bool {
        self.session
            .publish_json(destinations::SAVE_LEADERBOARD, &SaveScoreRequest { user_name, score })
    }

    pub fn say(&self, content: &str) -> bool {
        self.session
            .publish_json(destinations::SEND_MESSAGE, &json!({ "content": content }))
    }

    pub fn join_room(&self, room_id: &str) -> bool {
        self.session
            .publish_json(destinations::JOIN_ROOM, &json!({ "roomId": room_id }))
    }

    pub fn leave_room(&self, room_id: &str) -> bool {
        self.session
            .publish_json(destinations::LEAVE_ROOM, &json!({ "roomId": room_id }))
    }
}

/// Which server response a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Started,
    Desk,
    Drawn,
    Scored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Snapshot { kind: SnapshotKind, snapshot: GameSnapshot },
    LeaderboardSaved(Payload),
    ServerError(Payload),
    /// A frame whose body did not have the expected shape.
    Unreadable { destination: String, payload: Payload },
}

/// Subscriptions for the per-user game queues.
///
/// Every decoded snapshot is recorded in the store before the event is
/// forwarded. Dropping the feed leaves the subscriptions registered; call
/// [`GameFeed::close`].
pub struct GameFeed {
    subscriptions: Vec<Subscription>,
}

impl GameFeed {
    pub fn open<F>(session: &Session, sink: SnapshotSink, on_event: F) -> Self
    where
        F: FnMut(GameEvent) + 'static,
    {
        let on_event = std::rc::Rc::new(std::cell::RefCell::new(on_event));
        let mut subscriptions = Vec::new();

        let snapshot_queues = [
            (destinations::GAME_QUEUE, SnapshotKind::Started),
            (destinations::DESK_QUEUE, SnapshotKind::Desk),
            (destinations::DRAW_QUEUE, SnapshotKind::Drawn),
            (destinations::SCORE_QUEUE, SnapshotKind::Scored),
        ];
        for (destination, kind) in snapshot_queues {
            let sink = sink.clone();
            let on_event = on_event.clone();
            subscriptions.push(session.subscribe(destination, move |msg: &Message| {
                let event = match msg.payload.parse::<GameSnapshot>() {
                    Some(snapshot) => {
                        debug!(?kind, deck = snapshot.deck_cards_count, "game snapshot");
                        sink.record(snapshot.clone());
                        GameEvent::Snapshot { kind, snapshot }
                    }
                    None => {
                        warn!(destination = %msg.destination, "snapshot did not decode");
                        GameEvent::Unreadable {
                            destination: msg.destination.clone(),
                            payload: msg.payload.clone(),
                        }
                    }
                };
                (&mut *on_event.borrow_mut())(event);
            }));
        }

        let forward = on_event.clone();
        subscriptions.push(session.subscribe(destinations::LEADERBOARD_SAVE_QUEUE, move |msg: &Message| {
            (&mut *forward.borrow_mut())(GameEvent::LeaderboardSaved(msg.payload.clone()));
        }));

        let forward = on_event;
        subscriptions.push(session.subscribe(destinations::ERROR_QUEUE, move |msg: &Message| {
            (&mut *forward.borrow_mut())(GameEvent::ServerError(msg.payload.clone()));
        }));

        GameFeed { subscriptions }
    }

    pub fn close(&self) {
        for sub in &self.subscriptions {
            sub.unsubscribe();
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
