// crates/session-client/src/app.rs

//! Console application state.
//!
//! Owns the session for the life of the program: the store is mounted on
//! construction and unmounted (disconnecting) on shutdown. User input
//! arrives as parsed [`ConsoleCommand`]s; everything the server says is
//! printed as it arrives.

use std::collections::HashMap;

use chrono::Local;
use session_core::deck;
use session_core::game::{destinations, KoreanCard};
use session_core::{
    ConnectionId, ConnectionStatus, Connector, GameEvent, GameFeed, GameIntents, GameSnapshot,
    ListenerHandle, Message, Payload, Session, SessionStore, StoreOptions, Subscription,
    TransportEvent,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::commands::{ConsoleCommand, HELP};
use crate::config::ClientConfig;
use crate::nickname::Nickname;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    session: Session,
    store: SessionStore,
    intents: GameIntents,
    feed: GameFeed,
    topics: Vec<Subscription>,
    rooms: HashMap<String, Subscription>,
    error_listener: ListenerHandle,
    api: ApiClient,
    user_id: String,
}

impl App {
    pub fn new(config: &ClientConfig, user_id: String, connector: impl Connector + 'static) -> Self {
        let session = Session::new(config.connection_options(), connector);
        let store = SessionStore::mount(
            session.clone(),
            StoreOptions {
                auto_connect: config.auto_connect,
                identity: Some(user_id.clone()),
            },
        );

        let feed = GameFeed::open(&session, store.snapshot_sink(), print_game_event);

        let topics = [
            destinations::MESSAGES,
            destinations::NOTIFICATIONS,
            destinations::USER_CONNECTED,
            destinations::USER_DISCONNECTED,
        ]
        .into_iter()
        .map(|dest| session.subscribe(dest, print_topic_message))
        .collect();

        let error_listener = session.on_error(|err| {
            say(&format!("connection problem: {err}"));
        });

        info!(user = %user_id, endpoint = %config.websocket_url, "client ready");

        App {
            intents: GameIntents::new(session.clone()),
            session,
            store,
            feed,
            topics,
            rooms: HashMap::new(),
            error_listener,
            api: ApiClient::new(config.api_url.clone()),
            user_id,
        }
    }

    /// Apply a transport event from the network layer.
    pub fn on_transport_event(&self, id: ConnectionId, event: TransportEvent) {
        self.session.handle_event(id, event);
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.store.watch_status()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.store.status()
    }

    pub fn snapshot(&self) -> Option<GameSnapshot> {
        self.store.snapshot()
    }

    pub fn handle(&mut self, cmd: ConsoleCommand) -> Flow {
        debug!(?cmd, "command");
        match cmd {
            ConsoleCommand::Connect => self.store.connect(),
            ConsoleCommand::Disconnect => self.store.disconnect(),
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Start => self.sent(self.intents.start_game()),
            ConsoleCommand::Put(card) => self.sent(self.intents.put_card(&card)),
            ConsoleCommand::Remove(card) => self.sent(self.intents.remove_card(&card)),
            ConsoleCommand::Draw => self.sent(self.intents.draw_deck()),
            ConsoleCommand::Score => self.sent(self.intents.submit_score()),
            ConsoleCommand::Save(input) => self.save_score(&input),
            ConsoleCommand::Say(text) => self.sent(self.intents.say(&text)),
            ConsoleCommand::Join(room) => self.join(room),
            ConsoleCommand::Leave(room) => self.leave(&room),
            ConsoleCommand::Leaderboard(count) => self.fetch_leaderboard(count),
            ConsoleCommand::Deal(count) => {
                let hand = deck::random_hand(count, &mut rand::thread_rng());
                println!("  practice hand: {}", cards(&hand));
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Unmount: drop every subscription and disconnect.
    pub fn shutdown(mut self) {
        self.feed.close();
        for sub in self.topics.drain(..) {
            sub.unsubscribe();
        }
        for (_, sub) in self.rooms.drain() {
            sub.unsubscribe();
        }
        self.error_listener.remove();
        // Dropping the store disconnects.
    }

    fn sent(&self, ok: bool) {
        if !ok {
            say("not connected; try `connect`");
        }
    }

    fn print_status(&self) {
        let info = self.session.connection_info();
        let attempts = self.session.reconnect_attempts();
        say(&format!(
            "{} as {} ({} subscriptions, {} live, {} failed attempts){}",
            self.status(),
            self.user_id,
            self.session.subscription_count(),
            self.session.live_subscription_count(),
            attempts,
            info.map(|i| format!(" via {}", i.endpoint)).unwrap_or_default(),
        ));
        if let Some(snapshot) = self.snapshot() {
            print_snapshot(&snapshot);
        }
    }

    fn save_score(&self, input: &str) {
        let nickname = Nickname::from(input);
        if nickname.is_empty() {
            say("nickname needs letters or digits");
            return;
        }
        let score = self.snapshot().map_or(0, |s| s.total_score);
        self.sent(self.intents.save_leaderboard(nickname.as_str(), score));
    }

    fn join(&mut self, room: String) {
        if self.rooms.contains_key(&room) {
            say(&format!("already in room {room}"));
            return;
        }
        if !self.intents.join_room(&room) {
            self.sent(false);
            return;
        }
        let sub = self.session.subscribe(&destinations::room(&room), print_topic_message);
        self.rooms.insert(room, sub);
    }

    fn leave(&mut self, room: &str) {
        match self.rooms.remove(room) {
            Some(sub) => {
                sub.unsubscribe();
                self.sent(self.intents.leave_room(room));
            }
            None => say(&format!("not in room {room}")),
        }
    }

    fn fetch_leaderboard(&self, count: u32) {
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.leaderboard(count).await {
                Ok(board) if board.ranks.is_empty() => say("leaderboard is empty"),
                Ok(board) => {
                    for entry in board.ranks {
                        println!("  {:>3}. {:<10} {:>6}", entry.rank, entry.user_name, entry.score);
                    }
                }
                Err(e) => say(&format!("leaderboard unavailable: {e}")),
            }
        });
    }
}

/// One timestamped line on stdout.
pub fn say(text: &str) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), text);
}

fn print_game_event(event: GameEvent) {
    match event {
        GameEvent::Snapshot { kind, snapshot } => {
            say(&format!("{kind:?}"));
            print_snapshot(&snapshot);
        }
        GameEvent::LeaderboardSaved(_) => say("score saved to the leaderboard"),
        GameEvent::ServerError(payload) => say(&format!("server error: {}", describe(&payload))),
        GameEvent::Unreadable {
            destination,
            payload,
        } => say(&format!("unexpected data on {destination}: {}", describe(&payload))),
    }
}

fn print_topic_message(msg: &Message) {
    say(&format!("{} {}", msg.destination, describe(&msg.payload)));
}

fn print_snapshot(snapshot: &GameSnapshot) {
    println!(
        "  score {}  deck {}  session {}",
        snapshot.total_score, snapshot.deck_cards_count, snapshot.session_id
    );
    println!("  desk: {}", cards(&snapshot.desk.cards));
    println!("  hand: {}", cards(&snapshot.hand.cards));
}

fn cards(cards: &[KoreanCard]) -> String {
    if cards.is_empty() {
        return "-".to_string();
    }
    cards
        .iter()
        .map(|c| format!("{}[{:?} {} +{}]", c.id, c.card_type, c.value, c.point))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe(payload: &Payload) -> String {
    match payload {
        Payload::Json(v) => v.to_string(),
        Payload::Text(t) => t.clone(),
    }
}
