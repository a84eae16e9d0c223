//! realtime
//!
//! Менеджер push-соединения. Единственный владелец транспорта: остальной код
//! подписывается на `EventKind` и получает `Subscription`, а объявления
//! (`authenticate`, комнаты событий) отправляет через методы менеджера.
//!
//! Все обработчики вызываются по очереди из одной задачи-насоса, в порядке
//! прихода событий. Регистрация обработчиков живёт в менеджере, а не в
//! транспорте, поэтому переподключение её не трогает.
//!
//! Менеджер помнит, кем клиент представился и в какие комнаты вошёл, и
//! повторяет это в каждой новой серверной сессии: после `connect()` и после
//! того, как транспорт сам поднял соединение заново.

pub mod codec;
pub mod events;
pub mod memory;
pub mod transport;

pub use events::{Announcement, BookingUpdate, EventKind, OnlineUsers, PushEvent, SeatsUpdate};
pub use memory::MemoryTransport;
pub use transport::{Inbound, PushChannel, PushTransport, WireEvent, WsTransport};

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::Result;

pub type Handler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

struct Link {
    generation: u64,
    outbound: mpsc::UnboundedSender<WireEvent>,
    pump: JoinHandle<()>,
    driver: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct State {
    link: Option<Link>,
    handlers: HashMap<EventKind, Vec<(u64, Handler)>>,
    next_id: u64,
    generation: u64,
    identity: Option<String>,
    rooms: BTreeSet<i64>,
}

impl State {
    fn standing_announcements(&self) -> Vec<Announcement> {
        let mut announcements: Vec<Announcement> = self
            .identity
            .iter()
            .map(|username| Announcement::Authenticate { username: username.clone() })
            .collect();
        announcements.extend(
            self.rooms
                .iter()
                .map(|&event_id| Announcement::JoinEventRoom { event_id }),
        );
        announcements
    }

    // Повтор объявлений в свежую сессию
    fn replay(&self) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        for announcement in self.standing_announcements() {
            debug!("Replaying '{}'", announcement.wire_name());
            send(link, &announcement);
        }
    }
}

fn send(link: &Link, announcement: &Announcement) {
    let event = WireEvent {
        name: announcement.wire_name().to_string(),
        data: announcement.payload(),
    };
    if link.outbound.send(event).is_err() {
        debug!("Transport gone, dropping '{}'", announcement.wire_name());
    }
}

struct Shared {
    state: Mutex<State>,
    // Сериализует конкурирующие connect(), чтобы не открыть два канала
    connecting: tokio::sync::Mutex<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: &PushEvent) {
        let kind = event.kind();
        // Копируем список и отпускаем блокировку: обработчик может сам (от)писываться
        let handlers: Vec<Handler> = self
            .lock()
            .handlers
            .get(&kind)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        if let PushEvent::Authenticated { username } = event {
            info!("Push connection bound to user {}", username);
        }
        trace!("Dispatching '{}' to {} handler(s)", kind, handlers.len());
        for handler in handlers {
            handler(event);
        }
    }

    fn has_handler(&self, kind: EventKind, id: u64) -> bool {
        self.lock()
            .handlers
            .get(&kind)
            .is_some_and(|list| list.iter().any(|(handler_id, _)| *handler_id == id))
    }

    fn remove_handler(&self, kind: EventKind, id: u64) {
        let mut state = self.lock();
        if let Some(list) = state.handlers.get_mut(&kind) {
            list.retain(|(handler_id, _)| *handler_id != id);
            if list.is_empty() {
                state.handlers.remove(&kind);
            }
        }
    }
}

/// Хэндл подписки. Отписка: `cancel()` или просто drop.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    shared: Weak<Shared>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// `false`, если обработчик уже снят, например `disconnect()` менеджера.
    pub fn is_live(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.has_handler(self.kind, self.id))
    }

    pub fn cancel(self) {
        // Вся работа в Drop
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.remove_handler(self.kind, self.id);
        }
    }
}

#[derive(Clone)]
pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self {
            transport,
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                connecting: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().link.is_some()
    }

    /// Открывает соединение. Повторный вызов при живом соединении ничего не делает.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.shared.connecting.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let channel = self.transport.open().await?;

        let mut state = self.shared.lock();
        state.generation += 1;
        let generation = state.generation;
        let pump = tokio::spawn(pump(Arc::downgrade(&self.shared), generation, channel.inbound));
        state.link = Some(Link {
            generation,
            outbound: channel.outbound,
            pump,
            driver: channel.driver,
        });
        state.replay();
        info!("Connection manager online (generation {})", generation);
        Ok(())
    }

    /// Закрывает соединение и забывает подписки, имя пользователя и комнаты.
    pub fn disconnect(&self) {
        let link = {
            let mut state = self.shared.lock();
            state.handlers.clear();
            state.identity = None;
            state.rooms.clear();
            state.link.take()
        };
        if let Some(link) = link {
            link.pump.abort();
            // Закрытие outbound само остановит транспорт; драйвер не прерываем,
            // чтобы он успел закрыть сокет
            drop(link.outbound);
            drop(link.driver);
            info!("Connection manager offline");
        }
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let mut state = self.shared.lock();
        let id = state.next_id;
        state.next_id += 1;
        state
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        debug!("Subscribed to '{}' (#{})", kind, id);

        Subscription {
            shared: Arc::downgrade(&self.shared),
            kind,
            id,
        }
    }

    /// Снимает все обработчики данного вида.
    pub fn unsubscribe(&self, kind: EventKind) {
        if self.shared.lock().handlers.remove(&kind).is_some() {
            debug!("Removed all handlers for '{}'", kind);
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.shared
            .lock()
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Отправляет объявление; без соединения: тихо выбрасывает.
    pub fn announce(&self, announcement: Announcement) {
        let state = self.shared.lock();
        let Some(link) = state.link.as_ref() else {
            debug!("Not connected, dropping '{}'", announcement.wire_name());
            return;
        };
        send(link, &announcement);
    }

    /// Представляется серверу. Имя запоминается и повторяется после переподключений.
    pub fn authenticate(&self, username: &str) {
        self.shared.lock().identity = Some(username.to_string());
        self.announce(Announcement::Authenticate { username: username.to_string() });
    }

    /// Забыть имя пользователя (logout). Текущей сессии сервер об этом не узнаёт.
    pub fn forget_identity(&self) {
        self.shared.lock().identity = None;
    }

    pub fn identity(&self) -> Option<String> {
        self.shared.lock().identity.clone()
    }

    pub fn join_event_room(&self, event_id: i64) {
        self.shared.lock().rooms.insert(event_id);
        self.announce(Announcement::JoinEventRoom { event_id });
    }

    pub fn leave_event_room(&self, event_id: i64) {
        self.shared.lock().rooms.remove(&event_id);
        self.announce(Announcement::LeaveEventRoom { event_id });
    }
}

async fn pump(shared: Weak<Shared>, generation: u64, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
    while let Some(message) = inbound.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let wire = match message {
            Inbound::Event(wire) => wire,
            Inbound::Reestablished => {
                info!("Push session re-established, repeating announcements");
                let state = shared.lock();
                if state.link.as_ref().map(|link| link.generation) == Some(generation) {
                    state.replay();
                }
                continue;
            }
        };
        match PushEvent::from_wire(&wire.name, wire.data) {
            Ok(Some(event)) => shared.dispatch(&event),
            Ok(None) => trace!("Ignoring push event '{}'", wire.name),
            Err(e) => warn!("Dropping malformed '{}' payload: {}", wire.name, e),
        }
    }

    warn!("Push connection closed by transport");
    if let Some(shared) = shared.upgrade() {
        let mut state = shared.lock();
        if state.link.as_ref().map(|link| link.generation) == Some(generation) {
            state.link = None;
        }
    }
}
