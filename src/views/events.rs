//! events.rs
//!
//! Экран списка событий: снимок с сервера + применение push-событий.
//!
//! Снимок сходится с сервером только двумя путями: полная загрузка при
//! активации или push-событие с id конкретного события. `seats_updated` для
//! незнакомого id молча отбрасывается.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::Event;
use crate::realtime::{ConnectionManager, EventKind, PushEvent, SeatsUpdate, Subscription};

/// Чистая логика слияния, без ввода-вывода.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventsSnapshot {
    events: Vec<Event>,
}

impl EventsSnapshot {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, event_id: i64) -> Option<&Event> {
        self.events.iter().find(|event| event.id == event_id)
    }

    pub fn replace(&mut self, events: Vec<Event>) {
        self.events = events;
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Новое событие: в начало списка. Дубликаты не отсеиваются.
    pub fn apply_created(&mut self, event: Event) {
        self.events.insert(0, event);
    }

    /// Меняет только присланные поля. `false`, если такого события в снимке нет.
    pub fn apply_seats(&mut self, update: &SeatsUpdate) -> bool {
        let Some(event) = self.events.iter_mut().find(|event| event.id == update.event_id) else {
            return false;
        };
        event.available_seats = update.available_seats;
        if let Some(total) = update.total_seats {
            event.total_seats = total;
        }
        true
    }
}

struct ViewState {
    snapshot: EventsSnapshot,
    subscriptions: Vec<Subscription>,
}

/// Экран «Список событий».
///
/// Методы принимают `&self`, так что экран можно деактивировать, пока
/// загрузка ещё летит. Опоздавший ответ отбрасывается по номеру активации.
pub struct EventsView {
    api: ApiClient,
    connection: ConnectionManager,
    state: Arc<Mutex<ViewState>>,
    generation: Arc<AtomicU64>,
    updates: watch::Sender<Vec<Event>>,
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventsView {
    pub fn new(api: ApiClient, connection: ConnectionManager) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            api,
            connection,
            state: Arc::new(Mutex::new(ViewState {
                snapshot: EventsSnapshot::default(),
                subscriptions: Vec::new(),
            })),
            generation: Arc::new(AtomicU64::new(0)),
            updates,
        }
    }

    /// Приёмник для перерисовки: всегда держит последнее значение списка.
    pub fn watch(&self) -> watch::Receiver<Vec<Event>> {
        self.updates.subscribe()
    }

    pub fn events(&self) -> Vec<Event> {
        lock(&self.state).snapshot.events().to_vec()
    }

    /// Экран подписан и его обработчики всё ещё зарегистрированы в менеджере.
    /// После `ConnectionManager::disconnect()` это уже `false`.
    pub fn is_active(&self) -> bool {
        let state = lock(&self.state);
        !state.subscriptions.is_empty() && state.subscriptions.iter().all(Subscription::is_live)
    }

    /// Загружает список заново и подписывается на `new_event` / `seats_updated`.
    ///
    /// Возвращает `Ok(false)`, если за время загрузки экран успели
    /// деактивировать или активировать повторно: такой ответ не применяется.
    pub async fn activate(&self) -> Result<bool> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // Повторная активация начинает с чистого листа
        let previous = std::mem::take(&mut lock(&self.state).subscriptions);
        drop(previous);

        let events = match self.api.list_events().await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to load events: {}", e);
                // Старый список без подписок уже не сходится с сервером
                let mut state = lock(&self.state);
                if self.generation.load(Ordering::SeqCst) == generation {
                    state.snapshot.clear();
                    self.updates.send_replace(Vec::new());
                }
                return Err(e);
            }
        };

        let mut state = lock(&self.state);
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding stale events response (activation {})", generation);
            return Ok(false);
        }

        info!("Loaded {} events", events.len());
        state.snapshot.replace(events);
        state.subscriptions = vec![
            self.subscribe_created(generation),
            self.subscribe_seats(generation),
        ];
        self.updates.send_replace(state.snapshot.events().to_vec());
        Ok(true)
    }

    /// Отписывается и сбрасывает снимок: следующая активация начнётся с загрузки.
    pub fn deactivate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let subscriptions = {
            let mut state = lock(&self.state);
            state.snapshot.clear();
            std::mem::take(&mut state.subscriptions)
        };
        drop(subscriptions);
        self.updates.send_replace(Vec::new());
    }

    fn subscribe_created(&self, generation: u64) -> Subscription {
        let state = self.state.clone();
        let current = self.generation.clone();
        let updates = self.updates.clone();
        self.connection.subscribe(EventKind::NewEvent, move |event| {
            let PushEvent::NewEvent(created) = event else {
                return;
            };
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            let mut state = lock(&state);
            state.snapshot.apply_created(created.clone());
            updates.send_replace(state.snapshot.events().to_vec());
        })
    }

    fn subscribe_seats(&self, generation: u64) -> Subscription {
        let state = self.state.clone();
        let current = self.generation.clone();
        let updates = self.updates.clone();
        self.connection.subscribe(EventKind::SeatsUpdated, move |event| {
            let PushEvent::SeatsUpdated(update) = event else {
                return;
            };
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            let mut state = lock(&state);
            if state.snapshot.apply_seats(update) {
                updates.send_replace(state.snapshot.events().to_vec());
            } else {
                debug!("seats_updated for unknown event {} ignored", update.event_id);
            }
        })
    }
}

impl Drop for EventsView {
    fn drop(&mut self) {
        let subscriptions = std::mem::take(&mut lock(&self.state).subscriptions);
        drop(subscriptions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn event(id: i64, available: u32) -> Event {
        Event {
            id,
            title: format!("Event {}", id),
            description: None,
            venue: Some("Hall".to_string()),
            date: NaiveDate::from_ymd_opt(2026, 11, 1)
                .unwrap()
                .and_hms_opt(19, 0, 0)
                .unwrap(),
            price: 25.0,
            total_seats: 100,
            available_seats: available,
            created_by: None,
        }
    }

    #[test]
    fn seats_update_touches_only_the_named_event() {
        let mut snapshot = EventsSnapshot::new(vec![event(1, 3), event(2, 3)]);
        let applied = snapshot.apply_seats(&SeatsUpdate {
            event_id: 1,
            available_seats: 2,
            total_seats: None,
        });
        assert!(applied);
        assert_eq!(snapshot.get(1).unwrap().available_seats, 2);
        assert_eq!(snapshot.get(1).unwrap().total_seats, 100);
        assert_eq!(snapshot.get(2).unwrap().available_seats, 3);
    }

    #[test]
    fn created_event_may_duplicate_fetched_one() {
        let mut snapshot = EventsSnapshot::new(vec![event(1, 3)]);
        snapshot.apply_created(event(1, 3));
        assert_eq!(snapshot.events().len(), 2);
    }

    proptest! {
        #[test]
        fn unknown_ids_never_create_entries(
            known in proptest::collection::btree_set(0i64..50, 0..10),
            updates in proptest::collection::vec((0i64..100, 0u32..500), 0..40),
        ) {
            let mut snapshot = EventsSnapshot::new(known.iter().map(|id| event(*id, 10)).collect());
            for (event_id, available) in updates {
                let applied = snapshot.apply_seats(&SeatsUpdate {
                    event_id,
                    available_seats: available,
                    total_seats: None,
                });
                prop_assert_eq!(applied, known.contains(&event_id));
                prop_assert_eq!(snapshot.events().len(), known.len());
            }
        }

        #[test]
        fn created_event_is_always_first(len in 0usize..30, new_id in any::<i64>()) {
            let mut snapshot = EventsSnapshot::new((0..len as i64).map(|id| event(id, 1)).collect());
            snapshot.apply_created(event(new_id, 5));
            prop_assert_eq!(snapshot.events()[0].id, new_id);
            prop_assert_eq!(snapshot.events().len(), len + 1);
        }
    }
}
