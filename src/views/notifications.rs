//! notifications.rs
//!
//! Всплывающие уведомления о событиях в реальном времени.
//!
//! Не хранятся и не авторитетны: максимум `capacity` штук на экране, новые
//! сверху, каждое само исчезает через `ttl` по собственному таймеру.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::NotificationConfig;
use crate::realtime::{ConnectionManager, EventKind, OnlineUsers, PushEvent, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    NewEvent,
    Booking,
    SeatUpdate,
    UsersOnline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub category: NotificationCategory,
    pub message: String,
    pub created_at: DateTime<Utc>,
    expires_at: Instant,
}

impl Notification {
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

/// Ограниченный список уведомлений. Время передаётся снаружи.
#[derive(Debug)]
pub struct NotificationCenter {
    items: VecDeque<Notification>,
    capacity: usize,
    ttl: Duration,
    last_id: u64,
}

impl NotificationCenter {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            ttl,
            last_id: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Добавляет уведомление в начало; всё, что не влезло, выпадает с конца.
    pub fn push(
        &mut self,
        category: NotificationCategory,
        message: String,
        now: Instant,
        created_at: DateTime<Utc>,
    ) -> u64 {
        // id из времени создания; при совпадении миллисекунд сдвигаем на единицу
        let candidate = created_at.timestamp_millis().max(0) as u64;
        let id = if candidate > self.last_id { candidate } else { self.last_id + 1 };
        self.last_id = id;

        self.items.push_front(Notification {
            id,
            category,
            message,
            created_at,
            expires_at: now + self.ttl,
        });
        self.items.truncate(self.capacity);
        id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Удаляет всё, чей срок истёк к `now`. Возвращает число удалённых.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.expires_at > now);
        before - self.items.len()
    }

    pub fn visible(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Текст уведомления для push-события. `None`: событие не показывается.
pub fn describe(event: &PushEvent) -> Option<(NotificationCategory, String)> {
    match event {
        PushEvent::NewEvent(created) => Some((
            NotificationCategory::NewEvent,
            format!("New event: {}", created.title),
        )),
        PushEvent::BookingUpdate(update) => {
            let who = update.booked_by.as_deref().unwrap_or("Someone");
            let title = update
                .event_title
                .clone()
                .unwrap_or_else(|| format!("event #{}", update.event_id));
            Some((
                NotificationCategory::Booking,
                format!("{} booked {} seat(s) for {}", who, update.seats_booked, title),
            ))
        }
        PushEvent::SeatsUpdated(update) => {
            let total = update
                .total_seats
                .map(|total| format!("/{}", total))
                .unwrap_or_default();
            Some((
                NotificationCategory::SeatUpdate,
                format!(
                    "Event #{}: {}{} seats available",
                    update.event_id, update.available_seats, total
                ),
            ))
        }
        PushEvent::UsersOnline(online) => Some((
            NotificationCategory::UsersOnline,
            format!("{} user(s) online", online.count),
        )),
        PushEvent::Authenticated { .. } => None,
    }
}

struct Inner {
    center: NotificationCenter,
    online: Option<OnlineUsers>,
    subscriptions: Vec<Subscription>,
    timers: HashMap<u64, JoinHandle<()>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct NotificationsView {
    connection: ConnectionManager,
    inner: Arc<Mutex<Inner>>,
    updates: watch::Sender<Vec<Notification>>,
}

impl NotificationsView {
    pub fn new(connection: ConnectionManager, config: &NotificationConfig) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            connection,
            inner: Arc::new(Mutex::new(Inner {
                center: NotificationCenter::new(config.capacity, config.ttl()),
                online: None,
                subscriptions: Vec::new(),
                timers: HashMap::new(),
            })),
            updates,
        }
    }

    pub fn watch(&self) -> watch::Receiver<Vec<Notification>> {
        self.updates.subscribe()
    }

    /// Видимые уведомления, новые первыми.
    pub fn visible(&self) -> Vec<Notification> {
        let mut inner = lock(&self.inner);
        inner.center.expire(Instant::now());
        inner.center.visible()
    }

    /// Последнее известное число пользователей онлайн.
    pub fn online_users(&self) -> Option<OnlineUsers> {
        lock(&self.inner).online.clone()
    }

    pub fn activate(&self) {
        let mut inner = lock(&self.inner);
        if !inner.subscriptions.is_empty() {
            return;
        }
        inner.subscriptions = [
            EventKind::NewEvent,
            EventKind::BookingUpdate,
            EventKind::SeatsUpdated,
            EventKind::UsersOnline,
        ]
        .into_iter()
        .map(|kind| {
            let shared = self.inner.clone();
            let updates = self.updates.clone();
            self.connection
                .subscribe(kind, move |event| on_push(&shared, &updates, event))
        })
        .collect();
    }

    /// Ручное закрытие: убирает только это уведомление, чужие таймеры не трогает.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut inner = lock(&self.inner);
        let removed = inner.center.dismiss(id);
        if removed {
            self.updates.send_replace(inner.center.visible());
        }
        removed
    }

    pub fn deactivate(&self) {
        let (subscriptions, timers) = {
            let mut inner = lock(&self.inner);
            inner.center.clear();
            inner.online = None;
            (
                std::mem::take(&mut inner.subscriptions),
                std::mem::take(&mut inner.timers),
            )
        };
        drop(subscriptions);
        for (_, timer) in timers {
            timer.abort();
        }
        self.updates.send_replace(Vec::new());
    }
}

impl Drop for NotificationsView {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn on_push(shared: &Arc<Mutex<Inner>>, updates: &watch::Sender<Vec<Notification>>, event: &PushEvent) {
    let Some((category, message)) = describe(event) else {
        return;
    };

    let mut inner = lock(shared);
    if let PushEvent::UsersOnline(online) = event {
        inner.online = Some(online.clone());
    }

    let now = Instant::now();
    let id = inner.center.push(category, message, now, Utc::now());
    inner.center.expire(now);
    let ttl = inner.center.ttl();

    let timer_shared = shared.clone();
    let timer_updates = updates.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        let mut inner = lock(&timer_shared);
        inner.timers.remove(&id);
        if inner.center.dismiss(id) {
            debug!("Notification {} expired", id);
            timer_updates.send_replace(inner.center.visible());
        }
    });
    inner.timers.insert(id, timer);
    updates.send_replace(inner.center.visible());
}
