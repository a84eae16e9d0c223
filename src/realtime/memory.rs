//! Транспорт в памяти процесса: «сервер»: это сам вызывающий код.
//! Используется в тестах и в демо-режиме бинарника.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use super::transport::{Inbound, PushChannel, PushTransport, WireEvent};
use crate::error::{ClientError, Result};

#[derive(Default)]
struct Inner {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: Option<mpsc::UnboundedReceiver<WireEvent>>,
    sent: Vec<WireEvent>,
    opens: usize,
    refuse: bool,
}

#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Следующие `open()` будут падать, как при недоступном сервере.
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse = refuse;
    }

    /// Доставить событие клиенту. `false`, если канала нет или его уже закрыли.
    pub fn push(&self, name: &str, data: Value) -> bool {
        let inner = self.lock();
        match &inner.inbound {
            Some(tx) => tx
                .send(Inbound::Event(WireEvent { name: name.to_string(), data }))
                .is_ok(),
            None => false,
        }
    }

    /// Транспорт сам переподключился: канал тот же, серверная сессия новая.
    pub fn reestablish(&self) -> bool {
        let mut inner = self.lock();
        // Что клиент слал в старую сессию, уже записано
        if let Some(rx) = inner.outbound.as_mut() {
            let mut drained = Vec::new();
            while let Ok(event) = rx.try_recv() {
                drained.push(event);
            }
            inner.sent.extend(drained);
        }
        match &inner.inbound {
            Some(tx) => tx.send(Inbound::Reestablished).is_ok(),
            None => false,
        }
    }

    /// Всё, что клиент отправил через текущий и прошлые каналы.
    pub fn sent(&self) -> Vec<WireEvent> {
        let mut inner = self.lock();
        let mut drained = Vec::new();
        if let Some(rx) = inner.outbound.as_mut() {
            while let Ok(event) = rx.try_recv() {
                drained.push(event);
            }
        }
        inner.sent.extend(drained);
        inner.sent.clone()
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Обрыв со стороны сервера: входящая очередь закрывается.
    pub fn drop_connection(&self) {
        self.lock().inbound = None;
    }
}

#[async_trait]
impl PushTransport for MemoryTransport {
    async fn open(&self) -> Result<PushChannel> {
        let mut inner = self.lock();
        if inner.refuse {
            return Err(ClientError::Transport("connection refused".to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        // Хвост прошлого канала сохраняем в журнале
        if let Some(mut old) = inner.outbound.take() {
            while let Ok(event) = old.try_recv() {
                inner.sent.push(event);
            }
        }
        inner.inbound = Some(inbound_tx);
        inner.outbound = Some(outbound_rx);
        inner.opens += 1;

        Ok(PushChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
            driver: None,
        })
    }
}
