pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod realtime;
pub mod services;
pub mod session;
pub mod views;

use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::realtime::{ConnectionManager, PushTransport, WsTransport};
use crate::services::booking_flow::BookingFlow;
use crate::services::payment::{PaymentWidget, ProcessorWidget};
use crate::session::{FileTokenStore, SessionManager, TokenStore};
use crate::views::{BookingsView, EventsView, NotificationsView};

// Общее состояние клиента: всё, что экраны получают через конструктор
pub struct App {
    pub config: Config,
    pub api: ApiClient,
    pub connection: ConnectionManager,
    pub session: SessionManager,
    pub payments: Arc<dyn PaymentWidget>,
}

impl App {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let api = ApiClient::from_config(&config.api)?;
        let transport: Arc<dyn PushTransport> = Arc::new(WsTransport::from_config(&config.realtime)?);
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.session.token_path));
        let payments: Arc<dyn PaymentWidget> =
            Arc::new(ProcessorWidget::from_config(&config.payment, &config.circuit_breaker)?);
        Self::with_parts(config, api, transport, store, payments).await
    }

    /// Сборка из готовых частей: тесты подставляют свои транспорт, хранилище и виджет.
    pub async fn with_parts(
        config: Config,
        api: ApiClient,
        transport: Arc<dyn PushTransport>,
        store: Arc<dyn TokenStore>,
        payments: Arc<dyn PaymentWidget>,
    ) -> Result<Arc<Self>> {
        let connection = ConnectionManager::new(transport);
        if let Err(e) = connection.connect().await {
            warn!("Push connection unavailable, live updates paused: {}", e);
            spawn_connect_retry(connection.clone(), config.realtime.reconnect_base_delay(), config.realtime.reconnect_max_delay());
        }

        let session = SessionManager::new(api.clone(), store, connection.clone());
        match session.restore().await {
            Ok(Some(user)) => info!("Session restored for {}", user.display_name()),
            Ok(None) => info!("No stored session"),
            Err(e) => warn!("Stored session could not be restored: {}", e),
        }

        Ok(Arc::new(Self {
            config,
            api,
            connection,
            session,
            payments,
        }))
    }

    pub fn events_view(&self) -> EventsView {
        EventsView::new(self.api.clone(), self.connection.clone())
    }

    pub fn notifications_view(&self) -> NotificationsView {
        NotificationsView::new(self.connection.clone(), &self.config.notifications)
    }

    pub fn bookings_view(&self) -> BookingsView {
        BookingsView::new(self.api.clone())
    }

    #[cfg(feature = "admin")]
    pub fn dashboard_view(&self) -> views::DashboardView {
        views::DashboardView::new(self.api.clone())
    }

    pub fn booking_flow(&self) -> BookingFlow {
        BookingFlow::new(self.api.clone(), self.payments.clone())
            .with_connection(self.connection.clone())
    }
}

// Первое подключение не удалось: пробуем в фоне, пока не получится
fn spawn_connect_retry(connection: ConnectionManager, base: Duration, max: Duration) {
    task::spawn(async move {
        let mut delay = base;
        loop {
            tokio::time::sleep(delay).await;
            match connection.connect().await {
                Ok(()) => {
                    info!("Push connection established after retry");
                    return;
                }
                Err(e) => {
                    warn!("Push connection retry failed: {}", e);
                    delay = (delay * 2).min(max);
                }
            }
        }
    });
}
