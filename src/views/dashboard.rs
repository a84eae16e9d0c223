//! Админский дашборд: выручка, проданные билеты, заполняемость по событиям.
//! Рисование графиков: дело UI, здесь только данные для него.

use tracing::error;

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::AdminStats;
use crate::session::SessionManager;

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyBar {
    pub label: String,
    pub sold: i64,
    pub total: i64,
    pub percent: f64,
}

pub struct DashboardView {
    api: ApiClient,
    stats: Option<AdminStats>,
}

impl DashboardView {
    pub fn new(api: ApiClient) -> Self {
        Self { api, stats: None }
    }

    pub fn stats(&self) -> Option<&AdminStats> {
        self.stats.as_ref()
    }

    pub async fn refresh(&mut self, session: &SessionManager) -> Result<&AdminStats> {
        let credentials = session.require_credentials()?;
        let stats = match self.api.admin_stats(&credentials).await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Failed to load admin stats: {}", e);
                session.handle_error(&e).await;
                return Err(e);
            }
        };
        Ok(&*self.stats.insert(stats))
    }

    /// Ряд для графика заполняемости, от самых заполненных к пустым.
    pub fn occupancy(&self) -> Vec<OccupancyBar> {
        let Some(stats) = &self.stats else {
            return Vec::new();
        };
        let mut bars: Vec<OccupancyBar> = stats
            .chart_data
            .iter()
            .map(|point| OccupancyBar {
                label: point.name.clone(),
                sold: point.sold,
                total: point.total,
                percent: point.percent(),
            })
            .collect();
        bars.sort_by(|a, b| b.percent.total_cmp(&a.percent));
        bars
    }
}
