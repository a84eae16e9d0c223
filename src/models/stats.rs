use serde::{Deserialize, Serialize};

/// Одна точка графика заполняемости на дашборде.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyPoint {
    pub name: String,
    pub sold: i64,
    pub total: i64,
}

impl OccupancyPoint {
    /// Процент проданных мест, 0 для события без мест.
    pub fn percent(&self) -> f64 {
        if self.total <= 0 {
            return 0.0;
        }
        self.sold as f64 * 100.0 / self.total as f64
    }
}

/// Ответ `GET /admin/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub revenue: f64,
    pub tickets_sold: i64,
    pub chart_data: Vec<OccupancyPoint>,
}
