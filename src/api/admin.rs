use super::{ApiClient, Authorized, Credentials};
use crate::error::Result;
use crate::models::AdminStats;

impl ApiClient {
    /// GET /admin/stats
    pub async fn admin_stats(&self, credentials: &Credentials) -> Result<AdminStats> {
        self.send(self.get("/admin/stats")?.authorized(credentials)).await
    }
}
