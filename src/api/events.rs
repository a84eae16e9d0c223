use validator::Validate;

use super::{ApiClient, Authorized, Credentials};
use crate::error::Result;
use crate::models::{Event, EventsQuery, NewEvent};

impl ApiClient {
    /// GET /events: первая страница размером `page_size`.
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        self.list_events_page(EventsQuery { skip: 0, limit: self.page_size() })
            .await
    }

    pub async fn list_events_page(&self, query: EventsQuery) -> Result<Vec<Event>> {
        self.send(self.get("/events")?.query(&query)).await
    }

    /// GET /events/{id}
    pub async fn get_event(&self, event_id: i64) -> Result<Event> {
        self.send(self.get(&format!("/events/{}", event_id))?).await
    }

    /// POST /events: бэкенд сам разошлёт `new_event` всем подключённым клиентам.
    pub async fn create_event(&self, credentials: &Credentials, event: &NewEvent) -> Result<Event> {
        event.validate()?;
        self.send(self.post("/events")?.authorized(credentials).json(event))
            .await
    }
}
