mod common;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_client::api::Credentials;
use booking_client::models::{BookingStatus, Event};
use booking_client::services::booking_flow::{BookingFlow, BookingState, LOGIN_PROMPT, SOLD_OUT_PROMPT};
use common::{api, booking_json, connected, event_json, StubWidget};

fn event(id: i64, available: u32) -> Event {
    serde_json::from_value(event_json(id, available, 10)).unwrap()
}

fn credentials() -> Credentials {
    Credentials::bearer("token-abc")
}

async fn mount_intent(server: &MockServer, booking_id: i64) {
    Mock::given(method("POST"))
        .and(path("/create-payment-intent"))
        .and(header("authorization", "Bearer token-abc"))
        .and(body_json(json!({"event_id": 1, "seats": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_secret": "pi_123_secret_xyz",
            "booking_id": booking_id,
            "amount": 50.0,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn unauthenticated_submit_prompts_for_login_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let widget = StubWidget::approving();
    let mut flow = BookingFlow::new(api(&server.uri()), widget.clone());

    flow.select(event(1, 5)).unwrap();
    let state = flow.submit(None).await.clone();

    match state {
        BookingState::SeatSelection { prompt, seats, .. } => {
            assert_eq!(prompt.as_deref(), Some(LOGIN_PROMPT));
            assert_eq!(seats, 1);
        }
        other => panic!("unexpected state {}", other.name()),
    }
    assert_eq!(widget.calls(), 0);
}

#[tokio::test]
async fn sold_out_event_cannot_be_submitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let mut flow = BookingFlow::new(api(&server.uri()), StubWidget::approving());

    flow.select(event(1, 0)).unwrap();
    assert!(flow.set_seats(1).is_err());
    let creds = credentials();
    let state = flow.submit(Some(&creds)).await;
    assert!(matches!(
        state,
        BookingState::SeatSelection { prompt: Some(p), .. } if p == SOLD_OUT_PROMPT
    ));
}

#[tokio::test]
async fn successful_payment_confirms_booking() {
    let server = MockServer::start().await;
    mount_intent(&server, 41).await;
    Mock::given(method("POST"))
        .and(path("/confirm-payment/41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "booking": booking_json(41, 1, 2, "paid"),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let widget = StubWidget::approving();
    let mut flow = BookingFlow::new(api(&server.uri()), widget.clone());
    flow.select(event(1, 5)).unwrap();
    flow.set_seats(2).unwrap();

    let creds = credentials();
    match flow.submit(Some(&creds)).await {
        BookingState::Confirmed { booking } => {
            assert_eq!(booking.id, 41);
            assert_eq!(booking.status, BookingStatus::Paid);
        }
        other => panic!("unexpected state {}", other.name()),
    }
    assert_eq!(widget.secrets(), vec!["pi_123_secret_xyz".to_string()]);
}

#[tokio::test]
async fn declined_card_fails_with_processor_message_and_allows_retry() {
    let server = MockServer::start().await;
    mount_intent(&server, 42).await;
    Mock::given(method("POST"))
        .and(path("/confirm-payment/42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let widget = StubWidget::declining("Your card was declined.");
    let mut flow = BookingFlow::new(api(&server.uri()), widget.clone());
    flow.select(event(1, 5)).unwrap();
    flow.set_seats(2).unwrap();

    let creds = credentials();
    match flow.submit(Some(&creds)).await {
        BookingState::Failed { message, seats, .. } => {
            assert_eq!(message, "Your card was declined.");
            assert_eq!(*seats, 2);
        }
        other => panic!("unexpected state {}", other.name()),
    }
    flow.cancel().unwrap();
    assert_eq!(flow.state().name(), "browsing");
}

#[tokio::test]
async fn retry_returns_to_seat_selection_with_the_error_shown() {
    let server = MockServer::start().await;
    mount_intent(&server, 43).await;

    let widget = StubWidget::declining("Your card has insufficient funds.");
    let mut flow = BookingFlow::new(api(&server.uri()), widget.clone());
    flow.select(event(1, 5)).unwrap();
    flow.set_seats(2).unwrap();
    let creds = credentials();
    flow.submit(Some(&creds)).await;

    flow.retry().unwrap();
    match flow.state() {
        BookingState::SeatSelection { prompt, seats, event } => {
            assert_eq!(prompt.as_deref(), Some("Your card has insufficient funds."));
            assert_eq!(*seats, 2);
            assert_eq!(event.available_seats, 5);
        }
        other => panic!("unexpected state {}", other.name()),
    }
    assert!(flow.retry().is_err());
}

#[tokio::test]
async fn pending_confirmation_is_reported_as_failure() {
    let server = MockServer::start().await;
    mount_intent(&server, 44).await;
    Mock::given(method("POST"))
        .and(path("/confirm-payment/44"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "pending"})))
        .mount(&server)
        .await;

    let mut flow = BookingFlow::new(api(&server.uri()), StubWidget::approving());
    flow.select(event(1, 5)).unwrap();
    flow.set_seats(2).unwrap();
    let creds = credentials();

    assert!(matches!(flow.submit(Some(&creds)).await, BookingState::Failed { .. }));
}

#[tokio::test]
async fn backend_rejection_surfaces_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/create-payment-intent"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Not enough seats available"})),
        )
        .mount(&server)
        .await;

    let widget = StubWidget::approving();
    let mut flow = BookingFlow::new(api(&server.uri()), widget.clone());
    flow.select(event(1, 5)).unwrap();
    let creds = credentials();

    match flow.submit(Some(&creds)).await {
        BookingState::Failed { message, .. } => assert_eq!(message, "Not enough seats available"),
        other => panic!("unexpected state {}", other.name()),
    }
    assert_eq!(widget.calls(), 0);
}

#[tokio::test]
async fn seat_count_is_bounded_by_availability() {
    let server = MockServer::start().await;
    let mut flow = BookingFlow::new(api(&server.uri()), StubWidget::approving());
    assert!(flow.set_seats(1).is_err());

    flow.select(event(1, 3)).unwrap();
    assert!(flow.set_seats(0).is_err());
    assert!(flow.set_seats(4).is_err());
    flow.set_seats(3).unwrap();

    flow.refresh_event(&event(1, 2));
    assert!(matches!(flow.state(), BookingState::SeatSelection { seats: 2, .. }));

    flow.cancel().unwrap();
    assert_eq!(flow.state(), &BookingState::Browsing);
}

#[tokio::test]
async fn selected_event_room_is_joined_and_left() {
    let server = MockServer::start().await;
    let (connection, transport) = connected().await;
    let mut flow =
        BookingFlow::new(api(&server.uri()), StubWidget::approving()).with_connection(connection);

    flow.select(event(1, 5)).unwrap();
    flow.cancel().unwrap();
    flow.select(event(2, 5)).unwrap();
    drop(flow);

    let sent: Vec<(String, serde_json::Value)> =
        transport.sent().into_iter().map(|e| (e.name, e.data)).collect();
    assert_eq!(
        sent,
        vec![
            ("join_event_room".to_string(), json!({"event_id": 1})),
            ("leave_event_room".to_string(), json!({"event_id": 1})),
            ("join_event_room".to_string(), json!({"event_id": 2})),
            ("leave_event_room".to_string(), json!({"event_id": 2})),
        ]
    );
}
