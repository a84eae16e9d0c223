use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_client::config::{CircuitBreakerConfig, PaymentConfig};
use booking_client::error::ClientError;
use booking_client::services::payment::{CircuitState, PaymentWidget, ProcessorWidget};

fn widget(server: &MockServer) -> ProcessorWidget {
    ProcessorWidget::from_config(
        &PaymentConfig {
            gateway_url: server.uri(),
            publishable_key: "pk_test_123".to_string(),
            payment_method: "pm_card_visa".to_string(),
        },
        &CircuitBreakerConfig { failure_threshold: 2, timeout_seconds: 60 },
    )
    .unwrap()
}

#[tokio::test]
async fn confirms_intent_with_client_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_42/confirm"))
        .and(header("authorization", "Bearer pk_test_123"))
        .and(body_string_contains("client_secret=pi_42_secret_abc"))
        .and(body_string_contains("payment_method=pm_card_visa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "pi_42", "status": "succeeded"})))
        .expect(1)
        .mount(&server)
        .await;

    widget(&server).confirm("pi_42_secret_abc").await.unwrap();
}

#[tokio::test]
async fn card_error_message_is_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {"type": "card_error", "code": "card_declined", "message": "Your card was declined."}
        })))
        .mount(&server)
        .await;

    let widget = widget(&server);
    for _ in 0..3 {
        let err = widget.confirm("pi_42_secret_abc").await.unwrap_err();
        assert!(matches!(&err, ClientError::Payment(m) if m == "Your card was declined."));
    }
    // Отказ по карте не считается сбоем процессора
    assert_eq!(widget.circuit_state(), CircuitState::Closed);
}

#[tokio::test]
async fn repeated_outages_open_the_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let widget = widget(&server);
    assert!(matches!(widget.confirm("pi_1_secret_x").await, Err(ClientError::Transport(_))));
    assert!(matches!(widget.confirm("pi_1_secret_x").await, Err(ClientError::Transport(_))));
    assert_eq!(widget.circuit_state(), CircuitState::Open);
    assert!(matches!(widget.confirm("pi_1_secret_x").await, Err(ClientError::CircuitOpen)));
}

#[tokio::test]
async fn malformed_secret_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(widget(&server).confirm("garbage").await, Err(ClientError::Payment(_))));
}
