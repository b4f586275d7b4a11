//! Stripe client tests against a mock HTTP server.

use std::time::Duration;

use billing_ops::billing_provider::{ProviderError, StripeClient, SubscriptionProvider};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn subscription_body(price_id: &str) -> serde_json::Value {
    json!({
        "id": "sub_123",
        "object": "subscription",
        "status": "active",
        "items": {
            "object": "list",
            "data": [
                {"id": "si_abc", "object": "subscription_item", "price": {"id": price_id, "currency": "gbp"}}
            ]
        }
    })
}

fn client(server: &MockServer) -> StripeClient {
    StripeClient::new("sk_test_123", server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn retrieves_subscription_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_123"))
        .and(header("authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription_body("price_old")))
        .expect(1)
        .mount(&server)
        .await;

    let subscription = client(&server)
        .retrieve_subscription("sub_123")
        .await
        .unwrap();

    assert_eq!(subscription.id, "sub_123");
    let item = subscription.primary_item().unwrap();
    assert_eq!(item.id, "si_abc");
    assert_eq!(item.price.id, "price_old");
}

#[tokio::test]
async fn price_update_disables_proration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/subscriptions/sub_123"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_string_contains("proration_behavior=none"))
        .and(body_string_contains("items%5B0%5D%5Bid%5D=si_abc"))
        .and(body_string_contains("items%5B0%5D%5Bprice%5D=price_new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription_body("price_new")))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client(&server)
        .update_subscription_item_price("sub_123", "si_abc", "price_new")
        .await
        .unwrap();

    assert_eq!(updated.items[0].price.id, "price_new");
}

#[tokio::test]
async fn stripe_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "message": "No such subscription: 'sub_missing'"
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .retrieve_subscription("sub_missing")
        .await
        .unwrap_err();

    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "No such subscription: 'sub_missing'");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn malformed_success_body_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sub_123"})))
        .mount(&server)
        .await;

    let err = client(&server)
        .retrieve_subscription("sub_123")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}
