use axum::body::to_bytes;

use super::*;
use crate::state::test_helpers::*;

fn headers_for(ip: &str, ua: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert("x-forwarded-for", ip.parse().unwrap());
    h.insert("user-agent", ua.parse().unwrap());
    h.insert("accept-language", "en-US".parse().unwrap());
    h
}

fn peer(ip: &str) -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::new(ip.parse().unwrap(), 40000))
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn attempts_allowed_up_to_gate_limit() {
    let state = test_app_state();
    let headers = headers_for("203.0.113.9", "UA/1.0");

    for _ in 0..3 {
        let resp = record(State(state.clone()), peer("192.0.2.1"), headers.clone()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = record(State(state.clone()), peer("192.0.2.1"), headers.clone()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(resp).await;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["remaining"], 0);
    assert!(body["reset_at"].as_u64().is_some());
}

#[tokio::test]
async fn status_endpoint_is_read_only() {
    let state = test_app_state();
    let headers = headers_for("203.0.113.9", "UA/1.0");

    for _ in 0..10 {
        let resp = status(State(state.clone()), peer("192.0.2.1"), headers.clone()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let body = body_json(status(State(state.clone()), peer("192.0.2.1"), headers).await).await;
    assert_eq!(body["attempts"], 0);
}

#[tokio::test]
async fn different_user_agent_is_separate_identity() {
    let state = test_app_state();
    let firefox = headers_for("203.0.113.9", "Firefox");
    let chrome = headers_for("203.0.113.9", "Chrome");

    for _ in 0..3 {
        record(State(state.clone()), peer("192.0.2.1"), firefox.clone()).await;
    }
    assert_eq!(
        record(State(state.clone()), peer("192.0.2.1"), firefox).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        record(State(state.clone()), peer("192.0.2.1"), chrome).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn gate_keys_on_transport_address_without_proxy_headers() {
    let mut config = crate::config::LimitConfig::for_tests();
    config.production = true;
    let state = test_app_state_with_config(config);

    for _ in 0..3 {
        record(State(state.clone()), peer("198.51.100.7"), HeaderMap::new()).await;
    }
    // The peer that exhausted the gate is denied; a different peer is not
    // lumped onto the same key.
    assert_eq!(
        record(State(state.clone()), peer("198.51.100.7"), HeaderMap::new()).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        record(State(state.clone()), peer("198.51.100.8"), HeaderMap::new()).await.status(),
        StatusCode::OK
    );
}
