//! Canned Imgur responses and detector wiring for wiremock servers.

#![allow(dead_code)]

use imgdetect_core::{DetectorConfig, ImgurDetector};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "test-client";

/// Config pointing both Imgur endpoints at `server`.
pub fn config_for(server: &MockServer, backoff_initial_ms: u64) -> DetectorConfig {
    DetectorConfig {
        api_base_url: format!("{}/3", server.uri()),
        image_base_url: server.uri(),
        connect_timeout_secs: 5,
        read_timeout_secs: 5,
        backoff_initial_ms,
        ..DetectorConfig::with_client_id(CLIENT_ID)
    }
}

pub async fn connect(server: &MockServer, backoff_initial_ms: u64) -> ImgurDetector {
    ImgurDetector::connect(&config_for(server, backoff_initial_ms))
        .await
        .expect("client builds")
}

pub fn credits_body(remaining: i64) -> Value {
    json!({
        "data": {
            "UserLimit": 500,
            "UserRemaining": 500,
            "ClientLimit": 12500,
            "ClientRemaining": remaining
        },
        "success": true,
        "status": 200
    })
}

pub fn album_body(images: &[(&str, &str)]) -> Value {
    let images: Vec<Value> = images
        .iter()
        .map(|(link, mime)| json!({ "id": "x", "type": mime, "link": link, "animated": false }))
        .collect();
    json!({
        "data": { "id": "album", "images_count": images.len(), "images": images },
        "success": true,
        "status": 200
    })
}

/// Mounts a credits endpoint reporting `remaining` client requests.
pub async fn mount_credits(server: &MockServer, remaining: i64) {
    Mock::given(method("GET"))
        .and(path("/3/credits"))
        .and(header("Authorization", format!("Client-ID {CLIENT_ID}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(credits_body(remaining)))
        .mount(server)
        .await;
}

/// Mounts the direct-image answer for a `.jpg` guess of `id`.
pub async fn mount_image(server: &MockServer, id: &str, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{id}.jpg")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", content_type)
                .set_body_bytes(vec![0u8; 64]),
        )
        .mount(server)
        .await;
}
