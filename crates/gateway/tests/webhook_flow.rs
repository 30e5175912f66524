//! End-to-end inbound flow: signed webhook in, transcript and backend
//! forwarding out, attachments served back over HTTP.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    secrecy::Secret,
    tokio::net::TcpListener,
    waypost_config::{ChannelConfig, StorageConfig},
    waypost_gateway::{AppState, HttpBackend, build_app},
    waypost_whatsapp::{ChannelClient, DispatchSequencer, MediaStore, Transcript, webhook},
};

const APP_SECRET: &str = "meta-app-secret";
const VERIFY_TOKEN: &str = "verify-me";
const BACKEND_SECRET: &str = "backend-secret";
const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

struct TestGateway {
    addr: SocketAddr,
    transcript: Arc<Transcript>,
    uploads: tempfile::TempDir,
}

/// Boot a gateway on an ephemeral port, pointed at a mockito Graph API
/// and a mockito backend webhook.
async fn start_gateway(graph_url: &str, backend_url: &str) -> TestGateway {
    let uploads = tempfile::tempdir().unwrap();

    let channel = ChannelConfig {
        api_url: graph_url.to_owned(),
        phone_number_id: "123456".to_owned(),
        access_token: Secret::new("test-token".to_owned()),
        verify_token: Secret::new(VERIFY_TOKEN.to_owned()),
        app_secret: Some(Secret::new(APP_SECRET.to_owned())),
        ..ChannelConfig::default()
    };
    let storage = StorageConfig {
        uploads_dir: uploads.path().to_path_buf(),
        public_base_url: "http://localhost:3000".to_owned(),
    };

    let client = ChannelClient::new(&channel).unwrap();
    let transcript = Arc::new(Transcript::new());
    let media = Arc::new(MediaStore::new(client.clone(), &storage));
    let sequencer = Arc::new(DispatchSequencer::new(
        Arc::new(client),
        Arc::clone(&transcript),
        8,
    ));
    let sink = Arc::new(
        HttpBackend::new(
            backend_url.to_owned(),
            Some(Secret::new(BACKEND_SECRET.to_owned())),
        )
        .unwrap(),
    );

    let state = AppState {
        sequencer,
        media,
        transcript: Arc::clone(&transcript),
        sink,
        channel: Arc::new(channel),
        storage: Arc::new(storage),
        version: "test".to_owned(),
    };

    let app = build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    TestGateway {
        addr,
        transcript,
        uploads,
    }
}

/// POST a webhook payload with a valid signature.
async fn post_signed(addr: SocketAddr, payload: &serde_json::Value) -> reqwest::Response {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = webhook::sign_payload(&body, APP_SECRET);
    reqwest::Client::new()
        .post(format!("http://{addr}/webhook"))
        .header("content-type", "application/json")
        .header("x-hub-signature-256", signature)
        .body(body)
        .send()
        .await
        .unwrap()
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within one second");
}

fn text_payload(body: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "102290129340398",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550001111",
                        "phone_number_id": "123456"
                    },
                    "contacts": [{
                        "profile": { "name": "Ada" },
                        "wa_id": "15551234567"
                    }],
                    "messages": [{
                        "from": "15551234567",
                        "id": "wamid.text1",
                        "timestamp": "1714656000",
                        "type": "text",
                        "text": { "body": body }
                    }]
                }
            }]
        }]
    })
}

#[tokio::test]
async fn subscription_handshake_echoes_challenge() {
    let gateway = start_gateway("http://127.0.0.1:9", "http://127.0.0.1:9").await;

    let resp = reqwest::get(format!(
        "http://{}/webhook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1158201444",
        gateway.addr
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "1158201444");

    let resp = reqwest::get(format!(
        "http://{}/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1158201444",
        gateway.addr
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn rejects_unsigned_and_missigned_posts() {
    let gateway = start_gateway("http://127.0.0.1:9", "http://127.0.0.1:9").await;
    let body = serde_json::to_vec(&text_payload("hi")).unwrap();
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/webhook", gateway.addr))
        .header("content-type", "application/json")
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("http://{}/webhook", gateway.addr))
        .header("content-type", "application/json")
        .header("x-hub-signature-256", "sha256=deadbeef")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid signature");

    assert!(gateway.transcript.is_empty());
}

#[tokio::test]
async fn malformed_payload_is_400() {
    let gateway = start_gateway("http://127.0.0.1:9", "http://127.0.0.1:9").await;
    let body = b"not json at all".to_vec();
    let signature = webhook::sign_payload(&body, APP_SECRET);

    let resp = reqwest::Client::new()
        .post(format!("http://{}/webhook", gateway.addr))
        .header("content-type", "application/json")
        .header("x-hub-signature-256", signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn text_message_reaches_transcript_and_backend() {
    let mut backend = mockito::Server::new_async().await;
    let forwarded = backend
        .mock("POST", "/inbound")
        .match_header("x-hub-signature-256", mockito::Matcher::Regex("^sha256=".into()))
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "message_id": "wamid.text1",
            "from": "15551234567",
            "sender_name": "Ada",
            "text": "hello gateway",
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let gateway = start_gateway("http://127.0.0.1:9", &format!("{}/inbound", backend.url())).await;

    let resp = post_signed(gateway.addr, &text_payload("hello gateway")).await;
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "received");

    let transcript = Arc::clone(&gateway.transcript);
    wait_until(move || transcript.len() == 1).await;
    forwarded.assert_async().await;

    let resp = reqwest::get(format!("http://{}/transcript", gateway.addr))
        .await
        .unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["conversation"][0]["sender"], "User");
    assert_eq!(json["conversation"][0]["message"], "hello gateway");
}

#[tokio::test]
async fn image_message_round_trips_through_uploads() {
    let mut graph = mockito::Server::new_async().await;
    let graph_url = graph.url();
    let metadata = graph
        .mock("GET", "/v20.0/MEDIA123")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "url": format!("{graph_url}/signed/abc"),
                "mime_type": "image/jpeg",
                "file_size": JPEG_BYTES.len(),
                "id": "MEDIA123"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let binary = graph
        .mock("GET", "/signed/abc")
        .with_status(200)
        .with_body(JPEG_BYTES)
        .expect(1)
        .create_async()
        .await;

    let mut backend = mockito::Server::new_async().await;
    let forwarded = backend
        .mock("POST", "/inbound")
        .match_body(mockito::Matcher::Regex(
            r#""media_url":"http://localhost:3000/uploads/whatsapp_\d+\.jpg""#.into(),
        ))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let gateway = start_gateway(&graph_url, &format!("{}/inbound", backend.url())).await;

    let payload = serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "102290129340398",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550001111",
                        "phone_number_id": "123456"
                    },
                    "contacts": [{
                        "profile": { "name": "Ada" },
                        "wa_id": "15551234567"
                    }],
                    "messages": [{
                        "from": "15551234567",
                        "id": "wamid.img1",
                        "timestamp": "1714656001",
                        "type": "image",
                        "image": {
                            "id": "MEDIA123",
                            "mime_type": "image/jpeg",
                            "caption": "look at this"
                        }
                    }]
                }
            }]
        }]
    });
    let resp = post_signed(gateway.addr, &payload).await;
    assert_eq!(resp.status(), 200);

    let transcript = Arc::clone(&gateway.transcript);
    wait_until(move || transcript.len() == 1).await;
    metadata.assert_async().await;
    binary.assert_async().await;
    forwarded.assert_async().await;

    // The transcript shows the caption; the stored file is served back
    // with the right content type.
    let entries = gateway.transcript.entries();
    assert_eq!(entries[0].message, "look at this");

    let stored: Vec<_> = std::fs::read_dir(gateway.uploads.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].starts_with("whatsapp_") && stored[0].ends_with(".jpg"));

    let resp = reqwest::get(format!("http://{}/uploads/{}", gateway.addr, stored[0]))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), JPEG_BYTES);
}

#[tokio::test]
async fn uploads_reject_traversal_names() {
    let gateway = start_gateway("http://127.0.0.1:9", "http://127.0.0.1:9").await;

    // Encoded slashes and dotted names must not reach the filesystem.
    let resp = reqwest::get(format!(
        "http://{}/uploads/..%2F..%2Fetc%2Fpasswd",
        gateway.addr
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = reqwest::get(format!("http://{}/uploads/.hidden", gateway.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = reqwest::get(format!("http://{}/uploads/missing.jpg", gateway.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
