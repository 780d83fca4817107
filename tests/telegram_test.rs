use messages::{
    ChannelKind, Deliver, MessageError, MessageFields,
    domain::repositories::NoProfiles,
    infrastructure::messaging::TelegramBot,
};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

fn fields(to: Option<&str>, chat_id: Option<&str>, attachments: &[&str]) -> MessageFields {
    let mut fields = MessageFields {
        from: Some("Bob".into()),
        to: to.map(|handle| vec![handle.to_string()]).unwrap_or_default(),
        subject: Some("Hi".into()),
        body: "Hello".into(),
        attachments: attachments.iter().map(|a| a.to_string()).collect(),
        credentials: Some(SecretString::from("TOKEN")),
        ..Default::default()
    };
    if let Some(chat_id) = chat_id {
        fields.params.insert("chat_id".into(), Value::from(chat_id));
    }
    fields
}

fn bot(server: &MockServer, fields: MessageFields) -> TelegramBot {
    TelegramBot::new(fields, &NoProfiles, Client::new())
        .unwrap()
        .with_base_url(&server.uri())
}

async fn posted_bodies(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path().ends_with(endpoint))
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

#[tokio::test]
async fn one_call_for_body_and_one_per_attachment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendDocument"))
        .and(body_partial_json(json!({"document": "https://files.example/b.pdf"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendDocument"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(2)
        .mount(&server)
        .await;

    let mut bot = bot(
        &server,
        fields(
            None,
            Some("42"),
            &[
                "https://files.example/a.pdf",
                "https://files.example/b.pdf",
                "https://files.example/c.pdf",
            ],
        ),
    );
    bot.send().await.unwrap();

    let documents: Vec<Value> = posted_bodies(&server, "sendDocument")
        .await
        .into_iter()
        .map(|body| body["document"].clone())
        .collect();
    assert_eq!(
        documents,
        vec![
            json!("https://files.example/a.pdf"),
            json!("https://files.example/b.pdf"),
            json!("https://files.example/c.pdf"),
        ]
    );
}

#[tokio::test]
async fn failing_body_call_does_not_abort_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendDocument"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut bot = bot(&server, fields(None, Some("42"), &["https://files.example/a.pdf"]));
    assert!(bot.send().await.is_ok());
}

#[tokio::test]
async fn unknown_handle_sends_with_null_chat_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/botTOKEN/getUpdates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {"update_id": 1, "message": {"from": {"id": 7, "username": "bob"}}},
                {"update_id": 2, "channel_post": {"chat": {"id": -100}}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut bot = bot(&server, fields(Some("alice"), None, &[]));
    bot.send().await.unwrap();

    assert_eq!(bot.chat_id(), None);
    let bodies = posted_bodies(&server, "sendMessage").await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["chat_id"], Value::Null);
    assert_eq!(bodies[0]["text"], "From: Bob\nSubject: Hi\nHello");
}

#[tokio::test]
async fn known_handle_resolves_to_numeric_chat_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/botTOKEN/getUpdates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [{"message": {"from": {"id": 99, "username": "Alice"}}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .and(body_partial_json(json!({"chat_id": 99})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut bot = bot(&server, fields(Some("@alice"), None, &[]));
    bot.send().await.unwrap();
    assert_eq!(bot.chat_id(), Some("99"));
}

#[tokio::test]
async fn failed_lookup_is_a_miss() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/botTOKEN/getUpdates"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let bot = bot(&server, fields(Some("alice"), None, &[]));
    assert_eq!(bot.lookup_chat_id("alice").await, None);
}

#[tokio::test]
async fn missing_credentials_fail_before_any_request() {
    let server = MockServer::start().await;
    let mut fields = fields(None, Some("42"), &["https://files.example/a.pdf"]);
    fields.credentials = None;

    let err = TelegramBot::new(fields, &NoProfiles, Client::new()).err().unwrap();
    assert!(matches!(
        err,
        MessageError::Configuration { channel: ChannelKind::Telegram, .. }
    ));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
