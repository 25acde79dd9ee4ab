//! Service tests: secure channel codec, credential store, chat relay.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::Engine as _;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use chrono::DateTime;
    use futures_util::future::BoxFuture;
    use parking_lot::Mutex;
    use runtime_protocol::chat::{ChatParams, ChatResult};
    use runtime_protocol::*;
    use runtime_services::auth::BUILDER_ID_START_URL;
    use runtime_services::encryption::{EncryptionError, decrypt_claims_at, decrypt_jwt_at, encrypt_object};
    use runtime_services::*;
    use runtime_transport::{ClientChannel, TransportError};
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    /// In-memory client: answers every request with `reply` and records
    /// everything sent to it.
    struct FakeClient {
        reply: HandlerResult,
        requests: Mutex<Vec<String>>,
        notifications: Mutex<Vec<(String, Option<Value>)>>,
    }

    impl FakeClient {
        fn replying(reply: HandlerResult) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
                notifications: Mutex::new(Vec::new()),
            })
        }
    }

    impl ClientChannel for FakeClient {
        fn send_request<'a>(&'a self, method: &'a str, _params: Option<Value>) -> BoxFuture<'a, HandlerResult> {
            self.requests.lock().push(method.to_string());
            let reply = self.reply.clone();
            Box::pin(async move { reply })
        }

        fn send_notification(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
            self.notifications.lock().push((method.to_string(), params));
            Ok(())
        }
    }

    fn key() -> Arc<EncryptionKey> {
        Arc::new(EncryptionKey::from_bytes([7u8; 32]))
    }

    fn auth_with(client: Arc<FakeClient>, key: Option<Arc<EncryptionKey>>) -> Arc<Auth> {
        let telemetry = Telemetry::new(client.clone());
        Auth::new(client, telemetry, key)
    }

    fn update(data: Value) -> UpdateCredentialsParams {
        UpdateCredentialsParams { data, encrypted: None, metadata: None }
    }

    fn encrypted_update(token: String) -> UpdateCredentialsParams {
        UpdateCredentialsParams { data: Value::String(token), encrypted: Some(true), metadata: None }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Secure channel codec
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn encrypt_then_decrypt_returns_original() {
        let key = key();
        let value = json!({ "nested": { "list": [1, "two", null] }, "unicode": "héllo" });
        let token = encrypt_object_with_key(&value, &key).unwrap();
        let back: Value = decrypt_object_with_key(&token, &key).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn token_is_compact_dir_jwe() {
        let token = encrypt_object_with_key(&json!({}), &key()).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 5);
        assert!(segments[1].is_empty());
        assert_eq!(URL_SAFE_NO_PAD.decode(segments[2]).unwrap().len(), 12);

        let header: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[0]).unwrap()).unwrap();
        assert_eq!(header, json!({ "alg": "dir", "enc": "A256GCM" }));
        assert!(is_message_jwe_encrypted(&token, "dir", "A256GCM"));
    }

    #[test]
    fn decrypt_with_other_key_fails() {
        let token = encrypt_object_with_key(&json!({ "a": 1 }), &key()).unwrap();
        let other = EncryptionKey::from_bytes([8u8; 32]);
        assert!(matches!(
            decrypt_object_with_key::<Value>(&token, &other),
            Err(EncryptionError::DecryptionFailed)
        ));
    }

    #[test]
    fn foreign_algorithm_header_is_rejected() {
        let token = encrypt_object_with_key(&json!({ "a": 1 }), &key()).unwrap();
        let forged_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"A256KW","enc":"A256GCM"}"#);
        let rest = token.split_once('.').unwrap().1;
        let forged = format!("{forged_header}.{rest}");

        assert!(!is_message_jwe_encrypted(&forged, "dir", "A256GCM"));
        assert!(matches!(
            decrypt_object_with_key::<Value>(&forged, &key()),
            Err(EncryptionError::UnsupportedAlgorithm { .. })
        ));
        assert!(encrypt_object(&json!({}), &key(), "RSA-OAEP", "A256GCM").is_err());
    }

    #[test]
    fn jwe_detection_never_throws() {
        assert!(!is_message_jwe_encrypted("", "dir", "A256GCM"));
        assert!(!is_message_jwe_encrypted("plain text prompt", "dir", "A256GCM"));
        assert!(!is_message_jwe_encrypted("a.b.c.d.e", "dir", "A256GCM"));
        assert!(!is_message_jwe_encrypted("a.b.c.d", "dir", "A256GCM"));
    }

    #[test]
    fn key_must_be_32_bytes_of_base64() {
        assert!(EncryptionKey::from_base64(&STANDARD.encode([1u8; 32])).is_ok());
        assert!(matches!(
            EncryptionKey::from_base64(&STANDARD.encode([1u8; 16])),
            Err(EncryptionError::InvalidKey(_))
        ));
        assert!(EncryptionKey::from_base64("not base64!").is_err());
        assert!(!format!("{:?}", key()).contains('7'));
    }

    #[test]
    fn jwt_claims_respect_clock_tolerance() {
        let key = key();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let t = now.timestamp();

        let expired = encrypt_object_with_key(&json!({ "data": 1, "exp": t - 61 }), &key).unwrap();
        assert!(matches!(decrypt_jwt_at::<i64>(&expired, &key, now), Err(EncryptionError::Expired)));

        let recently_expired = encrypt_object_with_key(&json!({ "data": 2, "exp": t - 30 }), &key).unwrap();
        assert_eq!(decrypt_jwt_at::<i64>(&recently_expired, &key, now).unwrap(), 2);

        let almost_valid = encrypt_object_with_key(&json!({ "data": 3, "nbf": t + 30 }), &key).unwrap();
        assert_eq!(decrypt_jwt_at::<i64>(&almost_valid, &key, now).unwrap(), 3);

        let future = encrypt_object_with_key(&json!({ "data": 4, "nbf": t + 120 }), &key).unwrap();
        assert!(matches!(decrypt_jwt_at::<i64>(&future, &key, now), Err(EncryptionError::NotYetValid)));

        let no_data = encrypt_object_with_key(&json!({ "exp": t + 60 }), &key).unwrap();
        assert!(matches!(decrypt_jwt_at::<i64>(&no_data, &key, now), Err(EncryptionError::MissingData)));
    }

    #[test]
    fn claim_set_decrypts_whole_payload() {
        let key = key();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let t = now.timestamp();

        let token = encrypt_object_with_key(&json!({ "tabId": "t", "exp": t + 10 }), &key).unwrap();
        let claims: Value = decrypt_claims_at(&token, &key, now).unwrap();
        assert_eq!(claims, json!({ "tabId": "t", "exp": t + 10 }));

        let expired = encrypt_object_with_key(&json!({ "tabId": "t", "exp": t - 61 }), &key).unwrap();
        assert!(matches!(decrypt_claims_at::<Value>(&expired, &key, now), Err(EncryptionError::Expired)));

        let future = encrypt_object_with_key(&json!({ "tabId": "t", "nbf": t + 61 }), &key).unwrap();
        assert!(matches!(decrypt_claims_at::<Value>(&future, &key, now), Err(EncryptionError::NotYetValid)));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Credential store
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn iam_credentials_store_read_and_delete() {
        let auth = auth_with(FakeClient::replying(Ok(Value::Null)), None);
        auth.update_iam_credentials(update(json!({
            "accessKeyId": "AKIA", "secretAccessKey": "secret", "sessionToken": "session"
        })))
        .unwrap();

        assert!(auth.has_credentials(CredentialsType::Iam));
        assert!(!auth.has_credentials(CredentialsType::Bearer));
        assert_eq!(
            auth.get_credentials(CredentialsType::Iam),
            Some(Credentials::Iam(IamCredentials::new("AKIA", "secret", Some("session".into()))))
        );

        auth.delete_credentials(CredentialsType::Iam);
        assert!(!auth.has_credentials(CredentialsType::Iam));
        assert_eq!(auth.get_credentials(CredentialsType::Iam), None);
    }

    #[test]
    fn invalid_iam_update_clears_slot() {
        let auth = auth_with(FakeClient::replying(Ok(Value::Null)), None);
        auth.update_iam_credentials(update(json!({ "accessKeyId": "A", "secretAccessKey": "S" })))
            .unwrap();

        let err = auth
            .update_iam_credentials(update(json!({ "accessKeyId": "A" })))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid IAM credentials");
        assert!(!auth.has_credentials(CredentialsType::Iam));

        let response: ResponseError = err.into();
        assert_eq!(response.error_code(), ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn invalid_bearer_update_is_rejected() {
        let auth = auth_with(FakeClient::replying(Ok(Value::Null)), None);
        let err = auth
            .update_bearer_credentials(update(json!({ "token": "" })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid bearer credentials");
        assert!(!auth.has_credentials(CredentialsType::Bearer));
    }

    #[test]
    fn encrypted_iam_update_is_decrypted() {
        let key = key();
        let auth = auth_with(FakeClient::replying(Ok(Value::Null)), Some(key.clone()));
        let token = encrypt_object_with_key(
            &json!({ "data": { "accessKeyId": "AKIA", "secretAccessKey": "s" } }),
            &key,
        )
        .unwrap();

        auth.update_iam_credentials(encrypted_update(token)).unwrap();
        match auth.get_credentials(CredentialsType::Iam) {
            Some(Credentials::Iam(creds)) => assert_eq!(creds.access_key_id(), "AKIA"),
            other => panic!("expected IAM credentials, got {other:?}"),
        }
    }

    #[test]
    fn encrypted_update_without_key_fails_and_keeps_slot() {
        let auth = auth_with(FakeClient::replying(Ok(Value::Null)), None);
        auth.update_iam_credentials(update(json!({ "accessKeyId": "A", "secretAccessKey": "S" })))
            .unwrap();

        let token = encrypt_object_with_key(&json!({ "data": {} }), &key()).unwrap();
        let err = auth.update_iam_credentials(encrypted_update(token)).unwrap_err();
        assert!(matches!(err, AuthError::Encryption(EncryptionError::MissingKey)));
        assert!(auth.has_credentials(CredentialsType::Iam));
    }

    #[test]
    fn undecryptable_update_keeps_slot() {
        let auth = auth_with(FakeClient::replying(Ok(Value::Null)), Some(key()));
        auth.update_iam_credentials(update(json!({ "accessKeyId": "A", "secretAccessKey": "S" })))
            .unwrap();

        let foreign = EncryptionKey::from_bytes([9u8; 32]);
        let token = encrypt_object_with_key(&json!({ "data": { "accessKeyId": "B", "secretAccessKey": "T" } }), &foreign)
            .unwrap();
        assert!(auth.update_iam_credentials(encrypted_update(token)).is_err());

        match auth.get_credentials(CredentialsType::Iam) {
            Some(Credentials::Iam(creds)) => assert_eq!(creds.access_key_id(), "A"),
            other => panic!("expected original credentials, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bearer_update_uses_supplied_metadata() {
        let client = FakeClient::replying(Ok(Value::Null));
        let auth = auth_with(client.clone(), None);

        let mut params = update(json!({ "token": "tok" }));
        params.metadata = Some(ConnectionMetadata::with_start_url(BUILDER_ID_START_URL));
        auth.update_bearer_credentials(params).await.unwrap();

        assert!(client.requests.lock().is_empty());
        assert_eq!(auth.get_connection_type(), SsoConnectionType::BuilderId);
    }

    #[tokio::test]
    async fn bearer_update_fetches_missing_metadata() {
        let client = FakeClient::replying(Ok(json!({ "sso": { "startUrl": "https://d-123.awsapps.com/start" } })));
        let auth = auth_with(client.clone(), None);

        auth.update_bearer_credentials(update(json!({ "token": "tok" }))).await.unwrap();

        assert_eq!(*client.requests.lock(), vec!["aws/credentials/getConnectionMetadata"]);
        assert_eq!(
            auth.get_connection_metadata().unwrap().start_url(),
            Some("https://d-123.awsapps.com/start")
        );
        assert_eq!(auth.get_connection_type(), SsoConnectionType::IdentityCenter);
    }

    #[tokio::test]
    async fn failed_metadata_fetch_does_not_fail_update() {
        let client = FakeClient::replying(Err(ResponseError::internal("client unavailable")));
        let auth = auth_with(client.clone(), None);

        auth.update_bearer_credentials(update(json!({ "token": "tok" }))).await.unwrap();

        assert!(auth.has_credentials(CredentialsType::Bearer));
        assert!(auth.get_connection_metadata().is_none());
        assert_eq!(auth.get_connection_type(), SsoConnectionType::None);

        let notifications = client.notifications.lock();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].0, "telemetry/event");
        let event = notifications[0].1.as_ref().unwrap();
        assert_eq!(event["result"], "Failed");
        assert_eq!(event["errorData"]["reason"], "client unavailable");
    }

    #[tokio::test]
    async fn bearer_delete_clears_metadata_and_notifies() {
        let auth = auth_with(FakeClient::replying(Ok(Value::Null)), None);
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let seen = deleted.clone();
        auth.on_credentials_deleted(move |kind| seen.lock().push(kind));

        let mut params = update(json!({ "token": "tok" }));
        params.metadata = Some(ConnectionMetadata::with_start_url("https://sso.example.com/start"));
        auth.update_bearer_credentials(params).await.unwrap();
        assert_eq!(auth.get_connection_type(), SsoConnectionType::ExternalIdp);

        auth.delete_credentials(CredentialsType::Bearer);
        assert!(!auth.has_credentials(CredentialsType::Bearer));
        assert!(auth.get_connection_metadata().is_none());
        assert_eq!(*deleted.lock(), vec![CredentialsType::Bearer]);
    }

    #[test]
    fn connection_type_classification() {
        let classify = |url: &str| connection_type(Some(&ConnectionMetadata::with_start_url(url)));

        assert_eq!(connection_type(None), SsoConnectionType::None);
        assert_eq!(connection_type(Some(&ConnectionMetadata::default())), SsoConnectionType::None);
        assert_eq!(classify("not a url"), SsoConnectionType::None);
        assert_eq!(classify("https://view.awsapps.com/start"), SsoConnectionType::BuilderId);
        assert_eq!(classify("https://view.awsapps.com/start/#/"), SsoConnectionType::BuilderId);
        assert_eq!(classify("https://my-org.awsapps.com/start"), SsoConnectionType::IdentityCenter);
        assert_eq!(classify("https://portal.sso.us-east-1.amazonaws.com"), SsoConnectionType::IdentityCenter);
        assert_eq!(classify("https://my-org.awsapps.cn/start"), SsoConnectionType::IdentityCenter);
        assert_eq!(classify("https://login.example.com/awsapps.com"), SsoConnectionType::ExternalIdp);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Chat relay
    // ─────────────────────────────────────────────────────────────────────

    fn echo_chat(key: Option<Arc<EncryptionKey>>) -> Arc<Chat> {
        let chat = Chat::new(key);
        chat.on_chat_prompt(|params: ChatParams, _token| async move {
            Ok(ChatResult {
                body: params.prompt.prompt.map(|p| format!("echo: {p}")),
                message_id: Some(params.tab_id),
                ..Default::default()
            })
        });
        chat
    }

    #[tokio::test]
    async fn plain_chat_passes_through() {
        let chat = echo_chat(None);
        let result = chat
            .handle_chat_prompt(
                Some(json!({ "tabId": "t1", "prompt": { "prompt": "hi" } })),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result, json!({ "body": "echo: hi", "messageId": "t1" }));
    }

    #[tokio::test]
    async fn encrypted_chat_requires_jwe_message() {
        let chat = echo_chat(Some(key()));
        let err = chat
            .handle_chat_prompt(Some(json!({ "message": "hi" })), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.message, "The request was not encrypted correctly");

        let err = chat
            .handle_chat_prompt(Some(json!({ "tabId": "t1" })), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.message, "The request was not encrypted correctly");
    }

    #[tokio::test]
    async fn encrypted_chat_round_trip() {
        let key = key();
        let chat = echo_chat(Some(key.clone()));
        let message = encrypt_object_with_key(
            &json!({ "tabId": "t2", "prompt": { "prompt": "secret" } }),
            &key,
        )
        .unwrap();

        let result = chat
            .handle_chat_prompt(Some(json!({ "message": message })), CancellationToken::new())
            .await
            .unwrap();

        let token = result.as_str().expect("encrypted result string");
        let decrypted: ChatResult = decrypt_object_with_key(token, &key).unwrap();
        assert_eq!(decrypted.body.as_deref(), Some("echo: secret"));
        assert_eq!(decrypted.message_id.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn encrypted_chat_checks_claim_times() {
        let key = key();
        let chat = echo_chat(Some(key.clone()));
        let now = chrono::Utc::now().timestamp();

        let fresh = encrypt_object_with_key(
            &json!({ "tabId": "t3", "prompt": { "prompt": "p" }, "exp": now + 300 }),
            &key,
        )
        .unwrap();
        let result = chat
            .handle_chat_prompt(Some(json!({ "message": fresh })), CancellationToken::new())
            .await
            .unwrap();
        let decrypted: ChatResult = decrypt_object_with_key(result.as_str().unwrap(), &key).unwrap();
        assert_eq!(decrypted.message_id.as_deref(), Some("t3"));

        let stale = encrypt_object_with_key(
            &json!({ "tabId": "t4", "prompt": { "prompt": "p" }, "exp": now - 600 }),
            &key,
        )
        .unwrap();
        let err = chat
            .handle_chat_prompt(Some(json!({ "message": stale })), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.message, "\"exp\" claim timestamp check failed");
    }

    #[tokio::test]
    async fn chat_without_handler_is_method_not_found() {
        let chat = Chat::new(None);
        let err = chat
            .handle_chat_prompt(Some(json!({ "tabId": "t" })), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::MethodNotFound);
    }
}
