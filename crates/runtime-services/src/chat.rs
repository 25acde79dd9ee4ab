//! Chat prompt relay.
//!
//! Servers register a handler for `aws/chat/sendChatPrompt`. When the session
//! is encrypted the prompt arrives as a JWE and the result leaves as one;
//! handlers always see plain [`ChatParams`] and return a plain [`ChatResult`].

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use runtime_protocol::chat::{ChatParams, ChatResult, EncryptedChatParams};
use runtime_protocol::{HandlerResult, Methods, ResponseError, parse_params};
use runtime_transport::Connection;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::encryption::{
    ALG_DIR, ENC_A256GCM, EncryptionKey, decrypt_claims, encrypt_object_with_key,
    is_message_jwe_encrypted,
};

pub type ChatHandler = Arc<
    dyn Fn(ChatParams, CancellationToken) -> BoxFuture<'static, Result<ChatResult, ResponseError>>
        + Send
        + Sync,
>;

const NOT_ENCRYPTED: &str = "The request was not encrypted correctly";

pub struct Chat {
    key: Option<Arc<EncryptionKey>>,
    prompt_handler: RwLock<Option<ChatHandler>>,
}

impl Chat {
    pub fn new(key: Option<Arc<EncryptionKey>>) -> Arc<Self> {
        Arc::new(Self {
            key,
            prompt_handler: RwLock::new(None),
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    pub fn register(self: &Arc<Self>, connection: &Connection) {
        let chat = Arc::clone(self);
        connection.on_request(Methods::CHAT_PROMPT, move |params, token| {
            let chat = Arc::clone(&chat);
            async move { chat.handle_chat_prompt(params, token).await }
        });
    }

    /// Set the prompt handler. A later call replaces the earlier handler.
    pub fn on_chat_prompt<F, Fut>(&self, handler: F)
    where
        F: Fn(ChatParams, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ChatResult, ResponseError>> + Send + 'static,
    {
        let handler: ChatHandler = Arc::new(move |params, token| Box::pin(handler(params, token)));
        *self.prompt_handler.write() = Some(handler);
    }

    pub async fn handle_chat_prompt(&self, params: Option<Value>, token: CancellationToken) -> HandlerResult {
        let handler = self
            .prompt_handler
            .read()
            .clone()
            .ok_or_else(|| ResponseError::method_not_found(Methods::CHAT_PROMPT))?;

        let Some(key) = self.key.as_deref() else {
            let params: ChatParams = parse_params(params)?;
            let result = handler(params, token).await?;
            return serde_json::to_value(result).map_err(|e| ResponseError::internal(e.to_string()));
        };

        let encrypted: EncryptedChatParams =
            parse_params(params).map_err(|_| ResponseError::invalid_params(NOT_ENCRYPTED))?;
        if !is_message_jwe_encrypted(&encrypted.message, ALG_DIR, ENC_A256GCM) {
            warn!("Rejected chat prompt that is not a JWE");
            return Err(ResponseError::invalid_params(NOT_ENCRYPTED));
        }

        let params: ChatParams = decrypt_claims(&encrypted.message, key)?;
        debug!("Decrypted chat prompt for tab {}", params.tab_id);

        let result = handler(params, token).await?;
        Ok(Value::String(encrypt_object_with_key(&result, key)?))
    }
}
