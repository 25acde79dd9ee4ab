//! Method name constants: every request and notification the runtime
//! speaks, grouped by direction.

/// Requests and notifications sent by the client.
pub struct Methods;

impl Methods {
    // ── Lifecycle ───────────────────────────────────────────────────────
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const SHUTDOWN: &str = "shutdown";
    pub const EXIT: &str = "exit";
    pub const CANCEL_REQUEST: &str = "$/cancelRequest";

    // ── Workspace ───────────────────────────────────────────────────────
    pub const EXECUTE_COMMAND: &str = "workspace/executeCommand";
    pub const DID_CHANGE_CONFIGURATION: &str = "workspace/didChangeConfiguration";
    pub const GET_CONFIGURATION_FROM_SERVER: &str = "aws/getConfigurationFromServer";

    // ── Credentials ─────────────────────────────────────────────────────
    pub const IAM_CREDENTIALS_UPDATE: &str = "aws/credentials/iam/update";
    pub const IAM_CREDENTIALS_DELETE: &str = "aws/credentials/iam/delete";
    pub const BEARER_CREDENTIALS_UPDATE: &str = "aws/credentials/token/update";
    pub const BEARER_CREDENTIALS_DELETE: &str = "aws/credentials/token/delete";

    // ── Chat ────────────────────────────────────────────────────────────
    pub const CHAT_PROMPT: &str = "aws/chat/sendChatPrompt";

    // ── Notifications ───────────────────────────────────────────────────
    pub const NOTIFICATION_FOLLOWUP: &str = "aws/window/notificationFollowup";

    /// Requests the runtime answers itself. Hosted servers cannot register
    /// handlers for these.
    pub const RUNTIME_REQUESTS: [&str; 7] = [
        Self::INITIALIZE,
        Self::SHUTDOWN,
        Self::EXECUTE_COMMAND,
        Self::GET_CONFIGURATION_FROM_SERVER,
        Self::IAM_CREDENTIALS_UPDATE,
        Self::BEARER_CREDENTIALS_UPDATE,
        Self::CHAT_PROMPT,
    ];

    pub fn is_runtime_request(method: &str) -> bool {
        Self::RUNTIME_REQUESTS.contains(&method)
    }
}

/// Requests and notifications sent by the server to the client.
pub struct ClientMethods;

impl ClientMethods {
    pub const GET_CONNECTION_METADATA: &str = "aws/credentials/getConnectionMetadata";
    pub const SHOW_NOTIFICATION: &str = "aws/window/showNotification";
    pub const TELEMETRY_EVENT: &str = "telemetry/event";
}
