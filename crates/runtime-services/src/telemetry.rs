//! Telemetry context.
//!
//! Built once by the runtime and handed to whatever needs to report events.
//! Events go to the client as `telemetry/event` notifications.

use std::sync::Arc;

use runtime_protocol::ClientMethods;
use runtime_transport::ClientChannel;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricResult {
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub result: MetricResult,
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(rename = "errorData", skip_serializing_if = "Option::is_none")]
    pub error_data: Option<Value>,
}

#[derive(Clone)]
pub struct Telemetry {
    client: Arc<dyn ClientChannel>,
    session_id: Uuid,
}

impl Telemetry {
    pub fn new(client: Arc<dyn ClientChannel>) -> Self {
        Self {
            client,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Forward an arbitrary event payload as-is.
    pub fn emit(&self, event: Value) {
        if let Err(e) = self.client.send_notification(ClientMethods::TELEMETRY_EVENT, Some(event)) {
            debug!("Dropped telemetry event: {e}");
        }
    }

    pub fn emit_metric(&self, name: &str, result: MetricResult, data: Option<Value>, error_data: Option<Value>) {
        let event = TelemetryEvent {
            name: name.to_string(),
            result,
            session_id: self.session_id,
            data,
            error_data,
        };
        match serde_json::to_value(&event) {
            Ok(event) => self.emit(event),
            Err(e) => debug!("Failed to serialize telemetry event {name}: {e}"),
        }
    }
}
