//! Notification routing by server name.
//!
//! The client sees a single server, so two hosted servers may both show
//! notifications and both listen for followups. Outgoing ids are wrapped as
//! `{serverName, id}` and encoded; an incoming followup is only handed to the
//! server whose name is inside the tag, with the bare id restored.

use std::future::Future;
use std::sync::Arc;

use runtime_protocol::notification::{NotificationFollowupParams, NotificationSource, ShowNotificationParams};
use runtime_protocol::{ClientMethods, Methods};
use runtime_transport::{Connection, TransportError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::encoding::Encoding;

#[derive(Serialize, Deserialize)]
struct TaggedId {
    #[serde(rename = "serverName")]
    server_name: String,
    id: String,
}

/// Tags and untags correlation ids for one server.
#[derive(Clone)]
pub struct ServerNameRouter {
    server_name: String,
    encoding: Arc<dyn Encoding>,
}

impl ServerNameRouter {
    pub fn new(server_name: impl Into<String>, encoding: Arc<dyn Encoding>) -> Self {
        Self {
            server_name: server_name.into(),
            encoding,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn tag_id(&self, id: &str) -> String {
        let tagged = TaggedId {
            server_name: self.server_name.clone(),
            id: id.to_string(),
        };
        // Serializing two strings cannot fail
        let json = serde_json::to_string(&tagged).unwrap_or_default();
        self.encoding.encode(&json)
    }

    /// The bare id if `tagged` was tagged by this server, else `None`.
    pub fn untag_id(&self, tagged: &str) -> Option<String> {
        let json = self.encoding.decode(tagged)?;
        let TaggedId { server_name, id } = serde_json::from_str(&json).ok()?;
        (server_name == self.server_name).then_some(id)
    }
}

/// Notification feature handed to a server.
#[derive(Clone)]
pub struct Notifications {
    router: ServerNameRouter,
    connection: Arc<Connection>,
}

impl Notifications {
    pub fn new(router: ServerNameRouter, connection: Arc<Connection>) -> Self {
        Self { router, connection }
    }

    /// Send `aws/window/showNotification` with the id tagged by server name.
    pub fn show_notification(&self, mut params: ShowNotificationParams) -> Result<(), TransportError> {
        params.id = self.router.tag_id(&params.id);
        let params = serde_json::to_value(params).map_err(TransportError::Parse)?;
        self.connection
            .send_notification(ClientMethods::SHOW_NOTIFICATION, Some(params))
    }

    /// Receive followups to notifications this server showed. Followups for
    /// other servers, or with ids this runtime never tagged, are skipped.
    pub fn on_notification_followup<F, Fut>(&self, handler: F)
    where
        F: Fn(NotificationFollowupParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let router = self.router.clone();
        let handler = Arc::new(handler);
        self.connection
            .on_notification(Methods::NOTIFICATION_FOLLOWUP, move |params| {
                let router = router.clone();
                let handler = Arc::clone(&handler);
                async move {
                    let Some(followup) = params
                        .and_then(|p| serde_json::from_value::<NotificationFollowupParams>(p).ok())
                    else {
                        warn!("Ignoring malformed notification followup");
                        return;
                    };
                    let Some(id) = router.untag_id(&followup.source.id) else {
                        debug!("Followup not addressed to {}", router.server_name());
                        return;
                    };
                    handler(NotificationFollowupParams {
                        source: NotificationSource { id },
                        action: followup.action,
                    })
                    .await;
                }
            });
    }
}
