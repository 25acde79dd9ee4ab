//! LSP Runtime - Transport Layer
//!
//! Owns the byte stream between the editor and the runtime:
//! - Content-Length framing of JSON-RPC messages
//! - The `Connection` handler tables and outgoing queue
//! - `$/cancelRequest` bookkeeping for in-flight requests
//! - The one-line encryption handshake read before framing starts
//!
//! Nothing in here knows about servers or capabilities; the router and the
//! services register handlers on a `Connection`.

pub mod codec;
pub mod connection;
pub mod error;
pub mod handshake;

pub use connection::{ClientChannel, Connection, NotificationHandler, RequestHandler};
pub use error::{HandshakeError, TransportError};
pub use handshake::{
    HANDSHAKE_TIMEOUT, read_encryption_details, read_encryption_details_with_timeout,
    validate_encryption_details,
};
