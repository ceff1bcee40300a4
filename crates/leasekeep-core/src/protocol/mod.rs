//! Authenticated request/response channel between clients and the daemon
//!
//! The protocol uses:
//! - A Unix socket, one request and one response per connection
//! - LSP-style `Content-Length` framing around a JSON envelope
//! - `{"signature": hex(HMAC-SHA256(payload)), "payload": {...}}` in both
//!   directions, keyed by a shared secret file only the owner can read
//!
//! ```rust,ignore
//! let signer = MessageSigner::new(load_or_create_secret(&secret_path)?);
//! let message = signer.seal(&Command::Status(StatusRequest::default()))?;
//! write_frame(&mut stream, &serde_json::to_vec(&message)?).await?;
//! ```

mod error;
mod messages;
mod auth;
mod framing;
mod secret;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    Command, GrantRequest, RevokeRequest, StatusRequest, CleanupRequest,
    GrantResponse, RevokeResponse, StatusResponse, CleanupResponse,
    LeaseFailure, SkippedLease, ResponseBody,
};
pub use auth::{MessageSigner, SignedMessage};
pub use framing::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use secret::load_or_create_secret;
