//! Unix socket server: one signed request and one signed response per connection

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use super::{Daemon, Shutdown};
use crate::fs_atomic::{ensure_private_dir, PRIVATE_FILE_MODE};
use crate::protocol::{
    read_frame, write_frame, MessageSigner, ProtocolError, ProtocolResult, ResponseBody,
    SignedMessage,
};

/// How long a connected peer has to deliver its request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Whatever answers verified payloads
///
/// Only ever sees payloads whose signature checked out.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, payload: &[u8]) -> ResponseBody;
}

#[async_trait]
impl RequestHandler for Daemon {
    async fn handle(&self, payload: &[u8]) -> ResponseBody {
        self.dispatch(payload).await
    }
}

/// Bind the daemon socket with owner-only access
///
/// A node left behind by a crashed instance is removed first.
pub fn bind_socket(path: &Path) -> io::Result<UnixListener> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_private_dir(parent)?;
        }
    }

    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let listener = UnixListener::bind(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(PRIVATE_FILE_MODE))?;
    }

    Ok(listener)
}

/// Accept connections until `shutdown` fires
///
/// Each connection is served on its own task. In-flight connections are left
/// to finish on their own.
pub async fn serve<H: RequestHandler>(
    listener: UnixListener,
    handler: Arc<H>,
    signer: Arc<MessageSigner>,
    shutdown: Shutdown,
) {
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let handler = handler.clone();
                    let signer = signer.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handler.as_ref(), &signer).await {
                            debug!(error = %e, "Connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    info!("Server stopped accepting connections");
}

/// Serve one connection: read, verify, handle, answer
///
/// A request that fails verification is dropped without a reply so an
/// unauthenticated peer learns nothing.
pub async fn handle_connection<S, H>(
    stream: S,
    handler: &H,
    signer: &MessageSigner,
) -> ProtocolResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: RequestHandler + ?Sized,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    let frame = match tokio::time::timeout(REQUEST_TIMEOUT, read_frame(&mut reader)).await {
        Ok(frame) => frame?,
        Err(_) => {
            debug!("Peer sent no request in time");
            return Ok(());
        }
    };
    let Some(frame) = frame else {
        return Ok(());
    };

    let request = match SignedMessage::from_bytes(&frame) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Dropped malformed envelope");
            return Ok(());
        }
    };
    let payload = match signer.open(&request) {
        Ok(payload) => payload,
        Err(e @ (ProtocolError::BadSignature | ProtocolError::MalformedSignature)) => {
            warn!(error = %e, "Dropped request with invalid signature");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let body = handler.handle(payload).await;
    let response = signer.seal(&body)?;

    write_frame(&mut write_half, &response.to_bytes()?).await?;
    write_half.shutdown().await?;
    Ok(())
}
