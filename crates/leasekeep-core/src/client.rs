//! Client for talking to a running daemon
//!
//! One call is one connection: connect, send a signed command, read the
//! signed response, close. Uses the same `Content-Length` framing as the
//! server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use crate::config::DaemonConfig;
use crate::lease::{InvalidLease, LeaseKey, LeaseRequest};
use crate::protocol::{
    load_or_create_secret, read_frame, write_frame, CleanupRequest, CleanupResponse, Command,
    GrantRequest, GrantResponse, MessageSigner, ProtocolError, ResponseBody, RevokeRequest,
    RevokeResponse, SignedMessage, StatusRequest, StatusResponse,
};

/// Default time allowed for a whole round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while calling the daemon
#[derive(Error, Debug)]
pub enum ClientError {
    /// Not running, not answering, or silently dropped the request
    #[error("Daemon unreachable: {0}")]
    DaemonUnreachable(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The daemon answered but refused the whole request
    #[error("Request rejected: {error}")]
    Rejected {
        error: String,
        invalid: Vec<InvalidLease>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
    signer: MessageSigner,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(socket_path: impl Into<PathBuf>, signer: MessageSigner) -> Self {
        Self {
            socket_path: socket_path.into(),
            signer,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Client for the daemon described by `config`, reading (or creating)
    /// the shared secret it points at
    pub fn from_config(config: &DaemonConfig) -> ClientResult<Self> {
        let secret = load_or_create_secret(&config.secret_path)?;
        Ok(Self::new(&config.socket_path, MessageSigner::new(secret)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one command and return the `data` of a successful response
    pub async fn call(&self, command: &Command) -> ClientResult<Value> {
        let request = self.signer.seal(command)?.to_bytes()?;
        debug!(
            command = command.name(),
            socket = %self.socket_path.display(),
            content_length = request.len(),
            "Sending request"
        );

        let frame = tokio::time::timeout(self.timeout, self.round_trip(&request))
            .await
            .map_err(|_| ClientError::DaemonUnreachable("timed out waiting for daemon".to_string()))??;

        let response = SignedMessage::from_bytes(&frame)?;
        match self.signer.open_as::<ResponseBody>(&response)? {
            ResponseBody::Ok { data } => Ok(data),
            ResponseBody::Error { error, invalid } => Err(ClientError::Rejected { error, invalid }),
        }
    }

    async fn round_trip(&self, request: &[u8]) -> ClientResult<Vec<u8>> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| ClientError::DaemonUnreachable(e.to_string()))?;

        write_frame(&mut stream, request).await.map_err(transport)?;
        stream.flush().await.map_err(|e| transport(e.into()))?;

        let mut reader = BufReader::new(stream);
        match read_frame(&mut reader).await.map_err(transport)? {
            Some(frame) => Ok(frame),
            None => Err(ClientError::DaemonUnreachable(
                "connection closed without a response".to_string(),
            )),
        }
    }

    async fn call_as<T: DeserializeOwned>(&self, command: Command) -> ClientResult<T> {
        let data = self.call(&command).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Declare the complete lease set for `config_file`
    pub async fn grant(
        &self,
        config_file: impl Into<String>,
        leases: Vec<LeaseRequest>,
        override_owner: bool,
    ) -> ClientResult<GrantResponse> {
        self.call_as(Command::Grant(GrantRequest {
            leases,
            config_file: config_file.into(),
            override_owner,
        }))
        .await
    }

    pub async fn revoke(&self, request: RevokeRequest) -> ClientResult<RevokeResponse> {
        self.call_as(Command::Revoke(request)).await
    }

    pub async fn revoke_keys(&self, keys: Vec<LeaseKey>) -> ClientResult<RevokeResponse> {
        self.revoke(RevokeRequest::keys(keys)).await
    }

    pub async fn status(&self, config_file: Option<String>) -> ClientResult<StatusResponse> {
        self.call_as(Command::Status(StatusRequest { config_file })).await
    }

    pub async fn cleanup(&self) -> ClientResult<CleanupResponse> {
        self.call_as(Command::Cleanup(CleanupRequest {})).await
    }

    /// Whether a daemon answers on the socket with our secret
    pub async fn is_running(&self) -> bool {
        self.status(None).await.is_ok()
    }
}

/// Socket failures mid-call mean the daemon went away
fn transport(error: ProtocolError) -> ClientError {
    match error {
        ProtocolError::Io(e) => ClientError::DaemonUnreachable(e.to_string()),
        other => ClientError::Protocol(other),
    }
}

impl std::fmt::Debug for DaemonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonClient")
            .field("socket_path", &self.socket_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tempfile::tempdir;

    fn client(socket: &Path) -> DaemonClient {
        DaemonClient::new(socket, MessageSigner::new(SecretString::from("s".to_string())))
            .with_timeout(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_missing_socket_is_unreachable() {
        let dir = tempdir().unwrap();
        let client = client(&dir.path().join("nobody.sock"));

        let err = client.status(None).await.unwrap_err();
        assert!(matches!(err, ClientError::DaemonUnreachable(_)));
        assert!(!client.is_running().await);
    }

    #[tokio::test]
    async fn test_silent_peer_is_unreachable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("silent.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();

        // Accepts and then holds the connection open without answering
        let _peer = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let err = client(&path).cleanup().await.unwrap_err();
        assert!(matches!(err, ClientError::DaemonUnreachable(_)));
    }

    #[tokio::test]
    async fn test_from_config_creates_secret() {
        let dir = tempdir().unwrap();
        let config = DaemonConfig::in_dir(dir.path());

        let client = DaemonClient::from_config(&config).unwrap();
        assert_eq!(client.socket_path(), config.socket_path);
        assert!(config.secret_path.exists());
    }
}
