//! HMAC-SHA256 signing of protocol messages
//!
//! The signature covers the exact payload bytes as they appear on the wire,
//! so the payload is carried as raw JSON and never re-serialized before
//! verification. Comparison is constant time and failures carry no detail.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::error::{ProtocolError, ProtocolResult};

type HmacSha256 = Hmac<Sha256>;

/// Signed envelope used for both requests and responses
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedMessage {
    /// Hex-encoded HMAC-SHA256 of `payload`'s raw bytes
    pub signature: String,
    pub payload: Box<RawValue>,
}

impl SignedMessage {
    pub fn to_bytes(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Raw payload text, exactly as signed
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.get().as_bytes()
    }
}

/// Signs and verifies messages with the shared secret
pub struct MessageSigner {
    secret: SecretString,
}

impl MessageSigner {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Hex HMAC-SHA256 of `payload`
    pub fn sign(&self, payload: &[u8]) -> ProtocolResult<String> {
        Ok(hex::encode(self.mac(payload)?))
    }

    /// Check `signature` against `payload` in constant time
    pub fn verify(&self, payload: &[u8], signature: &str) -> ProtocolResult<()> {
        let provided = hex::decode(signature.trim()).map_err(|_| ProtocolError::MalformedSignature)?;
        let computed = self.mac(payload)?;

        if computed.ct_eq(&provided).into() {
            Ok(())
        } else {
            Err(ProtocolError::BadSignature)
        }
    }

    /// Serialize `value` and wrap it in a signed envelope
    pub fn seal<T: Serialize>(&self, value: &T) -> ProtocolResult<SignedMessage> {
        let json = serde_json::to_string(value)?;
        let signature = self.sign(json.as_bytes())?;
        let payload = RawValue::from_string(json)?;
        Ok(SignedMessage { signature, payload })
    }

    /// Verify an envelope and hand back its payload bytes
    pub fn open<'a>(&self, message: &'a SignedMessage) -> ProtocolResult<&'a [u8]> {
        let payload = message.payload_bytes();
        self.verify(payload, &message.signature)?;
        Ok(payload)
    }

    /// Verify an envelope and decode its payload
    pub fn open_as<T: DeserializeOwned>(&self, message: &SignedMessage) -> ProtocolResult<T> {
        let payload = self.open(message)?;
        Ok(serde_json::from_slice(payload)?)
    }

    fn mac(&self, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| ProtocolError::InvalidKey)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for MessageSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, StatusRequest};

    fn signer(secret: &str) -> MessageSigner {
        MessageSigner::new(SecretString::from(secret.to_string()))
    }

    #[test]
    fn test_sign_is_hmac_sha256_hex() {
        // RFC 4231 test case 2
        let signer = signer("Jefe");
        let sig = signer.sign(b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_seal_and_open() {
        let signer = signer("shared");
        let cmd = Command::Status(StatusRequest::default());
        let message = signer.seal(&cmd).unwrap();

        let bytes = message.to_bytes().unwrap();
        let received = SignedMessage::from_bytes(&bytes).unwrap();
        let decoded: Command = signer.open_as(&received).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let message = signer("right").seal(&Command::Status(StatusRequest::default())).unwrap();
        let err = signer("wrong").open(&message).unwrap_err();
        assert!(matches!(err, ProtocolError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = signer("shared");
        let message = signer.seal(&Command::Status(StatusRequest::default())).unwrap();
        let tampered = String::from_utf8(message.to_bytes().unwrap())
            .unwrap()
            .replace("\"status\"", "\"cleanup\"");

        let received = SignedMessage::from_bytes(tampered.as_bytes()).unwrap();
        assert!(matches!(signer.open(&received), Err(ProtocolError::BadSignature)));
    }

    #[test]
    fn test_payload_whitespace_is_signed_verbatim() {
        let signer = signer("shared");
        let payload = "{ \"command\" : \"status\" }";
        let sig = signer.sign(payload.as_bytes()).unwrap();
        let wire = format!("{{\"signature\":\"{}\",\"payload\":{}}}", sig, payload);

        let received = SignedMessage::from_bytes(wire.as_bytes()).unwrap();
        let decoded: Command = signer.open_as(&received).unwrap();
        assert_eq!(decoded.name(), "status");
    }

    #[test]
    fn test_malformed_signature() {
        let signer = signer("shared");
        assert!(matches!(
            signer.verify(b"{}", "not-hex"),
            Err(ProtocolError::MalformedSignature)
        ));
        assert!(matches!(signer.verify(b"{}", "abcd"), Err(ProtocolError::BadSignature)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", signer("top-secret"));
        assert!(!debug.contains("top-secret"));
    }
}
