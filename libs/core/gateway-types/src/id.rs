//! 43-character base64url identifiers and the 32-byte digests they encode.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::fmt;

use crate::error::GatewayError;

/// A 32-byte content digest, the persistent-key form of every identifier
/// in the system (transaction ids, data item ids, data roots).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest32(pub [u8; 32]);

impl Digest32 {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses a 43-character base64url identifier into its 32-byte digest.
    pub fn parse_b64url(s: &str) -> Result<Self, GatewayError> {
        if s.len() != 43 {
            return Err(GatewayError::MalformedInput(format!(
                        "identifier must be 43 chars, got {}",
                        s.len()
            )));
        }
        let decoded = URL_SAFE_NO_PAD
        .decode(s.as_bytes())
        .map_err(|e| GatewayError::MalformedInput(format!("invalid base64url id: {e}")))?;
        let bytes: [u8; 32] = decoded
        .try_into()
        .map_err(|_| GatewayError::MalformedInput("id did not decode to 32 bytes".into()))?;
        Ok(Self(bytes))
    }

    pub fn to_b64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest32({})", self.to_b64url())
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b64url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_b64url() {
        let bytes = [7u8; 32];
        let d = Digest32::from_bytes(bytes);
        let s = d.to_b64url();
        assert_eq!(s.len(), 43);
        let back = Digest32::parse_b64url(&s).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Digest32::parse_b64url("too-short").is_err());
    }
}
