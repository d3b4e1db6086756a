//! PKCE (RFC 7636) verifier and `S256` challenge generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// The only challenge method MCP authorization servers must support.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// A verifier and the challenge derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    /// Secret kept by the client until the code exchange
    pub code_verifier: String,
    /// `BASE64URL(SHA256(code_verifier))`, sent with the authorization request
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh pair from 32 random bytes.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Derive the `S256` challenge for an existing verifier.
    pub fn from_verifier(code_verifier: String) -> Self {
        let digest = Sha256::digest(code_verifier.as_bytes());
        Self {
            code_challenge: URL_SAFE_NO_PAD.encode(digest),
            code_verifier,
        }
    }
}
