//! PKCE (Proof Key for Code Exchange) challenge generation.
//!
//! Implements RFC 7636 for authorization-code flows where a client secret
//! cannot be safely stored. The state token doubles as CSRF protection for
//! the redirect.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a cryptographically random code verifier.
///
/// 32 random bytes, base64url-encoded without padding: 43 characters,
/// within the 43-128 range RFC 7636 requires.
#[must_use]
pub fn generate_code_verifier() -> String {
    random_urlsafe(32)
}

/// Derive the S256 code challenge from a verifier.
///
/// Per RFC 7636 the challenge is `BASE64URL(SHA256(ASCII(verifier)))`.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random state token for CSRF protection.
#[must_use]
pub fn generate_state() -> String {
    random_urlsafe(32)
}

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE challenge pair plus CSRF state for one authorization attempt
///
/// The verifier stays with the client until the code exchange; the
/// challenge and state travel in the authorization request.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random string kept secret until token exchange
    pub code_verifier: String,

    /// SHA256 hash of `code_verifier`, base64url encoded
    pub code_challenge: String,

    /// Random CSRF token, echoed back on the redirect
    pub state: String,
}

impl PkceChallenge {
    /// Generate a fresh challenge with cryptographically random values.
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state();

        Self { code_verifier, code_challenge, state }
    }

    /// The challenge method (always `S256`).
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}
