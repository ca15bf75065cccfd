//! PKCE verifier/challenge and state nonce generation.

use crate::constants::{CODE_VERIFIER_BYTES, STATE_NONCE_BYTES};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

/// Secrets of one in-flight authorization. Dropped once the code is
/// exchanged or the handshake fails.
#[derive(Clone)]
pub struct AuthSession {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state_nonce: String,
    pub redirect_uri: String,
}

impl AuthSession {
    /// Fresh verifier, its S256 challenge and a state nonce for `redirect_uri`.
    pub fn generate(redirect_uri: impl Into<String>) -> Self {
        let code_verifier = random_urlsafe(CODE_VERIFIER_BYTES);
        let code_challenge = code_challenge_s256(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
            state_nonce: random_urlsafe(STATE_NONCE_BYTES),
            redirect_uri: redirect_uri.into(),
        }
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("code_challenge", &self.code_challenge)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
