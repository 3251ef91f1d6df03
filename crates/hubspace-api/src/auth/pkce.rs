// Proof Key for Code Exchange (RFC 7636) helpers.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Random bytes behind each verifier; encodes to 64 URL-safe characters.
const VERIFIER_BYTES: usize = 48;

/// A PKCE code verifier. Lives only for the duration of one login.
#[derive(Debug, Clone)]
pub struct CodeVerifier(SecretString);

impl CodeVerifier {
    /// Generate a fresh verifier from the OS-seeded thread RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(SecretString::from(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// The `S256` challenge: base64url(sha256(verifier)), unpadded.
    pub fn challenge(&self) -> String {
        let digest = Sha256::digest(self.0.expose_secret().as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<&str> for CodeVerifier {
    fn from(value: &str) -> Self {
        Self(SecretString::from(value.to_owned()))
    }
}
