//! Sealed hand-off of the session key.
//!
//! The handshake transports the session key exactly once, server → client.
//! Sending it bare would hand the session to any eavesdropper, so it is
//! sealed with hybrid encryption instead:
//!
//! 1. The client generates an ephemeral X25519 keypair and sends the
//!    public half with its credentials.
//! 2. The server generates its own ephemeral keypair, performs ECDH
//!    against the client's public key, and derives a wrap key via
//!    HKDF-SHA256.
//! 3. The session key is AEAD-encrypted under the wrap key.
//!
//! Blob layout: `server_ephemeral_public (32) || nonce (12) ||
//! ciphertext+tag`. Both keypairs live for one handshake only.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::session_key::{KEY_SIZE, NONCE_SIZE, SessionKey, TAG_SIZE};
use crate::CryptoError;

/// HKDF info string binding derived keys to this protocol and use.
const HKDF_INFO: &[u8] = b"CONFAB-V1-KEY-SEAL";

/// Size of an X25519 public key in bytes.
const PUBLIC_SIZE: usize = 32;

/// Derives the symmetric wrap key from an ECDH shared secret.
fn derive_wrap_key(shared: &[u8]) -> Result<[u8; KEY_SIZE], CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut wrap = [0u8; KEY_SIZE];
    hk.expand(HKDF_INFO, &mut wrap)
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(wrap)
}

/// Seals a session key to the client's ephemeral public key (server side).
pub fn seal_session_key(
    key: &SessionKey,
    client_public: &[u8; PUBLIC_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    let server_secret = EphemeralSecret::random_from_rng(OsRng);
    let server_public = PublicKey::from(&server_secret);
    let shared =
        server_secret.diffie_hellman(&PublicKey::from(*client_public));

    let wrap = derive_wrap_key(shared.as_bytes())?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&wrap));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), key.as_bytes().as_slice())
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let mut blob =
        Vec::with_capacity(PUBLIC_SIZE + NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(server_public.as_bytes());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// The client's half of the key hand-off.
///
/// Generated just before sending credentials; the public half rides in the
/// login request, the secret half waits for the server's key frame. The
/// secret is consumed by [`open`](Self::open) — one keypair, one
/// handshake.
pub struct HandshakeKeyPair {
    secret: EphemeralSecret,
    public: [u8; PUBLIC_SIZE],
}

impl HandshakeKeyPair {
    /// Generates a fresh keypair for one handshake.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = *PublicKey::from(&secret).as_bytes();
        Self { secret, public }
    }

    /// The public half, to be sent with the login request.
    pub fn public(&self) -> [u8; PUBLIC_SIZE] {
        self.public
    }

    /// Opens a sealed session key blob received from the server.
    ///
    /// Consumes the keypair: the ephemeral secret is single-use.
    pub fn open(self, blob: &[u8]) -> Result<SessionKey, CryptoError> {
        if blob.len() < PUBLIC_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::MalformedSealedKey);
        }

        let mut server_public = [0u8; PUBLIC_SIZE];
        server_public.copy_from_slice(&blob[..PUBLIC_SIZE]);
        let nonce = &blob[PUBLIC_SIZE..PUBLIC_SIZE + NONCE_SIZE];
        let ciphertext = &blob[PUBLIC_SIZE + NONCE_SIZE..];

        let shared =
            self.secret.diffie_hellman(&PublicKey::from(server_public));
        let wrap = derive_wrap_key(shared.as_bytes())?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&wrap));

        let key_bytes = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        let key_bytes: [u8; KEY_SIZE] = key_bytes
            .try_into()
            .map_err(|_| CryptoError::MalformedSealedKey)?;
        Ok(SessionKey::from_bytes(key_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_round_trip() {
        let client = HandshakeKeyPair::generate();
        let key = SessionKey::generate();

        let blob = seal_session_key(&key, &client.public()).unwrap();
        let opened = client.open(&blob).unwrap();

        assert_eq!(opened.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_open_with_wrong_keypair_fails() {
        let intended = HandshakeKeyPair::generate();
        let eavesdropper = HandshakeKeyPair::generate();
        let key = SessionKey::generate();

        let blob = seal_session_key(&key, &intended.public()).unwrap();
        assert!(matches!(
            eavesdropper.open(&blob),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn test_open_tampered_blob_fails() {
        let client = HandshakeKeyPair::generate();
        let key = SessionKey::generate();

        let mut blob = seal_session_key(&key, &client.public()).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        assert!(matches!(client.open(&blob), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_open_truncated_blob_fails_cleanly() {
        let client = HandshakeKeyPair::generate();
        assert!(matches!(
            client.open(&[0u8; 10]),
            Err(CryptoError::MalformedSealedKey)
        ));
    }

    #[test]
    fn test_sealing_same_key_twice_produces_distinct_blobs() {
        // Fresh server ephemeral + nonce per seal; identical blobs would
        // mean reused randomness.
        let client = HandshakeKeyPair::generate();
        let key = SessionKey::generate();
        let a = seal_session_key(&key, &client.public()).unwrap();
        let b = seal_session_key(&key, &client.public()).unwrap();
        assert_ne!(a, b);
    }
}
