/// Errors that can occur during session crypto operations.
///
/// `Decrypt` deliberately carries no detail: AEAD failure means "tampered,
/// truncated, or wrong key" and distinguishing those cases for a caller
/// (or an attacker reading logs) has no upside.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Authenticated decryption failed: tamper, truncation, or key
    /// mismatch. Fatal to the session.
    #[error("decryption failed")]
    Decrypt,

    /// The input is too short to even contain a nonce and auth tag.
    #[error("ciphertext too short")]
    CiphertextTooShort,

    /// Deriving the key-wrap key from the shared secret failed.
    #[error("key derivation failed")]
    KeyDerivation,

    /// A sealed session key blob does not have the expected layout.
    #[error("sealed key blob malformed")]
    MalformedSealedKey,
}
