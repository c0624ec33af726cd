//! Record types and operation outcomes for the account store.

/// One row of the `users` table.
///
/// `username` is the stable business key across tables; `id` is assigned
/// by the database on insert. `verified` flips exactly once, server-side,
/// when a matching invite digest is presented. Records are never deleted
/// by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    /// One-way digest of the password. The plaintext never touches
    /// storage.
    pub password_digest: String,
    pub verified: bool,
    /// The invite word issued at registration; `None` for accounts
    /// created without verification.
    pub invite_word: Option<String>,
}

/// One row of the `invite_keys` table.
///
/// Created alongside an unverified [`UserRecord`]; its `invite_hash` is
/// overwritten with the consumed sentinel once verification succeeds —
/// a one-shot credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRecord {
    pub id: i64,
    pub username: String,
    pub invite_hash: String,
}

/// What [`register`](crate::AccountStore::register) hands back.
///
/// `invite_word` is returned exactly once, here, to be delivered to the
/// user over an out-of-band channel. The store keeps only its digest for
/// comparison; it never surfaces the word again.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: UserRecord,
    pub invite_word: Option<String>,
}

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials match and the account is verified — the handshake may
    /// issue a session key.
    Verified(UserRecord),
    /// No account under that username.
    UserNotFound,
    /// The password digest did not match.
    InvalidCredentials,
    /// Credentials match, but the invite has not been redeemed.
    /// Unverified accounts may not open chat sessions.
    Unverified,
}

/// Outcome of an invite redemption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// Digest matched; the account is now verified and the invite is
    /// consumed.
    Redeemed,
    /// Digest did not match the stored hash. Also the answer for an
    /// already-consumed invite: redemption is one-shot, and repeating it
    /// fails without disturbing the verified account.
    Mismatch,
    /// No invite record for that username.
    NotFound,
}
