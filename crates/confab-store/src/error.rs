//! Error types for the account store.

/// Errors that can cross the account store's boundary.
///
/// Authentication and redemption outcomes are *not* errors — they are
/// returned as [`AuthOutcome`](crate::AuthOutcome) and
/// [`RedeemOutcome`](crate::RedeemOutcome) values. What remains here is
/// the registration conflict and genuine database failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A user with this username already exists. Under concurrent
    /// registration of the same name, exactly one caller succeeds and the
    /// rest receive this.
    #[error("user {0:?} already exists")]
    DuplicateUser(String),

    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
