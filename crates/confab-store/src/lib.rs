//! Account storage for the Confab server.
//!
//! This crate owns the two persisted tables and the three authentication
//! operations built on them:
//!
//! 1. **Registration** — create a user, optionally gated behind a one-shot
//!    invite word ([`AccountStore::register`])
//! 2. **Authentication** — the predicate the handshake consults
//!    ([`AccountStore::authenticate`])
//! 3. **Verification** — the unverified → verified transition
//!    ([`AccountStore::redeem_invite`])
//!
//! Domain outcomes (unknown user, bad digest, unverified, consumed invite)
//! are values, not errors: every operation returns a definite outcome, and
//! the only `Err` that crosses this crate's boundary is an underlying
//! database failure. The handshake layer translates outcomes into
//! protocol-level rejection frames.

mod error;
mod records;
mod store;

pub use error::StoreError;
pub use records::{
    AuthOutcome, InviteRecord, RedeemOutcome, Registration, UserRecord,
};
pub use store::{AccountStore, CONSUMED_SENTINEL, INVITE_WORD_LEN};
