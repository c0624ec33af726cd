//! The account store: SQLite tables and the operations over them.
//!
//! # Concurrency
//!
//! The store is the one resource shared by every connection task, so each
//! operation is a single critical section: one mutex around the
//! connection makes every lookup-followed-by-conditional-write atomic
//! with respect to concurrent registrations and redemptions. The UNIQUE
//! index on `users.username` backs that up at the database level —
//! two racing registrations of the same name produce exactly one row.
//!
//! # SQL hygiene
//!
//! Every value is a bound parameter. Table and column identifiers are
//! fixed string literals in this file; callers can never supply one.

use std::path::Path;
use std::sync::Mutex;

use confab_protocol::digest;
use rand::RngCore;
use rand::rngs::OsRng;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;
use crate::records::{
    AuthOutcome, InviteRecord, RedeemOutcome, Registration, UserRecord,
};

/// Value written over a redeemed invite hash. No digest can ever equal it
/// (digests are 64 hex chars), so a consumed invite always compares as a
/// mismatch afterwards.
pub const CONSUMED_SENTINEL: &str = "consumed";

/// Length in characters of a generated invite word (128 bits as hex).
pub const INVITE_WORD_LEN: usize = 32;

const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    username        TEXT NOT NULL UNIQUE,
    password_digest TEXT NOT NULL,
    verified        INTEGER NOT NULL,
    invite_word     TEXT
);
CREATE TABLE IF NOT EXISTS invite_keys (
    id          INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    username    TEXT NOT NULL,
    invite_hash TEXT NOT NULL
);
";

/// Server-side store of user accounts and invite records.
pub struct AccountStore {
    conn: Mutex<Connection>,
}

impl AccountStore {
    /// Opens (creating if needed) the store at the given path.
    ///
    /// Table creation is idempotent; opening an existing database leaves
    /// its rows untouched.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store. Used by tests and throwaway servers.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates a new account.
    ///
    /// With `require_verification`, the account starts unverified: a
    /// random invite word is generated, stored on the user row, and its
    /// digest recorded in `invite_keys`. The word itself is returned once
    /// in [`Registration::invite_word`] for out-of-band delivery — it is
    /// not retrievable through any other operation.
    ///
    /// # Errors
    /// [`StoreError::DuplicateUser`] if the username is taken.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        require_verification: bool,
    ) -> Result<Registration, StoreError> {
        let password_digest = digest(password);
        let invite_word =
            require_verification.then(generate_invite_word);

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO users (username, password_digest, verified, invite_word)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                username,
                password_digest,
                !require_verification,
                invite_word
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::DuplicateUser(username.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        let user_id = tx.last_insert_rowid();

        if let Some(word) = &invite_word {
            tx.execute(
                "INSERT INTO invite_keys (username, invite_hash)
                 VALUES (?1, ?2)",
                params![username, digest(word)],
            )?;
        }
        tx.commit()?;

        tracing::info!(
            username,
            verified = !require_verification,
            "user registered"
        );

        Ok(Registration {
            user: UserRecord {
                id: user_id,
                username: username.to_string(),
                password_digest,
                verified: !require_verification,
                invite_word: invite_word.clone(),
            },
            invite_word,
        })
    }

    /// Checks credentials for the login handshake.
    ///
    /// Never errors for domain reasons — every attempt maps to one of the
    /// four [`AuthOutcome`]s.
    pub fn authenticate(
        &self,
        username: &str,
        password_digest: &str,
    ) -> Result<AuthOutcome, StoreError> {
        let conn = self.lock();
        let Some(user) = find_user(&conn, username)? else {
            return Ok(AuthOutcome::UserNotFound);
        };
        if user.password_digest != password_digest {
            return Ok(AuthOutcome::InvalidCredentials);
        }
        if !user.verified {
            return Ok(AuthOutcome::Unverified);
        }
        Ok(AuthOutcome::Verified(user))
    }

    /// Redeems an invite: flips the account to verified and consumes the
    /// invite record.
    ///
    /// One-shot by construction — the stored hash is overwritten with
    /// [`CONSUMED_SENTINEL`] on success, so a repeat presentation of the
    /// same (correct) digest comes back as `Mismatch` while the account
    /// stays verified.
    pub fn redeem_invite(
        &self,
        username: &str,
        invite_digest: &str,
    ) -> Result<RedeemOutcome, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let invite: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, invite_hash FROM invite_keys
                 WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((invite_id, stored_hash)) = invite else {
            return Ok(RedeemOutcome::NotFound);
        };
        // A consumed invite never matches again, not even against the
        // sentinel text itself.
        if stored_hash == CONSUMED_SENTINEL || stored_hash != invite_digest
        {
            return Ok(RedeemOutcome::Mismatch);
        }

        tx.execute(
            "UPDATE users SET verified = 1 WHERE username = ?1",
            params![username],
        )?;
        tx.execute(
            "UPDATE invite_keys SET invite_hash = ?1 WHERE id = ?2",
            params![CONSUMED_SENTINEL, invite_id],
        )?;
        tx.commit()?;

        tracing::info!(username, "invite redeemed, user verified");
        Ok(RedeemOutcome::Redeemed)
    }

    /// Looks up a user by username.
    pub fn find_user(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        find_user(&self.lock(), username)
    }

    /// Looks up a user's invite record.
    ///
    /// The `invite_hash` it carries is the stored digest before
    /// redemption and [`CONSUMED_SENTINEL`] after — never the word
    /// itself.
    pub fn find_invite(
        &self,
        username: &str,
    ) -> Result<Option<InviteRecord>, StoreError> {
        let invite = self
            .lock()
            .query_row(
                "SELECT id, username, invite_hash FROM invite_keys
                 WHERE username = ?1",
                params![username],
                |row| {
                    Ok(InviteRecord {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        invite_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(invite)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-query on another thread; the
        // connection itself is still usable.
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn find_user(
    conn: &Connection,
    username: &str,
) -> Result<Option<UserRecord>, StoreError> {
    let user = conn
        .query_row(
            "SELECT id, username, password_digest, verified, invite_word
             FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(UserRecord {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_digest: row.get(2)?,
                    verified: row.get::<_, i64>(3)? != 0,
                    invite_word: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Generates a random invite word: 128 bits from the OS CSPRNG as 32 hex
/// characters. Guessing one is as hard as guessing a session key.
fn generate_invite_word() -> String {
    let mut bytes = [0u8; INVITE_WORD_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `AccountStore`, all against in-memory databases.
    //!
    //! Naming convention: `test_{operation}_{scenario}_{expected}`.

    use super::*;

    fn store() -> AccountStore {
        AccountStore::open_in_memory().expect("in-memory store")
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[test]
    fn test_register_without_verification_is_immediately_verified() {
        let store = store();

        let reg = store.register("alice", "pw1", false).expect("register");

        assert!(reg.user.verified);
        assert!(reg.invite_word.is_none());
        assert_eq!(reg.user.username, "alice");
        // The digest is stored, never the plaintext.
        assert_eq!(reg.user.password_digest, digest("pw1"));
    }

    #[test]
    fn test_register_with_verification_returns_invite_word_once() {
        let store = store();

        let reg = store.register("bob", "pw2", true).expect("register");

        assert!(!reg.user.verified);
        let word = reg.invite_word.expect("invite word issued");
        assert_eq!(word.len(), INVITE_WORD_LEN);
        // No other operation surfaces the word in digestable form: the
        // invite table holds only its hash.
        assert_eq!(
            store
                .redeem_invite("bob", &digest(&word))
                .expect("redeem"),
            RedeemOutcome::Redeemed
        );
    }

    #[test]
    fn test_register_duplicate_username_returns_duplicate_user() {
        let store = store();
        store.register("alice", "pw1", false).unwrap();

        let result = store.register("alice", "other", true);

        assert!(
            matches!(result, Err(StoreError::DuplicateUser(u)) if u == "alice")
        );
    }

    #[test]
    fn test_register_generates_distinct_invite_words() {
        let store = store();
        let w1 = store
            .register("u1", "p", true)
            .unwrap()
            .invite_word
            .unwrap();
        let w2 = store
            .register("u2", "p", true)
            .unwrap()
            .invite_word
            .unwrap();
        assert_ne!(w1, w2);
    }

    // =====================================================================
    // authenticate()
    // =====================================================================

    #[test]
    fn test_authenticate_verified_user_returns_record() {
        let store = store();
        store.register("alice", "pw1", false).unwrap();

        let outcome = store.authenticate("alice", &digest("pw1")).unwrap();

        match outcome {
            AuthOutcome::Verified(user) => {
                assert_eq!(user.username, "alice");
                assert!(user.verified);
            }
            other => panic!("expected Verified, got {other:?}"),
        }
    }

    #[test]
    fn test_authenticate_unknown_user_returns_user_not_found() {
        let store = store();
        let outcome = store.authenticate("ghost", &digest("pw")).unwrap();
        assert_eq!(outcome, AuthOutcome::UserNotFound);
    }

    #[test]
    fn test_authenticate_wrong_digest_returns_invalid_credentials() {
        let store = store();
        store.register("alice", "pw1", false).unwrap();

        let outcome =
            store.authenticate("alice", &digest("wrong")).unwrap();
        assert_eq!(outcome, AuthOutcome::InvalidCredentials);
    }

    #[test]
    fn test_authenticate_unverified_until_invite_redeemed() {
        let store = store();
        let word = store
            .register("bob", "pw2", true)
            .unwrap()
            .invite_word
            .unwrap();

        // Correct credentials, but the account is gated.
        assert_eq!(
            store.authenticate("bob", &digest("pw2")).unwrap(),
            AuthOutcome::Unverified
        );

        store.redeem_invite("bob", &digest(&word)).unwrap();

        assert!(matches!(
            store.authenticate("bob", &digest("pw2")).unwrap(),
            AuthOutcome::Verified(_)
        ));
    }

    // =====================================================================
    // redeem_invite()
    // =====================================================================

    #[test]
    fn test_redeem_invite_wrong_digest_returns_mismatch() {
        let store = store();
        store.register("bob", "pw2", true).unwrap();

        let outcome = store
            .redeem_invite("bob", &digest("not the word"))
            .unwrap();

        assert_eq!(outcome, RedeemOutcome::Mismatch);
        // Still unverified.
        assert_eq!(
            store.authenticate("bob", &digest("pw2")).unwrap(),
            AuthOutcome::Unverified
        );
    }

    #[test]
    fn test_redeem_invite_unknown_user_returns_not_found() {
        let store = store();
        let outcome =
            store.redeem_invite("ghost", &digest("word")).unwrap();
        assert_eq!(outcome, RedeemOutcome::NotFound);
    }

    #[test]
    fn test_redeem_invite_is_one_shot() {
        let store = store();
        let word = store
            .register("bob", "pw2", true)
            .unwrap()
            .invite_word
            .unwrap();
        let word_digest = digest(&word);

        assert_eq!(
            store.redeem_invite("bob", &word_digest).unwrap(),
            RedeemOutcome::Redeemed
        );

        // Same correct digest again: the invite is consumed, so this is a
        // Mismatch — never a re-verification, never an error.
        assert_eq!(
            store.redeem_invite("bob", &word_digest).unwrap(),
            RedeemOutcome::Mismatch
        );
        // And the account is still verified.
        assert!(matches!(
            store.authenticate("bob", &digest("pw2")).unwrap(),
            AuthOutcome::Verified(_)
        ));
    }

    #[test]
    fn test_redeem_invite_consumed_hash_is_sentinel() {
        let store = store();
        let word = store
            .register("bob", "pw2", true)
            .unwrap()
            .invite_word
            .unwrap();
        store.redeem_invite("bob", &digest(&word)).unwrap();

        // Even presenting the sentinel text itself must not redeem a
        // consumed invite.
        assert_eq!(
            store.redeem_invite("bob", CONSUMED_SENTINEL).unwrap(),
            RedeemOutcome::Mismatch
        );
        assert!(matches!(
            store.authenticate("bob", &digest("pw2")).unwrap(),
            AuthOutcome::Verified(_)
        ));
    }

    // =====================================================================
    // find_user()
    // =====================================================================

    #[test]
    fn test_find_user_returns_none_for_unknown() {
        let store = store();
        assert!(store.find_user("nobody").unwrap().is_none());
    }

    #[test]
    fn test_find_user_round_trips_record_fields() {
        let store = store();
        let reg = store.register("carol", "pw3", true).unwrap();

        let found = store
            .find_user("carol")
            .unwrap()
            .expect("should exist");

        assert_eq!(found, reg.user);
        assert_eq!(found.invite_word, reg.invite_word);
    }

    // =====================================================================
    // find_invite()
    // =====================================================================

    #[test]
    fn test_find_invite_holds_digest_then_sentinel() {
        let store = store();
        let word = store
            .register("bob", "pw2", true)
            .unwrap()
            .invite_word
            .unwrap();

        // Before redemption the record holds the digest, not the word.
        let invite = store
            .find_invite("bob")
            .unwrap()
            .expect("invite record exists");
        assert_eq!(invite.username, "bob");
        assert_eq!(invite.invite_hash, digest(&word));
        assert_ne!(invite.invite_hash, word);

        store.redeem_invite("bob", &digest(&word)).unwrap();

        let consumed = store
            .find_invite("bob")
            .unwrap()
            .expect("record survives redemption");
        assert_eq!(consumed.invite_hash, CONSUMED_SENTINEL);
    }

    #[test]
    fn test_find_invite_none_for_ungated_account() {
        let store = store();
        store.register("alice", "pw1", false).unwrap();
        assert!(store.find_invite("alice").unwrap().is_none());
    }
}
