//! Integration tests for the account store: cross-thread races and
//! on-disk persistence, the two things the in-module unit tests can't
//! exercise.

use std::sync::Arc;

use confab_protocol::digest;
use confab_store::{AccountStore, AuthOutcome, RedeemOutcome, StoreError};

#[test]
fn test_concurrent_registration_exactly_one_winner() {
    // Two tasks racing to register the same username: exactly one must
    // succeed, the other must get DuplicateUser. Repeat a few times to
    // give the race a chance to land both orderings.
    for round in 0..10 {
        let store = Arc::new(AccountStore::open_in_memory().unwrap());
        let username = format!("racer-{round}");

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let store = Arc::clone(&store);
                let username = username.clone();
                std::thread::spawn(move || {
                    store.register(&username, &format!("pw-{i}"), false)
                })
            })
            .collect();

        let results: Vec<_> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let wins = results.iter().filter(|r| r.is_ok()).count();
        let dupes = results
            .iter()
            .filter(|r| {
                matches!(r, Err(StoreError::DuplicateUser(u)) if *u == username)
            })
            .count();
        assert_eq!((wins, dupes), (1, 1), "round {round}: {results:?}");

        // The surviving record authenticates under exactly one password.
        let record = store.find_user(&username).unwrap().unwrap();
        let matching = (0..2)
            .filter(|i| {
                record.password_digest == digest(&format!("pw-{i}"))
            })
            .count();
        assert_eq!(matching, 1);
    }
}

#[test]
fn test_concurrent_redemption_single_success() {
    // Many threads racing the same correct invite digest: the invite is
    // one-shot, so exactly one redemption wins.
    let store = Arc::new(AccountStore::open_in_memory().unwrap());
    let word = store
        .register("bob", "pw2", true)
        .unwrap()
        .invite_word
        .unwrap();
    let word_digest = digest(&word);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let word_digest = word_digest.clone();
            std::thread::spawn(move || {
                store.redeem_invite("bob", &word_digest).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let redeemed = outcomes
        .iter()
        .filter(|o| **o == RedeemOutcome::Redeemed)
        .count();
    assert_eq!(redeemed, 1, "outcomes: {outcomes:?}");
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, RedeemOutcome::Redeemed | RedeemOutcome::Mismatch))
    );

    assert!(matches!(
        store.authenticate("bob", &digest("pw2")).unwrap(),
        AuthOutcome::Verified(_)
    ));
}

#[test]
fn test_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.db");

    let word = {
        let store = AccountStore::open(&path).unwrap();
        store.register("alice", "pw1", false).unwrap();
        store
            .register("bob", "pw2", true)
            .unwrap()
            .invite_word
            .unwrap()
    };

    // Reopen: schema creation must be idempotent and rows must survive.
    let store = AccountStore::open(&path).unwrap();
    assert!(matches!(
        store.authenticate("alice", &digest("pw1")).unwrap(),
        AuthOutcome::Verified(_)
    ));
    assert_eq!(
        store.authenticate("bob", &digest("pw2")).unwrap(),
        AuthOutcome::Unverified
    );
    assert_eq!(
        store.redeem_invite("bob", &digest(&word)).unwrap(),
        RedeemOutcome::Redeemed
    );
}
