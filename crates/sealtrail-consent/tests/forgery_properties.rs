//! Property tests for consent token forgery detection.
//!
//! Any token whose signed fields differ from what was issued must fail
//! verification while keeping the original signature.

use chrono::Duration;
use proptest::prelude::*;

use sealtrail_consent::ConsentTokenAuthority;
use sealtrail_contracts::token::{ConsentToken, HumanApproval};

// Strategy: Generate arbitrary human approval states
fn arb_approval() -> impl Strategy<Value = Option<HumanApproval>> {
    prop_oneof![
        Just(None),
        any::<bool>().prop_map(|d| Some(HumanApproval::Decision(d))),
        "[a-z_ ]{1,24}".prop_map(|r| Some(HumanApproval::Rationale(r))),
    ]
}

// Strategy: One single-field edit to apply to an issued token
#[derive(Debug, Clone)]
enum Edit {
    Operation(String),
    FlipEthics,
    Approval(Option<HumanApproval>),
    ShiftIssuedAt(i64),
    Subject(String),
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[a-z_]{1,16}".prop_map(Edit::Operation),
        Just(Edit::FlipEthics),
        arb_approval().prop_map(Edit::Approval),
        (1i64..100_000).prop_map(Edit::ShiftIssuedAt),
        "[a-z0-9_]{1,16}".prop_map(Edit::Subject),
    ]
}

/// Apply `edit`, returning `None` when it would leave the token unchanged.
fn apply(token: &ConsentToken, edit: &Edit) -> Option<ConsentToken> {
    let mut forged = token.clone();
    match edit {
        Edit::Operation(op) => forged.operation = op.clone(),
        Edit::FlipEthics => forged.ethics_verified = !forged.ethics_verified,
        Edit::Approval(a) => forged.human_approval = a.clone(),
        Edit::ShiftIssuedAt(ms) => forged.issued_at = forged.issued_at + Duration::milliseconds(*ms),
        Edit::Subject(s) => forged.subject = s.clone(),
    }
    (forged != *token).then_some(forged)
}

proptest! {
    /// Property: issued tokens always verify under the issuing key.
    #[test]
    fn proptest_issued_tokens_verify(
        key in prop::collection::vec(any::<u8>(), 1..64),
        operation in "[a-z_]{1,24}",
        ethics in any::<bool>(),
        approval in arb_approval(),
        subject in "[a-z0-9_]{1,16}",
    ) {
        let authority = ConsentTokenAuthority::new(key).unwrap();
        let token = authority.issue(&operation, ethics, approval, &subject).unwrap();
        prop_assert!(authority.verify(&token));
    }

    /// Property: a single altered field with the original signature never
    /// verifies.
    #[test]
    fn proptest_altered_field_is_rejected(
        operation in "[a-z_]{1,24}",
        ethics in any::<bool>(),
        approval in arb_approval(),
        subject in "[a-z0-9_]{1,16}",
        edit in arb_edit(),
    ) {
        let authority = ConsentTokenAuthority::new(b"forgery-property-key".to_vec()).unwrap();
        let token = authority.issue(&operation, ethics, approval, &subject).unwrap();

        if let Some(forged) = apply(&token, &edit) {
            prop_assert_eq!(&forged.signature, &token.signature);
            prop_assert!(!authority.verify(&forged), "forged token verified: {:?}", forged);
        }
    }

    /// Property: a guessed signature never verifies.
    #[test]
    fn proptest_guessed_signature_is_rejected(guess in prop::collection::vec(any::<u8>(), 32)) {
        let authority = ConsentTokenAuthority::new(b"forgery-property-key".to_vec()).unwrap();
        let mut token = authority.issue("data_write", true, Some(true.into()), "alice").unwrap();
        let guessed = hex::encode(&guess);
        prop_assume!(guessed != token.signature);
        token.signature = guessed;
        prop_assert!(!authority.verify(&token));
    }

    /// Property: re-spelling the stored signature (same bytes, different
    /// hex text) never verifies.
    #[test]
    fn proptest_respelled_signature_is_rejected(
        operation in "[a-z_]{1,24}",
        subject in "[a-z0-9_]{1,16}",
        padded in any::<bool>(),
    ) {
        let authority = ConsentTokenAuthority::new(b"forgery-property-key".to_vec()).unwrap();
        let token = authority.issue(&operation, true, None, &subject).unwrap();

        let mut respelled = token.clone();
        respelled.signature = if padded {
            format!(" {}", token.signature)
        } else {
            token.signature.to_uppercase()
        };
        prop_assume!(respelled.signature != token.signature);
        prop_assert!(!authority.verify(&respelled));
    }
}

#[test]
fn test_uppercased_signature_is_rejected() {
    let authority = ConsentTokenAuthority::new(b"forgery-property-key".to_vec()).unwrap();
    let mut token = authority.issue("data_write", true, Some(true.into()), "alice").unwrap();
    assert!(authority.verify(&token));

    // An all-digit signature has no case to change.
    token.signature = token.signature.to_uppercase();
    if !token.signature.bytes().any(|b| b.is_ascii_alphabetic()) {
        token.signature.replace_range(..1, "A");
    }
    assert!(!authority.verify(&token));
}
