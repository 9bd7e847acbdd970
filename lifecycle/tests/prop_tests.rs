//! Property tests for the token primitives.

mod common;

use proptest::prelude::*;

use common::harness;
use tokentrust_lifecycle::{LifecycleError, TokenOp};
use tokentrust_types::TokenState;

fn op_strategy() -> impl Strategy<Value = TokenOp> {
    prop_oneof![
        Just(TokenOp::Freeze),
        Just(TokenOp::Unfreeze),
        Just(TokenOp::Revoke),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Once revoked, no sequence of primitives changes the state, and every
    /// call appends exactly one audit entry unless it fails.
    #[test]
    fn revoked_is_absorbing(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let h = harness();
        let token = h.issue();
        let mut revoked = false;

        for op in ops {
            let before = h.audit_len();
            let result = match op {
                TokenOp::Freeze => h.lifecycle.freeze(&token.id, "prop", "freeze"),
                TokenOp::Unfreeze => h.lifecycle.unfreeze(&token.id, "prop", "unfreeze"),
                TokenOp::Revoke => h.lifecycle.revoke(&token.id, "prop", "revoke"),
            };
            let state = h.lifecycle.token(&token.id).unwrap().token.state;

            if revoked {
                prop_assert_eq!(state, TokenState::Revoked);
            }
            match result {
                Ok(outcome) => {
                    prop_assert_eq!(h.audit_len(), before + 1);
                    prop_assert_eq!(outcome.state, state);
                }
                Err(LifecycleError::TokenRevoked(_)) => {
                    prop_assert!(revoked);
                    prop_assert_eq!(h.audit_len(), before);
                }
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
            revoked |= op == TokenOp::Revoke;
        }
    }

    /// Applying the same primitive twice leaves the same state and two entries.
    #[test]
    fn primitives_are_idempotent(op in op_strategy()) {
        let h = harness();
        let token = h.issue();
        let apply = || match op {
            TokenOp::Freeze => h.lifecycle.freeze(&token.id, "prop", "x"),
            TokenOp::Unfreeze => h.lifecycle.unfreeze(&token.id, "prop", "x"),
            TokenOp::Revoke => h.lifecycle.revoke(&token.id, "prop", "x"),
        };
        let before = h.audit_len();
        let first = apply().unwrap();
        let second = apply().unwrap();
        prop_assert_eq!(first.state, second.state);
        prop_assert!(!second.changed());
        prop_assert_eq!(second.action, op.noop_action());
        prop_assert_eq!(h.audit_len(), before + 2);
    }
}
