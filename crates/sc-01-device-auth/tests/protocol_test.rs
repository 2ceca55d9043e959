//! # Challenge/Response Protocol Tests
//!
//! Exercises the public API the way the gateway does: one authenticator
//! shared between threads, many devices.

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use sc_01_device_auth::{
    expected_response, AuthConfig, AuthError, DeviceAuthenticator, DeviceIdentity,
    ManualTimeSource,
};
use uuid::Uuid;

const SECRET: &str = "integration-secret";

fn namespace() -> Uuid {
    Uuid::parse_str("9b2e7d3c-1a4f-4e8b-b6c2-5d0a7f3e9c81").unwrap()
}

fn authenticator() -> DeviceAuthenticator {
    DeviceAuthenticator::with_time_source(
        AuthConfig::new(namespace(), SECRET),
        Arc::new(ManualTimeSource::new(1_700_000_000)),
    )
}

proptest! {
    #[test]
    fn prop_valid_identity_authenticates_exactly_once(
        name in "[a-zA-Z0-9-]{1,24}",
        mac in "([0-9a-f]{2}:){5}[0-9a-f]{2}",
    ) {
        let auth = authenticator();
        let identity = DeviceIdentity::new(name, mac, &namespace());

        let code = auth.request_challenge(&identity).unwrap();
        let response = expected_response(&code, SECRET);

        prop_assert!(auth.verify_challenge(&identity, &response).is_ok());
        prop_assert_eq!(
            auth.verify_challenge(&identity, &response),
            Err(AuthError::ChallengeNotFound)
        );
    }
}

#[test]
fn test_concurrent_devices_do_not_interfere() {
    let auth = Arc::new(authenticator());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let auth = Arc::clone(&auth);
            thread::spawn(move || {
                let identity =
                    DeviceIdentity::new(format!("cam-{i}"), format!("02:00:00:00:00:{i:02x}"), &namespace());
                let code = auth.request_challenge(&identity).unwrap();
                auth.verify_challenge(&identity, &expected_response(&code, SECRET))
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().is_ok());
    }
    assert_eq!(auth.pending_challenges(), 0);
}

#[test]
fn test_response_for_other_device_rejected() {
    let auth = authenticator();
    let alice = DeviceIdentity::new("alice", "02:00:00:00:00:0a", &namespace());
    let bob = DeviceIdentity::new("bob", "02:00:00:00:00:0b", &namespace());

    let alice_code = auth.request_challenge(&alice).unwrap();
    let _bob_code = auth.request_challenge(&bob).unwrap();

    assert_eq!(
        auth.verify_challenge(&bob, &expected_response(&alice_code, SECRET)),
        Err(AuthError::InvalidResponse)
    );
    assert!(auth
        .verify_challenge(&alice, &expected_response(&alice_code, SECRET))
        .is_ok());
}
