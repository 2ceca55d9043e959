//! # SC-01 Device Authentication
//!
//! Challenge/response authentication for capture devices.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): pure logic, no I/O
//!   - `DeviceIdentity`: device attributes plus the UUID v5 derived from them
//!   - `Challenge` / `ChallengeStore`: single-use, expiring challenge codes
//!   - `expected_response`: the answer a device must present
//!
//! - **Ports Layer** (`ports/`): `TimeSource` for testable expiry
//!
//! - **Service Layer** (`service/`): `DeviceAuthenticator` drives the protocol
//!
//! ## Protocol
//!
//! ```text
//! UNCHALLENGED ──request_challenge──→ CHALLENGED ──verify_challenge(ok)──→ AUTHENTICATED
//!       ↑                                  │
//!       └────── expired / wrong answer ────┘
//! ```
//!
//! 1. The device sends `{device_name, mac_address, uuid}`; the server re-derives
//!    the UUID v5 of `device_name + mac_address` and rejects mismatches.
//! 2. The server stores a random base32 code for the device UUID and returns it.
//! 3. The device answers with `hex(sha256(code + shared_secret))`.
//! 4. The stored challenge is removed on every verification attempt.
//!
//! ## Usage
//!
//! ```ignore
//! use sc_01_device_auth::{AuthConfig, DeviceAuthenticator, DeviceIdentity, expected_response};
//!
//! let auth = DeviceAuthenticator::new(AuthConfig::new(namespace, "secret"));
//! let identity = DeviceIdentity::new("cam-01", "aa:bb:cc:dd:ee:ff", &namespace);
//! let code = auth.request_challenge(&identity)?;
//! auth.verify_challenge(&identity, &expected_response(&code, "secret"))?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::challenge::{generate_code, Challenge, ChallengeStore, CHALLENGE_CODE_LEN};
pub use domain::identity::DeviceIdentity;
pub use domain::response::{expected_response, responses_match};
pub use error::AuthError;
pub use ports::outbound::{ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
pub use service::{auth_check, AuthConfig, DeviceAuthenticator, SessionAuth};

/// Default challenge lifetime in seconds.
pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 300;
