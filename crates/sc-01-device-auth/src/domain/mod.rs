//! Domain layer: identity derivation, challenge storage, response hashing.

pub mod challenge;
pub mod identity;
pub mod response;

pub use challenge::{Challenge, ChallengeStore};
pub use identity::DeviceIdentity;
pub use response::{expected_response, responses_match};
