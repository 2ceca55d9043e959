//! Service layer: the challenge/response protocol driver.

pub mod authenticator;

pub use authenticator::{auth_check, AuthConfig, DeviceAuthenticator, SessionAuth};
