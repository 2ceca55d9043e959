//! Device identity and UUID v5 derivation.
//!
//! The derived UUID is not a secret. It only proves that the three supplied
//! attributes are mutually consistent under the server's namespace.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Attributes a capture device reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Hostname of the device
    pub device_name: String,
    /// First hardware address reported by the device
    pub mac_address: String,
    /// UUID v5 of `device_name + mac_address`, as claimed by the device
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_info: Option<String>,
}

impl DeviceIdentity {
    /// Build an identity whose `uuid` is correctly derived under `namespace`.
    pub fn new(
        device_name: impl Into<String>,
        mac_address: impl Into<String>,
        namespace: &Uuid,
    ) -> Self {
        let device_name = device_name.into();
        let mac_address = mac_address.into();
        let uuid = Self::derive_uuid(namespace, &device_name, &mac_address).to_string();
        Self {
            device_name,
            mac_address,
            uuid,
            ip_address: None,
            os_info: None,
            machine_info: None,
        }
    }

    /// UUID v5 over the concatenation of name and MAC address.
    pub fn derive_uuid(namespace: &Uuid, device_name: &str, mac_address: &str) -> Uuid {
        let name = format!("{device_name}{mac_address}");
        Uuid::new_v5(namespace, name.as_bytes())
    }

    /// Parse the claimed UUID without checking it against the attributes.
    pub fn claimed_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.uuid).ok()
    }

    /// Check that the claimed UUID matches the derived one.
    ///
    /// Returns the verified UUID, which keys the challenge store.
    pub fn verify(&self, namespace: &Uuid) -> Result<Uuid, AuthError> {
        let claimed = self
            .claimed_uuid()
            .ok_or_else(|| AuthError::InvalidIdentity(format!("malformed uuid '{}'", self.uuid)))?;

        let derived = Self::derive_uuid(namespace, &self.device_name, &self.mac_address);
        if claimed != derived {
            return Err(AuthError::InvalidIdentity("Invalid UUID".into()));
        }
        Ok(derived)
    }
}
