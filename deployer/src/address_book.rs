//! Persisted contract addresses.
//!
//! Written after a successful bootstrap so the dashboards can find the three
//! contracts. The JSON keys match what the frontend reads.

use std::path::Path;

use serde::{Deserialize, Serialize};

use urbancycle_common::types::Address;

/// Addresses of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    #[serde(rename = "urbanCoin", with = "hex_address")]
    pub urban_coin: Address,
    #[serde(rename = "wasteNFT", with = "hex_address")]
    pub waste_nft: Address,
    #[serde(rename = "recycleManager", with = "hex_address")]
    pub recycle_manager: Address,
}

impl AddressBook {
    /// Pretty JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, AddressBookError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or addresses.
    pub fn from_json(content: &str) -> Result<Self, AddressBookError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Write to `path`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), AddressBookError> {
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, AddressBookError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Address book I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum AddressBookError {
    #[error("failed to access address book: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address book: {0}")]
    Json(#[from] serde_json::Error),
}

mod hex_address {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use urbancycle_common::types::{address_from_hex, address_to_hex, Address};

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address_to_hex(address))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let text = String::deserialize(deserializer)?;
        address_from_hex(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> AddressBook {
        AddressBook {
            urban_coin: [0x11; 32],
            waste_nft: [0x22; 32],
            recycle_manager: [0x33; 32],
        }
    }

    #[test]
    fn test_json_keys() {
        let json = book().to_json().unwrap();
        assert!(json.contains("\"urbanCoin\": \"0x1111"));
        assert!(json.contains("\"wasteNFT\""));
        assert!(json.contains("\"recycleManager\""));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.json");

        book().save(&path).unwrap();
        assert_eq!(AddressBook::load(&path).unwrap(), book());
    }

    #[test]
    fn test_bad_address_rejected() {
        let json = r#"{"urbanCoin":"0x12","wasteNFT":"0x12","recycleManager":"0x12"}"#;
        assert!(matches!(AddressBook::from_json(json), Err(AddressBookError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AddressBook::load(&dir.path().join("none.json")),
            Err(AddressBookError::Io(_))
        ));
    }
}
