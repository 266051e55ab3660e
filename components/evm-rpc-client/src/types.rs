use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeserializationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 20 bytes account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_hex(value: &str) -> Result<Address, String> {
        let stripped = value.strip_prefix("0x").unwrap_or(value);
        if stripped.len() != 40 {
            return Err(format!(
                "unable to parse '{}' as an address (expected 20 bytes)",
                value
            ));
        }
        let bytes = hex::decode(stripped)
            .map_err(|e| format!("unable to parse '{}' as an address: {}", value, e))?;
        let mut buffer = [0u8; 20];
        buffer.copy_from_slice(&bytes);
        Ok(Address(buffer))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The address left padded to the 32 bytes word used by constructor
    /// argument encoding.
    pub fn abi_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Address::from_hex(value)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Address::from_hex(&value).map_err(DeserializationError::custom)
    }
}

pub fn format_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

pub fn format_wei(value: u128) -> String {
    format!("0x{:x}", value)
}

pub fn parse_quantity(value: &str) -> Result<u64, String> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(stripped, 16)
        .map_err(|e| format!("unable to parse '{}' as a quantity: {}", value, e))
}

/// Transaction object submitted through `eth_sendTransaction`. The node
/// holds the sender's key and signs on our behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl TransactionRequest {
    pub fn contract_deployment(
        from: Address,
        data: &[u8],
        gas: u64,
        gas_price: Option<u64>,
        nonce: u64,
    ) -> TransactionRequest {
        TransactionRequest {
            from,
            to: None,
            gas: Some(format_quantity(gas)),
            gas_price: gas_price.map(format_quantity),
            value: None,
            data: Some(format!("0x{}", hex::encode(data))),
            nonce: Some(format_quantity(nonce)),
        }
    }

    pub fn transfer(
        from: Address,
        to: Address,
        wei_amount: u128,
        gas_price: Option<u64>,
        nonce: u64,
    ) -> TransactionRequest {
        TransactionRequest {
            from,
            to: Some(to),
            gas: Some(format_quantity(21_000)),
            gas_price: gas_price.map(format_quantity),
            value: Some(format_wei(wei_amount)),
            data: None,
            nonce: Some(format_quantity(nonce)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: String,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub gas_used: Option<String>,
    pub status: String,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        matches!(parse_quantity(&self.status), Ok(1))
    }

    pub fn block_height(&self) -> Result<u64, String> {
        parse_quantity(&self.block_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_address() {
        let address = Address::from_hex("0xDe0B295669a9FD93d5F28D9Ec85E40f4cb697BAe").unwrap();
        assert_eq!(
            address.to_string(),
            "0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae"
        );
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("de0b295669a9fd93d5f28d9ec85e40f4cb697bae").is_ok());
        assert!(Address::from_hex("0xzz0b295669a9fd93d5f28d9ec85e40f4cb697bae").is_err());
    }

    #[test]
    fn test_abi_word_is_left_padded() {
        let address = Address::from_hex("0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae").unwrap();
        let word = address.abi_word();
        assert_eq!(&word[0..12], &[0u8; 12]);
        assert_eq!(&word[12..], address.as_bytes());
    }

    #[test]
    fn test_quantity_round_trip() {
        assert_eq!(format_quantity(0), "0x0");
        assert_eq!(format_quantity(1_700_000), "0x19f0a0");
        assert_eq!(parse_quantity("0x19f0a0").unwrap(), 1_700_000);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(parse_quantity("0x").is_err());
    }

    #[test]
    fn test_contract_deployment_request_shape() {
        let from = Address::from_hex("0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1").unwrap();
        let request = TransactionRequest::contract_deployment(from, &[0x60, 0x80], 1_700_000, None, 3);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "from": "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1",
                "gas": "0x19f0a0",
                "data": "0x6080",
                "nonce": "0x3",
            })
        );
    }

    #[test]
    fn test_receipt_status() {
        let receipt = TransactionReceipt {
            transaction_hash: "0xabc".to_string(),
            block_number: "0x10".to_string(),
            contract_address: None,
            gas_used: Some("0x5208".to_string()),
            status: "0x1".to_string(),
        };
        assert!(receipt.is_success());
        assert_eq!(receipt.block_height().unwrap(), 16);
        let reverted = TransactionReceipt {
            status: "0x0".to_string(),
            ..receipt
        };
        assert!(!reverted.is_success());
    }
}
