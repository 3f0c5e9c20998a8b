//! Structural address validation for both chains.
//!
//! Validity is format only: prefix, length, charset and (for Aergo) the
//! base58check checksum. No chain state is consulted.

use std::{fmt, str::FromStr};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Chain, Result};

/// Length of a `0x`-prefixed Ethereum address string.
pub const ETH_ADDRESS_LEN: usize = 42;

/// Length of a base58check encoded Aergo address string.
pub const AERGO_ADDRESS_LEN: usize = 52;

/// Parse an Ethereum address, requiring the `0x` prefix and exactly 40 hex digits.
///
/// Mixed case is accepted without checking the EIP-55 checksum; key derivation
/// lowercases everything anyway.
pub fn parse_eth_address(addr: &str) -> Result<Address> {
    let invalid = |reason| BridgeError::InvalidAddress {
        chain: Chain::Ethereum,
        address: addr.to_string(),
        reason,
    };

    let digits = addr.strip_prefix("0x").ok_or_else(|| invalid("missing 0x prefix"))?;
    if addr.len() != ETH_ADDRESS_LEN {
        return Err(invalid("expected 42 characters"));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid("non-hex character"));
    }

    let mut bytes = [0u8; 20];
    alloy::hex::decode_to_slice(digits, &mut bytes).map_err(|_| invalid("non-hex character"))?;
    Ok(Address::from(bytes))
}

/// Render an Ethereum address the way the Aergo bridge contract stores it:
/// lowercase hex without the `0x` marker.
pub fn eth_address_arg(addr: &Address) -> String {
    alloy::hex::encode(addr.as_slice())
}

/// A validated Aergo account or contract address.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AergoAddress(String);

impl AergoAddress {
    /// The address as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 52 ASCII bytes of the address, as they enter storage keys.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for AergoAddress {
    type Err = BridgeError;

    fn from_str(addr: &str) -> Result<Self> {
        let invalid = |reason| BridgeError::InvalidAddress {
            chain: Chain::Aergo,
            address: addr.to_string(),
            reason,
        };

        if !addr.starts_with('A') {
            return Err(invalid("must start with 'A'"));
        }
        if addr.len() != AERGO_ADDRESS_LEN {
            return Err(invalid("expected 52 characters"));
        }
        bs58::decode(addr)
            .with_check(None)
            .into_vec()
            .map_err(|_| invalid("bad base58check encoding"))?;

        Ok(Self(addr.to_string()))
    }
}

impl TryFrom<String> for AergoAddress {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AergoAddress> for String {
    fn from(value: AergoAddress) -> Self {
        value.0
    }
}

impl fmt::Display for AergoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AergoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AergoAddress({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{AERGO_BRIDGE, AERGO_RECEIVER, ETH_RECEIVER};

    #[test]
    fn test_parse_eth_address() {
        let addr = parse_eth_address(ETH_RECEIVER).unwrap();
        assert_eq!(eth_address_arg(&addr), "fec3c905bcd3d9a5471452e53f82106844cb1e76");

        let mixed = parse_eth_address("0x89eD1D1C145F6bF3A7e62d2B8eB0e1Bf15Cb2374").unwrap();
        assert_eq!(eth_address_arg(&mixed), "89ed1d1c145f6bf3a7e62d2b8eb0e1bf15cb2374");
    }

    #[test]
    fn test_reject_malformed_eth_address() {
        for bad in [
            "fec3c905bcd3d9a5471452e53f82106844cb1e76",
            "0xfec3c905bcd3d9a5471452e53f82106844cb1e7",
            "0xfec3c905bcd3d9a5471452e53f82106844cb1e7g",
            "0Xfec3c905bcd3d9a5471452e53f82106844cb1e76",
        ] {
            let err = parse_eth_address(bad).unwrap_err();
            assert!(
                matches!(err, BridgeError::InvalidAddress { chain: Chain::Ethereum, .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_aergo_address() {
        let addr: AergoAddress = AERGO_RECEIVER.parse().unwrap();
        assert_eq!(addr.as_str(), AERGO_RECEIVER);
        assert_eq!(addr.as_bytes().len(), AERGO_ADDRESS_LEN);

        assert!(AERGO_BRIDGE.parse::<AergoAddress>().is_ok());
    }

    #[test]
    fn test_reject_malformed_aergo_address() {
        // wrong prefix
        assert!("BmNMFbiVsqy6vg4njsTjgy7bKPFHFYhLV4rzQyrENUS9AM1e3tw5".parse::<AergoAddress>().is_err());
        // wrong length
        assert!("AmNMFbiVsqy6vg4njsTjgy7bKPFHFYhLV4rzQyrENUS9AM1e3tw".parse::<AergoAddress>().is_err());
        // checksum broken by a flipped last character
        let err = "AmNMFbiVsqy6vg4njsTjgy7bKPFHFYhLV4rzQyrENUS9AM1e3tw6"
            .parse::<AergoAddress>()
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidAddress {
                chain: Chain::Aergo,
                reason: "bad base58check encoding",
                ..
            }
        ));
    }

    #[test]
    fn test_aergo_address_serde() {
        let json = format!("\"{AERGO_RECEIVER}\"");
        let addr: AergoAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&addr).unwrap(), json);

        assert!(serde_json::from_str::<AergoAddress>("\"Anope\"").is_err());
    }
}
