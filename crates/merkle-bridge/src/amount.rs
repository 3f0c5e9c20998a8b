//! Token amounts across the serialization boundary.
//!
//! Amounts are [`U256`] in this crate. Aergo contracts exchange them as a tagged
//! big number object, `{"_bignum": "<decimal>"}`; [`BigNum`] is that wire form.

use std::{fmt, str::FromStr};

use alloy::primitives::{I256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Key of the Aergo big number tag.
pub const BIGNUM_TAG: &str = "_bignum";

/// An amount in Aergo's tagged big number convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct BigNum(pub U256);

impl BigNum {
    pub fn into_inner(self) -> U256 {
        self.0
    }

    /// The JSON object Aergo contract calls expect.
    pub fn to_json(&self) -> Value {
        serde_json::json!({ BIGNUM_TAG: self.0.to_string() })
    }
}

impl From<U256> for BigNum {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl fmt::Display for BigNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for BigNum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(BIGNUM_TAG, &self.0.to_string())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for BigNum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_amount_value(&value).map(Self).map_err(de::Error::custom)
    }
}

/// Parse a decimal amount string such as `"10000000000000000000"`.
pub fn parse_decimal(text: &str) -> Result<U256> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BridgeError::InvalidAmount(format!("{text:?} is not a decimal integer")));
    }
    U256::from_str_radix(text, 10)
        .map_err(|e| BridgeError::InvalidAmount(format!("{text:?}: {e}")))
}

/// Interpret a value read from Aergo contract state or a proof as an amount.
///
/// Accepts the tagged big number object, decimal or `0x` hex strings, and
/// non-negative JSON integers.
pub fn parse_amount_value(value: &Value) -> Result<U256> {
    match value {
        Value::Object(map) => match map.get(BIGNUM_TAG) {
            Some(inner) => parse_amount_value(inner),
            None => Err(BridgeError::InvalidAmount(format!("untagged object {value}"))),
        },
        Value::String(text) => match text.strip_prefix("0x") {
            Some(hex) if hex.is_empty() => Ok(U256::ZERO),
            Some(_) => U256::from_str(text)
                .map_err(|e| BridgeError::InvalidAmount(format!("{text:?}: {e}"))),
            None => parse_decimal(text),
        },
        Value::Number(number) => number
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| BridgeError::InvalidAmount(format!("{number} is not a u64"))),
        other => Err(BridgeError::InvalidAmount(format!("unexpected value {other}"))),
    }
}

/// Interpret a stored value as a block height.
pub fn parse_height_value(value: &Value) -> Result<u64> {
    let amount = parse_amount_value(value)?;
    u64::try_from(amount).map_err(|_| BridgeError::InvalidAmount(format!("height {amount} overflows u64")))
}

/// Exact signed difference `a - b` of two unsigned amounts.
pub fn signed_difference(a: U256, b: U256) -> Result<I256> {
    let a = I256::try_from(a).map_err(|_| BridgeError::InvalidAmount(format!("{a} exceeds int256")))?;
    let b = I256::try_from(b).map_err(|_| BridgeError::InvalidAmount(format!("{b} exceeds int256")))?;
    a.checked_sub(b)
        .ok_or_else(|| BridgeError::InvalidAmount(format!("{a} - {b} overflows int256")))
}
