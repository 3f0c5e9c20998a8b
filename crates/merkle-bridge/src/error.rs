use std::fmt;

use thiserror::Error;

/// The two chains the bridge connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Ethereum,
    Aergo,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ethereum => f.write_str("ethereum"),
            Self::Aergo => f.write_str("aergo"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid {chain} address {address:?}: {reason}")]
    InvalidAddress {
        chain: Chain,
        address: String,
        reason: &'static str,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The queried key has no value yet at the requested height. Callers polling
    /// for an anchor should keep waiting on this variant only.
    #[error("not yet available: {0}")]
    NotYetAvailable(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node cannot serve state at the anchored height (pruned history).
    /// Retrying against the same node, or at another height, will not help.
    #[error("state at height {height:?} unavailable: {reason}")]
    HistoricalStateUnavailable { height: Option<u64>, reason: String },

    #[error("bridge contract layout mismatch: expected code hash {expected}, found {actual}")]
    LayoutMismatch { expected: String, actual: String },

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("malformed RPC response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error messages nodes return when historical state has been pruned.
const PRUNED_MARKERS: &[&str] = &[
    "missing trie node",
    "historical state",
    "pruned",
    "state is not available",
    "state histories haven't been fully indexed",
];

fn is_pruned(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    PRUNED_MARKERS.iter().any(|m| lower.contains(m))
}

impl BridgeError {
    /// Classify the message of a JSON-RPC error object returned by a node.
    ///
    /// `height` is the block the failed request was pinned to, if any. Only a
    /// pruning message on a height-pinned request is singled out; everything
    /// else, including unknown blocks and headers, stays a plain RPC error.
    /// Transport failures must not be passed here.
    pub fn from_rpc_message(message: impl Into<String>, height: Option<u64>) -> Self {
        let message = message.into();
        match height {
            Some(_) if is_pruned(&message) => Self::HistoricalStateUnavailable {
                height,
                reason: message,
            },
            _ => Self::Rpc(message),
        }
    }

    /// Like [`Self::from_rpc_message`] for a request pinned to a state root
    /// whose height the caller fills in with [`Self::at_height`].
    pub fn from_root_rpc_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_pruned(&message) {
            Self::HistoricalStateUnavailable {
                height: None,
                reason: message,
            }
        } else {
            Self::Rpc(message)
        }
    }

    /// Attach the height a failed state read was pinned to.
    pub fn at_height(self, height: u64) -> Self {
        match self {
            Self::HistoricalStateUnavailable { height: None, reason } => {
                Self::HistoricalStateUnavailable {
                    height: Some(height),
                    reason,
                }
            }
            other => other,
        }
    }

    /// True when the condition may resolve itself after the next anchor.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotYetAvailable(_))
    }

    /// True when repeating the same request against the same node cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HistoricalStateUnavailable { .. }
                | Self::LayoutMismatch { .. }
                | Self::InvalidAddress { .. }
                | Self::Config(_)
        )
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Rpc(e.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}

impl From<alloy::sol_types::Error> for BridgeError {
    fn from(e: alloy::sol_types::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_pruned_state() {
        let err = BridgeError::from_rpc_message("missing trie node 0xabc (path )", Some(42));
        assert!(matches!(
            err,
            BridgeError::HistoricalStateUnavailable { height: Some(42), .. }
        ));
        assert!(err.is_fatal());
        assert!(!err.is_not_ready());
    }

    #[test]
    fn test_pruned_marker_without_height_is_plain_rpc() {
        let err = BridgeError::from_rpc_message("missing trie node", None);
        assert!(matches!(err, BridgeError::Rpc(_)));
    }

    #[test]
    fn test_not_found_is_never_not_ready() {
        for (message, height) in [
            ("header not found", Some(1200)),
            ("block not found", Some(3000)),
            ("HTTP error 404 with body: 404 page not found", None),
            ("Key Not Found in contract state", None),
        ] {
            let err = BridgeError::from_rpc_message(message, height);
            assert!(matches!(err, BridgeError::Rpc(_)), "{message}");
            assert!(!err.is_not_ready());
        }
    }

    #[test]
    fn test_at_height_fills_root_pinned_pruning() {
        let err = BridgeError::from_root_rpc_message("state is not available for root");
        assert!(matches!(
            err.at_height(9),
            BridgeError::HistoricalStateUnavailable { height: Some(9), .. }
        ));

        let err = BridgeError::from_root_rpc_message("block not found").at_height(3000);
        assert!(matches!(err, BridgeError::Rpc(_)));

        let err = BridgeError::NotYetAvailable("no value".into()).at_height(9);
        assert!(err.is_not_ready());
    }

    #[test]
    fn test_classify_transport_failure() {
        let err = BridgeError::from_rpc_message("connection refused", Some(7));
        assert!(matches!(err, BridgeError::Rpc(_)));
        assert!(!err.is_not_ready());
    }
}
