//! Account and validator identifiers.
//!
//! Both are 32-byte values rendered as lowercase hex. A validator's operator
//! account carries the same bytes as the validator id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::ID_LENGTH;

/// Error returned when parsing an identifier from hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: expected 32 hex-encoded bytes")]
pub struct IdParseError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[serde_as]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; ID_LENGTH]);

        impl $name {
            /// Wrap raw identifier bytes.
            pub const fn new(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw bytes.
            pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }

            /// Build from a byte slice of exactly [`ID_LENGTH`] bytes.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                <[u8; ID_LENGTH]>::try_from(bytes).ok().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Short form keeps log lines readable.
                write!(f, "{}({})", stringify!($name), &hex::encode(self.0)[..8])
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|_| IdParseError)?;
                Self::from_slice(&bytes).ok_or(IdParseError)
            }
        }

        impl From<[u8; ID_LENGTH]> for $name {
            fn from(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }
        }
    };
}

define_id!(
    /// An account that can hold tokens (delegators, operators, pool recipients).
    AccountId
);

define_id!(
    /// A registered validator.
    ValidatorId
);

/// Delegators are plain accounts.
pub type DelegatorId = AccountId;

impl ValidatorId {
    /// The operator account that receives this validator's commission.
    pub fn operator(&self) -> AccountId {
        AccountId(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trip() {
        let id = ValidatorId::new([0xAB; 32]);
        let parsed: ValidatorId = id.to_string().parse().expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_wrong_length() {
        assert!("abcd".parse::<AccountId>().is_err());
        assert!("zz".repeat(32).parse::<AccountId>().is_err());
    }

    #[test]
    fn test_operator_shares_bytes() {
        let id = ValidatorId::new([7; 32]);
        assert_eq!(id.operator().as_bytes(), id.as_bytes());
    }

    #[test]
    fn test_serde_is_hex_string() {
        let id = AccountId::new([0x01; 32]);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: AccountId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_ordering_follows_bytes() {
        assert!(AccountId::new([1; 32]) < AccountId::new([2; 32]));
    }
}
