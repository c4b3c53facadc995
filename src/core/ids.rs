//! Platform identifiers
//!
//! The chat platform hands out 64-bit snowflake ids and serializes them as
//! JSON strings. The newtypes below accept both strings and numbers on input
//! and always emit strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw snowflake
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw snowflake
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match RawSnowflake::deserialize(deserializer)? {
                    RawSnowflake::Number(raw) => Ok(Self(raw)),
                    RawSnowflake::Text(text) => text.parse().map_err(serde::de::Error::custom),
                }
            }
        }
    };
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSnowflake {
    Number(u64),
    Text(String),
}

snowflake_id!(
    /// Identifier of a guild (server)
    GuildId
);
snowflake_id!(
    /// Identifier of a channel or category
    ChannelId
);
snowflake_id!(
    /// Identifier of a message; ticket prompts are keyed by it
    MessageId
);
snowflake_id!(
    /// Identifier of a user account
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_accept_strings_and_numbers() {
        let from_str: GuildId = serde_json::from_str("\"81384788765712384\"").unwrap();
        let from_num: GuildId = serde_json::from_str("81384788765712384").unwrap();
        assert_eq!(from_str, from_num);
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let json = serde_json::to_string(&UserId::new(42)).unwrap();
        assert_eq!(json, "\"42\"");
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        assert!(serde_json::from_str::<ChannelId>("\"not-a-number\"").is_err());
        assert!("abc".parse::<MessageId>().is_err());
    }
}
