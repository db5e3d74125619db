//! Snowflake-style identifiers used across the platform.
//!
//! Each id is a transparent `u64` newtype so guild, channel, role and user
//! ids cannot be mixed up at call sites. They serialize as bare integers.

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

snowflake!(
    /// A community (tenant) on the platform.
    GuildId
);
snowflake!(
    /// A text, voice or thread channel.
    ChannelId
);
snowflake!(
    /// A guild role.
    RoleId
);
snowflake!(
    /// A user account (human, bot, or webhook author).
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_integers() {
        let json = serde_json::to_string(&GuildId(42)).unwrap();
        assert_eq!(json, "42");
        let back: ChannelId = serde_json::from_str("7").unwrap();
        assert_eq!(back, ChannelId(7));
    }

    #[test]
    fn display_is_raw_number() {
        assert_eq!(UserId(123456789).to_string(), "123456789");
    }
}
