//! Gateway intents bitflags
//!
//! Intents select which event groups the gateway delivers to a session.
//! Sent as a 64-bit integer bitfield inside the identify payload.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Gateway event subscription flags
    ///
    /// Serialized as a plain integer in JSON, matching the wire format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild create/update/delete and role/channel lifecycle
        const GUILDS           = 1 << 0;
        /// Member join/leave/update
        const GUILD_MEMBERS    = 1 << 1;
        /// Bans and moderation events
        const GUILD_MODERATION = 1 << 2;
        /// Messages created/edited/deleted in guild channels
        const GUILD_MESSAGES   = 1 << 3;
        /// Reactions added/removed in guild channels
        const GUILD_REACTIONS  = 1 << 4;
        /// Typing indicators in guild channels
        const GUILD_TYPING     = 1 << 5;
        /// Presence updates (online status)
        const GUILD_PRESENCES  = 1 << 6;
        /// Direct messages
        const DIRECT_MESSAGES  = 1 << 7;
        /// Reactions in direct messages
        const DIRECT_REACTIONS = 1 << 8;
        /// Message content (privileged)
        const MESSAGE_CONTENT  = 1 << 9;

        /// Default, non-privileged subscription set
        const DEFAULT = Self::GUILDS.bits()
            | Self::GUILD_MESSAGES.bits()
            | Self::GUILD_REACTIONS.bits()
            | Self::DIRECT_MESSAGES.bits();

        /// Every intent, privileged ones included
        const ALL = Self::GUILDS.bits()
            | Self::GUILD_MEMBERS.bits()
            | Self::GUILD_MODERATION.bits()
            | Self::GUILD_MESSAGES.bits()
            | Self::GUILD_REACTIONS.bits()
            | Self::GUILD_TYPING.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::DIRECT_MESSAGES.bits()
            | Self::DIRECT_REACTIONS.bits()
            | Self::MESSAGE_CONTENT.bits();
    }
}

impl Intents {
    /// Check whether the set contains a privileged intent
    ///
    /// Privileged intents require explicit enablement on the application.
    #[inline]
    pub const fn has_privileged(&self) -> bool {
        self.intersects(Self::GUILD_MEMBERS.union(Self::GUILD_PRESENCES).union(Self::MESSAGE_CONTENT))
    }

    /// Parse from string representation (decimal number)
    pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
        s.parse::<u64>().map(Intents::from_bits_truncate)
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// The wire format is a plain integer, not the bitflags struct encoding
impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Intents::from_bits_truncate(bits))
    }
}
