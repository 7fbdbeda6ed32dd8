//! Type-safe identifier wrappers.
//!
//! Records owned by the economy (organizations, businesses, heists,
//! investments, journal entries) are identified by UUID v7 newtypes so that
//! identifiers of different kinds can never be mixed at compile time.
//!
//! Static catalog entries (zones, business types, heist targets) are keyed by
//! short human-readable strings taken from configuration, wrapped in their own
//! newtypes for the same reason.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Generates a newtype wrapper around a catalog key string.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create a key from anything string-like.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Borrow the key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }
    };
}

define_id! {
    /// Unique identifier for a player organization (gang).
    OrganizationId
}

define_id! {
    /// Unique identifier for a player character.
    CharacterId
}

define_id! {
    /// Unique identifier for an organization-owned business.
    BusinessId
}

define_id! {
    /// Unique identifier for a world-owned (NPC) business.
    NpcBusinessId
}

define_id! {
    /// Unique identifier for a planned or executed heist.
    HeistId
}

define_id! {
    /// Unique identifier for a fixed-term organization investment.
    InvestmentId
}

define_id! {
    /// Unique identifier for a ledger journal entry.
    JournalEntryId
}

define_key! {
    /// Catalog key of a zone (district) of the city.
    ZoneKey
}

define_key! {
    /// Catalog key of a purchasable business type.
    BusinessTypeKey
}

define_key! {
    /// Catalog key of a heist target.
    HeistTargetKey
}
