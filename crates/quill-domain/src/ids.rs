//! Strongly-typed identifiers backed by UUIDv7
//!
//! UUIDv7 provides:
//! - Chronological sortability, which gives projects a stable total order
//! - 128-bit uniqueness
//! - No coordination required between replicas

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u128);

        #[allow(clippy::new_without_default)]
        impl $name {
            /// Generate a new UUIDv7-based identifier
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7().as_u128())
            }

            /// Create an identifier from a raw u128 value
            ///
            /// This is primarily for storage layer deserialization.
            pub fn from_value(value: u128) -> Self {
                Self(value)
            }

            /// Parse an identifier from its hyphenated UUID string
            pub fn from_string(s: &str) -> Result<Self, String> {
                uuid::Uuid::parse_str(s)
                    .map(|u| Self(u.as_u128()))
                    .map_err(|e| format!("Invalid {} string: {}", stringify!($name), e))
            }

            /// Get the raw u128 value
            pub fn value(&self) -> u128 {
                self.0
            }

            /// Big-endian bytes, so that byte order matches id order
            pub fn to_bytes(&self) -> [u8; 16] {
                self.0.to_be_bytes()
            }

            /// Inverse of [`Self::to_bytes`]
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
                let arr: [u8; 16] = bytes.try_into().map_err(|_| {
                    format!("Expected 16 bytes for {}, got {}", stringify!($name), bytes.len())
                })?;
                Ok(Self(u128::from_be_bytes(arr)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", uuid::Uuid::from_u128(self.0))
            }
        }
    };
}

define_id!(
    /// Identifier of a project (tenant)
    ProjectId
);

define_id!(
    /// Identifier of a client attached to a project
    ClientId
);

define_id!(
    /// Identifier of a document
    DocumentId
);

impl ProjectId {
    /// The nil id. Sorts before every generated id and is never assigned to a
    /// real project, so "strictly after DEFAULT" means "from the first project".
    pub const DEFAULT: ProjectId = ProjectId(0);
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::DEFAULT
    }
}
