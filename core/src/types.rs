//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A simulation term. Terms are 1-based and dense once a full run completes.
pub type Term = u32;

/// Growth rate in percent per term.
pub type GrowthRate = f64;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of an economic parameter (GDP, unemployment, ...).
    ParameterId
);
entity_id!(CityId);
entity_id!(CountryId);
entity_id!(
    /// Identifier of a policy scenario snapshot.
    SnapshotId
);

/// Round to two decimal places, the precision every stored value carries.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
