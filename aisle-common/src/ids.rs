//! Identifier newtypes shared across the system.
//!
//! All identifiers are ULIDs: globally unique, lexicographically sortable by
//! creation time, and collision resistant. The [`ulid_id`] macro stamps out
//! the newtype so every id in the workspace carries the same surface
//! (`generate`, `Display`, `FromStr`, serde as a string).

/// Define a ULID-backed identifier newtype.
#[macro_export]
macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(ulid::Ulid);

        impl $name {
            /// Generate a new unique identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(ulid::Ulid::new())
            }

            /// Wrap an existing ULID.
            #[must_use]
            pub const fn new(id: ulid::Ulid) -> Self {
                Self(id)
            }

            /// The underlying ULID.
            #[must_use]
            pub const fn ulid(&self) -> ulid::Ulid {
                self.0
            }

            /// Milliseconds since the Unix epoch encoded in this id.
            #[must_use]
            pub const fn timestamp_ms(&self) -> u64 {
                self.0.timestamp_ms()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                ulid::Ulid::from_string(s).map(Self)
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let s = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                ulid::Ulid::from_string(&s)
                    .map(Self)
                    .map_err(::serde::de::Error::custom)
            }
        }
    };
}

ulid_id! {
    /// Identifier for a wedding.
    WeddingId
}

ulid_id! {
    /// Identifier for a guest within a wedding.
    GuestId
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn ids_round_trip_through_strings() {
        let id = WeddingId::generate();
        let parsed = WeddingId::from_str(&id.to_string()).expect("valid ULID string");
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_round_trip_through_serde() {
        let id = GuestId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        let back: GuestId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, back);
    }

    #[test]
    fn invalid_strings_are_rejected() {
        assert!(WeddingId::from_str("not-a-ulid").is_err());
        assert!(GuestId::from_str("").is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(GuestId::generate()));
        }
    }
}
