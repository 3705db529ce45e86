//! Newtype wrappers for string identifiers handed out by the platform.
//!
//! All newtypes serialize/deserialize as plain strings so they can sit directly
//! in wire models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Platform-assigned identifier of a trigger, unique within its function.
    TriggerId
);

string_newtype!(
    /// Tenant project identifier; the fourth segment of every function URN.
    ProjectId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_id_display_and_as_ref() {
        let id = TriggerId::new("a1b2c3");
        assert_eq!(id.to_string(), "a1b2c3");
        assert_eq!(id.as_str(), "a1b2c3");
        assert_eq!(AsRef::<str>::as_ref(&id), "a1b2c3");
    }

    #[test]
    fn trigger_id_serializes_as_plain_string() {
        let id = TriggerId::new("deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: TriggerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn project_id_compares_with_str() {
        let pid = ProjectId::from("0a1b2c");
        assert_eq!(pid, "0a1b2c");
        assert_eq!(pid.into_inner(), "0a1b2c");
    }
}
