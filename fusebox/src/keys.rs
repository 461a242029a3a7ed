//! Opaque string identifiers under which metrics, breakers, and pools are
//! colocated. Equality is plain string equality; cheap to clone via `Arc<str>`.

use std::fmt;
use std::sync::Arc;

macro_rules! string_key {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(value: impl AsRef<str>) -> Self {
                Self(Arc::from(value.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_key!(CommandKey);
string_key!(GroupKey);
string_key!(PoolKey);

impl CommandKey {
    /// Default group key is `<CommandKey>Group`.
    pub fn default_group(&self) -> GroupKey {
        GroupKey::new(format!("{}Group", self.as_str()))
    }
}

impl GroupKey {
    /// Default pool key is the group key itself.
    pub fn default_pool(&self) -> PoolKey {
        PoolKey::new(self.as_str())
    }
}
