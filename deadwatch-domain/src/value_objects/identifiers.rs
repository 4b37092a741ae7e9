// Identifier value objects

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
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
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(TenantId);
string_id!(ServerId);
string_id!(PlayerId);

impl ServerId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl PlayerId {
    /// Resolves a stable player identity. The platform id wins when present,
    /// otherwise the display name is folded into a name-scoped identity.
    pub fn resolve(platform_id: Option<&str>, display_name: &str) -> Option<Self> {
        if let Some(id) = platform_id.map(str::trim).filter(|id| !id.is_empty()) {
            return Some(Self(id.to_string()));
        }
        let name = display_name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self(format!("name:{}", name.to_lowercase())))
    }
}
