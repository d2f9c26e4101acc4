use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The user record of an authenticated session, as returned by the backend.
///
/// Only the fields the SDK relies on are typed. Everything else the backend sends is kept in
/// `extra` so a cached identity round trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[allow(missing_docs)]
    pub id: Option<UserId>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[allow(missing_docs)]
    pub email: Option<String>,
    /// Remaining fields of the user record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identity {
    /// An identity with only a name, mostly useful in tests.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: None,
            extra: Map::new(),
        }
    }
}

/// User ids are numeric on some backends and strings on others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
#[allow(missing_docs)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(id) => write!(f, "{id}"),
            UserId::Text(id) => f.write_str(id),
        }
    }
}

impl From<&UserId> for Value {
    fn from(id: &UserId) -> Self {
        match id {
            UserId::Number(id) => Value::from(*id),
            UserId::Text(id) => Value::from(id.as_str()),
        }
    }
}
