use serde::{Deserialize, Serialize};

/// `error` object of a failed VK method call.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub error_msg: String,
}

/// `response` payload of `account.getProfileInfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// `response` payload of `wall.get`.
#[derive(Debug, Clone, Deserialize)]
pub struct WallPage {
    #[serde(default)]
    pub items: Vec<WallPost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WallPost {
    /// Unix timestamp of publication.
    #[serde(default)]
    pub date: Option<i64>,
}

/// The account the access token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

/// Proof of a successful identity check. Authenticated calls take a `&Session`.
#[derive(Debug, Clone)]
pub struct Session {
    user: Identity,
}

impl Session {
    pub(crate) fn new(user: Identity) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &Identity {
        &self.user
    }
}
