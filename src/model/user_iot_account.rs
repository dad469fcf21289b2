use serde::{Deserialize, Serialize};

pub const PROVIDER_TUYA: &str = "tuya";

/// Row of `user_iot_accounts`, unique on `(user_id, provider)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIotAccount {
    pub user_id: String,
    pub provider: String,
    #[serde(default)]
    pub tuya_uid: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl UserIotAccount {
    /// Linked vendor uid, if the account actually carries one.
    pub fn linked_uid(&self) -> Option<&str> {
        self.tuya_uid.as_deref().filter(|uid| !uid.trim().is_empty())
    }
}
