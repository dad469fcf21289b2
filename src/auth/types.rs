use serde_json::Value;

/// The authenticated caller, normalized once at the verification boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
}

impl Principal {
    /// Builds a principal from the identity provider's user payload.
    ///
    /// The provider answers either with the user object itself or with the
    /// object nested under `user`. Anything without a non-empty string `id`
    /// is rejected.
    pub fn from_identity(payload: &Value) -> Option<Self> {
        let user = if payload.get("id").is_some() {
            payload
        } else {
            payload.get("user")?
        };

        let id = user.get("id")?.as_str()?.trim();
        if id.is_empty() {
            return None;
        }

        Some(Self { id: id.to_string() })
    }
}
