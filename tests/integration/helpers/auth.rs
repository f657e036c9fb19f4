use base64::{engine::general_purpose, Engine as _};
use serde_json::json;

pub struct TestAuth {
    pub user_id: String,
    pub role: Option<&'static str>,
}

impl TestAuth {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: None,
        }
    }

    pub fn admin(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: Some("admin"),
        }
    }

    /// Unsigned session token; the service only reads the payload.
    pub fn generate_token(&self) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let mut payload = json!({
            "sub": self.user_id,
            "name": format!("User {}", self.user_id),
            "exp": 1999999999, // far future
            "iat": 1700000000
        });
        if let Some(role) = self.role {
            payload["role"] = json!(role);
        }

        let header_part = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_part = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
        let signature_part = "dummy_signature";

        format!("{}.{}.{}", header_part, payload_part, signature_part)
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.generate_token())
    }
}
