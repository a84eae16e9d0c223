use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_active: bool,
}

impl User {
    // Имя для шапки: полное имя, если задано
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

/// Тело `POST /register`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Registration {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
    pub full_name: Option<String>,
}

/// Форма `POST /token` (OAuth2 password flow, form-urlencoded).
#[derive(Debug, Serialize)]
pub(crate) struct LoginForm<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(full_name: Option<&str>) -> User {
        User {
            id: 1,
            email: "ann@example.com".to_string(),
            username: "ann".to_string(),
            full_name: full_name.map(str::to_string),
            is_active: true,
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(user(Some("Ann Lee")).display_name(), "Ann Lee");
        assert_eq!(user(None).display_name(), "ann");
        assert_eq!(user(Some("  ")).display_name(), "ann");
    }

    #[test]
    fn registration_rejects_bad_email() {
        let form = Registration {
            email: "not-an-email".to_string(),
            username: "ann".to_string(),
            password: "secret".to_string(),
            full_name: None,
        };
        assert!(form.validate().is_err());
    }
}
