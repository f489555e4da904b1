//! Generated database credential.
//!
//! A [`Credential`] only carries generation options. There is no way to give
//! it a value: the secret store generates the password, and dependents read
//! individual fields through deferred tokens.

use serde_json::{Value, json};
use sonar_common::types::ResourceKind;

use super::{Reference, Resource, SecretSource};
use crate::graph::Handle;
use crate::token::Token;

/// Name of the field holding the principal name.
pub const USERNAME_FIELD: &str = "username";

/// Name of the generated field holding the password.
pub const PASSWORD_FIELD: &str = "password";

/// Punctuation excluded from generated passwords.
pub const EXCLUDED_CHARACTERS: &str = " %+~`#$&*()|[]{}:;<>?!'/@\"\\";

/// A secret holding a principal name and a generated password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password_length: u8,
    description: Option<String>,
}

impl Credential {
    /// Creates a credential for `username` with a generated password.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_length: 30,
            description: None,
        }
    }

    /// Sets the generated password length.
    #[must_use]
    pub const fn password_length(mut self, length: u8) -> Self {
        self.password_length = length;
        self
    }

    /// Sets a human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Resource for Credential {
    const KIND: ResourceKind = ResourceKind::Credential;

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn properties(&self) -> Value {
        let template = json!({ USERNAME_FIELD: self.username }).to_string();
        let mut props = json!({
            "GenerateSecretString": {
                "SecretStringTemplate": template,
                "GenerateStringKey": PASSWORD_FIELD,
                "PasswordLength": self.password_length,
                "ExcludeCharacters": EXCLUDED_CHARACTERS,
            },
        });
        if let Some(description) = &self.description {
            props["Description"] = json!(description);
        }
        props
    }
}

impl Handle<Credential> {
    /// Deferred token reading one field of the stored secret.
    #[must_use]
    pub fn field(&self, field: impl Into<String>) -> Token {
        Token::SecretField {
            secret: self.id().clone(),
            field: field.into(),
        }
    }

    /// Runtime secret source for one field, for injection into a container.
    #[must_use]
    pub fn secret_source(&self, field: impl Into<String>) -> SecretSource {
        SecretSource::new(self, field)
    }
}
