//! Persisted session state: onboarding progress, the signed-in user and their tokens.

mod store;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use store::LocalStore;

pub const KEY_COMPLETED_LANDING: &str = "completedLanding";
pub const KEY_USER: &str = "user";
pub const KEY_AUTH_TOKENS: &str = "authTokens";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// Which entry screen a fresh start lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Landing,
    Login,
    Generator,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Login => "login",
            Self::Generator => "generator",
        }
    }
}

/// Snapshot of the stored session, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub completed_landing: bool,
    pub user: Option<UserProfile>,
    pub auth_tokens: Option<AuthTokens>,
}

impl SessionConfig {
    pub fn load(store: &mut LocalStore) -> Self {
        Self {
            completed_landing: store
                .get(KEY_COMPLETED_LANDING)
                .map(|value| truthy(&value))
                .unwrap_or(false),
            user: decode(store, KEY_USER),
            auth_tokens: decode(store, KEY_AUTH_TOKENS),
        }
    }

    pub fn initial_screen(&self) -> Screen {
        if !self.completed_landing {
            Screen::Landing
        } else if self.access_token().is_none() {
            Screen::Login
        } else {
            Screen::Generator
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.auth_tokens
            .as_ref()
            .map(|tokens| tokens.access.as_str())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn mark_landing_completed(&mut self, store: &mut LocalStore) -> anyhow::Result<()> {
        store.set(KEY_COMPLETED_LANDING, Value::Bool(true))?;
        self.completed_landing = true;
        Ok(())
    }

    pub fn sign_in(
        &mut self,
        store: &mut LocalStore,
        user: UserProfile,
        tokens: AuthTokens,
    ) -> anyhow::Result<()> {
        store.set(KEY_USER, serde_json::to_value(&user)?)?;
        store.set(KEY_AUTH_TOKENS, serde_json::to_value(&tokens)?)?;
        self.user = Some(user);
        self.auth_tokens = Some(tokens);
        Ok(())
    }

    /// Forgets the user and tokens. Onboarding progress is kept.
    pub fn sign_out(&mut self, store: &mut LocalStore) -> anyhow::Result<()> {
        store.remove(KEY_USER)?;
        store.remove(KEY_AUTH_TOKENS)?;
        self.user = None;
        self.auth_tokens = None;
        Ok(())
    }
}

// Browsers stored these flags as strings, so "true" counts too.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn decode<T: serde::de::DeserializeOwned>(store: &mut LocalStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring malformed session value");
            None
        }
    }
}
