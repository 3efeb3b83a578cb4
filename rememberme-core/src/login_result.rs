use std::fmt;

use serde::Serialize;

/// Named outcome of a [`LoginResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginOutcome {
    /// Cookie matched a stored triplet.
    Success,
    /// Persistent token matched but the one-time token did not, or the
    /// cookie was malformed.
    Manipulation,
    /// No live record for the cookie.
    Expired,
    /// Request carried no cookie.
    NoCookie,
}

impl LoginOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Manipulation => "manipulation",
            Self::Expired => "expired",
            Self::NoCookie => "no_cookie",
        }
    }
}

impl fmt::Display for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only report of a single "remember me" login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResult {
    cookie_exists: bool,
    triplet_found: bool,
    triplet_valid: bool,
    credential: Option<String>,
}

impl LoginResult {
    pub fn success(credential: impl Into<String>) -> Self {
        Self {
            cookie_exists: true,
            triplet_found: true,
            triplet_valid: true,
            credential: Some(credential.into()),
        }
    }

    pub fn manipulation() -> Self {
        Self {
            cookie_exists: true,
            triplet_found: true,
            triplet_valid: false,
            credential: None,
        }
    }

    pub fn expired() -> Self {
        Self {
            cookie_exists: true,
            triplet_found: false,
            triplet_valid: false,
            credential: None,
        }
    }

    pub fn no_cookie() -> Self {
        Self {
            cookie_exists: false,
            triplet_found: false,
            triplet_valid: false,
            credential: None,
        }
    }

    pub fn cookie_exists(&self) -> bool {
        self.cookie_exists
    }

    pub fn is_success(&self) -> bool {
        self.cookie_exists && self.triplet_found && self.triplet_valid
    }

    pub fn has_possible_manipulation(&self) -> bool {
        self.cookie_exists && self.triplet_found && !self.triplet_valid
    }

    pub fn is_expired(&self) -> bool {
        self.cookie_exists && !self.triplet_found
    }

    /// Credential of a successful login.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn outcome(&self) -> LoginOutcome {
        if !self.cookie_exists {
            LoginOutcome::NoCookie
        } else if self.is_success() {
            LoginOutcome::Success
        } else if self.has_possible_manipulation() {
            LoginOutcome::Manipulation
        } else {
            LoginOutcome::Expired
        }
    }
}
