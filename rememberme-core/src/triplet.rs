use std::fmt;

use zeroize::Zeroizing;

/// Credential, one-time token and persistent token as carried by the cookie.
///
/// The one-time token rotates on every successful login. The persistent token
/// identifies the browser/device and only changes when a brand-new cookie is
/// issued. The credential is opaque application data (user id, email, ...).
///
/// A triplet parsed from malformed input is the empty sentinel, which is
/// never [`valid`](Self::is_valid).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Triplet {
    credential: String,
    one_time_token: Zeroizing<String>,
    persistent_token: Zeroizing<String>,
}

impl Triplet {
    /// Field delimiter of the serialized form.
    pub const SEPARATOR: char = '|';

    pub fn new(
        credential: impl Into<String>,
        one_time_token: impl Into<String>,
        persistent_token: impl Into<String>,
    ) -> Self {
        Self {
            credential: credential.into(),
            one_time_token: Zeroizing::new(one_time_token.into()),
            persistent_token: Zeroizing::new(persistent_token.into()),
        }
    }

    /// Parse a cookie payload.
    ///
    /// Tokens never contain the separator, so the two right-most separators
    /// delimit the tokens and everything before them is the credential.
    pub fn parse(value: &str) -> Self {
        let mut parts = value.rsplitn(3, Self::SEPARATOR);
        let (Some(persistent), Some(token), Some(credential)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Self::default();
        };

        let triplet = Self::new(credential, token, persistent);
        if triplet.is_valid() {
            triplet
        } else {
            Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.credential.is_empty()
            && !self.one_time_token.is_empty()
            && !self.persistent_token.is_empty()
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn one_time_token(&self) -> &str {
        &self.one_time_token
    }

    pub fn persistent_token(&self) -> &str {
        &self.persistent_token
    }

    /// One-time token with the request salt appended, ready for hashing.
    pub fn salted_one_time_token(&self, salt: &str) -> Zeroizing<String> {
        salted(&self.one_time_token, salt)
    }

    /// Persistent token with the request salt appended, ready for hashing.
    pub fn salted_persistent_token(&self, salt: &str) -> Zeroizing<String> {
        salted(&self.persistent_token, salt)
    }

    /// Same credential and persistent token, new one-time token.
    pub fn rotate(&self, one_time_token: impl Into<String>) -> Self {
        Self::new(
            self.credential.clone(),
            one_time_token,
            self.persistent_token.as_str(),
        )
    }
}

fn salted(token: &str, salt: &str) -> Zeroizing<String> {
    let mut value = Zeroizing::new(String::with_capacity(token.len() + salt.len()));
    value.push_str(token);
    value.push_str(salt);
    value
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.credential,
            self.one_time_token.as_str(),
            self.persistent_token.as_str(),
            sep = Self::SEPARATOR
        )
    }
}

impl fmt::Debug for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Triplet")
            .field("credential", &self.credential)
            .field("one_time_token", &"<redacted>")
            .field("persistent_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CREDENTIAL: &str = "user@example.org";
    const VALID_TOKEN: &str = "6021839c4c083b02d90c05b992ef6a509145f084";
    const VALID_PERSISTENT_TOKEN: &str =
        "d7ebd0fc1557c6fa14c8c83d8f7764ea91bcb7d0";

    fn joined(parts: &[&str]) -> String {
        parts.join(&Triplet::SEPARATOR.to_string())
    }

    #[test]
    fn parses_simple_payload() {
        let triplet = Triplet::parse(&joined(&[
            VALID_CREDENTIAL,
            VALID_TOKEN,
            VALID_PERSISTENT_TOKEN,
        ]));

        assert!(triplet.is_valid());
        assert_eq!(triplet.credential(), VALID_CREDENTIAL);
        assert_eq!(triplet.one_time_token(), VALID_TOKEN);
        assert_eq!(triplet.persistent_token(), VALID_PERSISTENT_TOKEN);
    }

    #[test]
    fn credential_absorbs_extra_separators() {
        let complex = format!("{VALID_CREDENTIAL}|complex");
        let triplet = Triplet::parse(&joined(&[
            &complex,
            VALID_TOKEN,
            VALID_PERSISTENT_TOKEN,
        ]));

        assert!(triplet.is_valid());
        assert_eq!(triplet.credential(), complex);
        assert_eq!(triplet.one_time_token(), VALID_TOKEN);
        assert_eq!(triplet.persistent_token(), VALID_PERSISTENT_TOKEN);
    }

    #[test]
    fn missing_parts_yield_empty_sentinel() {
        let triplet = Triplet::parse(&joined(&[VALID_CREDENTIAL, VALID_TOKEN]));

        assert!(!triplet.is_valid());
        assert_eq!(triplet.credential(), "");
        assert_eq!(triplet.one_time_token(), "");
        assert_eq!(triplet.persistent_token(), "");
    }

    #[test]
    fn empty_field_is_invalid() {
        assert!(!Triplet::parse("|token|persistent").is_valid());
        assert!(!Triplet::parse("user||persistent").is_valid());
        assert!(!Triplet::parse("user|token|").is_valid());
        assert!(!Triplet::parse("").is_valid());
        assert_eq!(Triplet::parse("user||persistent"), Triplet::default());
    }

    #[test]
    fn serializes_and_parses_back() {
        let triplet =
            Triplet::new(VALID_CREDENTIAL, VALID_TOKEN, VALID_PERSISTENT_TOKEN);
        let parsed = Triplet::parse(&triplet.to_string());

        assert!(parsed.is_valid());
        assert_eq!(parsed, triplet);
    }

    #[test]
    fn salting_appends_the_salt() {
        let triplet = Triplet::new("alice", "one", "two");
        assert_eq!(triplet.salted_one_time_token("pepper").as_str(), "onepepper");
        assert_eq!(
            triplet.salted_persistent_token("pepper").as_str(),
            "twopepper"
        );
        assert_eq!(triplet.salted_one_time_token("").as_str(), "one");
    }

    #[test]
    fn rotation_keeps_credential_and_persistent_token() {
        let triplet = Triplet::new("alice", "one", "two");
        let rotated = triplet.rotate("three");
        assert_eq!(rotated.credential(), "alice");
        assert_eq!(rotated.one_time_token(), "three");
        assert_eq!(rotated.persistent_token(), "two");
    }

    #[test]
    fn debug_redacts_tokens() {
        let rendered = format!("{:?}", Triplet::new("alice", "secret1", "secret2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("secret1"));
        assert!(!rendered.contains("secret2"));
    }
}
