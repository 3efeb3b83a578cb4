//! Request-scoped access to the remember-me cookie.
//!
//! The authenticator never touches ambient state: callers hand it a value
//! implementing [`CookieTransport`] for the exchange in progress.

#[cfg(feature = "axum")]
#[cfg_attr(docsrs, doc(cfg(feature = "axum")))]
pub mod http;

#[cfg(feature = "axum")]
pub use http::{
    CookieOptions, HttpCookie, InvalidCookieOptions, InvalidSameSite, SameSite,
};

/// Read side of the cookie.
pub trait CookieSource {
    /// The current payload. Absent and empty cookies are both `None`.
    fn value(&self) -> Option<&str>;
}

/// Write side of the cookie.
pub trait CookieSink {
    /// Replace the payload and refresh the client-side expiry.
    fn set_value(&mut self, value: &str);

    /// Drop the payload for the rest of the exchange and tell the client
    /// to discard it.
    fn delete_cookie(&mut self);
}

/// Both halves, as consumed by [`Authenticator`](crate::Authenticator).
pub trait CookieTransport: CookieSource + CookieSink {}

impl<T: CookieSource + CookieSink + ?Sized> CookieTransport for T {}

/// In-process cookie that records what the authenticator did with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCookie {
    value: Option<String>,
    writes: Vec<String>,
    deletions: usize,
}

impl MemoryCookie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Every payload passed to [`CookieSink::set_value`], oldest first.
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    pub fn was_deleted(&self) -> bool {
        self.deletions > 0
    }

    pub fn deletions(&self) -> usize {
        self.deletions
    }
}

impl CookieSource for MemoryCookie {
    fn value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.is_empty())
    }
}

impl CookieSink for MemoryCookie {
    fn set_value(&mut self, value: &str) {
        self.value = Some(value.to_string());
        self.writes.push(value.to_string());
    }

    fn delete_cookie(&mut self) {
        self.value = None;
        self.deletions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_reads_as_absent() {
        assert_eq!(MemoryCookie::new().value(), None);
        assert_eq!(MemoryCookie::with_value("").value(), None);
        assert_eq!(MemoryCookie::with_value("a|b|c").value(), Some("a|b|c"));
    }

    #[test]
    fn delete_hides_value_for_rest_of_exchange() {
        let mut cookie = MemoryCookie::with_value("a|b|c");
        cookie.delete_cookie();
        assert_eq!(cookie.value(), None);
        assert!(cookie.was_deleted());

        cookie.set_value("a|d|c");
        assert_eq!(cookie.value(), Some("a|d|c"));
        assert_eq!(cookie.writes(), ["a|d|c".to_string()]);
    }
}
