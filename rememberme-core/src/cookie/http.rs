use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::{CookieSink, CookieSource};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported SameSite value `{0}` (expected none, lax or strict)")]
pub struct InvalidSameSite(pub String);

/// Cookie attribute that cannot be written as a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidCookieOptions {
    #[error("cookie name `{0}` is not a valid cookie token")]
    Name(String),
    #[error("cookie path `{0:?}` must start with `/` and contain no control characters or `;`")]
    Path(String),
    #[error("cookie domain `{0:?}` is not a valid host name")]
    Domain(String),
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = InvalidSameSite;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            _ => Err(InvalidSameSite(value.to_string())),
        }
    }
}

/// Attributes of the remember-me cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    /// Used for both `Max-Age` and `Expires` when the cookie is written.
    pub lifetime: Duration,
}

impl CookieOptions {
    pub const DEFAULT_NAME: &'static str = "REMEMBERME";

    /// Check that every attribute can be rendered into a header.
    ///
    /// A rejected header would leave the client without its rotated
    /// token, so options must pass this before they are used.
    pub fn validate(&self) -> Result<(), InvalidCookieOptions> {
        if !is_cookie_token(&self.name) {
            return Err(InvalidCookieOptions::Name(self.name.clone()));
        }
        if !is_cookie_path(&self.path) {
            return Err(InvalidCookieOptions::Path(self.path.clone()));
        }
        if let Some(domain) = &self.domain
            && !is_cookie_domain(domain)
        {
            return Err(InvalidCookieOptions::Domain(domain.clone()));
        }
        Ok(())
    }
}

// RFC 6265 token characters.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}

fn is_cookie_path(path: &str) -> bool {
    path.starts_with('/')
        && path.bytes().all(|b| (b' '..=b'~').contains(&b) && b != b';')
}

fn is_cookie_domain(domain: &str) -> bool {
    let host = domain.strip_prefix('.').unwrap_or(domain);
    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            lifetime: Duration::weeks(1),
        }
    }
}

/// Cookie transport over HTTP headers.
///
/// Built from the incoming request headers; writes are collected as
/// `Set-Cookie` values and attached to the response, either through
/// [`HttpCookie::apply`] or by returning the cookie as response parts from
/// an axum handler.
#[derive(Debug, Clone)]
pub struct HttpCookie {
    options: CookieOptions,
    value: Option<String>,
    set_cookies: Vec<HeaderValue>,
}

impl HttpCookie {
    /// Transport for a response that is not tied to a request cookie.
    pub fn new(options: CookieOptions) -> Self {
        Self {
            options,
            value: None,
            set_cookies: Vec::new(),
        }
    }

    pub fn from_headers(headers: &HeaderMap, options: CookieOptions) -> Self {
        let value = read_cookie(headers, &options.name);
        Self {
            value,
            ..Self::new(options)
        }
    }

    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    /// `Set-Cookie` values produced so far, oldest first.
    pub fn set_cookie_headers(&self) -> &[HeaderValue] {
        &self.set_cookies
    }

    /// Append the collected `Set-Cookie` values to `headers`.
    pub fn apply(self, headers: &mut HeaderMap) {
        for value in self.set_cookies {
            headers.append(SET_COOKIE, value);
        }
    }

    fn push(&mut self, value: &str, max_age: i64, expires: chrono::DateTime<Utc>) {
        let options = &self.options;
        let mut cookie = format!("{}={}", options.name, urlencoding::encode(value));

        cookie.push_str(&format!("; Path={}", options.path));
        if let Some(domain) = &options.domain {
            cookie.push_str(&format!("; Domain={domain}"));
        }
        cookie.push_str(&format!("; Max-Age={max_age}"));
        cookie.push_str(&format!(
            "; Expires={}",
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
        if options.secure {
            cookie.push_str("; Secure");
        }
        if options.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str(&format!("; SameSite={}", options.same_site));

        match HeaderValue::from_str(&cookie) {
            Ok(header) => self.set_cookies.push(header),
            Err(err) => {
                warn!(cookie = %options.name, "dropping unrepresentable Set-Cookie header: {err}")
            }
        }
    }
}

impl CookieSource for HttpCookie {
    fn value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.is_empty())
    }
}

impl CookieSink for HttpCookie {
    fn set_value(&mut self, value: &str) {
        let lifetime = self.options.lifetime;
        self.push(value, lifetime.num_seconds(), Utc::now() + lifetime);
        self.value = Some(value.to_string());
    }

    fn delete_cookie(&mut self) {
        self.push("", 0, Utc::now() - Duration::days(1));
        self.value = None;
    }
}

impl IntoResponseParts for HttpCookie {
    type Error = Infallible;

    fn into_response_parts(
        self,
        mut res: ResponseParts,
    ) -> Result<ResponseParts, Self::Error> {
        self.apply(res.headers_mut());
        Ok(res)
    }
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(cookie_name, _)| cookie_name.trim() == name)
        .and_then(|(_, raw)| {
            urlencoding::decode(raw.trim())
                .ok()
                .map(|value| value.into_owned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn reads_named_cookie_and_decodes_it() {
        let headers = request_with("theme=dark; REMEMBERME=alice%40example.org%7Ca%7Cb");
        let cookie = HttpCookie::from_headers(&headers, CookieOptions::default());

        assert_eq!(cookie.value(), Some("alice@example.org|a|b"));
    }

    #[test]
    fn missing_cookie_is_none() {
        let headers = request_with("theme=dark");
        let cookie = HttpCookie::from_headers(&headers, CookieOptions::default());
        assert_eq!(cookie.value(), None);
    }

    #[test]
    fn set_value_emits_attributes() {
        let options = CookieOptions {
            secure: true,
            domain: Some("example.org".into()),
            same_site: SameSite::Strict,
            ..Default::default()
        };
        let mut cookie = HttpCookie::from_headers(&HeaderMap::new(), options);
        cookie.set_value("alice|a|b");

        let header = cookie.set_cookie_headers()[0].to_str().unwrap();
        assert!(header.starts_with("REMEMBERME=alice%7Ca%7Cb; Path=/; Domain=example.org"));
        assert!(header.contains(&format!("Max-Age={}", Duration::weeks(1).num_seconds())));
        assert!(header.contains("; Secure; HttpOnly; SameSite=Strict"));
        assert_eq!(cookie.value(), Some("alice|a|b"));
    }

    #[test]
    fn delete_expires_cookie_immediately() {
        let headers = request_with("REMEMBERME=alice|a|b");
        let mut cookie = HttpCookie::from_headers(&headers, CookieOptions::default());
        cookie.delete_cookie();

        assert_eq!(cookie.value(), None);
        let header = cookie.set_cookie_headers()[0].to_str().unwrap();
        assert!(header.starts_with("REMEMBERME=; Path=/"));
        assert!(header.contains("Max-Age=0"));

        let mut response = HeaderMap::new();
        cookie.apply(&mut response);
        assert_eq!(response.get_all(SET_COOKIE).iter().count(), 1);
    }

    #[test]
    fn validate_rejects_unrenderable_attributes() {
        assert_eq!(CookieOptions::default().validate(), Ok(()));

        let path = CookieOptions {
            path: "/app\n".into(),
            ..Default::default()
        };
        assert!(matches!(path.validate(), Err(InvalidCookieOptions::Path(_))));
        // Such a path can never become a header value.
        let mut cookie = HttpCookie::new(path);
        cookie.set_value("alice|a|b");
        assert!(cookie.set_cookie_headers().is_empty());

        let relative = CookieOptions {
            path: "app".into(),
            ..Default::default()
        };
        assert!(relative.validate().is_err());

        let domain = CookieOptions {
            domain: Some("example.org; Secure".into()),
            ..Default::default()
        };
        assert!(matches!(domain.validate(), Err(InvalidCookieOptions::Domain(_))));

        let leading_dot = CookieOptions {
            domain: Some(".example.org".into()),
            ..Default::default()
        };
        assert_eq!(leading_dot.validate(), Ok(()));

        let name = CookieOptions {
            name: "remember me".into(),
            ..Default::default()
        };
        assert!(matches!(name.validate(), Err(InvalidCookieOptions::Name(_))));
    }

    #[test]
    fn same_site_parsing_is_case_insensitive() {
        assert_eq!("NONE".parse::<SameSite>().unwrap(), SameSite::None);
        assert_eq!(" lax ".parse::<SameSite>().unwrap(), SameSite::Lax);
        assert_eq!("Strict".parse::<SameSite>().unwrap(), SameSite::Strict);
        assert!("sometimes".parse::<SameSite>().is_err());
    }
}
