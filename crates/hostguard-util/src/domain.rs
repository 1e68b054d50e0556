//! Normalized domain names and channel identifiers
//!
//! Everything a user types as a site goes through [`Domain::parse`], so the
//! policy, the persisted documents and the hosts file all agree on one
//! spelling: lower-case, no scheme, no `www.` prefix, no path, no port.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from parsing user-supplied sites and channels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("domain is empty")]
    Empty,

    #[error("domain '{0}' contains whitespace")]
    Whitespace(String),

    #[error("domain '{domain}' contains invalid character '{ch}'")]
    InvalidCharacter { domain: String, ch: char },

    #[error("'{0}' is not a YouTube channel URL or channel identifier")]
    InvalidChannel(String),
}

/// A normalized domain name, e.g. `youtube.com`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Normalize user input into a domain.
    ///
    /// Accepts `https://www.Example.com/path?q=1`, `example.com:8080`,
    /// `EXAMPLE.COM.` and similar; all become `example.com`.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::Whitespace(trimmed.to_string()));
        }

        let lowered = trimmed.to_ascii_lowercase();
        let without_scheme = match lowered.find("://") {
            Some(idx) => &lowered[idx + 3..],
            None => lowered.as_str(),
        };

        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        // userinfo@host
        let host = host.rsplit('@').next().unwrap_or_default();
        let host = match host.rfind(':') {
            Some(idx) if host[idx + 1..].chars().all(|c| c.is_ascii_digit()) => &host[..idx],
            _ => host,
        };
        let host = host.strip_prefix("www.").unwrap_or(host);
        let host = host.trim_end_matches('.');

        if host.is_empty() {
            return Err(DomainError::Empty);
        }

        if let Some(ch) = host
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')))
        {
            return Err(DomainError::InvalidCharacter {
                domain: host.to_string(),
                ch,
            });
        }

        if host.starts_with('.') || host.contains("..") {
            return Err(DomainError::InvalidCharacter {
                domain: host.to_string(),
                ch: '.',
            });
        }

        Ok(Self(host.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Domain {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

/// Normalize a blocked sub-path so it always starts with `/`
pub fn normalize_path(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() || path == "/" {
        return None;
    }
    if path.starts_with('/') {
        Some(path.to_string())
    } else {
        Some(format!("/{}", path))
    }
}

/// An approved YouTube channel identifier (handle, custom name, or channel ID)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

const CHANNEL_PREFIXES: [&str; 4] = ["@", "c/", "channel/", "user/"];

fn is_channel_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl ChannelId {
    /// Extract a channel identifier from a channel URL or accept a bare one.
    ///
    /// Recognized URLs: `youtube.com/@name`, `youtube.com/c/name`,
    /// `youtube.com/channel/UC...`, `youtube.com/user/name`.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DomainError::Empty);
        }

        if let Some(idx) = input.find("youtube.com/") {
            let rest = &input[idx + "youtube.com/".len()..];
            for prefix in CHANNEL_PREFIXES {
                if let Some(tail) = rest.strip_prefix(prefix) {
                    let id: String = tail.chars().take_while(|c| is_channel_char(*c)).collect();
                    if !id.is_empty() {
                        return Ok(Self(id));
                    }
                }
            }
            return Err(DomainError::InvalidChannel(input.to_string()));
        }

        let bare = input.strip_prefix('@').unwrap_or(input);
        if !bare.is_empty() && bare.chars().all(is_channel_char) {
            Ok(Self(bare.to_string()))
        } else {
            Err(DomainError::InvalidChannel(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChannelId> for String {
    fn from(channel: ChannelId) -> Self {
        channel.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_www_and_case() {
        let d = Domain::parse("https://WWW.Reddit.com/r/all?sort=new").unwrap();
        assert_eq!(d.as_str(), "reddit.com");

        let d = Domain::parse("  http://news.ycombinator.com:8080/ ").unwrap();
        assert_eq!(d.as_str(), "news.ycombinator.com");

        let d = Domain::parse("example.org.").unwrap();
        assert_eq!(d.as_str(), "example.org");
    }

    #[test]
    fn keeps_subdomains_other_than_www() {
        let d = Domain::parse("m.youtube.com").unwrap();
        assert_eq!(d.as_str(), "m.youtube.com");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(Domain::parse(""), Err(DomainError::Empty));
        assert_eq!(Domain::parse("https://www."), Err(DomainError::Empty));
        assert!(matches!(
            Domain::parse("bad domain.com"),
            Err(DomainError::Whitespace(_))
        ));
        assert!(matches!(
            Domain::parse("exa*mple.com"),
            Err(DomainError::InvalidCharacter { ch: '*', .. })
        ));
        assert!(Domain::parse("a..b").is_err());
    }

    #[test]
    fn domain_deserialization_normalizes() {
        let d: Domain = serde_json::from_str("\"WWW.Facebook.com\"").unwrap();
        assert_eq!(d.as_str(), "facebook.com");
        assert!(serde_json::from_str::<Domain>("\"\"").is_err());
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("shorts"), Some("/shorts".into()));
        assert_eq!(normalize_path("/reels"), Some("/reels".into()));
        assert_eq!(normalize_path(" / "), None);
    }

    #[test]
    fn channel_from_urls() {
        let cases = [
            ("https://www.youtube.com/@veritasium", "veritasium"),
            ("youtube.com/c/3blue1brown/videos", "3blue1brown"),
            ("https://youtube.com/channel/UCYO_jab_esuFRV4b17AJtAw", "UCYO_jab_esuFRV4b17AJtAw"),
            ("https://www.youtube.com/user/numberphile", "numberphile"),
        ];
        for (input, expected) in cases {
            assert_eq!(ChannelId::parse(input).unwrap().as_str(), expected, "{input}");
        }
    }

    #[test]
    fn channel_bare_and_invalid() {
        assert_eq!(ChannelId::parse("@kurzgesagt").unwrap().as_str(), "kurzgesagt");
        assert!(ChannelId::parse("https://www.youtube.com/watch?v=abc").is_err());
        assert!(ChannelId::parse("not a channel").is_err());
        assert!(ChannelId::parse("").is_err());
    }
}
