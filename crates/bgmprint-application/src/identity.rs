// SPDX-License-Identifier: GPL-3.0-or-later

//! Track identity derived from the file naming convention.
//!
//! Files are expected to end with a bracketed token, e.g.
//! `Morning Walk[abc-123].mp3`. The token becomes the track's key inside a
//! fixed namespace: `dova-s/abc-123`.

use bgmprint_domain::{TrackIdentity, IDENTITY_NAMESPACE};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// The file name does not follow the naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid file name: {raw_file_name}")]
pub struct ValidationFailure {
    pub raw_file_name: String,
}

lazy_static! {
    // Trailing [token] made of letters, digits, '-' and '_'
    static ref TRAILING_TOKEN: Regex = Regex::new(r"\[([_\-A-Za-z0-9]+?)\]$").unwrap();
}

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    namespace: String,
}

impl IdentityResolver {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Derive the identity for a file name without its extension.
    pub fn derive_identity(&self, raw_file_name: &str) -> Result<TrackIdentity, ValidationFailure> {
        TRAILING_TOKEN
            .captures(raw_file_name)
            .and_then(|caps| caps.get(1))
            .map(|token| TrackIdentity::new(&self.namespace, token.as_str()))
            .ok_or_else(|| ValidationFailure {
                raw_file_name: raw_file_name.to_string(),
            })
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(IDENTITY_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::default()
    }

    #[test]
    fn trailing_token_becomes_identity() {
        let id = resolver().derive_identity("SongA[xyz-1]").unwrap();
        assert_eq!(id.as_str(), "dova-s/xyz-1");
    }

    #[test]
    fn derivation_is_deterministic() {
        let r = resolver();
        for name in ["SongA[xyz-1]", "夜の散歩 [a_b-C9]", "[only]"] {
            assert_eq!(r.derive_identity(name), r.derive_identity(name));
            assert!(r.derive_identity(name).is_ok());
        }
    }

    #[test]
    fn last_bracket_group_is_used() {
        let id = resolver().derive_identity("Mix [live][take_2]").unwrap();
        assert_eq!(id.as_str(), "dova-s/take_2");
    }

    #[test]
    fn missing_token_is_rejected() {
        let err = resolver().derive_identity("BadName").unwrap_err();
        assert_eq!(err.raw_file_name, "BadName");
        assert_eq!(err.to_string(), "Invalid file name: BadName");
    }

    #[test]
    fn token_must_be_at_the_end() {
        assert!(resolver().derive_identity("Song[abc] remix").is_err());
    }

    #[test]
    fn empty_or_invalid_tokens_are_rejected() {
        let r = resolver();
        assert!(r.derive_identity("Song[]").is_err());
        assert!(r.derive_identity("Song[a b]").is_err());
        assert!(r.derive_identity("Song[a.b]").is_err());
    }

    #[test]
    fn default_namespace_is_fixed() {
        assert_eq!(IdentityResolver::default().namespace(), "dova-s");
        assert_eq!(
            IdentityResolver::default().derive_identity("x[1]").unwrap(),
            IdentityResolver::default().derive_identity("x[1]").unwrap()
        );
    }

    #[test]
    fn explicit_namespace_is_used() {
        let id = IdentityResolver::new("bgm").derive_identity("x[1]").unwrap();
        assert_eq!(id.as_str(), "bgm/1");
    }
}
