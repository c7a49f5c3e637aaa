//! Cache key derivation.
//!
//! Cached files are content-addressed by the URL they were downloaded from:
//! the same URL always maps to the same file name, across runs and processes.

use std::fmt;

/// Number of hex characters kept from the digest (8 bytes).
pub const KEY_LENGTH: usize = 16;

/// A short, deterministic identifier derived from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `url`.
    ///
    /// The key is the first [`KEY_LENGTH`] hex characters of the BLAKE3
    /// digest of the URL, exactly as written (no normalization).
    ///
    /// ```
    /// use vendr_fetch::CacheKey;
    ///
    /// let key = CacheKey::derive("https://cdn.example.com/a.js");
    /// assert_eq!(key.as_str().len(), 16);
    /// assert_eq!(key, CacheKey::derive("https://cdn.example.com/a.js"));
    /// assert_ne!(key, CacheKey::derive("https://cdn.example.com/b.js"));
    /// ```
    pub fn derive(url: &str) -> Self {
        let digest = blake3::hash(url.as_bytes()).to_hex();
        Self(digest[..KEY_LENGTH].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The cache file name: `<prefix><key><extension>`.
    ///
    /// ```
    /// use vendr_fetch::CacheKey;
    ///
    /// let key = CacheKey::derive("https://cdn.example.com/a.js");
    /// let name = key.file_name("remote-script.", ".js");
    /// assert_eq!(name, format!("remote-script.{key}.js"));
    /// ```
    pub fn file_name(&self, prefix: &str, extension: &str) -> String {
        format!("{prefix}{}{extension}", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://cdn.example.com/a.js")]
    #[case("http://localhost:8080/style.css?v=2")]
    #[case("https://unpkg.com/vue@3/dist/vue.global.js")]
    fn test_key_shape(#[case] url: &str) {
        let key = CacheKey::derive(url);
        assert_eq!(key.as_str().len(), KEY_LENGTH);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    // Pinned: a different key would orphan every existing cache directory.
    #[rstest]
    #[case("https://cdn.example.com/a.js", "a37a2fcf881d7371")]
    #[case("http://localhost:8080/style.css?v=2", "80d1134ccba6a16a")]
    #[case("https://unpkg.com/vue@3/dist/vue.global.js", "a107d38c11a20f7a")]
    fn test_key_is_stable(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(CacheKey::derive(url).as_str(), expected);
        assert_eq!(
            CacheKey::derive(url).file_name("remote-script.", ".js"),
            format!("remote-script.{expected}.js")
        );
    }

    #[test]
    fn test_key_is_not_normalized() {
        assert_ne!(CacheKey::derive("https://cdn.example.com/a.js"), CacheKey::derive("https://CDN.example.com/a.js"));
    }

    #[rstest]
    #[case("remote-script.", ".js")]
    #[case("", ".css")]
    #[case("vendor-", "")]
    fn test_file_name(#[case] prefix: &str, #[case] extension: &str) {
        let key = CacheKey::derive("https://cdn.example.com/a.js");
        let name = key.file_name(prefix, extension);
        assert!(name.starts_with(prefix));
        assert!(name.ends_with(extension));
        assert_eq!(name.len(), prefix.len() + KEY_LENGTH + extension.len());
    }
}
