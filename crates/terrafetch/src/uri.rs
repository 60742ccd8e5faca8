//! Logical resource references and their resolution.
//!
//! A [`Uri`] pairs the location string a caller supplied (the *base*) with a
//! [`UriContext`] (referrer and request headers), and eagerly resolves the
//! two into the absolute *full* form used as the cache and gate key.
//!
//! Remote references may embed a rotation marker, a bracketed character set
//! such as `http://[abc].tiles.example.com/`, which is expanded to one of its
//! characters per fetch to spread requests across mirror hosts.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const FILE_PREFIX: &str = "file://";

/// Context a reference is resolved and fetched under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriContext {
    /// Location of the document that mentioned the reference, used to
    /// resolve relative references.
    pub referrer: String,
    /// Extra request headers sent with remote fetches, in order.
    pub headers: Vec<(String, String)>,
}

impl UriContext {
    /// Create a context with the given referrer and no headers.
    #[must_use]
    pub fn with_referrer(referrer: impl Into<String>) -> Self {
        Self {
            referrer: referrer.into(),
            headers: Vec::new(),
        }
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// How a resolved reference is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind {
    /// A filesystem path.
    Local,
    /// An `http://` or `https://` URL.
    Remote,
    /// Empty, or a scheme no transport handles.
    Unrecognized,
}

/// A resolved resource reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    base: String,
    full: String,
    /// Byte offsets of the `[` and `]` of the rotation marker in `full`.
    rotation: Option<(usize, usize)>,
    context: UriContext,
}

impl Uri {
    /// Create a reference with an empty context.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self::with_context(location, UriContext::default())
    }

    /// Create a reference and resolve it against `context`.
    #[must_use]
    pub fn with_context(location: impl Into<String>, context: UriContext) -> Self {
        let location = location.into();
        let base = strip_file_prefix(location.trim()).to_string();
        let full = resolve(&base, &context);
        let rotation = find_rotation(&full);
        Self {
            base,
            full,
            rotation,
            context,
        }
    }

    /// The location as given, minus any `file://` prefix.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The resolved, absolute form of the reference.
    #[must_use]
    pub fn full(&self) -> &str {
        &self.full
    }

    /// The context this reference was resolved under.
    #[must_use]
    pub fn context(&self) -> &UriContext {
        &self.context
    }

    /// Byte offsets of the rotation marker brackets, if any.
    #[must_use]
    pub fn rotation(&self) -> Option<(usize, usize)> {
        self.rotation
    }

    /// Classify the resolved reference.
    #[must_use]
    pub fn kind(&self) -> UriKind {
        let full = self.full.trim();
        if has_http_scheme(full) {
            UriKind::Remote
        } else if full.is_empty() || scheme_of(full).is_some() {
            UriKind::Unrecognized
        } else {
            UriKind::Local
        }
    }

    /// Whether the reference points at an HTTP server.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.kind() == UriKind::Remote
    }

    /// Replace the referrer and resolve the base again.
    pub fn set_referrer(&mut self, referrer: impl Into<String>) {
        self.context.referrer = referrer.into();
        self.full = resolve(&self.base, &self.context);
        self.rotation = find_rotation(&self.full);
    }

    /// The full reference with the rotation marker replaced by the character
    /// selected by `counter` (modulo the size of the set).
    ///
    /// Returns the full reference unchanged when there is no marker.
    #[must_use]
    pub fn rotated(&self, counter: usize) -> String {
        let Some((open, close)) = self.rotation else {
            return self.full.clone();
        };
        let choices: Vec<char> = self.full[open + 1..close].chars().collect();
        let pick = choices[counter % choices.len()];
        format!("{}{pick}{}", &self.full[..open], &self.full[close + 1..])
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl From<&str> for Uri {
    fn from(location: &str) -> Self {
        Self::new(location)
    }
}

impl From<String> for Uri {
    fn from(location: String) -> Self {
        Self::new(location)
    }
}

/// Serialized shape: a bare string, or an object with headers.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum UriRepr {
    Href(String),
    Object {
        href: String,
        #[serde(default, skip_serializing)]
        referrer: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        headers: Vec<(String, String)>,
    },
}

impl Serialize for Uri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = if self.context.referrer.is_empty() && self.context.headers.is_empty() {
            UriRepr::Href(self.base.clone())
        } else {
            UriRepr::Object {
                href: self.base.clone(),
                referrer: String::new(),
                headers: self.context.headers.clone(),
            }
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match UriRepr::deserialize(deserializer)? {
            UriRepr::Href(href) => Uri::new(href),
            UriRepr::Object {
                href,
                referrer,
                headers,
            } => Uri::with_context(href, UriContext { referrer, headers }),
        })
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn strip_file_prefix(location: &str) -> &str {
    if starts_with_ignore_case(location, FILE_PREFIX) {
        &location[FILE_PREFIX.len()..]
    } else {
        location
    }
}

pub(crate) fn has_http_scheme(s: &str) -> bool {
    let s = s.trim();
    starts_with_ignore_case(s, "http://") || starts_with_ignore_case(s, "https://")
}

/// The `scheme` of a `scheme://...` string.
fn scheme_of(s: &str) -> Option<&str> {
    let scheme = &s[..s.find("://")?];
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

fn resolve(base: &str, context: &UriContext) -> String {
    let absolute = Path::new(base).is_absolute() || has_http_scheme(base);
    if absolute || context.referrer.is_empty() {
        return base.to_string();
    }

    if has_http_scheme(&context.referrer) {
        resolve_remote(context.referrer.trim(), base)
    } else {
        resolve_local(strip_file_prefix(&context.referrer), base)
    }
}

/// Join `base` onto the directory of a remote referrer. Purely lexical; the
/// authority is fixed and `..` never climbs above it.
fn resolve_remote(referrer: &str, base: &str) -> String {
    let Some(sep) = referrer.find("://") else {
        return base.to_string();
    };
    let (scheme, rest) = referrer.split_at(sep + 3);
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let (authority, path) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, "/"),
    };
    let dir = &path[..=path.rfind('/').unwrap_or(0)];

    let (base_path, suffix) = match base.find(['?', '#']) {
        Some(i) => base.split_at(i),
        None => (base, ""),
    };

    let joined = format!("{dir}{base_path}");
    format!("{scheme}{authority}{}{suffix}", normalize_url_path(&joined))
}

/// Collapse `.` and `..` segments of an absolute URL path.
fn normalize_url_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    let mut out = format!("/{}", segments.join("/"));
    if trailing && !segments.is_empty() {
        out.push('/');
    }
    out
}

fn resolve_local(referrer: &str, base: &str) -> String {
    let referrer = Path::new(referrer);
    let dir = if referrer.as_os_str().to_string_lossy().ends_with('/') {
        referrer
    } else {
        referrer.parent().unwrap_or_else(|| Path::new(""))
    };
    weakly_canonical(&dir.join(base))
        .to_string_lossy()
        .into_owned()
}

/// Canonicalize the longest existing prefix of `path` and append the
/// lexically normalized remainder. Never fails.
fn weakly_canonical(path: &Path) -> PathBuf {
    let normalized = normalize_lexically(path);

    let mut existing = normalized.clone();
    let mut remainder = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(&existing) {
            return remainder
                .iter()
                .rev()
                .fold(canonical, |acc, name| acc.join(name));
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                remainder.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return normalized,
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn find_rotation(full: &str) -> Option<(usize, usize)> {
    if !has_http_scheme(full) {
        return None;
    }
    let open = full.find('[')?;
    let close = open + full[open..].find(']')?;
    (close > open + 1).then_some((open, close))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_remote_ignores_referrer() {
        let uri = Uri::with_context(
            "https://tiles.example.com/0/0/0.png",
            UriContext::with_referrer("http://other.example.com/map.json"),
        );
        assert_eq!(uri.full(), "https://tiles.example.com/0/0/0.png");
        assert_eq!(uri.kind(), UriKind::Remote);
    }

    #[test]
    fn test_file_prefix_stripped() {
        let uri = Uri::new("file:///data/world.tif");
        assert_eq!(uri.base(), "/data/world.tif");
        assert_eq!(uri.full(), "/data/world.tif");
        assert_eq!(uri.kind(), UriKind::Local);

        let upper = Uri::new("FILE:///data/world.tif");
        assert_eq!(upper.full(), "/data/world.tif");
    }

    #[test]
    fn test_relative_without_referrer_unchanged() {
        let uri = Uri::new("tiles/a.png");
        assert_eq!(uri.full(), "tiles/a.png");
    }

    #[test]
    fn test_relative_against_remote_referrer() {
        let uri = Uri::with_context(
            "../imagery/0/0/0.png",
            UriContext::with_referrer("http://tiles.example.com/maps/world/layer.json"),
        );
        assert_eq!(
            uri.full(),
            "http://tiles.example.com/maps/imagery/0/0/0.png"
        );
    }

    #[test]
    fn test_remote_parent_stops_at_host() {
        let uri = Uri::with_context(
            "../../x.png",
            UriContext::with_referrer("https://host/a.json"),
        );
        assert_eq!(uri.full(), "https://host/x.png");
    }

    #[test]
    fn test_remote_referrer_query_ignored_base_query_kept() {
        let uri = Uri::with_context(
            "./c.png?v=../2",
            UriContext::with_referrer("http://host/a/b.json?key=1"),
        );
        assert_eq!(uri.full(), "http://host/a/c.png?v=../2");
    }

    #[test]
    fn test_relative_against_missing_local_referrer() {
        let uri = Uri::with_context(
            "./imagery/../elevation/dem.tif",
            UriContext::with_referrer("/no-such-root-terrafetch/maps/earth.json"),
        );
        assert_eq!(
            uri.full(),
            "/no-such-root-terrafetch/maps/elevation/dem.tif"
        );
    }

    #[test]
    fn test_relative_against_existing_local_referrer() {
        let dir = tempfile::tempdir().unwrap();
        let referrer = dir.path().join("map.json");
        let uri = Uri::with_context(
            "tiles/a.tif",
            UriContext::with_referrer(referrer.to_string_lossy()),
        );

        let expected = std::fs::canonicalize(dir.path())
            .unwrap()
            .join("tiles")
            .join("a.tif");
        assert_eq!(uri.full(), expected.to_string_lossy());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let context = UriContext::with_referrer("http://[ab].host/dir/layer.json")
            .with_header("Authorization", "token");
        let first = Uri::with_context("../t/[xy]/1.png", context.clone());
        let second = Uri::with_context("../t/[xy]/1.png", context);
        assert_eq!(first, second);
        assert_eq!(first.full(), "http://[ab].host/t/[xy]/1.png");
    }

    #[test]
    fn test_rotation_round_robin() {
        let uri = Uri::new("http://[abc].example.com/x");
        assert_eq!(uri.rotation(), Some((7, 11)));

        let picks: Vec<String> = (0..4).map(|i| uri.rotated(i)).collect();
        assert_eq!(
            picks,
            vec![
                "http://a.example.com/x",
                "http://b.example.com/x",
                "http://c.example.com/x",
                "http://a.example.com/x",
            ]
        );
        assert!(picks.iter().all(|p| !p.contains('[') && !p.contains(']')));

        // Resolution itself never substitutes.
        assert_eq!(uri.full(), "http://[abc].example.com/x");
    }

    #[test]
    fn test_no_rotation_for_local_or_empty_marker() {
        assert_eq!(Uri::new("/data/[abc]/x.tif").rotation(), None);
        assert_eq!(Uri::new("http://host/[]/x").rotation(), None);
        assert_eq!(Uri::new("http://host/x").rotated(3), "http://host/x");
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(Uri::new("HTTP://Host/X").kind(), UriKind::Remote);
        assert_eq!(Uri::new("  https://host/x").kind(), UriKind::Remote);
        assert_eq!(Uri::new("/var/tiles/a.png").kind(), UriKind::Local);
        assert_eq!(Uri::new("relative/a.png").kind(), UriKind::Local);
        assert_eq!(Uri::new("ftp://host/a.png").kind(), UriKind::Unrecognized);
        assert_eq!(Uri::new("").kind(), UriKind::Unrecognized);
    }

    #[test]
    fn test_set_referrer_resolves_again() {
        let mut uri = Uri::new("b.png");
        assert_eq!(uri.full(), "b.png");

        uri.set_referrer("http://host/dir/a.json");
        assert_eq!(uri.full(), "http://host/dir/b.png");
        assert_eq!(uri.context().referrer, "http://host/dir/a.json");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let uri = Uri::new("  http://host/x.png \n");
        assert_eq!(uri.base(), "http://host/x.png");
        assert_eq!(uri.full(), "http://host/x.png");
        assert_eq!(uri.kind(), UriKind::Remote);

        let uri = Uri::new(" file:///data/world.tif");
        assert_eq!(uri.full(), "/data/world.tif");
    }

    #[test]
    fn test_serialize_bare_string() {
        let uri = Uri::new("http://example.com/a.png");
        let json = serde_json::to_value(&uri).unwrap();
        assert_eq!(json, serde_json::json!("http://example.com/a.png"));
    }

    #[test]
    fn test_serialize_object_with_headers_omits_referrer() {
        let context = UriContext::with_referrer("http://example.com/layer.json")
            .with_header("Authorization", "Bearer abc")
            .with_header("X-Tenant", "blue");
        let uri = Uri::with_context("a.png", context);

        let json = serde_json::to_value(&uri).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "href": "a.png",
                "headers": [["Authorization", "Bearer abc"], ["X-Tenant", "blue"]],
            })
        );
    }

    #[test]
    fn test_serialize_referrer_only_is_object_without_headers() {
        let uri = Uri::with_context("a.png", UriContext::with_referrer("/maps/m.json"));
        let json = serde_json::to_value(&uri).unwrap();
        assert_eq!(json, serde_json::json!({ "href": "a.png" }));
    }

    #[test]
    fn test_deserialize_both_forms() {
        let bare: Uri = serde_json::from_str("\"http://example.com/a.png\"").unwrap();
        assert_eq!(bare.full(), "http://example.com/a.png");

        let object: Uri = serde_json::from_str(
            r#"{"href": "a.png", "referrer": "http://host/d/m.json", "headers": [["X-Key", "1"]]}"#,
        )
        .unwrap();
        assert_eq!(object.full(), "http://host/d/a.png");
        assert_eq!(
            object.context().headers,
            vec![("X-Key".to_string(), "1".to_string())]
        );

        let back = serde_json::to_value(&object).unwrap();
        assert_eq!(
            back,
            serde_json::json!({ "href": "a.png", "headers": [["X-Key", "1"]] })
        );
    }
}
