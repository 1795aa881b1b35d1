//! Content address resolution.
//!
//! Translates canonical article addresses (`https://en.wikipedia.org/wiki/Cat`)
//! into fetchable addresses under the custom routing scheme, resolves link
//! titles raised inside rendered content back into article references, and
//! rewrites lead image sources to a requested thumbnail width. Everything
//! here is a pure function of its inputs.

use std::fmt;

use folio_types::error::{FolioError, Result};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Characters escaped in a title path segment: everything outside the
/// URL path set, plus `/` and `.` so a title is always one segment.
const TITLE_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'/')
    .add(b'.');

/// Path prefix of canonical article addresses.
const ARTICLE_PATH_PREFIX: &str = "/wiki/";

/// Path prefix of page content endpoints.
const ENDPOINT_PATH_PREFIX: &str = "/api/rest_v1/page/";

// ---------------------------------------------------------------------------
// URL parsing and resolution (simplified RFC 3986)
// ---------------------------------------------------------------------------

/// A parsed URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    /// Scheme component (e.g. `"https"`, `"app"`).
    pub scheme: String,
    /// Host component (e.g. `"en.wikipedia.org"`).
    pub host: String,
    /// Optional explicit port number.
    pub port: Option<u16>,
    /// Path component starting with `/`.
    pub path: String,
    /// Optional query string (without the leading `?`).
    pub query: Option<String>,
    /// Optional fragment (without the leading `#`).
    pub fragment: Option<String>,
}

impl Url {
    /// Parse an absolute or protocol-relative URL string.
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }

        if let Some(rest) = url.strip_prefix("//") {
            return Self::parse_authority_and_path("", rest);
        }

        let idx = url.find("://")?;
        let scheme = &url[..idx];
        if scheme.is_empty() || !scheme.chars().all(is_scheme_char) {
            return None;
        }
        Self::parse_authority_and_path(scheme, &url[idx + 3..])
    }

    /// Parse `host[:port]/path?query#fragment` after the scheme has been
    /// stripped.
    fn parse_authority_and_path(scheme: &str, rest: &str) -> Option<Url> {
        let (rest, fragment) = match rest.find('#') {
            Some(i) => (&rest[..i], Some(rest[i + 1..].to_string())),
            None => (rest, None),
        };

        let (rest, query) = match rest.find('?') {
            Some(i) => (&rest[..i], Some(rest[i + 1..].to_string())),
            None => (rest, None),
        };

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rfind(':') {
            Some(i) => match authority[i + 1..].parse::<u16>() {
                Ok(p) => (&authority[..i], Some(p)),
                Err(_) => (authority, None),
            },
            None => (authority, None),
        };

        Some(Url {
            scheme: scheme.to_lowercase(),
            host: host.to_lowercase(),
            port,
            path: path.to_string(),
            query,
            fragment,
        })
    }

    /// Resolve a reference against this base URL.
    ///
    /// Handles absolute URLs, protocol-relative (`//host/path`), absolute
    /// paths (`/path`), relative paths (`file.jpg`, `../file.jpg`), and
    /// fragment-only references.
    pub fn resolve(&self, relative: &str) -> Option<Url> {
        let relative = relative.trim();
        if relative.is_empty() {
            return Some(self.clone());
        }

        if relative.contains("://") {
            return Url::parse(relative);
        }

        if relative.starts_with("//") {
            return Url::parse(&format!("{}:{}", self.scheme, relative));
        }

        if let Some(frag) = relative.strip_prefix('#') {
            let mut resolved = self.clone();
            resolved.fragment = Some(frag.to_string());
            return Some(resolved);
        }

        let (rel_path, query, fragment) = split_path_query_fragment(relative);
        let path = if rel_path.starts_with('/') {
            resolve_path("/", &rel_path)
        } else {
            resolve_path(self.directory(), &rel_path)
        };
        Some(Url {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            path,
            query,
            fragment,
        })
    }

    /// The directory portion of the path (up to and including the last `/`).
    pub fn directory(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[..=i],
            None => "/",
        }
    }

    /// The last path segment, if any.
    pub fn last_segment(&self) -> Option<&str> {
        self.path.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Return a copy with a different scheme.
    pub fn with_scheme(&self, scheme: &str) -> Url {
        Url {
            scheme: scheme.to_lowercase(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.path)?;
        if let Some(ref q) = self.query {
            write!(f, "?{q}")?;
        }
        if let Some(ref frag) = self.fragment {
            write!(f, "#{frag}")?;
        }
        Ok(())
    }
}

fn is_scheme_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')
}

/// Split a (possibly relative) path string into `(path, query, fragment)`.
fn split_path_query_fragment(s: &str) -> (String, Option<String>, Option<String>) {
    let (s, fragment) = match s.find('#') {
        Some(i) => (&s[..i], Some(s[i + 1..].to_string())),
        None => (s, None),
    };
    let (path, query) = match s.find('?') {
        Some(i) => (s[..i].to_string(), Some(s[i + 1..].to_string())),
        None => (s.to_string(), None),
    };
    (path, query, fragment)
}

/// Resolve a relative path against a base directory, handling `..` and
/// `.` segments.
fn resolve_path(base_dir: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();

    for seg in relative.split('/') {
        match seg {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            s => segments.push(s),
        }
    }

    format!("/{}", segments.join("/"))
}

// ---------------------------------------------------------------------------
// Title encoding
// ---------------------------------------------------------------------------

/// Percent-encode a title as a single path segment.
pub fn encode_title(title: &str) -> String {
    utf8_percent_encode(title, TITLE_SEGMENT).to_string()
}

/// Decode a percent-encoded title segment.
pub fn decode_title(encoded: &str) -> Result<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| FolioError::InvalidParameters(format!("title is not UTF-8: {e}")))
}

/// Derive the language code from a host such as `en.wikipedia.org`.
///
/// The host needs at least three labels and a leading label that looks
/// like a language code.
pub fn language_from_host(host: &str) -> Option<&str> {
    let mut labels = host.split('.');
    let first = labels.next()?;
    if labels.filter(|l| !l.is_empty()).count() < 2 {
        return None;
    }
    let looks_like_language = (2..=12).contains(&first.len())
        && first != "www"
        && first
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && first.starts_with(|c: char| c.is_ascii_lowercase());
    looks_like_language.then_some(first)
}

// ---------------------------------------------------------------------------
// ArticleReference
// ---------------------------------------------------------------------------

/// Key identifying an article in the metadata store (`host/title`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleKey(String);

impl ArticleKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one article: canonical address, host, language, title.
///
/// Immutable once built. Navigating to another article builds a new
/// reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleReference {
    address: Url,
    language: String,
    title: String,
}

impl ArticleReference {
    /// Parse a canonical article address.
    pub fn parse(address: &str) -> Result<Self> {
        let url = Url::parse(address).ok_or_else(|| {
            FolioError::InvalidParameters(format!("unparseable article address: {address}"))
        })?;
        Self::from_url(url)
    }

    /// Build a reference from a parsed canonical address.
    pub fn from_url(url: Url) -> Result<Self> {
        if url.host.is_empty() {
            return Err(FolioError::InvalidParameters(format!(
                "article address has no host: {url}"
            )));
        }
        let language = language_from_host(&url.host)
            .ok_or_else(|| {
                FolioError::InvalidParameters(format!(
                    "cannot derive language from host {:?}",
                    url.host
                ))
            })?
            .to_string();
        let encoded = url
            .path
            .strip_prefix(ARTICLE_PATH_PREFIX)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                FolioError::InvalidParameters(format!("article address has no title: {url}"))
            })?;
        let title = decode_title(encoded)?;
        if title.trim().is_empty() {
            return Err(FolioError::InvalidParameters(format!(
                "article address has a blank title: {url}"
            )));
        }

        // Canonical form drops query and fragment and normalizes the title
        // encoding.
        let address = Url {
            scheme: if url.scheme.is_empty() {
                "https".to_string()
            } else {
                url.scheme
            },
            host: url.host,
            port: url.port,
            path: format!("{ARTICLE_PATH_PREFIX}{}", encode_title(&title)),
            query: None,
            fragment: None,
        };

        Ok(Self {
            address,
            language,
            title,
        })
    }

    /// The canonical address.
    pub fn address(&self) -> &Url {
        &self.address
    }

    pub fn host(&self) -> &str {
        &self.address.host
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// The decoded title (underscores preserved).
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The title encoded as a path segment.
    pub fn encoded_title(&self) -> String {
        encode_title(&self.title)
    }

    /// Metadata store key for this article.
    pub fn key(&self) -> ArticleKey {
        ArticleKey(format!("{}/{}", self.address.host, self.title))
    }
}

impl fmt::Display for ArticleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.address.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Page content endpoint flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The rendered article document.
    MobileHtml,
    /// Sub-resources needed to render the document offline.
    MobileHtmlOfflineResources,
    /// Media used by the article.
    MediaList,
    /// Short article summary.
    Summary,
    /// Reference list.
    References,
}

impl Endpoint {
    /// Path segment naming this endpoint.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::MobileHtml => "mobile-html",
            Endpoint::MobileHtmlOfflineResources => "mobile-html-offline-resources",
            Endpoint::MediaList => "media-list",
            Endpoint::Summary => "summary",
            Endpoint::References => "references",
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve the fetchable address of an endpoint for an article, under the
/// given routing scheme.
pub fn document_address(reference: &ArticleReference, endpoint: Endpoint, scheme: &str) -> Result<Url> {
    if scheme.is_empty() || !scheme.chars().all(is_scheme_char) {
        return Err(FolioError::InvalidParameters(format!(
            "invalid routing scheme {scheme:?}"
        )));
    }
    Ok(Url {
        scheme: scheme.to_lowercase(),
        host: reference.host().to_string(),
        port: None,
        path: format!(
            "{ENDPOINT_PATH_PREFIX}{}/{}",
            endpoint.path(),
            reference.encoded_title()
        ),
        query: None,
        fragment: None,
    })
}

/// Resolve a link title raised by rendered content into an article on
/// `host`.
///
/// Content links arrive as `Dog`, `./Dog`, or `Dog#Section`; spaces are
/// normalized to underscores.
pub fn article_reference(host: &str, title: &str) -> Result<ArticleReference> {
    if host.is_empty() {
        return Err(FolioError::InvalidParameters("empty host".to_string()));
    }
    let title = title.trim();
    let title = title.strip_prefix("./").unwrap_or(title);
    let title = title.split('#').next().unwrap_or("");
    if title.is_empty() {
        return Err(FolioError::InvalidParameters(
            "empty link title".to_string(),
        ));
    }
    let title = title.replace(' ', "_");
    let url = Url {
        scheme: "https".to_string(),
        host: host.to_lowercase(),
        port: None,
        path: format!("{ARTICLE_PATH_PREFIX}{}", encode_title(&title)),
        query: None,
        fragment: None,
    };
    ArticleReference::from_url(url)
}

/// Compute the address to fetch for a lead image source at a target width.
///
/// Relative sources resolve against `base`, protocol-relative sources
/// gain `base`'s scheme. Thumbnail sources (`.../thumb/.../<N>px-<file>`)
/// get their width prefix rewritten to `target_width`, capped at the
/// original width when known. Returns `None` for an empty or
/// unresolvable source.
pub fn lead_image_address(
    base: &Url,
    source: &str,
    target_width: u32,
    original_width: Option<u32>,
) -> Option<Url> {
    let source = source.trim();
    if source.is_empty() {
        return None;
    }
    let mut url = base.resolve(source)?;

    let width = match original_width {
        Some(original) if original > 0 => target_width.min(original),
        _ => target_width,
    };

    if width > 0
        && url.path.contains("/thumb/")
        && let Some(last) = url.last_segment()
        && let Some((prefix, file)) = last.split_once("px-")
        && !prefix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_digit())
    {
        let rewritten = format!("{width}px-{file}");
        let dir_len = url.path.len() - last.len();
        url.path = format!("{}{rewritten}", &url.path[..dir_len]);
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- URL parsing -------------------------------------------------------

    #[test]
    fn parse_article_url() {
        let url = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        assert_eq!(url.scheme, "https");
        assert_eq!(url.host, "en.wikipedia.org");
        assert_eq!(url.port, None);
        assert_eq!(url.path, "/wiki/Cat");
    }

    #[test]
    fn parse_url_with_port_query_and_fragment() {
        let url = Url::parse("http://localhost:8080/api?q=1#top").unwrap();
        assert_eq!(url.host, "localhost");
        assert_eq!(url.port, Some(8080));
        assert_eq!(url.query, Some("q=1".to_string()));
        assert_eq!(url.fragment, Some("top".to_string()));
    }

    #[test]
    fn parse_rejects_empty_and_schemeless() {
        assert!(Url::parse("").is_none());
        assert!(Url::parse("en.wikipedia.org/wiki/Cat").is_none());
        assert!(Url::parse("bad scheme://x/y").is_none());
    }

    #[test]
    fn display_round_trip() {
        let url = Url::parse("https://example.com:443/path?q=1#frag").unwrap();
        assert_eq!(url.to_string(), "https://example.com:443/path?q=1#frag");
    }

    #[test]
    fn resolve_relative_and_dotdot() {
        let base = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        assert_eq!(base.resolve("cat.jpg").unwrap().path, "/wiki/cat.jpg");
        assert_eq!(base.resolve("../img/cat.jpg").unwrap().path, "/img/cat.jpg");
        assert_eq!(base.resolve("/static/a.png").unwrap().path, "/static/a.png");
    }

    #[test]
    fn resolve_protocol_relative_uses_base_scheme() {
        let base = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        let url = base.resolve("//upload.wikimedia.org/a.jpg").unwrap();
        assert_eq!(url.scheme, "https");
        assert_eq!(url.host, "upload.wikimedia.org");
    }

    // -- language and references --------------------------------------------

    #[test]
    fn language_from_hosts() {
        assert_eq!(language_from_host("en.wikipedia.org"), Some("en"));
        assert_eq!(language_from_host("zh-yue.wikipedia.org"), Some("zh-yue"));
        assert_eq!(language_from_host("de.m.wikipedia.org"), Some("de"));
        assert_eq!(language_from_host("wikipedia.org"), None);
        assert_eq!(language_from_host("www.wikipedia.org"), None);
        assert_eq!(language_from_host("localhost"), None);
        assert_eq!(language_from_host(""), None);
    }

    #[test]
    fn reference_from_canonical_address() {
        let r = ArticleReference::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        assert_eq!(r.host(), "en.wikipedia.org");
        assert_eq!(r.language(), "en");
        assert_eq!(r.title(), "Cat");
        assert_eq!(r.key().as_str(), "en.wikipedia.org/Cat");
        assert_eq!(r.to_string(), "https://en.wikipedia.org/wiki/Cat");
    }

    #[test]
    fn reference_decodes_title_and_drops_fragment() {
        let r = ArticleReference::parse("https://fr.wikipedia.org/wiki/Caf%C3%A9#Histoire").unwrap();
        assert_eq!(r.title(), "Café");
        assert_eq!(r.address().fragment, None);
        assert_eq!(r.encoded_title(), "Caf%C3%A9");
    }

    #[test]
    fn reference_without_language_is_invalid() {
        let err = ArticleReference::parse("https://wikipedia.org/wiki/Cat").unwrap_err();
        assert!(matches!(err, FolioError::InvalidParameters(_)));
    }

    #[test]
    fn reference_without_title_is_invalid() {
        assert!(ArticleReference::parse("https://en.wikipedia.org/wiki/").is_err());
        assert!(ArticleReference::parse("https://en.wikipedia.org/").is_err());
        assert!(ArticleReference::parse("not a url").is_err());
    }

    #[test]
    fn title_encoding_escapes_slash_and_dot() {
        assert_eq!(encode_title("AC/DC"), "AC%2FDC");
        assert_eq!(encode_title("Mr._Bean"), "Mr%2E_Bean");
        assert_eq!(encode_title("C++"), "C++");
        assert_eq!(encode_title("A B"), "A%20B");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert!(decode_title("%FF%FE").is_err());
    }

    // -- endpoint resolution -----------------------------------------------

    #[test]
    fn document_address_for_mobile_html() {
        let r = ArticleReference::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        let url = document_address(&r, Endpoint::MobileHtml, "app").unwrap();
        assert_eq!(
            url.to_string(),
            "app://en.wikipedia.org/api/rest_v1/page/mobile-html/Cat"
        );
    }

    #[test]
    fn document_address_other_endpoints() {
        let r = ArticleReference::parse("https://en.wikipedia.org/wiki/AC%2FDC").unwrap();
        let url = document_address(&r, Endpoint::MediaList, "app").unwrap();
        assert_eq!(url.path, "/api/rest_v1/page/media-list/AC%2FDC");
        assert_eq!(Endpoint::Summary.path(), "summary");
        assert_eq!(Endpoint::References.path(), "references");
        assert_eq!(
            Endpoint::MobileHtmlOfflineResources.path(),
            "mobile-html-offline-resources"
        );
    }

    #[test]
    fn document_address_rejects_bad_scheme() {
        let r = ArticleReference::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        let err = document_address(&r, Endpoint::MobileHtml, "").unwrap_err();
        assert!(matches!(err, FolioError::InvalidParameters(_)));
        assert!(document_address(&r, Endpoint::MobileHtml, "a b").is_err());
    }

    #[test]
    fn link_title_resolves_on_same_host() {
        let r = article_reference("en.wikipedia.org", "Dog").unwrap();
        assert_eq!(r.to_string(), "https://en.wikipedia.org/wiki/Dog");
        assert_eq!(r.language(), "en");
    }

    #[test]
    fn link_title_normalization() {
        let r = article_reference("en.wikipedia.org", "./Domestic dog#Diet").unwrap();
        assert_eq!(r.title(), "Domestic_dog");
    }

    #[test]
    fn link_title_rejects_empty_and_bad_host() {
        assert!(article_reference("en.wikipedia.org", "").is_err());
        assert!(article_reference("en.wikipedia.org", "#Only_fragment").is_err());
        assert!(article_reference("", "Dog").is_err());
        assert!(article_reference("localhost", "Dog").is_err());
    }

    // -- lead image addresses -----------------------------------------------

    #[test]
    fn lead_image_thumbnail_width_rewritten() {
        let base = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        let url = lead_image_address(
            &base,
            "//upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Cat.jpg/320px-Cat.jpg",
            640,
            Some(1200),
        )
        .unwrap();
        assert_eq!(
            url.to_string(),
            "https://upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Cat.jpg/640px-Cat.jpg"
        );
    }

    #[test]
    fn lead_image_width_capped_at_original() {
        let base = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        let url = lead_image_address(
            &base,
            "https://upload.wikimedia.org/x/thumb/a/ab/Cat.jpg/320px-Cat.jpg",
            640,
            Some(500),
        )
        .unwrap();
        assert!(url.path.ends_with("/500px-Cat.jpg"));
    }

    #[test]
    fn lead_image_relative_source() {
        let base = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        let url = lead_image_address(&base, "cat.jpg", 640, Some(800)).unwrap();
        assert_eq!(url.to_string(), "https://en.wikipedia.org/wiki/cat.jpg");
    }

    #[test]
    fn lead_image_non_thumbnail_unchanged() {
        let base = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        let source = "https://upload.wikimedia.org/wikipedia/commons/a/ab/Cat.jpg";
        let url = lead_image_address(&base, source, 640, None).unwrap();
        assert_eq!(url.to_string(), source);
    }

    #[test]
    fn lead_image_empty_source() {
        let base = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
        assert!(lead_image_address(&base, "  ", 640, None).is_none());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn link_title_round_trips_through_document_address(
                title in "[A-Za-z0-9_()+,'!&.:/é-]{1,24}"
            ) {
                prop_assume!(!title.trim().is_empty());
                prop_assume!(!title.starts_with("./"));
                let original = ArticleReference::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
                document_address(&original, Endpoint::MobileHtml, "app").unwrap();

                let linked = article_reference(original.host(), &title).unwrap();
                prop_assert_eq!(linked.title(), title.as_str());

                let reparsed = ArticleReference::parse(&linked.to_string()).unwrap();
                prop_assert_eq!(reparsed.title(), title.as_str());
            }

            #[test]
            fn encoded_title_is_a_single_segment(title in "\\PC{1,32}") {
                let encoded = encode_title(&title);
                prop_assert!(!encoded.contains('/'));
                prop_assert_eq!(decode_title(&encoded).unwrap(), title);
            }
        }
    }
}
