//! Cache-backed content fetching.
//!
//! The rendering surface routes every request under the custom scheme
//! (document and sub-resources) to a [`ContentFetcher`]. The orchestrator
//! only registers the fetcher and issues the top-level document request;
//! cache policy lives here.
//!
//! [`CachedContentFetcher`] is the stock implementation: it maps
//! `app://host/path` onto `https://host/path`, answers from an LRU
//! [`ResourceCache`] when it can, and otherwise goes to a
//! [`NetworkClient`].

pub mod cache;
pub mod http;

use std::sync::{Arc, Mutex};

use folio_types::error::{FolioError, Result};

use crate::address::Url;
use cache::ResourceCache;

/// A request for a resource under the routing scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub url: String,
}

impl ResourceRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// A loaded resource.
#[derive(Debug, Clone)]
pub struct ResourceResponse {
    pub url: String,
    pub content_type: ContentType,
    pub body: Vec<u8>,
    pub status: u16,
}

impl ResourceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Content types served to the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Css,
    JavaScript,
    Json,
    Jpeg,
    Png,
    Gif,
    Svg,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from a MIME type string.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.split(';').next().unwrap_or("").trim();
        match mime {
            "text/html" => ContentType::Html,
            "text/css" => ContentType::Css,
            "application/javascript" | "text/javascript" => ContentType::JavaScript,
            "application/json" => ContentType::Json,
            "image/jpeg" => ContentType::Jpeg,
            "image/png" => ContentType::Png,
            "image/gif" => ContentType::Gif,
            "image/svg+xml" => ContentType::Svg,
            "text/plain" => ContentType::PlainText,
            _ => ContentType::Unknown,
        }
    }

    /// Detect content type from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "html" | "htm" => ContentType::Html,
            "css" => ContentType::Css,
            "js" => ContentType::JavaScript,
            "json" => ContentType::Json,
            "jpg" | "jpeg" => ContentType::Jpeg,
            "png" => ContentType::Png,
            "gif" => ContentType::Gif,
            "svg" => ContentType::Svg,
            "txt" => ContentType::PlainText,
            _ => ContentType::Unknown,
        }
    }
}

/// Guess the content type of a URL from its extension; extensionless
/// endpoint paths are documents.
pub fn detect_content_type(url: &Url) -> ContentType {
    url.last_segment()
        .and_then(|seg| seg.rsplit_once('.'))
        .map(|(_, ext)| ContentType::from_extension(ext))
        .unwrap_or(ContentType::Html)
}

// -----------------------------------------------------------------------
// Boundaries
// -----------------------------------------------------------------------

/// Serves requests for a custom URL scheme on behalf of a rendering
/// surface.
///
/// Called from the surface's loading threads. Every accepted request
/// must resolve to `Ok` or `Err`; nothing is dropped silently.
pub trait ContentFetcher: Send + Sync {
    /// The scheme this fetcher answers (without the trailing `://`).
    fn scheme(&self) -> &str;

    /// Resolve a request, from cache or network.
    fn resolve(&self, request: &ResourceRequest) -> Result<ResourceResponse>;
}

/// Blocking network access used on cache misses.
pub trait NetworkClient: Send + Sync {
    fn get(&self, url: &Url) -> Result<ResourceResponse>;
}

// -----------------------------------------------------------------------
// CachedContentFetcher
// -----------------------------------------------------------------------

/// LRU-cached fetcher that maps the routing scheme onto HTTPS.
pub struct CachedContentFetcher {
    scheme: String,
    cache: Mutex<ResourceCache>,
    network: Arc<dyn NetworkClient>,
}

impl CachedContentFetcher {
    /// `network` may be shared with other consumers, such as the lead
    /// image fetcher.
    pub fn new(scheme: &str, max_cache_bytes: usize, network: Arc<dyn NetworkClient>) -> Self {
        Self {
            scheme: scheme.to_lowercase(),
            cache: Mutex::new(ResourceCache::new(max_cache_bytes)),
            network,
        }
    }

    /// Map a routing-scheme address to the network address it stands for.
    pub fn network_address(&self, url: &Url) -> Result<Url> {
        if !url.scheme.eq_ignore_ascii_case(&self.scheme) {
            return Err(FolioError::Fetch(format!(
                "{url} is not under the {}:// scheme",
                self.scheme
            )));
        }
        if url.host.is_empty() {
            return Err(FolioError::Fetch(format!("{url} has no host")));
        }
        Ok(url.with_scheme("https"))
    }

    /// Number of cached resources.
    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    /// Drop every cached resource.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ResourceCache> {
        // The cache holds plain data; a panic mid-insert leaves it usable.
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ContentFetcher for CachedContentFetcher {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn resolve(&self, request: &ResourceRequest) -> Result<ResourceResponse> {
        let url = Url::parse(&request.url)
            .ok_or_else(|| FolioError::Fetch(format!("invalid URL: {}", request.url)))?;
        let key = url.to_string();

        if let Some(hit) = self.lock_cache().get(&key) {
            log::debug!("Cache hit: {key}");
            return Ok(hit.clone());
        }

        let remote = self.network_address(&url)?;
        log::debug!("Cache miss: {key} -> {remote}");
        let mut response = self.network.get(&remote)?;
        response.url = key.clone();

        if response.is_success() {
            self.lock_cache().insert(key, response.clone());
        } else {
            log::warn!("Fetch of {remote} returned status {}", response.status);
        }
        Ok(response)
    }
}
