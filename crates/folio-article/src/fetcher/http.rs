//! Minimal HTTP/1.1 GET client for cache misses.
//!
//! Plain HTTP over `std::net::TcpStream`; HTTPS through rustls when the
//! `tls-rustls` feature is enabled.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use folio_types::error::{FolioError, Result};

use super::{ContentType, NetworkClient, ResourceResponse, detect_content_type};
use crate::address::Url;

/// Maximum response body size (8 MB).
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: u8 = 5;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const READ_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = concat!("folio/", env!("CARGO_PKG_VERSION"));

/// HTTP(S) client used by [`super::CachedContentFetcher`] and the lead
/// image fetcher.
pub struct HttpClient {
    #[cfg(feature = "tls-rustls")]
    tls: std::sync::Arc<rustls::ClientConfig>,
}

impl HttpClient {
    /// Build a client. With `tls-rustls`, HTTPS trusts Mozilla's root CA
    /// bundle.
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "tls-rustls")]
            tls: {
                let root_store = rustls::RootCertStore::from_iter(
                    webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
                );
                std::sync::Arc::new(
                    rustls::ClientConfig::builder()
                        .with_root_certificates(root_store)
                        .with_no_client_auth(),
                )
            },
        }
    }

    /// Whether HTTPS URLs can be fetched.
    pub fn supports_https(&self) -> bool {
        cfg!(feature = "tls-rustls")
    }

    /// Perform a GET, following redirects (301/302/303/307/308) up to
    /// [`MAX_REDIRECTS`] hops.
    pub fn get(&self, url: &Url) -> Result<ResourceResponse> {
        let mut current_url = url.clone();
        for _ in 0..=MAX_REDIRECTS {
            let resp = self.do_request(&current_url)?;

            if is_redirect(resp.status_code)
                && let Some(location) = find_header(&resp.headers, "location")
            {
                let location = location.to_string();
                current_url = current_url
                    .resolve(&location)
                    .ok_or_else(|| FolioError::Fetch(format!("bad redirect Location: {location}")))?;
                log::debug!("Redirected to {current_url}");
                continue;
            }

            let content_type = find_header(&resp.headers, "content-type")
                .map(ContentType::from_mime)
                .unwrap_or_else(|| detect_content_type(&current_url));

            return Ok(ResourceResponse {
                url: current_url.to_string(),
                content_type,
                body: resp.body,
                status: resp.status_code,
            });
        }

        Err(FolioError::Fetch("too many redirects".to_string()))
    }

    /// Connect, optionally upgrade to TLS, send GET, read and parse.
    fn do_request(&self, url: &Url) -> Result<HttpResponse> {
        let is_https = match url.scheme.as_str() {
            "http" => false,
            "https" => true,
            scheme => {
                return Err(FolioError::Fetch(format!(
                    "unsupported scheme for HTTP client: {scheme}"
                )));
            },
        };
        let port = url.port.unwrap_or(if is_https { 443 } else { 80 });

        if is_https {
            return self.do_https_request(url, port);
        }

        let mut stream = tcp_connect(&url.host, port)?;
        send_request(&mut stream, url, false)?;
        let raw = read_response(&mut stream)?;
        parse_response(&raw)
    }

    #[cfg(feature = "tls-rustls")]
    fn do_https_request(&self, url: &Url, port: u16) -> Result<HttpResponse> {
        let server_name = rustls_pki_types::ServerName::try_from(url.host.clone())
            .map_err(|e| FolioError::Fetch(format!("invalid server name: {e}")))?;
        let conn = rustls::ClientConnection::new(std::sync::Arc::clone(&self.tls), server_name)
            .map_err(|e| FolioError::Fetch(format!("TLS init: {e}")))?;
        let tcp = tcp_connect(&url.host, port)?;
        let mut stream = rustls::StreamOwned::new(conn, tcp);
        send_request(&mut stream, url, true)?;
        let raw = read_response(&mut stream)?;
        parse_response(&raw)
    }

    #[cfg(not(feature = "tls-rustls"))]
    fn do_https_request(&self, url: &Url, _port: u16) -> Result<HttpResponse> {
        Err(FolioError::Fetch(format!(
            "HTTPS not available (built without tls-rustls): {url}"
        )))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkClient for HttpClient {
    fn get(&self, url: &Url) -> Result<ResourceResponse> {
        HttpClient::get(self, url)
    }
}

// -------------------------------------------------------------------
// Internal types
// -------------------------------------------------------------------

/// A raw parsed HTTP response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    /// Response headers as (lowercased name, value) pairs.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

// -------------------------------------------------------------------
// Internals
// -------------------------------------------------------------------

/// Open a TCP connection with connect and read timeouts.
fn tcp_connect(host: &str, port: u16) -> Result<TcpStream> {
    use std::net::ToSocketAddrs;

    let addr = format!("{host}:{port}")
        .to_socket_addrs()
        .map_err(|e| FolioError::Fetch(format!("DNS resolution failed: {e}")))?
        .next()
        .ok_or_else(|| FolioError::Fetch(format!("no addresses for {host}:{port}")))?;

    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .map_err(|e| FolioError::Fetch(format!("TCP connect failed: {e}")))?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    Ok(stream)
}

/// Send an HTTP/1.1 GET request.
fn send_request(stream: &mut impl Write, url: &Url, is_https: bool) -> Result<()> {
    let default_port: u16 = if is_https { 443 } else { 80 };
    let host_header = match url.port {
        Some(p) if p != default_port => format!("{}:{}", url.host, p),
        _ => url.host.clone(),
    };

    let path = match url.query {
        Some(ref q) => format!("{}?{}", url.path, q),
        None => url.path.clone(),
    };

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host_header}\r\n\
         User-Agent: {USER_AGENT}\r\n\
         Accept: */*\r\n\
         Connection: close\r\n\
         \r\n"
    );

    stream
        .write_all(request.as_bytes())
        .map_err(|e| FolioError::Fetch(format!("send request: {e}")))?;
    stream
        .flush()
        .map_err(|e| FolioError::Fetch(format!("send request: {e}")))
}

/// Read the entire response until EOF or until the read timeout fires.
fn read_response(stream: &mut impl Read) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() + n > MAX_BODY_SIZE + 4096 {
                    return Err(FolioError::Fetch("response too large".to_string()));
                }
                buf.extend_from_slice(&chunk[..n]);
            },
            // Servers that close TLS without close_notify surface as
            // UnexpectedEof once the body is in.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                        | io::ErrorKind::UnexpectedEof
                ) =>
            {
                break;
            },
            Err(e) => {
                return Err(FolioError::Fetch(format!("read response: {e}")));
            },
        }
    }
    Ok(buf)
}

/// Parse raw bytes into status code, headers, and body.
pub fn parse_response(data: &[u8]) -> Result<HttpResponse> {
    let header_end = find_subsequence(data, b"\r\n\r\n").ok_or_else(|| {
        FolioError::Fetch("malformed HTTP response: no header terminator".to_string())
    })?;

    let header_str = std::str::from_utf8(&data[..header_end])
        .map_err(|_| FolioError::Fetch("non-UTF-8 headers".to_string()))?;
    let body_start = header_end + 4;

    let mut lines = header_str.split("\r\n");
    let status_line = lines
        .next()
        .ok_or_else(|| FolioError::Fetch("empty response".to_string()))?;
    let status_code = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    let raw_body = &data[body_start..];
    let body = if find_header(&headers, "transfer-encoding").is_some_and(|v| v.contains("chunked"))
    {
        decode_chunked(raw_body)?
    } else if let Some(cl) = find_header(&headers, "content-length") {
        let len: usize = cl
            .parse()
            .map_err(|_| FolioError::Fetch("bad Content-Length".to_string()))?;
        if len > MAX_BODY_SIZE {
            return Err(FolioError::Fetch(
                "response body exceeds 8 MB limit".to_string(),
            ));
        }
        raw_body[..raw_body.len().min(len)].to_vec()
    } else {
        raw_body.to_vec()
    };

    if body.len() > MAX_BODY_SIZE {
        return Err(FolioError::Fetch(
            "response body exceeds 8 MB limit".to_string(),
        ));
    }

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

/// Parse the status code from `HTTP/1.x NNN reason`.
fn parse_status_line(line: &str) -> Result<u16> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(FolioError::Fetch(format!("bad status line: {line}")));
    }
    parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| FolioError::Fetch(format!("bad status code in: {line}")))
}

/// Case-insensitive header lookup.
fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    let name_lower = name.to_lowercase();
    headers
        .iter()
        .find(|(k, _)| k == &name_lower)
        .map(|(_, v)| v.as_str())
}

/// Decode a chunked transfer-encoded body.
fn decode_chunked(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut pos = 0;

    while let Some(i) = find_subsequence(&data[pos..], b"\r\n") {
        let line_end = pos + i;

        let size_str = std::str::from_utf8(&data[pos..line_end])
            .map_err(|_| FolioError::Fetch("bad chunk size".to_string()))?;
        // Strip optional chunk extensions (after `;`).
        let size_str = size_str.split(';').next().unwrap_or("").trim();

        let chunk_size = usize::from_str_radix(size_str, 16)
            .map_err(|_| FolioError::Fetch("bad chunk size".to_string()))?;
        if chunk_size == 0 {
            break;
        }

        if result.len().saturating_add(chunk_size) > MAX_BODY_SIZE {
            return Err(FolioError::Fetch(
                "chunked body exceeds 8 MB limit".to_string(),
            ));
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start
            .checked_add(chunk_size)
            .ok_or_else(|| FolioError::Fetch("bad chunk size".to_string()))?;
        if chunk_end > data.len() {
            // Partial chunk: take what arrived.
            result.extend_from_slice(&data[chunk_start..]);
            break;
        }

        result.extend_from_slice(&data[chunk_start..chunk_end]);
        pos = chunk_end + 2;
        if pos >= data.len() {
            break;
        }
    }

    Ok(result)
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
