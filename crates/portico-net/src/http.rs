//! Minimal blocking HTTP/1.1 GET client.
//!
//! Plain HTTP runs over `std::net::TcpStream`; HTTPS goes through the
//! configured [`TlsProvider`]. Every request sends `Connection: close`
//! and reads to EOF, so there is no connection reuse.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use portico_types::{PorticoError, Result};

use crate::tls::{Connection, TlsProvider};
use crate::url::Url;

/// Maximum response body size (8 MB).
pub const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Slack allowed on the raw read for status line and headers.
const MAX_HEADER_SIZE: usize = 64 * 1024;

/// Headers that must not follow a redirect to another origin.
const CREDENTIAL_HEADERS: &[&str] = &["authorization", "cookie"];

// -------------------------------------------------------------------
// Response
// -------------------------------------------------------------------

/// A complete HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL that produced this response, after redirects.
    pub url: Url,
    pub status: u16,
    /// Reason phrase from the status line (may be empty).
    pub reason: String,
    /// Header (lowercase name, value) pairs in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// -------------------------------------------------------------------
// Client
// -------------------------------------------------------------------

/// Blocking HTTP client with redirect handling.
#[derive(Clone)]
pub struct HttpClient {
    tls: Option<Arc<dyn TlsProvider>>,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_redirects: u8,
    user_agent: String,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            tls: None,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            max_redirects: 5,
            user_agent: format!("Portico/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Enable HTTPS through `provider`.
    pub fn with_tls(mut self, provider: Arc<dyn TlsProvider>) -> Self {
        self.tls = Some(provider);
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: u8) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn supports_https(&self) -> bool {
        self.tls.is_some()
    }

    /// GET `url` with extra request `headers`, following redirects
    /// (301/302/303/307/308) up to the configured limit.
    ///
    /// Non-2xx statuses are returned, not raised. Credential headers are
    /// dropped when a redirect leaves the original origin.
    pub fn get(&self, url: &Url, headers: &[(String, String)]) -> Result<HttpResponse> {
        for (name, value) in headers {
            if name.contains(['\r', '\n', ':']) || value.contains(['\r', '\n']) {
                return Err(PorticoError::Http(format!("invalid request header: {name}")));
            }
        }
        let mut current = url.clone();
        let mut headers = headers.to_vec();

        for _ in 0..=self.max_redirects {
            let raw = self.do_request(&current, &headers)?;

            if is_redirect(raw.status)
                && let Some(location) = find_header(&raw.headers, "location")
            {
                let next = current.resolve(location).ok_or_else(|| {
                    PorticoError::Http(format!("bad redirect Location: {location}"))
                })?;
                log::debug!("{} {} -> {next}", raw.status, current);
                if !next.same_origin(url) {
                    headers.retain(|(name, _)| {
                        !CREDENTIAL_HEADERS.contains(&name.to_ascii_lowercase().as_str())
                    });
                }
                current = next;
                continue;
            }

            return Ok(HttpResponse {
                url: current,
                status: raw.status,
                reason: raw.reason,
                headers: raw.headers,
                body: raw.body,
            });
        }

        Err(PorticoError::Http(format!(
            "too many redirects (limit {})",
            self.max_redirects
        )))
    }

    /// Connect, optionally upgrade to TLS, send GET, read and parse.
    fn do_request(&self, url: &Url, headers: &[(String, String)]) -> Result<RawResponse> {
        if url.scheme != "http" && url.scheme != "https" {
            return Err(PorticoError::Network(format!(
                "unsupported scheme for HTTP client: {}",
                url.scheme
            )));
        }
        let tls = match (&self.tls, url.is_https()) {
            (Some(provider), true) => Some(provider),
            (None, true) => {
                return Err(PorticoError::Network(
                    "TLS not available".to_string(),
                ));
            },
            (_, false) => None,
        };

        let stream = self.tcp_connect(&url.host, url.port_or_default())?;
        let mut conn: Box<dyn Connection> = match tls {
            Some(provider) => provider.connect_tls(stream, &url.host)?,
            None => Box::new(stream),
        };

        log::trace!("GET {url}");
        self.send_request(&mut conn, url, headers)?;
        let raw = read_response(&mut conn)?;
        parse_response(&raw)
    }

    /// Open a TCP connection with connect and read timeouts.
    fn tcp_connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| PorticoError::Network(format!("DNS resolution failed for {host}: {e}")))?
            .next()
            .ok_or_else(|| PorticoError::Network(format!("no addresses for {host}:{port}")))?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| PorticoError::Network(format!("TCP connect to {addr} failed: {e}")))?;
        stream
            .set_read_timeout(Some(self.read_timeout))
            .map_err(|e| PorticoError::Network(format!("set read timeout: {e}")))?;
        Ok(stream)
    }

    fn send_request(
        &self,
        stream: &mut impl Write,
        url: &Url,
        headers: &[(String, String)],
    ) -> Result<()> {
        let mut request = format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             User-Agent: {}\r\n\
             Accept-Encoding: identity\r\n",
            url.request_target(),
            url.host_header(),
            self.user_agent,
        );
        for (name, value) in headers {
            request.push_str(name);
            request.push_str(": ");
            request.push_str(value);
            request.push_str("\r\n");
        }
        request.push_str("Connection: close\r\n\r\n");

        stream
            .write_all(request.as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|e| PorticoError::Network(format!("send request: {e}")))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------
// Internals
// -------------------------------------------------------------------

/// A parsed response before redirect handling.
#[derive(Debug)]
struct RawResponse {
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

/// Read the entire response until EOF.
fn read_response(stream: &mut impl Read) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() + n > MAX_BODY_SIZE + MAX_HEADER_SIZE {
                    return Err(PorticoError::Http(
                        "response body exceeds 8 MB limit".to_string(),
                    ));
                }
                buf.extend_from_slice(&chunk[..n]);
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                if buf.is_empty() {
                    return Err(PorticoError::Network("read timed out".to_string()));
                }
                break;
            },
            // Servers that close without a TLS close_notify.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !buf.is_empty() => break,
            Err(e) => {
                return Err(PorticoError::Network(format!("read response: {e}")));
            },
        }
    }
    Ok(buf)
}

/// Parse raw bytes into status, headers, and decoded body.
fn parse_response(data: &[u8]) -> Result<RawResponse> {
    let header_end = find_subsequence(data, b"\r\n\r\n").ok_or_else(|| {
        PorticoError::Http("malformed HTTP response: no header terminator".to_string())
    })?;

    let header_str = std::str::from_utf8(&data[..header_end])
        .map_err(|_| PorticoError::Http("non-UTF-8 headers".to_string()))?;
    let mut lines = header_str.split("\r\n");

    let status_line = lines
        .next()
        .ok_or_else(|| PorticoError::Http("empty response".to_string()))?;
    let (status, reason) = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let raw_body = &data[header_end + 4..];
    let body = if find_header(&headers, "transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    {
        decode_chunked(raw_body)?
    } else if let Some(cl) = find_header(&headers, "content-length") {
        let len: usize = cl
            .parse()
            .map_err(|_| PorticoError::Http(format!("bad Content-Length: {cl}")))?;
        if len > MAX_BODY_SIZE {
            return Err(PorticoError::Http(
                "response body exceeds 8 MB limit".to_string(),
            ));
        }
        if raw_body.len() < len {
            return Err(PorticoError::Network(format!(
                "response truncated: {} of {len} body bytes",
                raw_body.len()
            )));
        }
        raw_body[..len].to_vec()
    } else {
        raw_body.to_vec()
    };

    if body.len() > MAX_BODY_SIZE {
        return Err(PorticoError::Http(
            "response body exceeds 8 MB limit".to_string(),
        ));
    }

    Ok(RawResponse {
        status,
        reason,
        headers,
        body,
    })
}

/// Parse `HTTP/1.x NNN Reason` into code and reason phrase.
fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(PorticoError::Http(format!("bad status line: {line}")));
    }
    let code = parts
        .next()
        .and_then(|c| c.parse::<u16>().ok())
        .filter(|c| (100..600).contains(c))
        .ok_or_else(|| PorticoError::Http(format!("bad status code in: {line}")))?;
    Ok((code, parts.next().unwrap_or("").trim().to_string()))
}

/// Case-insensitive header lookup over lowercase-named pairs.
fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Decode a chunked transfer-encoded body.
fn decode_chunked(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut pos = 0;

    while let Some(i) = find_subsequence(&data[pos..], b"\r\n") {
        let line_end = pos + i;
        let size_line = std::str::from_utf8(&data[pos..line_end])
            .map_err(|_| PorticoError::Http("bad chunk size".to_string()))?;
        // Chunk extensions follow a `;`.
        let size_str = size_line.split(';').next().unwrap_or("").trim();
        let chunk_size = usize::from_str_radix(size_str, 16)
            .map_err(|_| PorticoError::Http(format!("bad chunk size: {size_str:?}")))?;

        if chunk_size == 0 {
            break;
        }
        if chunk_size > MAX_BODY_SIZE - result.len() {
            return Err(PorticoError::Http(
                "chunked body exceeds 8 MB limit".to_string(),
            ));
        }

        let chunk_start = line_end + 2;
        let chunk_end = chunk_start
            .checked_add(chunk_size)
            .ok_or_else(|| PorticoError::Http(format!("bad chunk size: {size_str:?}")))?;
        if chunk_end > data.len() {
            // Truncated final chunk: keep what arrived.
            result.extend_from_slice(&data[chunk_start..]);
            break;
        }
        result.extend_from_slice(&data[chunk_start..chunk_end]);
        pos = (chunk_end + 2).min(data.len());
    }

    Ok(result)
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// -------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Serve one canned response per entry, returning the raw requests.
    fn serve(responses: Vec<String>) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let mut requests = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                requests.push(read_request(&mut stream));
                stream.write_all(response.as_bytes()).unwrap();
            }
            requests
        });
        (port, handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while find_subsequence(&buf, b"\r\n\r\n").is_none() {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8(buf).unwrap()
    }

    fn ok(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    fn url(port: u16, path: &str) -> Url {
        Url::parse(&format!("http://127.0.0.1:{port}{path}")).unwrap()
    }

    // -- parsing ---------------------------------------------------------

    #[test]
    fn parse_simple_response() {
        let raw = b"HTTP/1.1 200 OK\r\n\
                     Content-Type: text/html\r\n\
                     Content-Length: 13\r\n\
                     \r\n\
                     <html>hi</html>";
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.reason, "OK");
        assert_eq!(find_header(&resp.headers, "Content-Type"), Some("text/html"));
        // Trimmed to Content-Length.
        assert_eq!(resp.body, b"<html>hi</htm");
    }

    #[test]
    fn parse_without_content_length_reads_to_end() {
        let raw = b"HTTP/1.1 404 Not Found\r\n\r\nnot found";
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.reason, "Not Found");
        assert_eq!(resp.body, b"not found");
    }

    #[test]
    fn parse_chunked_response() {
        let raw = b"HTTP/1.1 200 OK\r\n\
                     Transfer-Encoding: chunked\r\n\
                     \r\n\
                     5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\n\r\n";
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.body, b"hello world");
    }

    #[test]
    fn bad_chunk_size_is_an_error() {
        assert!(decode_chunked(b"zz\r\nhello\r\n0\r\n\r\n").is_err());
    }

    #[test]
    fn oversized_chunk_after_data_is_an_error() {
        let err = decode_chunked(b"1\r\na\r\nffffffffffffffff\r\nxyz").unwrap_err();
        assert!(matches!(err, PorticoError::Http(_)));
        let err = decode_chunked(b"1\r\na\r\n800000\r\nxyz").unwrap_err();
        assert!(err.to_string().contains("8 MB"));
    }

    #[test]
    fn short_body_is_a_network_error() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort";
        let err = parse_response(raw).unwrap_err();
        assert!(matches!(err, PorticoError::Network(_)));
        assert!(err.to_string().contains("5 of 10"));
    }

    #[test]
    fn max_body_enforced() {
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_SIZE + 1
        );
        let err = parse_response(header.as_bytes()).unwrap_err();
        assert!(matches!(err, PorticoError::Http(_)));
        assert!(err.to_string().contains("8 MB"));
    }

    #[test]
    fn status_line_validation() {
        assert_eq!(
            parse_status_line("HTTP/1.0 301 Moved Permanently").unwrap(),
            (301, "Moved Permanently".to_string())
        );
        assert_eq!(parse_status_line("HTTP/1.1 204").unwrap(), (204, String::new()));
        assert!(parse_status_line("garbage").is_err());
        assert!(parse_status_line("HTTP/1.1 abc OK").is_err());
        assert!(parse_response(b"no terminator").is_err());
    }

    #[test]
    fn connection_closed_mid_body_is_a_network_error() {
        let (port, server) =
            serve(vec!["HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n<main>par".to_string()]);
        let err = HttpClient::new().get(&url(port, "/app"), &[]).unwrap_err();
        assert!(matches!(err, PorticoError::Network(_)));
        server.join().unwrap();
    }

    #[test]
    fn redirect_codes() {
        for code in [301, 302, 303, 307, 308] {
            assert!(is_redirect(code));
        }
        assert!(!is_redirect(200));
        assert!(!is_redirect(304));
    }

    // -- loopback --------------------------------------------------------

    #[test]
    fn sends_headers_and_returns_body() {
        let (port, server) = serve(vec![ok("<main>hi</main>")]);
        let client = HttpClient::new().with_user_agent("test-agent");
        let headers = vec![("Authorization".to_string(), "token abc:def".to_string())];
        let resp = client.get(&url(port, "/app/orders?x=1"), &headers).unwrap();

        assert_eq!(resp.status, 200);
        assert!(resp.is_success());
        assert_eq!(resp.text(), "<main>hi</main>");
        let requests = server.join().unwrap();
        let req = &requests[0];
        assert!(req.starts_with("GET /app/orders?x=1 HTTP/1.1\r\n"));
        assert!(req.contains(&format!("Host: 127.0.0.1:{port}\r\n")));
        assert!(req.contains("User-Agent: test-agent\r\n"));
        assert!(req.contains("Authorization: token abc:def\r\n"));
        assert!(req.contains("Connection: close\r\n"));
    }

    #[test]
    fn non_success_status_is_returned() {
        let (port, server) =
            serve(vec!["HTTP/1.1 403 Forbidden\r\nContent-Length: 6\r\n\r\ndenied".to_string()]);
        let resp = HttpClient::new().get(&url(port, "/app"), &[]).unwrap();
        assert_eq!(resp.status, 403);
        assert_eq!(resp.reason, "Forbidden");
        assert!(!resp.is_success());
        server.join().unwrap();
    }

    #[test]
    fn follows_same_origin_redirect_keeping_credentials() {
        let (port, server) = serve(vec![
            "HTTP/1.1 302 Found\r\nLocation: /app/home\r\nContent-Length: 0\r\n\r\n".to_string(),
            ok("home"),
        ]);
        let headers = vec![("Cookie".to_string(), "sid=1".to_string())];
        let resp = HttpClient::new().get(&url(port, "/app"), &headers).unwrap();
        assert_eq!(resp.text(), "home");
        assert_eq!(resp.url.path, "/app/home");
        let requests = server.join().unwrap();
        assert!(requests[1].starts_with("GET /app/home "));
        assert!(requests[1].contains("Cookie: sid=1\r\n"));
    }

    #[test]
    fn cross_origin_redirect_drops_credentials() {
        let (other_port, other) = serve(vec![ok("elsewhere")]);
        let (port, first) = serve(vec![format!(
            "HTTP/1.1 301 Moved\r\nLocation: http://127.0.0.1:{other_port}/x\r\n\r\n"
        )]);
        let headers = vec![
            ("Authorization".to_string(), "token k:s".to_string()),
            ("Accept".to_string(), "text/html".to_string()),
        ];
        let resp = HttpClient::new().get(&url(port, "/a"), &headers).unwrap();
        assert_eq!(resp.text(), "elsewhere");
        first.join().unwrap();
        let requests = other.join().unwrap();
        assert!(!requests[0].contains("Authorization"));
        assert!(requests[0].contains("Accept: text/html\r\n"));
    }

    #[test]
    fn redirect_limit_is_enforced() {
        let loop_response =
            "HTTP/1.1 302 Found\r\nLocation: /again\r\nContent-Length: 0\r\n\r\n".to_string();
        let (port, server) = serve(vec![loop_response.clone(), loop_response]);
        let err = HttpClient::new()
            .with_max_redirects(1)
            .get(&url(port, "/start"), &[])
            .unwrap_err();
        assert!(err.to_string().contains("too many redirects"));
        server.join().unwrap();
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn https_without_tls_is_a_network_error() {
        let target = Url::parse(&format!("https://127.0.0.1:{}/", closed_port())).unwrap();
        let err = HttpClient::new().get(&target, &[]).unwrap_err();
        assert!(matches!(err, PorticoError::Network(_)));
        assert!(err.to_string().contains("TLS"));
    }

    #[test]
    fn connection_refused_is_a_network_error() {
        let port = closed_port();
        let err = HttpClient::new()
            .with_timeouts(Duration::from_millis(500), Duration::from_millis(500))
            .get(&url(port, "/"), &[])
            .unwrap_err();
        assert!(matches!(err, PorticoError::Network(_)));
    }

    #[test]
    fn header_injection_is_rejected() {
        let headers = vec![("X-Bad".to_string(), "a\r\nInjected: 1".to_string())];
        let err = HttpClient::new()
            .get(&url(closed_port(), "/"), &headers)
            .unwrap_err();
        assert!(matches!(err, PorticoError::Http(_)));
    }
}
