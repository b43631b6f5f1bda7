//! Networking for Portico.
//!
//! [`HttpClient`] performs blocking HTTP/1.1 GETs with redirect handling.
//! HTTPS is delegated to a [`TlsProvider`]; the rustls-backed provider is
//! available behind the `tls-rustls` feature.

pub mod http;
pub mod tls;
#[cfg(feature = "tls-rustls")]
pub mod tls_rustls;
pub mod url;

pub use http::{HttpClient, HttpResponse, MAX_BODY_SIZE};
pub use tls::{Connection, TlsProvider};
#[cfg(feature = "tls-rustls")]
pub use tls_rustls::RustlsTlsProvider;
pub use url::Url;
