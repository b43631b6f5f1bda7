//! TLS provider abstraction.
//!
//! The HTTP client hands a connected [`TcpStream`] to a [`TlsProvider`]
//! and gets back an encrypted [`Connection`], so nothing outside this
//! module depends on a concrete TLS library.

use std::io::{Read, Write};
use std::net::TcpStream;

use portico_types::Result;

/// A bidirectional byte stream the HTTP client can talk over.
pub trait Connection: Read + Write + Send {}

impl<T: Read + Write + Send> Connection for T {}

/// Provides TLS client connections.
pub trait TlsProvider: Send + Sync {
    /// Wrap `stream` in a TLS client session.
    ///
    /// `server_name` is used for SNI and certificate verification.
    fn connect_tls(&self, stream: TcpStream, server_name: &str) -> Result<Box<dyn Connection>>;
}
