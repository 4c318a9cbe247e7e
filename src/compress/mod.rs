//! Block compression backends.
//!
//! The container codec never talks to a compression library directly. It holds a
//! [`Backend`] and calls [`Compressor::compress`] / [`Compressor::decompress`] on
//! whole in-memory buffers, one entry at a time. Backends are free to process the
//! data in bounded chunks internally.

mod deflate;

use std::str::FromStr;

use crate::error::{Error, Result};

pub use deflate::DeflateCompressor;

/// How hard a backend should try to shrink the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Bypass compression entirely.
    Store,
    Fast,
    #[default]
    Default,
    Maximum,
}

impl CompressionLevel {
    /// Backend effort on the usual 0..=9 scale.
    pub fn effort(self) -> u32 {
        match self {
            CompressionLevel::Store => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Maximum => 9,
        }
    }

    /// Map a `-m0..9` style digit onto a level.
    ///
    /// `0` stores, `1` is fast, `9` is maximum and everything in between is the
    /// default level. Values above 9 are rejected.
    pub fn from_digit(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionLevel::Store),
            1 => Some(CompressionLevel::Fast),
            2..=8 => Some(CompressionLevel::Default),
            9 => Some(CompressionLevel::Maximum),
            _ => None,
        }
    }
}

/// Capability contract every compression backend satisfies.
pub trait Compressor {
    /// Compress a complete buffer.
    ///
    /// An empty input yields an empty output without touching the engine, and
    /// [`CompressionLevel::Store`] returns the input unchanged.
    fn compress(&mut self, input: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// Decompress a complete buffer.
    ///
    /// `expected_size` only pre-sizes the output; decompression always runs until
    /// the compressed stream ends.
    fn decompress(&mut self, input: &[u8], expected_size: usize) -> Result<Vec<u8>>;
}

/// Names of the backends that can be selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Deflate,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "deflate" => Ok(BackendKind::Deflate),
            _ => Err(Error::UnknownBackend(name.to_string())),
        }
    }
}

/// A concrete backend, dispatched statically over the closed set of methods.
#[derive(Debug)]
pub enum Backend {
    Deflate(DeflateCompressor),
}

impl Backend {
    pub fn new(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Deflate => Backend::Deflate(DeflateCompressor::new()),
        }
    }

    /// Select a backend by name, e.g. `"deflate"`.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Deflate(_) => BackendKind::Deflate,
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::new(BackendKind::Deflate)
    }
}

impl Compressor for Backend {
    fn compress(&mut self, input: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        match self {
            Backend::Deflate(inner) => inner.compress(input, level),
        }
    }

    fn decompress(&mut self, input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        match self {
            Backend::Deflate(inner) => inner.decompress(input, expected_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_by_name() {
        assert_eq!(Backend::from_name("deflate").unwrap().kind(), BackendKind::Deflate);
        assert_eq!(Backend::from_name("DEFLATE").unwrap().kind(), BackendKind::Deflate);
    }

    #[test]
    fn unknown_backend_fails() {
        let err = Backend::from_name("gzip").unwrap_err();
        assert!(matches!(err, Error::UnknownBackend(ref name) if name == "gzip"));
    }

    #[test]
    fn level_digits() {
        assert_eq!(CompressionLevel::from_digit(0), Some(CompressionLevel::Store));
        assert_eq!(CompressionLevel::from_digit(1), Some(CompressionLevel::Fast));
        assert_eq!(CompressionLevel::from_digit(5), Some(CompressionLevel::Default));
        assert_eq!(CompressionLevel::from_digit(9), Some(CompressionLevel::Maximum));
        assert_eq!(CompressionLevel::from_digit(10), None);
    }
}
