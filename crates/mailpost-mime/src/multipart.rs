//! Multipart container writer.

use crate::header::HeaderList;
use rand::RngCore;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Random bytes per boundary, hex encoded to twice as many characters.
const BOUNDARY_BYTES: usize = 30;

/// Generates a fresh boundary from the thread-local CSPRNG.
#[must_use]
pub fn generate_boundary() -> String {
    let mut bytes = [0u8; BOUNDARY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(BOUNDARY_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Writes the parts of one multipart container.
///
/// Each part is introduced by its delimiter line and header block; the part
/// body is written by the caller into the writer returned from
/// [`MultipartWriter::create_part`]. [`MultipartWriter::close`] writes the
/// closing delimiter.
#[derive(Debug)]
pub struct MultipartWriter<W> {
    inner: W,
    boundary: String,
    parts: usize,
}

impl<W: Write> MultipartWriter<W> {
    /// Creates a writer with a random boundary.
    pub fn new(inner: W) -> Self {
        Self::with_boundary(inner, generate_boundary())
    }

    /// Creates a writer with a fixed boundary.
    pub fn with_boundary(inner: W, boundary: impl Into<String>) -> Self {
        Self {
            inner,
            boundary: boundary.into(),
            parts: 0,
        }
    }

    /// Returns the boundary.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Starts a new part and returns the writer for its body.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn create_part(&mut self, headers: &HeaderList) -> io::Result<&mut W> {
        if self.parts > 0 {
            self.inner.write_all(b"\r\n")?;
        }
        write!(self.inner, "--{}\r\n", self.boundary)?;
        headers.write_to(&mut self.inner, "")?;
        self.parts += 1;
        Ok(&mut self.inner)
    }

    /// Writes the closing delimiter and returns the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn close(mut self) -> io::Result<W> {
        if self.parts > 0 {
            self.inner.write_all(b"\r\n")?;
        }
        write!(self.inner, "--{}--\r\n", self.boundary)?;
        Ok(self.inner)
    }
}
