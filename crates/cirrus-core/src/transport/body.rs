//! Request bodies and the reset contract retries depend on.

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// A body stream the engine can rewind before resending.
pub trait ResettableStream: Read + Send {
    /// Rewind to the position the stream had when it was handed over.
    fn reset(&mut self) -> io::Result<()>;
}

impl<T: AsRef<[u8]> + Send> ResettableStream for Cursor<T> {
    fn reset(&mut self) -> io::Result<()> {
        self.set_position(0);
        Ok(())
    }
}

/// Wraps any seekable reader (e.g. a `File`) and rewinds it to where it
/// started, not to offset zero.
pub struct Seekable<S> {
    inner: S,
    start: u64,
}

impl<S: Read + Seek + Send> Seekable<S> {
    pub fn new(mut inner: S) -> io::Result<Self> {
        let start = inner.stream_position()?;
        Ok(Self { inner, start })
    }
}

impl<S: Read> Read for Seekable<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<S: Read + Seek + Send> ResettableStream for Seekable<S> {
    fn reset(&mut self) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(self.start)).map(|_| ())
    }
}

/// A stream that can be read exactly once (stdin, sockets). Resetting it
/// fails, which the engine turns into a fatal `NonRestartableBody`.
pub struct OneShot<R> {
    inner: R,
    touched: bool,
}

impl<R: Read + Send> OneShot<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            touched: false,
        }
    }
}

impl<R: Read> Read for OneShot<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.touched = true;
        self.inner.read(buf)
    }
}

impl<R: Read + Send> ResettableStream for OneShot<R> {
    fn reset(&mut self) -> io::Result<()> {
        if !self.touched {
            return Ok(());
        }
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "one-shot stream was already consumed",
        ))
    }
}

/// Body of a request, owned by one engine invocation across all attempts.
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Stream(Box<dyn ResettableStream>),
}

impl RequestBody {
    pub fn stream<S: ResettableStream + 'static>(stream: S) -> Self {
        RequestBody::Stream(Box::new(stream))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Stream(_) => false,
        }
    }

    /// Rewind before a retried attempt. In-memory bodies always succeed.
    pub fn reset(&mut self) -> io::Result<()> {
        match self {
            RequestBody::Empty | RequestBody::Bytes(_) => Ok(()),
            RequestBody::Stream(s) => s.reset(),
        }
    }

    /// Read the whole body for sending. Streams are left at their end, so
    /// the next attempt must call [`RequestBody::reset`] first.
    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        match self {
            RequestBody::Empty => Ok(Vec::new()),
            RequestBody::Bytes(b) => Ok(b.clone()),
            RequestBody::Stream(s) => {
                let mut buf = Vec::new();
                s.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Bytes(text.into_bytes())
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Bytes(text.as_bytes().to_vec())
    }
}
