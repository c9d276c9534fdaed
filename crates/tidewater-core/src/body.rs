use std::fmt;
use std::io;

use bytes::Bytes;
use futures_util::stream::{LocalBoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Chunk stream carried by streaming bodies.
pub type BodyStream = LocalBoxStream<'static, Result<Bytes, anyhow::Error>>;

/// HTTP body shared by requests and responses.
///
/// Rendered documents are always buffered (`Once`); streaming bodies only appear when a
/// handler or the runtime hands one over, and they stay `!Send` so they can wrap worker
/// streams on `wasm32`.
pub enum Body {
    Once(Bytes),
    Stream(BodyStream),
}

impl Body {
    pub fn empty() -> Self {
        Self::Once(Bytes::new())
    }

    pub fn from_bytes<B>(bytes: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self::Once(bytes.into())
    }

    pub fn text<S>(text: S) -> Self
    where
        S: Into<String>,
    {
        Self::Once(Bytes::from(text.into()))
    }

    pub fn json<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        serde_json::to_vec(value).map(Self::from_bytes)
    }

    /// Wrap a fallible chunk stream, erasing its error type.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + 'static,
        anyhow::Error: From<E>,
    {
        Self::Stream(stream.map(|chunk| chunk.map_err(anyhow::Error::from)).boxed_local())
    }

    /// Wrap an infallible chunk stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Bytes> + 'static,
    {
        Self::Stream(stream.map(Ok::<Bytes, anyhow::Error>).boxed_local())
    }

    /// Buffered contents, or `None` for streaming bodies.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Once(bytes) => Some(bytes.as_ref()),
            Body::Stream(_) => None,
        }
    }

    /// Buffered contents as UTF-8 text, if the body is buffered and valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        self.as_bytes()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn into_stream(self) -> Option<BodyStream> {
        match self {
            Body::Once(_) => None,
            Body::Stream(stream) => Some(stream),
        }
    }

    /// Drain the body into memory, consuming streaming bodies chunk by chunk.
    pub async fn collect(self) -> Result<Bytes, anyhow::Error> {
        match self {
            Body::Once(bytes) => Ok(bytes),
            Body::Stream(mut stream) => {
                let mut buf = Vec::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    pub fn to_json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        match self {
            Body::Once(bytes) => serde_json::from_slice(bytes.as_ref()),
            Body::Stream(_) => Err(serde_json::Error::io(io::Error::other(
                "streaming body cannot be read as JSON",
            ))),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Once(bytes) => f
                .debug_struct("Body::Once")
                .field("len", &bytes.len())
                .finish(),
            Body::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Once(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::from_bytes(value)
    }
}

impl From<&[u8]> for Body {
    fn from(value: &[u8]) -> Self {
        Body::from_bytes(Bytes::copy_from_slice(value))
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::text(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::text(value)
    }
}
