//! Write chunks and text encodings

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;

/// Payload accepted by [`ZitiSocket::write_chunk`](super::ZitiSocket::write_chunk)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Raw bytes, sent as-is
    Bytes(Bytes),
    /// Text, converted with the write's [`Encoding`]
    Text(String),
}

impl Chunk {
    /// Convert to the bytes that go on the wire
    ///
    /// Byte chunks ignore `encoding`. Text that cannot be represented in
    /// `encoding` is rejected with [`Error::InvalidChunk`].
    pub fn into_bytes(self, encoding: Encoding) -> Result<Bytes> {
        let text = match self {
            Chunk::Bytes(bytes) => return Ok(bytes),
            Chunk::Text(text) => text,
        };

        match encoding {
            Encoding::Utf8 => Ok(Bytes::from(text.into_bytes())),
            Encoding::Ascii => {
                if let Some(c) = text.chars().find(|c| !c.is_ascii()) {
                    return Err(Error::InvalidChunk(format!(
                        "character {:?} is not ascii",
                        c
                    )));
                }
                Ok(Bytes::from(text.into_bytes()))
            }
            Encoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        Error::InvalidChunk(format!("character {:?} is outside latin1", c))
                    })
                })
                .collect::<Result<Vec<u8>>>()
                .map(Bytes::from),
            Encoding::Hex => hex::decode(&text)
                .map(Bytes::from)
                .map_err(|e| Error::InvalidChunk(format!("invalid hex text: {}", e))),
            Encoding::Base64 => BASE64
                .decode(&text)
                .map(Bytes::from)
                .map_err(|e| Error::InvalidChunk(format!("invalid base64 text: {}", e))),
        }
    }

    /// Whether the chunk carries no payload
    pub fn is_empty(&self) -> bool {
        match self {
            Chunk::Bytes(bytes) => bytes.is_empty(),
            Chunk::Text(text) => text.is_empty(),
        }
    }
}

impl From<Bytes> for Chunk {
    fn from(bytes: Bytes) -> Self {
        Chunk::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Chunk {
    fn from(bytes: &'static [u8]) -> Self {
        Chunk::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::Text(text)
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::Text(text.to_string())
    }
}

/// Text encoding for [`Chunk::Text`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8
    #[default]
    Utf8,
    /// 7-bit ASCII
    Ascii,
    /// ISO-8859-1, one byte per character
    Latin1,
    /// Hex digits, two per byte
    Hex,
    /// Standard base64
    Base64,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utf8 => write!(f, "utf8"),
            Self::Ascii => write!(f, "ascii"),
            Self::Latin1 => write!(f, "latin1"),
            Self::Hex => write!(f, "hex"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "ascii" => Ok(Self::Ascii),
            "latin1" | "binary" => Ok(Self::Latin1),
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            _ => Err(Error::InvalidArgument(format!("unknown encoding '{}'", s))),
        }
    }
}
