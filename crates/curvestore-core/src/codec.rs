//! Wire codecs and content negotiation.
//!
//! The registry is ordered from most to least preferred. The order drives both
//! the weighted `Accept` header and the choice of request body encoding, while
//! responses are decoded with whichever codec matches the `Content-Type` the
//! server actually returned.
//!
//! | Codec | Media type |
//! |-------|------------|
//! | [`ZstdMsgPackCodec`] | `application/x.msgpack+zstd` |
//! | [`MsgPackCodec`] | `application/x.msgpack` |
//! | [`JsonCodec`] | `application/json` |

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub const ZSTD_MSGPACK_MEDIA_TYPE: &str = "application/x.msgpack+zstd";
pub const MSGPACK_MEDIA_TYPE: &str = "application/x.msgpack";
pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const PROBLEM_JSON_MEDIA_TYPE: &str = "application/problem+json";

/// What a payload is, as far as codec capability goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Query results and write payloads.
    Data,
    /// RFC7807 problem documents.
    Problem,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to encode {media_type}: {message}")]
    Encode {
        media_type: &'static str,
        message: String,
    },
    #[error("failed to decode {media_type}: {message}")]
    Decode {
        media_type: &'static str,
        message: String,
    },
    #[error("response content type '{media_type}' is not supported")]
    UnsupportedMediaType { media_type: String },
    #[error("no registered codec can handle {kind:?} payloads")]
    NoCodec { kind: PayloadKind },
}

/// A serde-backed wire format.
pub trait Codec {
    fn media_type(&self) -> &'static str;

    fn can_handle(&self, kind: PayloadKind) -> bool;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn media_type(&self) -> &'static str {
        JSON_MEDIA_TYPE
    }

    fn can_handle(&self, _kind: PayloadKind) -> bool {
        true
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode {
            media_type: JSON_MEDIA_TYPE,
            message: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            media_type: JSON_MEDIA_TYPE,
            message: e.to_string(),
        })
    }
}

/// MessagePack with named struct fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn media_type(&self) -> &'static str {
        MSGPACK_MEDIA_TYPE
    }

    fn can_handle(&self, kind: PayloadKind) -> bool {
        kind == PayloadKind::Data
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::Encode {
            media_type: MSGPACK_MEDIA_TYPE,
            message: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::Decode {
            media_type: MSGPACK_MEDIA_TYPE,
            message: e.to_string(),
        })
    }
}

/// MessagePack compressed as a single zstd frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZstdMsgPackCodec {
    level: i32,
}

impl Default for ZstdMsgPackCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdMsgPackCodec {
    pub const fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdMsgPackCodec {
    fn media_type(&self) -> &'static str {
        ZSTD_MSGPACK_MEDIA_TYPE
    }

    fn can_handle(&self, kind: PayloadKind) -> bool {
        kind == PayloadKind::Data
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let packed = MsgPackCodec.encode(value).map_err(|e| CodecError::Encode {
            media_type: ZSTD_MSGPACK_MEDIA_TYPE,
            message: e.to_string(),
        })?;
        zstd::encode_all(packed.as_slice(), self.level).map_err(|e| CodecError::Encode {
            media_type: ZSTD_MSGPACK_MEDIA_TYPE,
            message: format!("zstd encoder: {e}"),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let packed = zstd::decode_all(bytes).map_err(|e| CodecError::Decode {
            media_type: ZSTD_MSGPACK_MEDIA_TYPE,
            message: format!("zstd decoder: {e}"),
        })?;
        MsgPackCodec
            .decode(&packed)
            .map_err(|e| CodecError::Decode {
                media_type: ZSTD_MSGPACK_MEDIA_TYPE,
                message: e.to_string(),
            })
    }
}

/// Registered wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCodec {
    ZstdMsgPack(ZstdMsgPackCodec),
    MsgPack(MsgPackCodec),
    Json(JsonCodec),
}

impl Codec for WireCodec {
    fn media_type(&self) -> &'static str {
        match self {
            Self::ZstdMsgPack(codec) => codec.media_type(),
            Self::MsgPack(codec) => codec.media_type(),
            Self::Json(codec) => codec.media_type(),
        }
    }

    fn can_handle(&self, kind: PayloadKind) -> bool {
        match self {
            Self::ZstdMsgPack(codec) => codec.can_handle(kind),
            Self::MsgPack(codec) => codec.can_handle(kind),
            Self::Json(codec) => codec.can_handle(kind),
        }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::ZstdMsgPack(codec) => codec.encode(value),
            Self::MsgPack(codec) => codec.encode(value),
            Self::Json(codec) => codec.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Self::ZstdMsgPack(codec) => codec.decode(bytes),
            Self::MsgPack(codec) => codec.decode(bytes),
            Self::Json(codec) => codec.decode(bytes),
        }
    }
}

/// Ordered codec list, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecRegistry {
    codecs: Vec<WireCodec>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new(vec![
            WireCodec::ZstdMsgPack(ZstdMsgPackCodec::default()),
            WireCodec::MsgPack(MsgPackCodec),
            WireCodec::Json(JsonCodec),
        ])
    }
}

impl CodecRegistry {
    pub fn new(codecs: Vec<WireCodec>) -> Self {
        Self { codecs }
    }

    pub fn json_only() -> Self {
        Self::new(vec![WireCodec::Json(JsonCodec)])
    }

    pub fn codecs(&self) -> &[WireCodec] {
        &self.codecs
    }

    /// Builds the weighted `Accept` header: the first codec gets `q=1` and
    /// every following one a strictly lower weight.
    pub fn accept_header(&self) -> String {
        let count = self.codecs.len();
        self.codecs
            .iter()
            .enumerate()
            .map(|(index, codec)| {
                let weight = (count - index) as f64 / count as f64;
                format!("{}; q={}", codec.media_type(), format_weight(weight))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// First codec able to encode a payload of the given kind.
    pub fn preferred(&self, kind: PayloadKind) -> Result<&WireCodec, CodecError> {
        self.codecs
            .iter()
            .find(|codec| codec.can_handle(kind))
            .ok_or(CodecError::NoCodec { kind })
    }

    /// Codec registered for a response media type (parameters ignored).
    pub fn for_media_type(&self, content_type: &str) -> Result<&WireCodec, CodecError> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        self.codecs
            .iter()
            .find(|codec| codec.media_type() == media_type)
            .ok_or(CodecError::UnsupportedMediaType { media_type })
    }
}

fn format_weight(weight: f64) -> String {
    if weight >= 1.0 {
        return String::from("1");
    }
    let rendered = format!("{weight:.3}");
    rendered.trim_end_matches('0').to_owned()
}
