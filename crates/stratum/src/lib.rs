use {
    bitcoin::{CompactTarget, Target},
    derive_more::Display,
    primitive_types::U256,
    serde::{
        Deserialize, Serialize, Serializer,
        de::{self, Deserializer},
    },
    serde_json::{Map, Value},
    serde_with::{DeserializeFromStr, SerializeDisplay},
    snafu::Snafu,
    std::{
        fmt::{self, Display, Formatter},
        str::FromStr,
        sync::LazyLock,
    },
};

pub use {
    codec::{Frame, FrameError, LineCodec},
    difficulty::Difficulty,
    error::{JsonRpcError, StratumError},
    extranonce::Extranonce,
    message::{Id, Message},
    nbits::Nbits,
};

mod codec;
mod difficulty;
mod error;
mod extranonce;
mod message;
mod nbits;

/// Maximum accepted line length for a single Stratum frame, per the wire
/// codec contract (oversize frames fail with `protocol/frame-too-large`).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
