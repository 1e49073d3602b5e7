use {
    super::*,
    bytes::BytesMut,
    tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError},
};

/// One decoded line: either a well-formed envelope, or a line that failed to
/// parse as JSON and should be dropped without tearing down the session
/// (§4.1: "Unparseable lines from either peer are dropped silently").
#[derive(Debug)]
pub enum Frame {
    Message(Message),
    Malformed(String),
}

/// Frames newline-delimited Stratum JSON. Decodes at most one line per call;
/// lines over `MAX_MESSAGE_SIZE` bytes fail decoding outright rather than
/// being silently dropped, since an oversize line usually indicates a
/// desynced peer rather than an isolated bad message.
pub struct LineCodec {
    lines: LinesCodec,
}

impl LineCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Snafu)]
pub enum FrameError {
    #[snafu(display("frame exceeds maximum size of {MAX_MESSAGE_SIZE} bytes"))]
    TooLarge,
    #[snafu(display("io error: {source}"))]
    Io { source: std::io::Error },
}

impl From<LinesCodecError> for FrameError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => FrameError::TooLarge,
            LinesCodecError::Io(source) => FrameError::Io { source },
        }
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(line) = self.lines.decode(src)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Message>(&line) {
            Ok(message) => Ok(Some(Frame::Message(message))),
            Err(_) => Ok(Some(Frame::Malformed(line))),
        }
    }
}

impl Encoder<&Message> for LineCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = serde_json::to_string(item).expect("Message always serializes");
        self.lines.encode(line, dst)?;
        Ok(())
    }
}
