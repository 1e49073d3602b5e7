use super::*;

/// A hex-encoded nonce extension (`extranonce1` or `extranonce2`). Stored as
/// raw bytes; rendered as uppercase hex on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, SerializeDisplay, DeserializeFromStr)]
pub struct Extranonce(Vec<u8>);

impl Extranonce {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in hex characters, i.e. twice the byte length.
    pub fn hex_len(&self) -> usize {
        self.0.len() * 2
    }

    pub fn byte_len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self ∥ other`, used to append a client's assigned prefix to the
    /// upstream `extranonce1`.
    pub fn concat(&self, other: &Extranonce) -> Extranonce {
        let mut bytes = Vec::with_capacity(self.0.len() + other.0.len());
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(&other.0);
        Extranonce(bytes)
    }

    pub fn starts_with(&self, prefix: &Extranonce) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl Display for Extranonce {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

impl FromStr for Extranonce {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Extranonce(hex::decode(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_uppercase() {
        let e: Extranonce = "deadbeef".parse().unwrap();
        assert_eq!(e.to_string(), "DEADBEEF");
        assert_eq!(e.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn hex_len_is_double_byte_len() {
        let e = Extranonce::from_bytes(&[1, 2, 3]);
        assert_eq!(e.byte_len(), 3);
        assert_eq!(e.hex_len(), 6);
    }

    #[test]
    fn concat_appends_bytes() {
        let e1: Extranonce = "deadbeef".parse().unwrap();
        let prefix: Extranonce = "00".parse().unwrap();
        assert_eq!(e1.concat(&prefix).to_string(), "DEADBEEF00");
    }

    #[test]
    fn starts_with_checks_prefix() {
        let e: Extranonce = "00a1b2c3".parse().unwrap();
        let prefix: Extranonce = "00".parse().unwrap();
        assert!(e.starts_with(&prefix));

        let other: Extranonce = "01".parse().unwrap();
        assert!(!e.starts_with(&other));
    }

    #[test]
    fn roundtrip_through_serde() {
        let e: Extranonce = "AABBCC".parse().unwrap();
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, "\"AABBCC\"");
        let back: Extranonce = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
