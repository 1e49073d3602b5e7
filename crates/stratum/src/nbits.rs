use super::*;

/// The compact target encoding carried in `mining.notify`'s `nbits` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub struct Nbits(CompactTarget);

impl Nbits {
    pub fn to_compact(self) -> CompactTarget {
        self.0
    }
}

impl From<CompactTarget> for Nbits {
    fn from(compact: CompactTarget) -> Self {
        Nbits(compact)
    }
}

impl From<Nbits> for CompactTarget {
    fn from(nbits: Nbits) -> Self {
        nbits.0
    }
}

impl Display for Nbits {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:08x}", self.0.to_consensus())
    }
}

impl FromStr for Nbits {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let mut consensus = [0u8; 4];
        let len = bytes.len().min(4);
        consensus[4 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
        Ok(Nbits(CompactTarget::from_consensus(u32::from_be_bytes(
            consensus,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_hex() {
        let n: Nbits = "1d00ffff".parse().unwrap();
        assert_eq!(n.to_string(), "1d00ffff");
    }

    #[test]
    fn parses_into_compact_target() {
        let n: Nbits = "1c2ac4af".parse().unwrap();
        assert_eq!(CompactTarget::from(n).to_consensus(), 0x1c2ac4af);
    }
}
