use super::*;

static DIFFICULTY_1_TARGET: LazyLock<U256> =
    LazyLock::new(|| U256::from_big_endian(&Target::MAX.to_be_bytes()));

/// `difficulty_1_target / target`, the share/network difficulty derived
/// from an `nbits` value (see GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Difficulty(f64);

impl Difficulty {
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl From<f64> for Difficulty {
    fn from(value: f64) -> Self {
        Difficulty(value)
    }
}

impl From<Nbits> for Difficulty {
    fn from(nbits: Nbits) -> Self {
        let target = Target::from(CompactTarget::from(nbits));
        let target = U256::from_big_endian(&target.to_be_bytes());

        if target.is_zero() {
            return Difficulty(0.0);
        }

        // Mainnet-level targets make difficulty_1_target/target exceed u64
        // long before the division is done, so go through U256's decimal
        // `Display` rather than `low_u64()`, which would silently truncate
        // to the low 64 bits of a much larger quotient.
        let numerator: f64 = DIFFICULTY_1_TARGET.to_string().parse().unwrap_or(f64::MAX);
        let denominator: f64 = target.to_string().parse().unwrap_or(f64::MAX);

        Difficulty(numerator / denominator)
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}
