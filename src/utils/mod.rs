pub mod encodings;

use std::{fmt, str::FromStr};

use serde::Serialize;

/// The instantaneous codes a BVGraph section can be written with.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum EncodingType {
    UNARY,
    GAMMA,
    DELTA,
    ZETA,
}

impl FromStr for EncodingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "UNARY" => Ok(EncodingType::UNARY),
            "GAMMA" => Ok(EncodingType::GAMMA),
            "DELTA" => Ok(EncodingType::DELTA),
            "ZETA" => Ok(EncodingType::ZETA),
            other => Err(format!("Unknown encoding {}", other)),
        }
    }
}

impl fmt::Display for EncodingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodingType::UNARY => "UNARY",
            EncodingType::GAMMA => "GAMMA",
            EncodingType::DELTA => "DELTA",
            EncodingType::ZETA => "ZETA",
        };
        f.write_str(name)
    }
}

/// Maps an integer to a natural number: 0, -1, 1, -2, 2... become 0, 1, 2, 3, 4...
#[inline(always)]
pub fn int2nat(x: i64) -> u64 {
    ((x << 1) ^ (x >> 63)) as u64
}

/// Inverse of [`int2nat`].
#[inline(always)]
pub fn nat2int(x: u64) -> i64 {
    ((x >> 1) as i64) ^ -((x & 1) as i64)
}
