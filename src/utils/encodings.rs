use crate::bitstreams::{BinaryReader, BinaryWriterBuilder};
use crate::utils::EncodingType;
use crate::{GraphError, Result};

/// An instantaneous code for the natural numbers.
///
/// `zk` is the shrinking factor of zeta codes and is ignored by the others.
pub trait UniversalCode {
    fn read_next(reader: &mut BinaryReader, zk: Option<u64>) -> Result<u64>;
    fn write_next(writer: &mut BinaryWriterBuilder, x: u64, zk: Option<u64>) -> u64;
    fn to_encoding_type() -> EncodingType;
}

pub struct UnaryCode;

impl UniversalCode for UnaryCode {
    #[inline(always)]
    fn read_next(reader: &mut BinaryReader, _zk: Option<u64>) -> Result<u64> {
        reader.read_unary()
    }

    #[inline(always)]
    fn write_next(writer: &mut BinaryWriterBuilder, x: u64, _zk: Option<u64>) -> u64 {
        writer.push_unary(x)
    }

    #[inline(always)]
    fn to_encoding_type() -> EncodingType {
        EncodingType::UNARY
    }
}

pub struct GammaCode;

impl UniversalCode for GammaCode {
    #[inline(always)]
    fn read_next(reader: &mut BinaryReader, _zk: Option<u64>) -> Result<u64> {
        let start = reader.get_position();
        let msb = reader.read_unary()?;
        if msb >= 64 {
            return Err(GraphError::format(format!("Gamma code at bit {} has a {}-bit prefix", start, msb)));
        }

        match reader.read_int(msb) {
            Ok(low) => Ok(((1 << msb) | low) - 1),
            Err(e) => {
                reader.position(start)?;
                Err(e)
            }
        }
    }

    #[inline(always)]
    fn write_next(writer: &mut BinaryWriterBuilder, x: u64, _zk: Option<u64>) -> u64 {
        assert!(x < u64::MAX);

        let x = x + 1; // Code [0, +inf - 1]
        let msb = (u64::BITS - 1 - x.leading_zeros()) as u64;

        writer.push_unary(msb) + writer.push_bits(x, msb)
    }

    #[inline(always)]
    fn to_encoding_type() -> EncodingType {
        EncodingType::GAMMA
    }
}

pub struct DeltaCode;

impl UniversalCode for DeltaCode {
    #[inline(always)]
    fn read_next(reader: &mut BinaryReader, _zk: Option<u64>) -> Result<u64> {
        let start = reader.get_position();
        let msb = GammaCode::read_next(reader, None)?;
        if msb >= 64 {
            return Err(GraphError::format(format!("Delta code at bit {} has a {}-bit length", start, msb)));
        }

        match reader.read_int(msb) {
            Ok(low) => Ok(((1 << msb) | low) - 1),
            Err(e) => {
                reader.position(start)?;
                Err(e)
            }
        }
    }

    #[inline(always)]
    fn write_next(writer: &mut BinaryWriterBuilder, x: u64, _zk: Option<u64>) -> u64 {
        assert!(x < u64::MAX);

        let x = x + 1; // Code [0, +inf - 1]
        let msb = (u64::BITS - 1 - x.leading_zeros()) as u64;
        GammaCode::write_next(writer, msb, None) + writer.push_bits(x, msb)
    }

    #[inline(always)]
    fn to_encoding_type() -> EncodingType {
        EncodingType::DELTA
    }
}

pub struct ZetaCode;

impl UniversalCode for ZetaCode {
    #[inline(always)]
    fn read_next(reader: &mut BinaryReader, zk: Option<u64>) -> Result<u64> {
        let zk = zk.ok_or_else(|| GraphError::format("Zeta code used without a zetak property"))?;
        if zk == 0 {
            return Err(GraphError::format("zetak must be at least 1"));
        }

        let start = reader.get_position();
        let unary = reader.read_unary()?;
        let width = unary * zk;
        if width + zk > 64 {
            return Err(GraphError::format(format!("Zeta code at bit {} is too long", start)));
        }

        let decoded = read_zeta_tail(reader, width, zk);

        if decoded.is_err() {
            reader.position(start)?;
        }
        decoded
    }

    #[inline(always)]
    fn write_next(writer: &mut BinaryWriterBuilder, x: u64, zk: Option<u64>) -> u64 {
        let zk = zk.unwrap_or(3);
        assert!(x < u64::MAX);
        assert!(zk >= 1);

        let x = x + 1;
        let msb = (u64::BITS - 1 - x.leading_zeros()) as u64;
        let h = msb / zk;
        let unary = writer.push_unary(h);
        let left = 1 << (h * zk);
        unary +
            if x - left < left
                {writer.push_bits(x - left, h * zk + zk - 1)}
            else
                {writer.push_bits(x, h * zk + zk)}
    }

    #[inline(always)]
    fn to_encoding_type() -> EncodingType {
        EncodingType::ZETA
    }
}

#[inline(always)]
fn read_zeta_tail(reader: &mut BinaryReader, width: u64, zk: u64) -> Result<u64> {
    let left = 1u64 << width;
    let m = reader.read_int(width + zk - 1)?;
    if m < left {
        Ok(m + left - 1)
    } else {
        Ok((m << 1) + reader.read_bit()? - 1)
    }
}

impl EncodingType {
    /// Reads the next integer from `reader` with this code.
    #[inline(always)]
    pub fn read_next(&self, reader: &mut BinaryReader, zk: Option<u64>) -> Result<u64> {
        match self {
            EncodingType::UNARY => UnaryCode::read_next(reader, zk),
            EncodingType::GAMMA => GammaCode::read_next(reader, zk),
            EncodingType::DELTA => DeltaCode::read_next(reader, zk),
            EncodingType::ZETA => ZetaCode::read_next(reader, zk),
        }
    }

    /// Writes `x` to `writer` with this code, returning the number of written bits.
    #[inline(always)]
    pub fn write_next(&self, writer: &mut BinaryWriterBuilder, x: u64, zk: Option<u64>) -> u64 {
        match self {
            EncodingType::UNARY => UnaryCode::write_next(writer, x, zk),
            EncodingType::GAMMA => GammaCode::write_next(writer, x, zk),
            EncodingType::DELTA => DeltaCode::write_next(writer, x, zk),
            EncodingType::ZETA => ZetaCode::write_next(writer, x, zk),
        }
    }
}
