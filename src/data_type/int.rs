use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::codecs::ab::bytes_codec::Endian;

use super::{DataType, NBytes, ReflectedType};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum IntSize {
    b8,
    b16,
    b32,
    b64,
}

impl TryFrom<usize> for IntSize {
    type Error = &'static str;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(Self::b8),
            16 => Ok(Self::b16),
            32 => Ok(Self::b32),
            64 => Ok(Self::b64),
            _ => Err("not a valid integer size"),
        }
    }
}

impl Display for IntSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.nbits())
    }
}

impl NBytes for IntSize {
    fn nbytes(&self) -> usize {
        match self {
            Self::b8 => 1,
            Self::b16 => 2,
            Self::b32 => 4,
            Self::b64 => 8,
        }
    }
}

impl ReflectedType for u8 {
    const ZARR_TYPE: DataType = DataType::UInt(IntSize::b8);

    fn encode_into(self, buf: &mut [u8], _endian: Endian) {
        buf[0] = self;
    }

    fn decode_from(buf: &[u8], _endian: Endian) -> Self {
        buf[0]
    }
}

impl ReflectedType for i8 {
    const ZARR_TYPE: DataType = DataType::Int(IntSize::b8);

    fn encode_into(self, buf: &mut [u8], _endian: Endian) {
        buf[0] = self.to_le_bytes()[0];
    }

    fn decode_from(buf: &[u8], _endian: Endian) -> Self {
        Self::from_le_bytes([buf[0]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_ignores_endian() {
        for e in [Endian::Little, Endian::Big] {
            assert_eq!(i8::encode_slice(&[-1, 2], e), vec![255, 2]);
            assert_eq!(u8::decode_slice(&[7, 9], e).unwrap(), vec![7, 9]);
        }
    }
}
