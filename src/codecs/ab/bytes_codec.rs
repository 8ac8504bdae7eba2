use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind};

use super::ABCodec;
use crate::data_type::{NBytes, ReflectedType};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Big,
    #[default]
    Little,
}

#[cfg(target_endian = "big")]
pub const NATIVE_ENDIAN: Endian = Endian::Big;
#[cfg(target_endian = "little")]
pub const NATIVE_ENDIAN: Endian = Endian::Little;

/// Serialises elements to bytes in the given endianness.
///
/// The endianness may be omitted for single-byte data types.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BytesCodec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endian: Option<Endian>,
}

impl Default for BytesCodec {
    fn default() -> Self {
        Self {
            endian: Some(Endian::default()),
        }
    }
}

impl BytesCodec {
    pub fn new(endian: Option<Endian>) -> Self {
        Self { endian }
    }

    pub fn new_big() -> Self {
        Self::new(Some(Endian::Big))
    }

    pub fn new_little() -> Self {
        Self::new(Some(Endian::Little))
    }

    pub fn new_native() -> Self {
        Self::new(Some(NATIVE_ENDIAN))
    }

    pub fn new_single_byte() -> Self {
        Self::new(None)
    }

    fn valid_endian<T: ReflectedType>(&self) -> io::Result<Endian> {
        match self.endian {
            Some(e) => Ok(e),
            None if !T::ZARR_TYPE.has_endianness() => Ok(Endian::default()),
            None => Err(io::Error::new(
                ErrorKind::InvalidData,
                "Undefined endianness is only valid with single-byte data types",
            )),
        }
    }
}

impl ABCodec for BytesCodec {
    fn encode<T: ReflectedType>(&self, decoded: &[T]) -> io::Result<Vec<u8>> {
        Ok(T::encode_slice(decoded, self.valid_endian::<T>()?))
    }

    fn decode<T: ReflectedType>(&self, encoded: &[u8], numel: usize) -> io::Result<Vec<T>> {
        let endian = self.valid_endian::<T>()?;
        let expected = numel * T::ZARR_TYPE.nbytes();
        if encoded.len() != expected {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Chunk has {} bytes, expected {expected}",
                    encoded.len()
                ),
            ));
        }
        T::decode_slice(encoded, endian)
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, "Truncated element in chunk"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deser_endian() {
        let s = r#"{"endian": "little"}"#;
        let codec: BytesCodec = serde_json::from_str(s).unwrap();
        assert_eq!(codec, BytesCodec::new_little());
    }

    #[test]
    fn deser_endian_noconfig() {
        let s = r#"{}"#;
        let codec: BytesCodec = serde_json::from_str(s).unwrap();
        assert_eq!(codec, BytesCodec::new_single_byte());
    }

    #[test]
    fn single_byte_without_endian() {
        let c = BytesCodec::new_single_byte();
        assert_eq!(c.encode(&[1u8, 2]).unwrap(), vec![1, 2]);
        assert!(c.encode(&[1u16]).is_err());
    }

    #[test]
    fn decode_checks_length() {
        let c = BytesCodec::new_big();
        assert_eq!(c.decode::<u16>(&[0, 1, 0, 2], 2).unwrap(), vec![1, 2]);
        assert!(c.decode::<u16>(&[0, 1, 0, 2], 3).is_err());
    }
}
