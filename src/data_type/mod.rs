use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::codecs::ab::bytes_codec::Endian;

mod float;
pub use float::FloatSize;
mod int;
pub use int::IntSize;

pub trait NBytes {
    /// Number of bytes in the data type
    fn nbytes(&self) -> usize;

    /// Number of bits in the data type
    fn nbits(&self) -> usize {
        self.nbytes() * 8
    }

    /// Whether the data type should have an endianness.
    fn has_endianness(&self) -> bool {
        self.nbytes() > 1
    }
}

/// Element type declared by a stored array.
///
/// Covers the core numeric types an on-disk array may declare;
/// which of them can become an image is decided by [crate::image::ElementKind].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Int(IntSize),
    UInt(IntSize),
    Float(FloatSize),
}

impl DataType {
    pub fn default_fill_value(&self) -> serde_json::Value {
        match self {
            DataType::Bool => serde_json::Value::from(false),
            DataType::Int(_) | DataType::UInt(_) | DataType::Float(_) => {
                serde_json::Value::from(0)
            }
        }
    }
}

impl Serialize for DataType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(de::Error::custom)
    }
}

impl NBytes for DataType {
    fn nbytes(&self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int(s) | Self::UInt(s) => s.nbytes(),
            Self::Float(s) => s.nbytes(),
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nbits = self.nbits();
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int(_) => write!(f, "int{nbits}"),
            Self::UInt(_) => write!(f, "uint{nbits}"),
            Self::Float(_) => write!(f, "float{nbits}"),
        }
    }
}

fn split_str_num(s: &str) -> Result<(&str, Option<usize>), &'static str> {
    if let Some(idx) = s.find(|c: char| c.is_ascii_digit()) {
        let n = s[idx..].parse().map_err(|_| "non-digit after digit")?;
        Ok((&s[0..idx], Some(n)))
    } else {
        Ok((s, None))
    }
}

impl FromStr for DataType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_str_num(s)? {
            ("int", Some(n)) => Ok(Self::Int(n.try_into()?)),
            ("uint", Some(n)) => Ok(Self::UInt(n.try_into()?)),
            ("float", Some(n)) => Ok(Self::Float(n.try_into()?)),
            ("bool", None) => Ok(Self::Bool),
            _ => Err("Unknown data type"),
        }
    }
}

/// Trait implemented by primitive types that can be stored in an array.
///
/// The supertraits are not necessary for this trait, but are used to
/// remove redundant bounds elsewhere when operating generically over
/// data types.
pub trait ReflectedType:
    Send
    + Sync
    + Clone
    + Copy
    + Default
    + serde::de::DeserializeOwned
    + serde::ser::Serialize
    + 'static
    + Sized
    + PartialEq
    + Debug
{
    const ZARR_TYPE: DataType;

    /// Write the bytes of a single value into a buffer of exactly [NBytes::nbytes] bytes.
    fn encode_into(self, buf: &mut [u8], endian: Endian);

    /// Read a single value from a buffer of exactly [NBytes::nbytes] bytes.
    fn decode_from(buf: &[u8], endian: Endian) -> Self;

    /// Interpret a metadata fill value.
    fn from_fill_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    fn encode_slice(values: &[Self], endian: Endian) -> Vec<u8> {
        let n = Self::ZARR_TYPE.nbytes();
        let mut out = vec![0u8; values.len() * n];
        for (v, buf) in values.iter().zip(out.chunks_exact_mut(n)) {
            v.encode_into(buf, endian);
        }
        out
    }

    /// `None` if the byte count is not a whole number of elements.
    fn decode_slice(bytes: &[u8], endian: Endian) -> Option<Vec<Self>> {
        let n = Self::ZARR_TYPE.nbytes();
        if bytes.len() % n != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(n)
                .map(|b| Self::decode_from(b, endian))
                .collect(),
        )
    }
}

macro_rules! reflected_primitive {
    ($d_name:expr, $d_type:ty, $bo_read_fn:ident, $bo_write_fn:ident) => {
        impl ReflectedType for $d_type {
            const ZARR_TYPE: DataType = $d_name;

            fn encode_into(self, buf: &mut [u8], endian: Endian) {
                use byteorder::ByteOrder;
                match endian {
                    Endian::Big => byteorder::BigEndian::$bo_write_fn(buf, self),
                    Endian::Little => byteorder::LittleEndian::$bo_write_fn(buf, self),
                }
            }

            fn decode_from(buf: &[u8], endian: Endian) -> Self {
                use byteorder::ByteOrder;
                match endian {
                    Endian::Big => byteorder::BigEndian::$bo_read_fn(buf),
                    Endian::Little => byteorder::LittleEndian::$bo_read_fn(buf),
                }
            }
        }
    };
}

pub(crate) use reflected_primitive;

impl ReflectedType for bool {
    const ZARR_TYPE: DataType = DataType::Bool;

    fn encode_into(self, buf: &mut [u8], _endian: Endian) {
        buf[0] = u8::from(self);
    }

    fn decode_from(buf: &[u8], _endian: Endian) -> Self {
        buf[0] != 0
    }
}

reflected_primitive!(DataType::UInt(IntSize::b16), u16, read_u16, write_u16);
reflected_primitive!(DataType::UInt(IntSize::b32), u32, read_u32, write_u32);
reflected_primitive!(DataType::UInt(IntSize::b64), u64, read_u64, write_u64);
reflected_primitive!(DataType::Int(IntSize::b16), i16, read_i16, write_i16);
reflected_primitive!(DataType::Int(IntSize::b32), i32, read_i32, write_i32);
reflected_primitive!(DataType::Int(IntSize::b64), i64, read_i64, write_i64);
