use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{reflected_primitive, DataType, NBytes, ReflectedType};
use crate::codecs::ab::bytes_codec::Endian;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum FloatSize {
    b32,
    b64,
}

impl Display for FloatSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.nbits())
    }
}

impl TryFrom<usize> for FloatSize {
    type Error = &'static str;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            32 => Ok(Self::b32),
            64 => Ok(Self::b64),
            _ => Err("not a valid float size"),
        }
    }
}

impl NBytes for FloatSize {
    fn nbytes(&self) -> usize {
        match self {
            Self::b32 => 4,
            Self::b64 => 8,
        }
    }
}

/// Float fill values may be numbers, or one of the strings
/// `"NaN"`, `"Infinity"`, `"-Infinity"`, or a `0x`-prefixed big-endian hex bit pattern.
fn special_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

fn hex_bits(value: &Value) -> Option<u64> {
    let s = value.as_str()?.strip_prefix("0x")?;
    u64::from_str_radix(s, 16).ok()
}

impl ReflectedType for f32 {
    const ZARR_TYPE: DataType = DataType::Float(FloatSize::b32);

    fn encode_into(self, buf: &mut [u8], endian: Endian) {
        self.to_bits().encode_into(buf, endian)
    }

    fn decode_from(buf: &[u8], endian: Endian) -> Self {
        f32::from_bits(u32::decode_from(buf, endian))
    }

    fn from_fill_value(value: &Value) -> Option<Self> {
        if let Some(bits) = hex_bits(value) {
            return u32::try_from(bits).ok().map(f32::from_bits);
        }
        special_float(value).map(|f| f as f32)
    }
}

reflected_primitive!(DataType::Float(FloatSize::b64), f64, read_f64, write_f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_fill_values() {
        assert!(f32::from_fill_value(&Value::from("NaN")).unwrap().is_nan());
        assert_eq!(
            f32::from_fill_value(&Value::from("-Infinity")).unwrap(),
            f32::NEG_INFINITY
        );
        assert_eq!(f32::from_fill_value(&Value::from(1.5)).unwrap(), 1.5);
        assert_eq!(
            f32::from_fill_value(&Value::from("0x7fc00000"))
                .unwrap()
                .to_bits(),
            0x7fc00000
        );
        assert!(f32::from_fill_value(&Value::from("apples")).is_none());
    }

    #[test]
    fn f32_bytes() {
        let v = [1.0f32, -2.5];
        for e in [Endian::Little, Endian::Big] {
            let b = f32::encode_slice(&v, e);
            assert_eq!(f32::decode_slice(&b, e).unwrap(), v.to_vec());
        }
        assert_eq!(f32::encode_slice(&[1.0], Endian::Big), vec![0x3f, 0x80, 0, 0]);
    }
}
