use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use thiserror::Error;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;

use crate::codecs::bb::BBCodec;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum GzipLevel {
    None = 0,
    L1 = 1,
    L2 = 2,
    L3 = 3,
    L4 = 4,
    L5 = 5,
    L6 = 6,
    L7 = 7,
    L8 = 8,
    L9 = 9,
}

#[derive(Error, Debug)]
#[error("Invalid GZIP level {0} (must be 0-9)")]
pub struct InvalidGzipLevel(u32);

impl InvalidGzipLevel {
    pub fn level(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for GzipLevel {
    type Error = InvalidGzipLevel;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::L1),
            2 => Ok(Self::L2),
            3 => Ok(Self::L3),
            4 => Ok(Self::L4),
            5 => Ok(Self::L5),
            6 => Ok(Self::L6),
            7 => Ok(Self::L7),
            8 => Ok(Self::L8),
            9 => Ok(Self::L9),
            other => Err(InvalidGzipLevel(other)),
        }
    }
}

impl From<GzipLevel> for u32 {
    fn from(value: GzipLevel) -> Self {
        value as u32
    }
}

// metadata stores the level as a bare integer
impl Serialize for GzipLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(*self as u32)
    }
}

impl<'de> Deserialize<'de> for GzipLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = u32::deserialize(deserializer)?;
        n.try_into().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Debug)]
pub struct GzipCodec {
    pub level: GzipLevel,
}

impl GzipCodec {
    pub fn from_level(level: u32) -> Result<Self, InvalidGzipLevel> {
        Ok(Self {
            level: level.try_into()?,
        })
    }

    pub fn best() -> Self {
        Self {
            level: GzipLevel::L9,
        }
    }

    pub fn fastest() -> Self {
        Self {
            level: GzipLevel::L1,
        }
    }

    pub fn none() -> Self {
        Self {
            level: GzipLevel::None,
        }
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: GzipLevel::L6,
        }
    }
}

impl BBCodec for GzipCodec {
    fn encode(&self, decoded: &[u8]) -> io::Result<Vec<u8>> {
        let mut enc = GzEncoder::new(Vec::new(), GzCompression::new(self.level.into()));
        enc.write_all(decoded)?;
        enc.finish()
    }

    fn decode(&self, encoded: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        GzDecoder::new(encoded).read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_every_level() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 7) as u8).collect();
        for lvl in 0..=9 {
            let c = GzipCodec::from_level(lvl).unwrap();
            let enc = c.encode(&data).unwrap();
            assert_eq!(c.decode(&enc).unwrap(), data, "level {lvl}");
        }
    }

    #[test]
    fn compresses() {
        let data = vec![0u8; 10_000];
        assert!(GzipCodec::best().encode(&data).unwrap().len() < data.len() / 10);
    }

    #[test]
    fn invalid_level() {
        let e = GzipCodec::from_level(10).unwrap_err();
        assert_eq!(e.level(), 10);
        assert!(serde_json::from_str::<GzipCodec>(r#"{"level": 12}"#).is_err());
    }

    #[test]
    fn serde_level() {
        let c: GzipCodec = serde_json::from_str(r#"{"level": 1}"#).unwrap();
        assert_eq!(c, GzipCodec::fastest());
        assert_eq!(serde_json::to_string(&c).unwrap(), r#"{"level":1}"#);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(GzipCodec::default().decode(b"not gzip").is_err());
    }
}
