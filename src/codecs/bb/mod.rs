use std::io;

use serde::{Deserialize, Serialize};

use crate::variant_from_data;

pub mod gzip_codec;

/// Common interface for compressors.
pub trait BBCodec {
    fn decode(&self, encoded: &[u8]) -> io::Result<Vec<u8>>;

    fn encode(&self, decoded: &[u8]) -> io::Result<Vec<u8>>;
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "lowercase", tag = "name", content = "configuration")]
pub enum BBCodecType {
    Gzip(gzip_codec::GzipCodec),
}

impl BBCodec for BBCodecType {
    fn encode(&self, decoded: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip(c) => c.encode(decoded),
        }
    }

    fn decode(&self, encoded: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip(c) => c.decode(encoded),
        }
    }
}

/// Encoders run first to last; decoders last to first.
impl BBCodec for [BBCodecType] {
    fn encode(&self, decoded: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = decoded.to_vec();
        for c in self.iter() {
            out = c.encode(&out)?;
        }
        Ok(out)
    }

    fn decode(&self, encoded: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = encoded.to_vec();
        for c in self.iter().rev() {
            out = c.decode(&out)?;
        }
        Ok(out)
    }
}

variant_from_data!(BBCodecType, Gzip, gzip_codec::GzipCodec);
