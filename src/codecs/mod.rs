use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ab;
pub mod bb;

use ab::{bytes_codec::BytesCodec, ABCodec};
use bb::{gzip_codec::GzipCodec, BBCodec, BBCodecType};

use crate::{data_type::ReflectedType, variant_from_data};

/// A single entry of the `codecs` metadata list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "name", content = "configuration")]
pub enum CodecType {
    Bytes(BytesCodec),
    Gzip(GzipCodec),
}

variant_from_data!(CodecType, Bytes, BytesCodec);
variant_from_data!(CodecType, Gzip, GzipCodec);

#[derive(Error, Debug)]
pub enum CodecChainConstructionError {
    #[error("More than one array->bytes codec found")]
    MultipleAB,
    #[error("No array->bytes codec found")]
    MissingAB,
    #[error("Illegal codec order: {0} codec found after {1} codec")]
    IllegalOrder(&'static str, &'static str),
}

/// The array->bytes codec followed by any bytes->bytes codecs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CodecType>", into = "Vec<CodecType>")]
pub struct CodecChain {
    ab_codec: BytesCodec,
    bb_codecs: Vec<BBCodecType>,
}

impl Default for CodecChain {
    fn default() -> Self {
        Self::new(BytesCodec::default(), Vec::default())
    }
}

impl CodecChain {
    pub fn new(ab_codec: BytesCodec, bb_codecs: Vec<BBCodecType>) -> Self {
        Self {
            ab_codec,
            bb_codecs,
        }
    }

    pub fn replace_ab_codec(&mut self, codec: BytesCodec) -> BytesCodec {
        std::mem::replace(&mut self.ab_codec, codec)
    }

    pub fn bb_codecs_mut(&mut self) -> &mut Vec<BBCodecType> {
        &mut self.bb_codecs
    }

    pub fn encode<T: ReflectedType>(&self, decoded: &[T]) -> io::Result<Vec<u8>> {
        let bytes = self.ab_codec.encode(decoded)?;
        self.bb_codecs.as_slice().encode(&bytes)
    }

    pub fn decode<T: ReflectedType>(&self, encoded: &[u8], numel: usize) -> io::Result<Vec<T>> {
        let bytes = self.bb_codecs.as_slice().decode(encoded)?;
        self.ab_codec.decode(&bytes, numel)
    }
}

impl TryFrom<Vec<CodecType>> for CodecChain {
    type Error = CodecChainConstructionError;

    fn try_from(value: Vec<CodecType>) -> Result<Self, Self::Error> {
        let mut ab_codec = None;
        let mut bb_codecs = Vec::default();

        for ce in value {
            match ce {
                CodecType::Bytes(c) => {
                    if ab_codec.is_some() {
                        return Err(CodecChainConstructionError::MultipleAB);
                    }
                    if !bb_codecs.is_empty() {
                        return Err(CodecChainConstructionError::IllegalOrder("AB", "BB"));
                    }
                    ab_codec = Some(c);
                }
                CodecType::Gzip(c) => {
                    if ab_codec.is_none() {
                        return Err(CodecChainConstructionError::MissingAB);
                    }
                    bb_codecs.push(c.into())
                }
            }
        }

        let ab_codec = ab_codec.ok_or(CodecChainConstructionError::MissingAB)?;
        Ok(Self::new(ab_codec, bb_codecs))
    }
}

impl From<CodecChain> for Vec<CodecType> {
    fn from(value: CodecChain) -> Self {
        let mut out = vec![CodecType::Bytes(value.ab_codec)];
        out.extend(value.bb_codecs.into_iter().map(|c| match c {
            BBCodecType::Gzip(g) => CodecType::Gzip(g),
        }));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODECS: &str = r#"[{"name":"bytes","configuration":{"endian":"little"}},{"name":"gzip","configuration":{"level":1}}]"#;

    #[test]
    fn roundtrip_chain_metadata() {
        let chain: CodecChain = serde_json::from_str(CODECS).unwrap();
        assert_eq!(
            chain,
            CodecChain::new(BytesCodec::new_little(), vec![GzipCodec::fastest().into()])
        );
        assert_eq!(serde_json::to_string(&chain).unwrap(), CODECS);
    }

    #[test]
    fn reject_bad_chains() {
        let no_ab = r#"[{"name":"gzip","configuration":{"level":1}}]"#;
        assert!(serde_json::from_str::<CodecChain>(no_ab).is_err());
        let two_ab = r#"[{"name":"bytes","configuration":{}},{"name":"bytes","configuration":{}}]"#;
        assert!(serde_json::from_str::<CodecChain>(two_ab).is_err());
        let unknown = r#"[{"name":"bytes","configuration":{}},{"name":"blosc","configuration":{}}]"#;
        assert!(serde_json::from_str::<CodecChain>(unknown).is_err());
    }

    #[test]
    fn chain_roundtrip_values() {
        let chain = CodecChain::new(BytesCodec::new_big(), vec![GzipCodec::best().into()]);
        let values: Vec<u32> = (0..1000).map(|i| i * 31).collect();
        let enc = chain.encode(&values).unwrap();
        assert_eq!(chain.decode::<u32>(&enc, values.len()).unwrap(), values);
    }
}
