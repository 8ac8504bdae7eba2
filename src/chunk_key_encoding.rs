use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{store::NodeKey, CoordVec};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Separator {
    #[default]
    #[serde(rename = "/")]
    Slash,
    #[serde(rename = ".")]
    Dot,
}

impl Display for Separator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Separator::Slash => write!(f, "/"),
            Separator::Dot => write!(f, "."),
        }
    }
}

/// Chunk keys of the form `c/1/2/3` (or `c.1.2.3`).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefaultChunkKeyEncoding {
    #[serde(default)]
    separator: Separator,
}

impl DefaultChunkKeyEncoding {
    pub fn new(separator: Separator) -> Self {
        Self { separator }
    }

    fn components(&self, coord: &[u64]) -> CoordVec<String> {
        let mut out = CoordVec::default();
        match self.separator {
            Separator::Slash => {
                out.push("c".to_owned());
                out.extend(coord.iter().map(|n| n.to_string()));
            }
            Separator::Dot => {
                let sep = self.separator.to_string();
                let s = coord
                    .iter()
                    .map(|n| n.to_string())
                    .fold(String::from("c"), |a, b| a + &sep + &b);
                out.push(s);
            }
        }
        out
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "name", content = "configuration", rename_all = "lowercase")]
pub enum ChunkKeyEncoding {
    Default(DefaultChunkKeyEncoding),
}

impl Default for ChunkKeyEncoding {
    fn default() -> Self {
        Self::Default(DefaultChunkKeyEncoding::default())
    }
}

impl ChunkKeyEncoding {
    pub fn encode(&self, coord: &[u64]) -> String {
        match self {
            Self::Default(e) => e.components(coord).join("/"),
        }
    }

    /// Key of the chunk at `coord` within the array node at `node`.
    pub fn chunk_key(&self, node: &NodeKey, coord: &[u64]) -> NodeKey {
        let mut n = node.clone();
        let components = match self {
            Self::Default(e) => e.components(coord),
        };
        for c in components {
            n.push_unchecked(&c);
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_chunk_key_encoding() {
        for s in [
            r#"{"name":"default","configuration":{"separator":"/"}}"#,
            r#"{"name":"default","configuration":{"separator":"."}}"#,
        ] {
            let c: ChunkKeyEncoding = serde_json::from_str(s).unwrap();
            assert_eq!(serde_json::to_string(&c).unwrap(), s);
        }
    }

    #[test]
    fn missing_separator_is_slash() {
        let c: ChunkKeyEncoding =
            serde_json::from_str(r#"{"name":"default","configuration":{}}"#).unwrap();
        assert_eq!(c, ChunkKeyEncoding::default());
    }

    #[test]
    fn encode_keys() {
        assert_eq!(ChunkKeyEncoding::default().encode(&[1, 2, 3]), "c/1/2/3");
        let dot = ChunkKeyEncoding::Default(DefaultChunkKeyEncoding::new(Separator::Dot));
        assert_eq!(dot.encode(&[1, 2, 3]), "c.1.2.3");

        let node: NodeKey = "group/image".parse().unwrap();
        let k = ChunkKeyEncoding::default().chunk_key(&node, &[0, 4]);
        assert_eq!(k.to_string(), "/group/image/c/0/4");
        let k = dot.chunk_key(&node, &[0, 4]);
        assert_eq!(k.to_string(), "/group/image/c.0.4");
    }
}
