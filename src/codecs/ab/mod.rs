use std::io;

use crate::data_type::ReflectedType;

pub mod bytes_codec;

/// Converts between a chunk's elements (in C order) and its byte representation.
pub trait ABCodec {
    fn encode<T: ReflectedType>(&self, decoded: &[T]) -> io::Result<Vec<u8>>;

    fn decode<T: ReflectedType>(&self, encoded: &[u8], numel: usize) -> io::Result<Vec<T>>;
}
