use thiserror::Error;

/// adds `From<D>` for an enum with a variant containing D
#[macro_export]
macro_rules! variant_from_data {
    ($enum:ty, $variant:ident, $data_type:ty) => {
        impl std::convert::From<$data_type> for $enum {
            fn from(c: $data_type) -> Self {
                <$enum>::$variant(c)
            }
        }
    };
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Got {other_ndim} dimensions when expecting {ref_ndim}")]
pub struct DimensionMismatch {
    ref_ndim: usize,
    other_ndim: usize,
}

impl DimensionMismatch {
    pub fn check_coords(coord_ndim: usize, array_ndim: usize) -> Result<(), Self> {
        if coord_ndim == array_ndim {
            Ok(())
        } else {
            Err(Self {
                ref_ndim: coord_ndim,
                other_ndim: array_ndim,
            })
        }
    }
}

impl From<DimensionMismatch> for std::io::Error {
    fn from(value: DimensionMismatch) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, value)
    }
}
