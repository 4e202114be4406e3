//! Domain models.

mod verdict;

pub use verdict::{
    parse_verdict, PhotoMetadata, VerdictDetails, VerdictParseError, VerdictResponse,
    VerdictType, MAX_SCORE,
};
