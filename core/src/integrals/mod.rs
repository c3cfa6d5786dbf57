pub mod boys;
pub mod cfour;
pub mod packed;

pub use boys::BoysTable;
pub use cfour::{read_one_electron_integrals, DecodeSummary, IntegralFileReader, SectionLabel};
pub use packed::PackedIndex;
