//! Binary file formats
//!
//! One module per artifact. Writers stream records and back-patch their
//! count headers; readers and `verify` functions exist for every format so
//! outputs can be checked without a downstream consumer.

pub mod fingerprint;
pub mod graph;
pub mod names;
pub mod range_table;
pub mod raw_names;
pub mod restrictions;

pub use fingerprint::{FingerPrint, FINGERPRINT_SIZE};
pub use graph::{GraphFile, GraphWriter, PackedEdge};
pub use names::NamesFile;
pub use range_table::RangeTable;
pub use raw_names::RawNamesFile;
pub use restrictions::{ResolvedRestriction, RestrictionsFile};
