pub mod error;
pub mod ids;
pub mod matching;
pub mod policy;
pub mod record;

pub use error::{ModelError, Result};
pub use ids::{EntityAlias, SourceId};
pub use matching::{CanonicalAssignment, PairwiseMatch};
pub use policy::{FieldPolicy, MergePolicy, MergeType};
pub use record::{Fields, SourceRecord, entity_id, is_absent};
