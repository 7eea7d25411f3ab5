pub mod binding;
pub mod record;

pub use binding::{
    BindOutcome, BindingMeta, BindingScope, BindingState, MetaPatch, OutputBindingState,
    ResolvedBinding,
};
pub use record::{
    JobStatus, RecordDraft, RoundInput, TrackerRecord, ValidDraft, WriteMode, CSV_HEADERS,
};
