pub mod context;
pub mod dates;
pub mod hospitals;
pub mod merge;
pub mod parse;
pub mod types;

pub use context::ContextDetector;
pub use dates::{resolve_date_columns, DateResolverConfig};
pub use hospitals::{HospitalClassifier, HospitalDirectory};
pub use merge::{apply_overrides, merge_docs, roster_to_docs};
pub use parse::{parse_schedule, parse_schedule_bytes, parse_schedule_file, ParserConfig};
pub use types::{
    DateRange, LogEntry, OverrideMap, ParsedSchedule, Roster, ScheduleDoc, SelectedUser,
    ShiftEntry, ShiftOverride, ShiftRecord, Student,
};
