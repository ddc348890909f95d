pub mod assignment_diff;
pub mod batch;
pub mod evaluation;
pub mod keys;
pub mod merge;
pub mod positional;
pub mod schedule_entry;
pub mod snapshot;
pub mod validation;
pub mod working_schedule;
