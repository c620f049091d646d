pub mod math;
pub mod schedule;

pub use math::{compute_emi, split_payment, MAX_TENURE_MONTHS};
pub use schedule::{build_schedule, Schedule, ScheduleItem};
