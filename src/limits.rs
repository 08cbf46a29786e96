use crate::model::Amount;

pub const MAX_RESOURCES: usize = 10_000;
pub const MAX_PERIODS_PER_RESOURCE: usize = 50_000;
/// Resources touched by one bulk hold sync.
pub const MAX_BATCH_SIZE: usize = 500;
/// Longest booking, hold, or maintenance range.
pub const MAX_RANGE_DAYS: i64 = 366;
pub const MAX_TIMELINE_WINDOW_DAYS: i64 = 2 * 366;
pub const MAX_TEXT_LEN: usize = 1024;
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2200;
pub const MAX_AMOUNT: Amount = 1_000_000_000_000;
