//! Operational caps. Everything here bounds what a single tenant can
//! hold in memory or write to its WAL.

use crate::model::Ms;

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 512;

/// Free-text limitation/constraint tags.
pub const MAX_TAG_LEN: usize = 64;
pub const MAX_TAGS_PER_ENTITY: usize = 64;

pub const MAX_SOLDIERS_PER_TENANT: usize = 100_000;
pub const MAX_DUTIES_PER_TENANT: usize = 100_000;
pub const MAX_SOLDIERS_PER_DUTY: u32 = 1_000;

/// 2000-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;
/// A duty window wider than a year is a caller bug.
pub const MAX_SPAN_DURATION_MS: Ms = 366 * 24 * 3_600_000;

pub const MAX_TENANTS: usize = 256;
pub const MAX_TENANT_NAME_LEN: usize = 256;
