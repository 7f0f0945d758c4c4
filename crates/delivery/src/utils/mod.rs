//! Id and timestamp helpers shared by the repositories.

use chrono::{DateTime, SecondsFormat, Utc};
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

pub fn new_public_id() -> String {
    CUID.create_id()
}

/// Fixed-width RFC 3339 in UTC so that stored timestamps sort lexically.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}
