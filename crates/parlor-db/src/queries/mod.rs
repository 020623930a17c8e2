mod members;
mod messages;
mod rooms;
pub(crate) mod users;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use std::str::FromStr;
use uuid::Uuid;

use parlor_types::models::UserSummary;

/// Timestamps are stored as fixed-width RFC 3339 text so lexical order in
/// SQL matches chronological order.
pub(crate) fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    stamp(Utc::now())
}

pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Parses a text column into one of the lowercase enums (`role`, `message_type`).
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Reads an embedded user from a LEFT JOIN: `id, username, avatar_url`
/// starting at `idx`. A NULL id means the join found nothing.
pub(crate) fn user_summary_cols(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<UserSummary>> {
    let Some(id) = opt_uuid_col(row, idx)? else {
        return Ok(None);
    };
    Ok(Some(UserSummary {
        id,
        username: row.get(idx + 1)?,
        avatar_url: row.get(idx + 2)?,
        email: None,
    }))
}

/// Numbered placeholder list for `IN (...)` clauses.
pub(crate) fn placeholders(count: usize) -> String {
    (1..=count).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stamps_sort_lexically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 9, 59, 59).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(stamp(earlier) < stamp(later));
        assert_eq!(stamp(earlier), "2024-01-01T09:59:59.000000Z");
    }

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(3), "?1, ?2, ?3");
    }
}
