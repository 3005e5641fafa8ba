use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC 3339 UTC timestamp so stored strings sort chronologically
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now() -> String {
    to_db(Utc::now())
}

pub fn parse(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
