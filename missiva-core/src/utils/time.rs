use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Istante corrente in UTC.
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Restituisce l'istante corrente in UTC formattato come RFC3339 (es. "2025-11-02T12:34:56Z").
pub fn now_timestamp() -> String {
    format_timestamp(now_utc())
}

/// Formatta un istante come RFC3339. Un `OffsetDateTime` fuori dal range RFC3339
/// (anni < 0 o > 9999) degrada alla rappresentazione di `Display`.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

/// Parse di un timestamp RFC3339.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(raw, &Rfc3339)
}
