//! Shared identifiers and timestamps
use chrono::{DateTime, TimeZone, Utc};

use crate::error::{EnrollmentError, Result};

/// Caller-supplied course identifier.
pub type CourseId = String;
/// External student identity; the ledger never owns students.
pub type StudentId = String;

/// Keys are built by joining ids with this byte, so ids may not contain it.
pub(crate) const KEY_SEPARATOR: char = '/';
const MAX_ID_LEN: usize = 128;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// Nanoseconds since the epoch, zero when out of the representable range.
    pub fn nanos(&self) -> i64 {
        self.0.timestamp_nanos_opt().unwrap_or_default()
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> std::result::Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _: &mut C,
    ) -> std::result::Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Rejects ids that are empty, oversized, or would break key layout.
pub fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EnrollmentError::validation(format!("{kind} id is empty")));
    }
    if id.len() > MAX_ID_LEN {
        return Err(EnrollmentError::validation(format!(
            "{kind} id exceeds {MAX_ID_LEN} bytes"
        )));
    }
    if id
        .chars()
        .any(|c| c == KEY_SEPARATOR || c.is_whitespace() || c.is_control())
    {
        return Err(EnrollmentError::validation(format!(
            "{kind} id '{id}' contains a reserved character"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(validate_id("course", "cs101").is_ok());
        assert!(validate_id("course", "").is_err());
        assert!(validate_id("course", "cs/101").is_err());
        assert!(validate_id("student", "jane doe").is_err());
        assert!(validate_id("student", &"x".repeat(129)).is_err());
    }
}
