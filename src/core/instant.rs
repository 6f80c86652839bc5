use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Clock representation an instant was captured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstantKind {
    Local,
    Utc,
    /// Treated as already being in the display's local representation.
    Unspecified,
}

/// Wall-clock value tagged with the representation it was captured in.
///
/// Settings and persisted chart ranges arrive in this form; the core only ever
/// stores the normalized UTC instant produced by [`normalize_instant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedInstant {
    pub value: NaiveDateTime,
    pub kind: InstantKind,
}

impl TaggedInstant {
    #[must_use]
    pub fn utc(time: DateTime<Utc>) -> Self {
        Self {
            value: time.naive_utc(),
            kind: InstantKind::Utc,
        }
    }

    #[must_use]
    pub fn local(value: NaiveDateTime) -> Self {
        Self {
            value,
            kind: InstantKind::Local,
        }
    }

    #[must_use]
    pub fn unspecified(value: NaiveDateTime) -> Self {
        Self {
            value,
            kind: InstantKind::Unspecified,
        }
    }
}

/// Normalizes a tagged instant into UTC storage.
///
/// `Local` and `Unspecified` values are read in `display_offset`; `Utc` values
/// are taken as-is. This is the only place instant kinds are interpreted, so no
/// value is ever converted twice.
#[must_use]
pub fn normalize_instant(instant: TaggedInstant, display_offset: FixedOffset) -> DateTime<Utc> {
    match instant.kind {
        InstantKind::Utc => Utc.from_utc_datetime(&instant.value),
        InstantKind::Local | InstantKind::Unspecified => {
            let offset = TimeDelta::seconds(i64::from(display_offset.local_minus_utc()));
            Utc.from_utc_datetime(&(instant.value - offset))
        }
    }
}

/// Projects a stored UTC instant into the display's local representation.
#[must_use]
pub fn to_display_time(instant: DateTime<Utc>, display_offset: FixedOffset) -> DateTime<FixedOffset> {
    instant.with_timezone(&display_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid naive time")
    }

    fn plus_two() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).expect("valid offset")
    }

    #[test]
    fn local_and_unspecified_are_read_in_display_offset() {
        let local = normalize_instant(TaggedInstant::local(naive(12)), plus_two());
        let unspecified = normalize_instant(TaggedInstant::unspecified(naive(12)), plus_two());
        assert_eq!(local, Utc.from_utc_datetime(&naive(10)));
        assert_eq!(unspecified, local);
    }

    #[test]
    fn utc_instants_are_not_shifted() {
        let utc = Utc.from_utc_datetime(&naive(12));
        assert_eq!(normalize_instant(TaggedInstant::utc(utc), plus_two()), utc);
        assert_eq!(
            to_display_time(utc, plus_two()).naive_local(),
            naive(14),
        );
    }
}
