//! Conversion between user-entered schedules and stored instants.
//!
//! Every date and time a user enters is read at the fixed offset
//! [`LOCAL_OFFSET`] (UTC+9), whatever the server locale is. Stored instants
//! are UTC. This is a fixed offset, not a time zone: there is no daylight
//! saving handling and none is needed for UTC+9.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;
use time::{
    Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::{format_description, offset},
};

pub const LOCAL_OFFSET: UtcOffset = offset!(+9);

/// Years a stored instant may fall in. Anything else cannot be written as
/// RFC 3339.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

const STORED_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const NAIVE_ISO_FORMATS: [&[BorrowedFormatItem<'_>]; 3] = [
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
];

time::serde::format_description!(local_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(local_time, Time, "[hour]:[minute]");

/// A date and time on the local (UTC+9) wall clock.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
pub struct LocalSchedule {
    #[serde(with = "local_date")]
    pub date: Date,
    #[serde(with = "local_time")]
    pub time: Time,
}

/// The UTC instant of a schedule falls outside [`SUPPORTED_YEARS`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("Schedule {} {} is out of range", .0.date, .0.time)]
pub struct OutOfRangeError(pub LocalSchedule);

/// Schedule fields as entered in the composer.
///
/// Used both for the shared schedule of a post, where `enabled` is the
/// "scheduled" switch, and for per-platform overrides.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleInput {
    pub enabled: bool,
    #[serde(with = "local_date::option")]
    pub date: Option<Date>,
    #[serde(with = "local_time::option")]
    pub time: Option<Time>,
}

impl LocalSchedule {
    #[must_use]
    pub fn new(date: Date, time: Time) -> Self {
        Self { date, time }
    }

    pub fn to_utc(self) -> Result<UtcDateTime, OutOfRangeError> {
        PrimitiveDateTime::new(self.date, self.time)
            .checked_sub(local_offset())
            .map(PrimitiveDateTime::as_utc)
            .filter(|&instant| is_supported(instant))
            .ok_or(OutOfRangeError(self))
    }

    /// `None` if the local wall clock would leave the representable range.
    #[must_use]
    pub fn from_utc(instant: UtcDateTime) -> Option<Self> {
        instant.checked_add(local_offset()).map(|local| Self {
            date: local.date(),
            time: local.time(),
        })
    }
}

fn local_offset() -> Duration {
    Duration::seconds(i64::from(LOCAL_OFFSET.whole_seconds()))
}

#[must_use]
pub fn is_supported(instant: UtcDateTime) -> bool {
    SUPPORTED_YEARS.contains(&instant.year())
}

impl ScheduleInput {
    #[must_use]
    pub fn at(schedule: LocalSchedule) -> Self {
        Self {
            enabled: true,
            date: Some(schedule.date),
            time: Some(schedule.time),
        }
    }

    /// The schedule, if it is switched on and both fields are filled.
    #[must_use]
    pub fn complete(self) -> Option<LocalSchedule> {
        match self {
            ScheduleInput {
                enabled: true,
                date: Some(date),
                time: Some(time),
            } => Some(LocalSchedule { date, time }),
            _ => None,
        }
    }

    /// Switched on but missing its date or time.
    #[must_use]
    pub fn is_incomplete(self) -> bool {
        self.enabled && self.complete().is_none()
    }
}

/// Picks the instant a record is scheduled for.
///
/// A complete override wins. An override that is off or only partly filled
/// falls back to the shared schedule. `None` means post immediately.
pub fn resolve_schedule(
    shared: ScheduleInput,
    platform_override: Option<ScheduleInput>,
) -> Result<Option<UtcDateTime>, OutOfRangeError> {
    platform_override
        .and_then(ScheduleInput::complete)
        .or_else(|| shared.complete())
        .map(LocalSchedule::to_utc)
        .transpose()
}

/// Renders a stored instant as `YYYY-MM-DD HH:MM` in UTC.
#[must_use]
pub fn format_stored(instant: UtcDateTime) -> String {
    format_primitive(PrimitiveDateTime::new(instant.date(), instant.time()))
}

/// Renders an instant as `YYYY-MM-DD HH:MM` on the local clock.
#[must_use]
pub fn format_local(instant: UtcDateTime) -> String {
    match LocalSchedule::from_utc(instant) {
        Some(local) => format_primitive(PrimitiveDateTime::new(local.date, local.time)),
        None => format_stored(instant),
    }
}

fn format_primitive(date_time: PrimitiveDateTime) -> String {
    // Only fails for years outside the four-digit range the format allows.
    date_time
        .format(STORED_FORMAT)
        .unwrap_or_else(|_| date_time.to_string())
}

/// Parses a stored schedule literal.
///
/// Accepts `YYYY-MM-DD HH:MM`, RFC 3339 with an offset, and ISO 8601
/// without one. Literals without an offset are UTC. Instants outside
/// [`SUPPORTED_YEARS`] are rejected.
#[must_use]
pub fn parse_stored(literal: &str) -> Option<UtcDateTime> {
    let literal = literal.trim();

    let instant = match OffsetDateTime::parse(literal, &Rfc3339) {
        Ok(date_time) => {
            let date_time = date_time.to_offset(UtcOffset::UTC);
            Some(PrimitiveDateTime::new(date_time.date(), date_time.time()).as_utc())
        }
        Err(_) => std::iter::once(STORED_FORMAT)
            .chain(NAIVE_ISO_FORMATS)
            .find_map(|format| PrimitiveDateTime::parse(literal, format).ok())
            .map(PrimitiveDateTime::as_utc),
    };

    instant.filter(|&instant| is_supported(instant))
}

/// Serde support for UTC instants as RFC 3339 strings.
pub mod rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::{
        OffsetDateTime, PrimitiveDateTime, UtcDateTime, UtcOffset,
        format_description::well_known::Rfc3339,
    };

    pub fn serialize<S>(instant: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = PrimitiveDateTime::new(instant.date(), instant.time())
            .assume_utc()
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<UtcDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let literal = String::deserialize(deserializer)?;
        parse(&literal).map_err(D::Error::custom)
    }

    fn parse(literal: &str) -> Result<UtcDateTime, time::error::Parse> {
        let date_time = OffsetDateTime::parse(literal, &Rfc3339)?.to_offset(UtcOffset::UTC);
        Ok(PrimitiveDateTime::new(date_time.date(), date_time.time()).as_utc())
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer, de::Error};
        use time::UtcDateTime;

        #[allow(clippy::ref_option)]
        pub fn serialize<S>(
            instant: &Option<UtcDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match instant {
                Some(instant) => super::serialize(instant, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<UtcDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|literal| super::parse(&literal).map_err(D::Error::custom))
                .transpose()
        }
    }
}
