//! Simulation clock types.
use std::{fmt, ops};

use serde::{Deserialize, Serialize};
use time::Duration;

/// Universal simulation time, counted from an arbitrary scenario
/// origin.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UT(Duration);

impl UT {
    pub const ZERO: UT = UT(Duration::ZERO);

    pub fn new_seconds(sec: f64) -> UT {
        UT(Duration::seconds_f64(sec))
    }

    pub fn as_seconds(self) -> f64 {
        self.0.as_seconds_f64()
    }

    pub fn into_duration(self) -> Duration {
        self.0
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    /// Advance by a (possibly fractional, possibly time-warped) number
    /// of seconds.
    #[must_use]
    pub fn advance(self, sec: f64) -> Self {
        self + Duration::seconds_f64(sec)
    }
}

impl ops::Sub<UT> for UT {
    type Output = Duration;

    fn sub(self, rhs: UT) -> Self::Output {
        self.0 - rhs.0
    }
}

impl ops::Add<Duration> for UT {
    type Output = UT;

    fn add(self, rhs: Duration) -> Self::Output {
        UT(self.0 + rhs)
    }
}

impl ops::Sub<Duration> for UT {
    type Output = UT;

    fn sub(self, rhs: Duration) -> Self::Output {
        UT(self.0 - rhs)
    }
}

impl fmt::Display for UT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UT({}s)", self.0.as_seconds_f64())
    }
}

impl fmt::Debug for UT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Mission elapsed time: simulation time since the clock was started.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MET(Duration);

impl MET {
    pub fn between(start: UT, now: UT) -> Self {
        Self(now - start)
    }

    pub fn is_negative(self) -> bool {
        self.0.is_negative()
    }

    pub fn days(self) -> i64 {
        self.0.whole_days()
    }

    pub fn hours(self) -> u8 {
        (self.0.whole_hours() % 24).unsigned_abs() as u8
    }

    pub fn whole_hours(self) -> i64 {
        self.0.whole_hours()
    }

    pub fn minutes(self) -> u8 {
        (self.0.whole_minutes() % 60).unsigned_abs() as u8
    }

    pub fn seconds(self) -> u8 {
        (self.0.whole_seconds() % 60).unsigned_abs() as u8
    }

    pub fn millis(self) -> u16 {
        (self.0.whole_milliseconds() % 1000).unsigned_abs() as u16
    }

    pub fn as_seconds(self) -> f64 {
        self.0.as_seconds_f64()
    }

    pub fn into_duration(self) -> Duration {
        self.0
    }
}

impl fmt::Display for MET {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        if self.days() != 0 && !f.alternate() {
            write!(
                f,
                "MET({sign}{}:{:02}:{:02}:{:02}.{:>03})",
                self.days().unsigned_abs(),
                self.hours(),
                self.minutes(),
                self.seconds(),
                self.millis()
            )
        } else {
            write!(
                f,
                "MET({sign}{:02}:{:02}:{:02}.{:>03})",
                self.whole_hours().unsigned_abs(),
                self.minutes(),
                self.seconds(),
                self.millis()
            )
        }
    }
}

impl fmt::Debug for MET {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
