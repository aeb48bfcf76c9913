use std::fmt;
use std::ops::Sub;
use std::time::{SystemTime, UNIX_EPOCH};

use rosc::OscTime;

/// Seconds between the NTP era 0 epoch (1900-01-01) and the Unix epoch.
const UNIX_OFFSET: u64 = 2_208_988_800;

/// Fixed-point OSC time tag.
///
/// `seconds` counts whole seconds since 1900-01-01 UTC, `fraction` counts
/// units of 1/2^32 second. The reserved pair `{0, 1}` means "immediately".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeTag {
    pub seconds: u32,
    pub fraction: u32,
}

impl TimeTag {
    /// The reserved "process immediately" tag.
    pub fn immediate() -> Self {
        TimeTag {
            seconds: 0,
            fraction: 1,
        }
    }

    /// The current wall-clock time.
    ///
    /// Panics if the system clock reads before the Unix epoch.
    pub fn now() -> Self {
        let since_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock reads before the Unix epoch");
        let fraction = (u64::from(since_unix.subsec_nanos()) << 32) / 1_000_000_000;
        TimeTag {
            seconds: (since_unix.as_secs() + UNIX_OFFSET) as u32,
            fraction: fraction as u32,
        }
    }

    pub fn from_parts(seconds: u32, fraction: u32) -> Self {
        TimeTag { seconds, fraction }
    }

    /// The current time plus `ms` milliseconds.
    pub fn from_ms(ms: u32) -> Self {
        let mut tag = Self::now();
        tag.add(ms);
        tag
    }

    /// Advances the tag by `ms` milliseconds.
    ///
    /// The sub-second part is converted with 64-bit arithmetic and any
    /// fraction overflow carries into `seconds`, so repeated small
    /// additions land within one fraction unit of a single large one.
    pub fn add(&mut self, ms: u32) {
        self.seconds = self.seconds.wrapping_add(ms / 1000);
        let extra = (u64::from(ms % 1000) << 32) / 1000;
        let sum = u64::from(self.fraction) + extra;
        self.seconds = self.seconds.wrapping_add((sum >> 32) as u32);
        self.fraction = sum as u32;
    }

    /// Signed difference `self - other` in seconds.
    pub fn diff(&self, other: TimeTag) -> f64 {
        let whole = f64::from(self.seconds) - f64::from(other.seconds);
        let frac = f64::from(self.fraction) - f64::from(other.fraction);
        whole + frac / 4_294_967_296.0
    }

    /// Seconds elapsed since this tag was taken. Negative for future tags.
    pub fn diff_now(&self) -> f64 {
        Self::now().diff(*self)
    }

    pub fn is_immediate(&self) -> bool {
        self.seconds == 0 && self.fraction == 1
    }
}

impl Default for TimeTag {
    fn default() -> Self {
        Self::immediate()
    }
}

impl Sub for TimeTag {
    type Output = f64;

    fn sub(self, rhs: TimeTag) -> f64 {
        self.diff(rhs)
    }
}

impl fmt::Display for TimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_immediate() {
            write!(f, "immediate")
        } else {
            write!(f, "{}:{}", self.seconds, self.fraction)
        }
    }
}

impl From<OscTime> for TimeTag {
    fn from(time: OscTime) -> Self {
        TimeTag {
            seconds: time.seconds,
            fraction: time.fractional,
        }
    }
}

impl From<TimeTag> for OscTime {
    fn from(tag: TimeTag) -> Self {
        OscTime {
            seconds: tag.seconds,
            fractional: tag.fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn immediate_is_the_reserved_pair() {
        let tag = TimeTag::immediate();
        check!(tag.seconds == 0);
        check!(tag.fraction == 1);
        check!(tag.is_immediate());
        check!(TimeTag::default() == tag);
    }

    #[test]
    fn add_whole_seconds() {
        let mut tag = TimeTag::from_parts(100, 42);
        tag.add(3000);
        check!(tag == TimeTag::from_parts(103, 42));
    }

    #[test]
    fn add_carries_fraction_overflow_into_seconds() {
        let mut tag = TimeTag::from_parts(10, u32::MAX);
        tag.add(1);
        check!(tag.seconds == 11);
        check!(tag.fraction == 4_294_966);
    }

    #[test]
    fn add_converts_half_a_second_exactly() {
        let mut tag = TimeTag::from_parts(0, 0);
        tag.add(1500);
        check!(tag.seconds == 1);
        check!(tag.fraction == 1 << 31);
    }

    #[test]
    fn repeated_adds_match_one_large_add() {
        let mut stepped = TimeTag::from_parts(500, 0);
        let mut whole = TimeTag::from_parts(500, 0);
        for _ in 0..3 {
            stepped.add(333);
        }
        whole.add(999);
        check!(approx_eq!(f64, stepped.diff(whole), 0.0, epsilon = 1e-9));
    }

    #[test]
    fn diff_is_signed_seconds() {
        let base = TimeTag::from_parts(1000, 0);
        let mut later = base;
        later.add(1500);
        check!(approx_eq!(f64, later.diff(base), 1.5, epsilon = 1e-9));
        check!(approx_eq!(f64, base.diff(later), -1.5, epsilon = 1e-9));
        check!(approx_eq!(f64, later - base, 1.5, epsilon = 1e-9));
    }

    #[test]
    fn now_does_not_go_backwards() {
        let first = TimeTag::now();
        let second = TimeTag::now();
        check!(second.diff(first) >= 0.0);
    }

    #[test]
    fn from_ms_lands_in_the_future() {
        let tag = TimeTag::from_ms(1000);
        let ahead = tag.diff(TimeTag::now());
        check!(ahead > 0.5);
        check!(ahead < 1.5);
    }

    #[test]
    fn converts_to_wire_time() {
        let time = OscTime::from(TimeTag::from_parts(5, 7));
        check!(time.seconds == 5);
        check!(time.fractional == 7);
        check!(TimeTag::from(time) == TimeTag::from_parts(5, 7));
    }
}
