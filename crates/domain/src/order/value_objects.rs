//! Value objects for prices and durations.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Money amount represented in minor units (kopecks) to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g., 50000 = 500.00)
    minor_units: i64,
}

impl Money {
    /// Creates a new Money amount from minor units.
    pub fn from_minor_units(minor_units: i64) -> Self {
        Self { minor_units }
    }

    /// Creates a new Money amount from whole major units.
    ///
    /// Returns None if the amount does not fit in minor units.
    pub fn from_major_units(major_units: i64) -> Option<Self> {
        major_units
            .checked_mul(100)
            .map(|minor_units| Self { minor_units })
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { minor_units: 0 }
    }

    /// Returns the amount in minor units.
    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    /// Returns the whole major units, rounded down.
    pub fn major_units(&self) -> i64 {
        self.minor_units.div_euclid(100)
    }

    /// Returns the minor portion (remainder after major units).
    pub fn minor_part(&self) -> i64 {
        self.minor_units.rem_euclid(100)
    }

    /// Adds two amounts, returning None on overflow.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.minor_units
            .checked_add(rhs.minor_units)
            .map(Money::from_minor_units)
    }

    /// Sums amounts, returning None on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), Money::checked_add)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.major_units(), self.minor_part())
    }
}

/// Length of a service or order in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceDuration {
    seconds: i64,
}

impl ServiceDuration {
    /// Creates a duration from seconds.
    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds }
    }

    /// Creates a duration from whole minutes.
    ///
    /// Returns None if the duration does not fit in seconds.
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        minutes.checked_mul(60).map(|seconds| Self { seconds })
    }

    /// Returns zero duration.
    pub fn zero() -> Self {
        Self { seconds: 0 }
    }

    /// Returns the duration in seconds.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Returns the whole minutes, rounded down.
    pub fn minutes(&self) -> i64 {
        self.seconds.div_euclid(60)
    }

    /// Converts into a chrono duration for time arithmetic.
    ///
    /// Returns None if the duration is out of chrono's range.
    pub fn as_chrono(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.seconds)
    }

    /// Adds two durations, returning None on overflow.
    pub fn checked_add(self, rhs: ServiceDuration) -> Option<ServiceDuration> {
        self.seconds
            .checked_add(rhs.seconds)
            .map(ServiceDuration::from_seconds)
    }

    /// Sums durations, returning None on overflow.
    pub fn checked_sum(
        durations: impl IntoIterator<Item = ServiceDuration>,
    ) -> Option<ServiceDuration> {
        durations
            .into_iter()
            .try_fold(ServiceDuration::zero(), ServiceDuration::checked_add)
    }

    /// The instant this long after `start`, or None if it is out of range.
    pub fn after(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.as_chrono()
            .and_then(|delta| start.checked_add_signed(delta))
    }
}

impl Default for ServiceDuration {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_minor_units() {
        let money = Money::from_minor_units(1234);
        assert_eq!(money.minor_units(), 1234);
        assert_eq!(money.major_units(), 12);
        assert_eq!(money.minor_part(), 34);
    }

    #[test]
    fn test_money_from_major_units() {
        let money = Money::from_major_units(500).unwrap();
        assert_eq!(money.minor_units(), 50_000);
        assert_eq!(money.minor_part(), 0);
        assert!(Money::from_major_units(i64::MAX).is_none());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_minor_units(1234).to_string(), "12.34");
        assert_eq!(Money::from_minor_units(100).to_string(), "1.00");
        assert_eq!(Money::from_minor_units(5).to_string(), "0.05");
    }

    #[test]
    fn test_money_sum_floors_major_units() {
        let total = Money::checked_sum(
            [50_000, 20_050, 49].into_iter().map(Money::from_minor_units),
        )
        .unwrap();
        assert_eq!(total.minor_units(), 70_099);
        assert_eq!(total.major_units(), 700);
    }

    #[test]
    fn test_duration_minutes_round_down() {
        assert_eq!(ServiceDuration::from_seconds(899).minutes(), 14);
        assert_eq!(ServiceDuration::from_seconds(900).minutes(), 15);
        assert_eq!(ServiceDuration::from_minutes(10).unwrap().seconds(), 600);
    }

    #[test]
    fn test_duration_sum() {
        let total = ServiceDuration::checked_sum(
            [600, 300].into_iter().map(ServiceDuration::from_seconds),
        )
        .unwrap();
        assert_eq!(total.seconds(), 900);
        assert_eq!(total.as_chrono(), Some(TimeDelta::minutes(15)));
    }

    #[test]
    fn test_money_sum_overflow() {
        let large = Money::from_minor_units(i64::MAX / 2 + 1);
        assert!(large.checked_add(large).is_none());
        assert!(Money::checked_sum([large, Money::zero(), large]).is_none());
        assert_eq!(Money::checked_sum([]), Some(Money::zero()));
    }

    #[test]
    fn test_duration_out_of_range() {
        let huge = ServiceDuration::from_minutes(1_000_000_000_000).unwrap();
        assert!(huge.as_chrono().is_some());
        assert!(huge.after(Utc::now()).is_none());

        let largest = ServiceDuration::from_seconds(i64::MAX);
        assert!(largest.as_chrono().is_none());
        assert!(ServiceDuration::checked_sum([largest, largest]).is_none());
    }

    #[test]
    fn test_duration_after() {
        let start = Utc::now();
        let end = ServiceDuration::from_minutes(15).unwrap().after(start);
        assert_eq!(end, Some(start + TimeDelta::minutes(15)));
    }
}
