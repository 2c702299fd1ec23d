//! Report bucketing and period comparison.
//!
//! Every dashboard chart goes through [`aggregate`]: the caller turns sales
//! or movements into [`AggregateInput`] rows and picks a bucketing and a
//! dimension. Buckets follow calendar boundaries in the shop's local time.

use std::collections::BTreeMap;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDateTime, TimeZone, Timelike, Utc,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::DateRange;

/// Label used when a row has no value for the requested dimension
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// Time granularity of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Bucketing {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Secondary grouping of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    #[default]
    None,
    Category,
    Staff,
    PaymentMethod,
}

/// What a report sums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportMetric {
    /// Sold quantity x unit price
    #[default]
    Revenue,
    /// Sold quantity
    UnitsSold,
    /// Signed stock movement quantity across all streams
    StockMovement,
}

/// One row fed to the aggregator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateInput {
    pub occurred_at: DateTime<Utc>,
    pub value: Decimal,
    pub category: Option<String>,
    pub staff: Option<String>,
    pub payment_method: Option<String>,
}

impl AggregateInput {
    pub fn new(occurred_at: DateTime<Utc>, value: Decimal) -> Self {
        Self {
            occurred_at,
            value,
            category: None,
            staff: None,
            payment_method: None,
        }
    }

    fn dimension_value(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::None => None,
            Dimension::Category => self.category.as_deref(),
            Dimension::Staff => self.staff.as_deref(),
            Dimension::PaymentMethod => self.payment_method.as_deref(),
        }
    }
}

/// One aggregated report row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportBucket {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub sum: Decimal,
    pub count: u64,
}

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window covering whole local calendar days from `range.start` through
    /// `range.end`. Returns `None` for an inverted range.
    pub fn from_dates(range: &DateRange, offset: FixedOffset) -> Option<Self> {
        let start = offset
            .from_local_datetime(&range.start.and_hms_opt(0, 0, 0)?)
            .single()?
            .with_timezone(&Utc);
        let end = offset
            .from_local_datetime(&range.end.succ_opt()?.and_hms_opt(0, 0, 0)?)
            .single()?
            .with_timezone(&Utc);

        (end > start).then_some(Self { start, end })
    }

    /// Equal-length window ending exactly where this one starts.
    /// `None` when its start falls outside the representable time range.
    pub fn previous(&self) -> Option<Self> {
        let length = self.end.signed_duration_since(self.start);
        Some(Self {
            start: self.start.checked_sub_signed(length)?,
            end: self.start,
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Start of the local calendar bucket containing `local`
pub fn bucket_start(local: NaiveDateTime, bucketing: Bucketing) -> NaiveDateTime {
    let midnight = local.date().and_time(Default::default());
    match bucketing {
        Bucketing::Hourly => {
            local
                - Duration::seconds(i64::from(local.minute() * 60 + local.second()))
                - Duration::nanoseconds(i64::from(local.nanosecond()))
        }
        Bucketing::Daily => midnight,
        Bucketing::Weekly => {
            midnight - Duration::days(i64::from(local.weekday().num_days_from_monday()))
        }
        Bucketing::Monthly => midnight - Duration::days(i64::from(local.day0())),
    }
}

/// Start of the bucket following the one starting at `start`
pub fn next_bucket(start: NaiveDateTime, bucketing: Bucketing) -> Option<NaiveDateTime> {
    match bucketing {
        Bucketing::Hourly => Some(start + Duration::hours(1)),
        Bucketing::Daily => Some(start + Duration::days(1)),
        Bucketing::Weekly => Some(start + Duration::days(7)),
        Bucketing::Monthly => start.checked_add_months(Months::new(1)),
    }
}

pub fn bucket_label(start: NaiveDateTime, bucketing: Bucketing) -> String {
    match bucketing {
        Bucketing::Hourly => start.format("%Y-%m-%d %H:00").to_string(),
        Bucketing::Daily | Bucketing::Weekly => start.format("%Y-%m-%d").to_string(),
        Bucketing::Monthly => start.format("%Y-%m").to_string(),
    }
}

/// Bucket and group the inputs.
///
/// Rows outside `window` (when given) are ignored. Without a dimension and
/// with a window, every bucket in the window is emitted, empty ones with
/// zero sum and count. With a dimension only non-empty groups appear.
/// Output is ordered by bucket start, then group label.
pub fn aggregate(
    inputs: &[AggregateInput],
    bucketing: Bucketing,
    dimension: Dimension,
    offset: FixedOffset,
    window: Option<&ReportWindow>,
) -> Vec<ReportBucket> {
    let mut groups: BTreeMap<(NaiveDateTime, Option<String>), (Decimal, u64)> = BTreeMap::new();

    for input in inputs {
        if window.map(|w| !w.contains(input.occurred_at)).unwrap_or(false) {
            continue;
        }

        let local = input.occurred_at.with_timezone(&offset).naive_local();
        let group = match dimension {
            Dimension::None => None,
            _ => Some(
                input
                    .dimension_value(dimension)
                    .unwrap_or(UNASSIGNED_LABEL)
                    .to_string(),
            ),
        };

        let slot = groups
            .entry((bucket_start(local, bucketing), group))
            .or_insert((Decimal::ZERO, 0));
        slot.0 += input.value;
        slot.1 += 1;
    }

    if let (Dimension::None, Some(window)) = (dimension, window) {
        let end = window.end.with_timezone(&offset).naive_local();
        let mut cursor = Some(bucket_start(
            window.start.with_timezone(&offset).naive_local(),
            bucketing,
        ));

        while let Some(start) = cursor.filter(|c| *c < end) {
            groups.entry((start, None)).or_insert((Decimal::ZERO, 0));
            cursor = next_bucket(start, bucketing);
        }
    }

    groups
        .into_iter()
        .map(|((start, group), (sum, count))| ReportBucket {
            label: bucket_label(start, bucketing),
            group,
            sum,
            count,
        })
        .collect()
}

/// Sum of input values inside a window
pub fn window_total(inputs: &[AggregateInput], window: &ReportWindow) -> Decimal {
    inputs
        .iter()
        .filter(|i| window.contains(i.occurred_at))
        .map(|i| i.value)
        .sum()
}

/// Percentage change from `previous` to `current`, rounded to 2 places.
///
/// Never divides by zero: both zero is 0%, a zero previous with a non-zero
/// current is +100%.
pub fn percent_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        if current.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE_HUNDRED
        }
    } else {
        ((current - previous) / previous.abs() * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// A metric for the current window against the one before it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PeriodComparison {
    pub current: Decimal,
    pub previous: Decimal,
    pub change_percent: Decimal,
}

impl PeriodComparison {
    pub fn new(current: Decimal, previous: Decimal) -> Self {
        Self {
            current,
            previous,
            change_percent: percent_change(current, previous),
        }
    }

    /// Compare the window against the equal-length window before it
    pub fn over(inputs: &[AggregateInput], window: &ReportWindow) -> Self {
        let previous = window
            .previous()
            .map(|prev| window_total(inputs, &prev))
            .unwrap_or(Decimal::ZERO);
        Self::new(window_total(inputs, window), previous)
    }
}
