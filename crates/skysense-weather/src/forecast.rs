//! Daily aggregation of the provider's 3-hourly forecast samples, plus the
//! place-local time formatting shared with the current-conditions mapping.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::types::{ConditionTag, ForecastDay};

/// Number of future days kept after dropping today.
pub const FORECAST_DAYS: usize = 5;

/// One forecast sample, already validated out of the provider response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Epoch seconds (UTC)
    pub timestamp: i64,
    /// Degrees Celsius
    pub temperature: f64,
    pub condition_code: i32,
}

/// Round to the nearest whole degree, halves toward positive infinity.
pub fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Build a UTC offset from the provider's `timezone` seconds.
/// Out-of-range values fall back to UTC.
pub(crate) fn utc_offset(seconds: i64) -> FixedOffset {
    i32::try_from(seconds)
        .ok()
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

fn local_time(timestamp: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&offset))
}

/// Render epoch seconds as a 12 hour clock time in the place's local time,
/// e.g. "06:05 AM". Unrepresentable timestamps render as "--:--".
pub fn format_clock_time(timestamp: i64, utc_offset_secs: i64) -> String {
    local_time(timestamp, utc_offset(utc_offset_secs))
        .map(|t| t.format("%I:%M %p").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

/// Group samples by place-local calendar day, drop the first group (today)
/// and summarize the next five.
///
/// Groups keep the order in which their day first appears. Each day's
/// condition comes from its middle sample (`len / 2`). Fewer than six groups
/// yields fewer days; nothing is padded.
pub fn aggregate_daily(samples: &[Sample], utc_offset_secs: i64) -> Vec<ForecastDay> {
    let offset = utc_offset(utc_offset_secs);
    let mut groups: Vec<(NaiveDate, Vec<(DateTime<FixedOffset>, &Sample)>)> = Vec::new();

    for sample in samples {
        let Some(local) = local_time(sample.timestamp, offset) else {
            tracing::debug!("Skipping forecast sample with bad timestamp {}", sample.timestamp);
            continue;
        };
        let date = local.date_naive();
        match groups.iter_mut().find(|(d, _)| *d == date) {
            Some((_, items)) => items.push((local, sample)),
            None => groups.push((date, vec![(local, sample)])),
        }
    }

    groups
        .into_iter()
        .skip(1)
        .take(FORECAST_DAYS)
        .filter_map(|(date, items)| summarize_day(date, &items))
        .collect()
}

fn summarize_day(
    date: NaiveDate,
    items: &[(DateTime<FixedOffset>, &Sample)],
) -> Option<ForecastDay> {
    let (median_time, median) = items.get(items.len() / 2)?;

    let (min, max) = items.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(min, max), (_, s)| (min.min(s.temperature), max.max(s.temperature)),
    );

    Some(ForecastDay {
        date: date.format("%b %-d").to_string(),
        day: median_time.format("%a").to_string(),
        high: round_half_up(max),
        low: round_half_up(min),
        condition: ConditionTag::from_code(median.condition_code),
    })
}
