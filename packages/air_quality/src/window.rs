//! Best-window and peak-hour selection over a prediction series.

use chrono::TimeDelta;
use citypulse_air_quality_models::{BestWindow, HourlyPrediction, PeakHour};

/// Averages closer than this are treated as equal when breaking ties.
const AVERAGE_EPSILON: f64 = 1e-9;

/// Result of [`select_windows`].
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSelection {
    /// Contiguous run of at least the minimum length with the lowest mean
    /// AQI. `None` when the series is shorter than the minimum.
    pub best_window: Option<BestWindow>,
    /// Hour with the highest predicted AQI. `None` for an empty series.
    pub peak: Option<PeakHour>,
}

/// Finds the best window of at least `min_hours` and the peak hour.
#[must_use]
pub fn select_windows(predictions: &[HourlyPrediction], min_hours: usize) -> WindowSelection {
    WindowSelection {
        best_window: best_window(predictions, min_hours),
        peak: peak_hour(predictions),
    }
}

/// Lowest-average contiguous window of length `>= min_hours`.
///
/// Any window of length `2k` or more splits into two windows of length
/// `>= k`, one of which has an average no greater than the whole, so only
/// lengths `k..2k` need checking. Ties keep the earliest start, then the
/// shortest length.
#[must_use]
pub fn best_window(predictions: &[HourlyPrediction], min_hours: usize) -> Option<BestWindow> {
    let min_hours = min_hours.max(1);
    let n = predictions.len();
    if n < min_hours {
        return None;
    }

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for p in predictions {
        prefix.push(prefix[prefix.len() - 1] + p.predicted_aqi);
    }

    let max_len = (2 * min_hours - 1).min(n);
    let mut best: Option<(usize, usize, f64)> = None;

    for start in 0..=(n - min_hours) {
        for len in min_hours..=max_len {
            let end = start + len;
            if end > n {
                break;
            }
            #[allow(clippy::cast_precision_loss)]
            let average = (prefix[end] - prefix[start]) / len as f64;
            if best.is_none_or(|(_, _, b)| average < b - AVERAGE_EPSILON) {
                best = Some((start, len, average));
            }
        }
    }

    best.map(|(start, hours, average_aqi)| {
        let first = predictions[start].timestamp;
        BestWindow {
            start: first,
            end: first + TimeDelta::hours(i64::try_from(hours).unwrap_or(i64::MAX)),
            start_index: start,
            hours,
            average_aqi,
        }
    })
}

/// Highest predicted AQI; the earliest hour wins ties.
#[must_use]
pub fn peak_hour(predictions: &[HourlyPrediction]) -> Option<PeakHour> {
    let mut peak: Option<PeakHour> = None;
    for (index, p) in predictions.iter().enumerate() {
        if peak.as_ref().is_none_or(|current| p.predicted_aqi > current.aqi) {
            peak = Some(PeakHour {
                timestamp: p.timestamp,
                index,
                aqi: p.predicted_aqi,
            });
        }
    }
    peak
}
