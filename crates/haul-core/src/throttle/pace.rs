//! Rate arithmetic for pacing sleeps.

use std::time::Duration;

use super::arbiter::BudgetStatus;

/// Multiplier applied to the rate once budget usage passes `threshold`:
/// 1.0 at the threshold, falling linearly to 0.0 at full usage.
pub(crate) fn ramp_factor(usage: f64, threshold: f64) -> f64 {
    if usage <= threshold {
        return 1.0;
    }
    if usage >= 1.0 {
        return 0.0;
    }
    ((1.0 - usage) / (1.0 - threshold)).clamp(0.0, 1.0)
}

/// Bytes per second to pace at, or `None` for no pacing.
///
/// A zero `target` means no ceiling of its own; under a budget the budget's
/// average rate (allowance per interval) stands in so the ramp has something
/// to scale.
pub(crate) fn effective_rate(
    target: u64,
    status: Option<&BudgetStatus>,
    threshold: f64,
) -> Option<f64> {
    let base = match (target, status) {
        (0, None) => return None,
        (0, Some(s)) => s.allowance as f64 / s.interval.as_secs_f64(),
        (t, _) => t as f64,
    };
    let factor = status.map_or(1.0, |s| ramp_factor(s.usage_fraction, threshold));
    Some(base * factor)
}

/// How long to sleep after writing `bytes` in `took`, never past `cap`.
///
/// A zero rate (budget exhausted) sleeps the full cap, which ends the interval.
pub(crate) fn pacing_delay(
    bytes: u64,
    took: Duration,
    rate: Option<f64>,
    cap: Option<Duration>,
) -> Duration {
    let Some(rate) = rate else {
        return Duration::ZERO;
    };
    let delay = if rate <= 0.0 {
        cap.unwrap_or(Duration::ZERO)
    } else {
        let expected = Duration::try_from_secs_f64(bytes as f64 / rate).unwrap_or(Duration::MAX);
        expected.saturating_sub(took)
    };
    match cap {
        Some(cap) => delay.min(cap),
        None => delay,
    }
}
