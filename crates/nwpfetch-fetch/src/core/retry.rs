use std::time::Duration;

/// Delay to wait after a failed attempt before the next one.
///
/// The delay formula is: `min(unit * 2^attempt, cap)`
///
/// # Arguments
///
/// * `attempt` - The attempt that just failed (1-indexed: 1 = first attempt)
/// * `unit` - The backoff unit, one second in production
/// * `cap` - Upper bound for any single delay
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use nwpfetch_fetch::backoff_delay;
///
/// let unit = Duration::from_secs(1);
/// let cap = Duration::from_secs(30);
///
/// assert_eq!(backoff_delay(1, unit, cap), Duration::from_secs(2));
/// assert_eq!(backoff_delay(4, unit, cap), Duration::from_secs(16));
/// assert_eq!(backoff_delay(5, unit, cap), Duration::from_secs(30));
/// ```
pub fn backoff_delay(attempt: u32, unit: Duration, cap: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(attempt);
    unit.saturating_mul(multiplier).min(cap)
}
