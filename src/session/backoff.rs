//! Randomised, linearly widening join backoff.

use rand_core::RngCore;

use crate::config::JoinBackoff;

/// Half-open delay window `[lower_ms, upper_ms)` for one retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffBounds {
    pub lower_ms: u32,
    pub upper_ms: u32,
}

/// Delay window for the `attempt`-th retry (1-based; 0 is treated as 1).
/// Attempts past the retry ceiling get the ceiling's window.
pub fn bounds(params: &JoinBackoff, attempt: u8) -> BackoffBounds {
    let n = u32::from(attempt.clamp(1, params.retry_ceiling.max(1)));
    let widen = (n - 1).saturating_mul(params.step_ms);
    BackoffBounds {
        lower_ms: params.lower_base_ms.saturating_add(widen),
        upper_ms: params.upper_base_ms.saturating_add(widen),
    }
}

/// Draw a delay uniformly from `b` by scaling a 32-bit sample onto the
/// span.  A degenerate window yields its lower bound.
pub fn pick_delay_ms(b: BackoffBounds, rng: &mut dyn RngCore) -> u32 {
    let span = b.upper_ms.saturating_sub(b.lower_ms);
    if span == 0 {
        return b.lower_ms;
    }
    // (r * span) >> 32 < span, so the sum stays below upper_ms.
    let offset = (u64::from(rng.next_u32()) * u64::from(span)) >> 32;
    b.lower_ms + offset as u32
}
