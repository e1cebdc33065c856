//! Adaptive timing heuristics for page load and render waits.
//!
//! Every timeout in the pipeline scales linearly with the retry attempt
//! number, and the pre-render delay additionally scales with how many bytes
//! the page downloaded. This trades a fixed worst-case wait for an adaptive
//! one keyed to observed payload size.

use std::time::Duration;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Timeout multiplier for a 0-based attempt index
pub fn attempt_progress(attempt: u32) -> u32 {
    attempt + 1
}

/// Base timeout scaled by the attempt multiplier
pub fn scaled_timeout(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms * u64::from(attempt_progress(attempt)))
}

/// Normalize a transferred-byte count into a [0, 1] payload weight.
///
/// Payloads at or below `min_tax_mb` incur no extra wait; the weight ramps
/// linearly and saturates at 1.0 over the next `max_tax_mb` MiB.
pub fn resource_size(transferred_bytes: u64, min_tax_mb: f64, max_tax_mb: f64) -> f64 {
    let mib = transferred_bytes as f64 / BYTES_PER_MIB;
    ((mib - min_tax_mb) / max_tax_mb).clamp(0.0, 1.0)
}

/// Pre-render delay compensating for asset decode time.
///
/// Proportional to the payload weight and escalated by the attempt number.
pub fn network_tax_delay(network_tax_ms: u64, resource_size: f64, attempt: u32) -> Duration {
    let ms = network_tax_ms as f64 * resource_size * f64::from(attempt_progress(attempt));
    Duration::from_millis(ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_progress_is_n_plus_one() {
        for n in 0..10 {
            assert_eq!(attempt_progress(n), n + 1);
        }
    }

    #[test]
    fn test_scaled_timeout_monotone() {
        let mut previous = Duration::ZERO;
        for n in 0..8 {
            let t = scaled_timeout(6000, n);
            assert_eq!(t, Duration::from_millis(6000 * u64::from(n + 1)));
            assert!(t >= previous);
            previous = t;
        }
    }

    #[test]
    fn test_resource_size_clamped_low() {
        // Below the minimum tax threshold nothing is charged
        assert_eq!(resource_size(0, 1.0, 5.0), 0.0);
        assert_eq!(resource_size(512 * 1024, 1.0, 5.0), 0.0);
    }

    #[test]
    fn test_resource_size_clamped_high() {
        // Arbitrarily large payloads saturate at 1.0
        assert_eq!(resource_size(u64::MAX, 1.0, 5.0), 1.0);
        assert_eq!(resource_size(100 * 1024 * 1024, 1.0, 5.0), 1.0);
    }

    #[test]
    fn test_resource_size_midpoint() {
        // 3.5 MiB with min 1.0 and span 5.0 => (3.5 - 1.0) / 5.0 = 0.5
        let bytes = (3.5 * 1024.0 * 1024.0) as u64;
        let size = resource_size(bytes, 1.0, 5.0);
        assert!((size - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_network_tax_delay_scales_with_attempt() {
        let first = network_tax_delay(2000, 0.5, 0);
        let second = network_tax_delay(2000, 0.5, 1);
        assert_eq!(first, Duration::from_millis(1000));
        assert_eq!(second, Duration::from_millis(2000));
    }

    #[test]
    fn test_network_tax_delay_zero_weight() {
        assert_eq!(network_tax_delay(2000, 0.0, 5), Duration::ZERO);
    }
}
