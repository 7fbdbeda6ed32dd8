//! Box-constrained share normalization.
//!
//! Raw shares are rescaled so they sum to exactly 1.0 while every share lies
//! inside `[min_share, max_share]`. Shares pinned at a bound are fixed; the
//! remaining free shares are scaled by one common factor. The band is widened
//! to include `1/n` when `n * min_share > 1` or `n * max_share < 1`, because
//! no valid distribution exists otherwise.

/// Tolerance for bound violations.
const EPSILON: f64 = 1e-12;

/// Normalize raw scores into final shares.
///
/// Non-finite or negative scores count as zero. If every score is zero the
/// result is an equal split.
pub fn normalize_shares(scores: &[f64], min_share: f64, max_share: f64) -> Vec<f64> {
    let n = scores.len();
    if n == 0 {
        return Vec::new();
    }
    let count = f64::from(u32::try_from(n).unwrap_or(u32::MAX));
    let equal = 1.0 / count;
    let lo = min_share.min(equal).max(0.0);
    let hi = max_share.max(equal).min(1.0);

    let weights: Vec<f64> = scores
        .iter()
        .map(|s| if s.is_finite() && *s > 0.0 { *s } else { 0.0 })
        .collect();
    let sum: f64 = weights.iter().sum();
    let raw: Vec<f64> = if sum > 0.0 {
        weights.iter().map(|w| w / sum).collect()
    } else {
        vec![equal; n]
    };

    let mut fixed: Vec<Option<f64>> = vec![None; n];
    // Each pass fixes at least one share, so n + 1 passes always suffice.
    for _ in 0..=n {
        let fixed_total: f64 = fixed.iter().flatten().sum();
        let remaining = 1.0 - fixed_total;
        let free: Vec<usize> = (0..n).filter(|i| fixed.get(*i).is_some_and(Option::is_none)).collect();
        if free.is_empty() {
            break;
        }

        let free_raw: f64 = free.iter().filter_map(|i| raw.get(*i)).sum();
        let free_count = f64::from(u32::try_from(free.len()).unwrap_or(u32::MAX));
        let candidate = |i: usize| -> f64 {
            if free_raw > 0.0 {
                raw.get(i).copied().unwrap_or(0.0) * remaining / free_raw
            } else {
                remaining / free_count
            }
        };

        let mut excess = 0.0;
        let mut deficit = 0.0;
        for i in &free {
            let value = candidate(*i);
            if value > hi + EPSILON {
                excess += value - hi;
            } else if value < lo - EPSILON {
                deficit += lo - value;
            }
        }

        if excess <= 0.0 && deficit <= 0.0 {
            let shares: Vec<f64> = (0..n)
                .map(|i| fixed.get(i).copied().flatten().unwrap_or_else(|| candidate(i)))
                .collect();
            return if shares.iter().all(|s| s.is_finite()) {
                shares
            } else {
                vec![equal; n]
            };
        }

        let fix_upper = excess >= deficit;
        for i in free {
            let value = candidate(i);
            let pinned = if fix_upper && value > hi + EPSILON {
                Some(hi)
            } else if !fix_upper && value < lo - EPSILON {
                Some(lo)
            } else {
                None
            };
            if let (Some(bound), Some(slot)) = (pinned, fixed.get_mut(i)) {
                *slot = Some(bound);
            }
        }
    }

    let shares: Vec<f64> = fixed.iter().map(|s| s.unwrap_or(equal)).collect();
    let total: f64 = shares.iter().sum();
    if (total - 1.0).abs() < 1e-9 {
        shares
    } else {
        vec![equal; n]
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn assert_valid(shares: &[f64], lo: f64, hi: f64) {
        let total: f64 = shares.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "sum {total}");
        for share in shares {
            assert!(*share >= lo - 1e-9 && *share <= hi + 1e-9, "share {share} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn proportional_when_inside_band() {
        let shares = normalize_shares(&[40.0, 30.0, 30.0], 0.05, 0.6);
        assert_valid(&shares, 0.05, 0.6);
        assert!((shares.first().copied().unwrap_or(0.0) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn dominant_business_is_capped() {
        let shares = normalize_shares(&[1000.0, 10.0, 10.0], 0.05, 0.6);
        assert_valid(&shares, 0.05, 0.6);
        assert!((shares.first().copied().unwrap_or(0.0) - 0.6).abs() < 1e-9);
        assert!((shares.get(1).copied().unwrap_or(0.0) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn tiny_business_is_lifted_to_floor() {
        let shares = normalize_shares(&[100.0, 100.0, 0.0], 0.05, 0.6);
        assert_valid(&shares, 0.05, 0.6);
        assert!((shares.get(2).copied().unwrap_or(0.0) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn zero_scores_split_equally() {
        let shares = normalize_shares(&[0.0, 0.0, 0.0, 0.0], 0.05, 0.6);
        for share in &shares {
            assert!((share - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn single_business_takes_everything() {
        let shares = normalize_shares(&[12.0], 0.05, 0.6);
        assert_eq!(shares.len(), 1);
        assert!((shares.first().copied().unwrap_or(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn infeasible_floor_is_widened() {
        // 30 * 0.05 = 1.5 > 1: the floor drops to 1/30.
        let scores = vec![1.0; 30];
        let shares = normalize_shares(&scores, 0.05, 0.6);
        assert_valid(&shares, 1.0 / 30.0, 0.6);
    }

    #[test]
    fn random_inputs_always_normalize() {
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..500 {
            let n = rng.random_range(1..=25_usize);
            let scores: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..200.0)).collect();
            let shares = normalize_shares(&scores, 0.05, 0.6);
            let equal = 1.0 / f64::from(u32::try_from(n).unwrap_or(1));
            assert_valid(&shares, 0.05_f64.min(equal), 0.6_f64.max(equal));
        }
    }
}
