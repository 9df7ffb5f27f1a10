//! Summary statistics over rollout repetitions.

use ndarray::{ArrayView2, Axis};

use crate::utils::linspace;

/// Median with the even-count convention of averaging the two middle values.
/// `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median absolute deviation: `median(|v - median(v)|)`.
pub fn median_abs_deviation(values: &[f64]) -> Option<f64> {
    let center = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Per-time-step median and min/max band across repetitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub median: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Envelope {
    /// Builds the envelope of a `(time_steps, repetitions)` view, keeping the
    /// first `n_points` time steps.
    pub fn from_repetitions(series: ArrayView2<f64>, n_points: usize) -> Self {
        let n = n_points.min(series.nrows());
        let mut median_s = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);

        for row in series.axis_iter(Axis(0)).take(n) {
            let reps: Vec<f64> = row.iter().copied().collect();
            median_s.push(median(&reps).unwrap_or(f64::NAN));
            lower.push(reps.iter().copied().fold(f64::INFINITY, f64::min));
            upper.push(reps.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        }

        Self {
            median: median_s,
            lower,
            upper,
        }
    }

    pub fn len(&self) -> usize {
        self.median.len()
    }

    pub fn is_empty(&self) -> bool {
        self.median.is_empty()
    }

    /// `(min, max)` over the band.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let lo = self.lower.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = self.upper.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((lo, hi))
    }
}

/// Sum over time for each repetition of a `(time_steps, repetitions)` reward array.
pub fn cumulative_rewards(rewards: ArrayView2<f64>) -> Vec<f64> {
    rewards.sum_axis(Axis(0)).to_vec()
}

/// `reference - value` for each repetition.
pub fn optimality_gaps(reference: f64, cumulative: &[f64]) -> Vec<f64> {
    cumulative.iter().map(|c| reference - c).collect()
}

/// Equal-width histogram bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
}

impl Histogram {
    /// `bins` equal-width bins spanning `[min, max]` of all `values`.
    ///
    /// When every value is identical the range is widened to `v ± 0.5`.
    pub fn spanning<'a, I>(values: I, bins: usize) -> Option<Self>
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let bins = bins.max(1);
        let (lo, hi) = values
            .into_iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;

        let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
        Some(Self {
            edges: linspace(lo, hi, bins + 1),
        })
    }

    pub fn bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn min(&self) -> f64 {
        self.edges.first().copied().unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.edges.last().copied().unwrap_or(0.0)
    }

    /// Counts per bin. Bins are half-open `[a, b)` except the last, which
    /// also includes its right edge; values outside the edges are ignored.
    pub fn counts(&self, values: &[f64]) -> Vec<usize> {
        let bins = self.bins();
        let mut counts = vec![0usize; bins];
        if bins == 0 {
            return counts;
        }
        let (lo, hi) = (self.min(), self.max());
        for &v in values {
            if !(lo..=hi).contains(&v) {
                continue;
            }
            // edges are sorted; first edge strictly greater than v closes the bin
            let idx = self.edges.partition_point(|e| *e <= v);
            let bin = idx.saturating_sub(1).min(bins - 1);
            counts[bin] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn median_odd_even_empty() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn mad_is_zero_for_identical_sums() {
        assert_eq!(median_abs_deviation(&[-3.5, -3.5]), Some(0.0));
        assert_eq!(median_abs_deviation(&[1.0, 2.0, 3.0, 4.0, 100.0]), Some(1.0));
    }

    #[test]
    fn envelope_truncates_to_requested_points() {
        let a = Array2::from_shape_fn((80, 3), |(t, r)| t as f64 + r as f64);
        let env = Envelope::from_repetitions(a.view(), 60);
        assert_eq!(env.len(), 60);
        assert_eq!(env.median[10], 11.0);
        assert_eq!(env.lower[10], 10.0);
        assert_eq!(env.upper[10], 12.0);
        assert_eq!(env.bounds(), Some((0.0, 61.0)));

        let short = Envelope::from_repetitions(a.slice(ndarray::s![..40, ..]), 60);
        assert_eq!(short.len(), 40);
    }

    #[test]
    fn cumulative_rewards_sum_over_time() {
        let r = Array2::from_elem((60, 5), 10.0);
        let c = cumulative_rewards(r.view());
        assert_eq!(c, vec![600.0; 5]);
        assert_eq!(optimality_gaps(650.0, &c), vec![50.0; 5]);
    }

    #[test]
    fn histogram_edges_span_min_max() {
        let a = [-5.0, -1.0, -3.0];
        let b = [-9.0, -2.0];
        let h = Histogram::spanning(a.iter().chain(b.iter()), 20).unwrap();
        assert_eq!(h.bins(), 20);
        assert_eq!(h.min(), -9.0);
        assert_eq!(h.max(), -1.0);
        let width = (h.max() - h.min()) / 20.0;
        for w in h.edges.windows(2) {
            assert!(((w[1] - w[0]) - width).abs() < 1e-12);
        }
    }

    #[test]
    fn histogram_counts_close_last_bin() {
        let h = Histogram { edges: vec![0.0, 1.0, 2.0] };
        assert_eq!(h.counts(&[0.0, 0.5, 1.0, 2.0, 2.5, -0.1]), vec![2, 2]);
    }

    #[test]
    fn degenerate_histogram_is_widened() {
        let v = [600.0, 600.0];
        let h = Histogram::spanning(v.iter(), 20).unwrap();
        assert_eq!((h.min(), h.max()), (599.5, 600.5));
        assert_eq!(h.counts(&v).iter().sum::<usize>(), 2);
        assert!(Histogram::spanning(std::iter::empty::<&f64>(), 20).is_none());
    }
}
