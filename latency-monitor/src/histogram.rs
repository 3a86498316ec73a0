use tracing::warn;

/// Upper bound on the number of bins. A narrower `width` is widened to fit.
pub const MAX_HISTOGRAM_BINS: usize = 512;

/// Fixed-width histogram with population statistics.
///
/// Bins start at `floor(min / width) * width` and end at `ceil(max / width) * width` (at least
/// one bin, at most [`MAX_HISTOGRAM_BINS`]). Values falling on or beyond the last edge are
/// counted in the last bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub start: f64,
    pub width: f64,
    pub counts: Vec<usize>,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl Histogram {
    /// Bin `values` with the provided `width`. Non-finite values are ignored.
    ///
    /// Returns `None` when there is nothing to bin or `width` is not a positive finite number.
    pub fn new(values: impl IntoIterator<Item = f64>, mut width: f64) -> Option<Self> {
        if !(width.is_finite() && width > 0.0) {
            return None;
        }

        let values: Vec<f64> = values.into_iter().filter(|value| value.is_finite()).collect();
        if values.is_empty() {
            return None;
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
                (lo.min(*value), hi.max(*value))
            });

        let mut start = (min / width).floor() * width;
        let mut end = (max / width).ceil() * width;
        if end <= start {
            end = start + width;
        }

        let bins_needed = (end - start) / width;
        if !(start.is_finite() && end.is_finite()) || bins_needed > MAX_HISTOGRAM_BINS as f64 {
            let span = max - min;
            if !span.is_finite() {
                return None;
            }
            let requested = width;
            let n_bins = if span > 0.0 { MAX_HISTOGRAM_BINS } else { 1 };
            width = if span > 0.0 { span / n_bins as f64 } else { 1.0 };
            start = min;
            end = start + n_bins as f64 * width;
            warn!(requested, width, "histogram bin width too narrow, widened");
        }

        let n_bins = (((end - start) / width).round() as usize).clamp(1, MAX_HISTOGRAM_BINS);
        let mut counts = vec![0; n_bins];
        for value in &values {
            let index = ((value - start) / width).floor();
            let index = if index < 0.0 {
                0
            } else {
                (index as usize).min(n_bins - 1)
            };
            counts[index] += 1;
        }

        let len = values.len() as f64;
        let mean = values.iter().sum::<f64>() / len;
        let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / len;

        Some(Self {
            start,
            width,
            counts,
            mean,
            std_dev: variance.sqrt(),
        })
    }

    /// Left edge of bin `index`.
    pub fn bin_start(&self, index: usize) -> f64 {
        self.start + index as f64 * self.width
    }

    pub fn end(&self) -> f64 {
        self.bin_start(self.counts.len())
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_edges_and_counts() {
        let histogram = Histogram::new([-7.5, -2.0, 0.0, 3.0, 10.0], 5.0).unwrap();

        assert_eq!(histogram.start, -10.0);
        assert_eq!(histogram.end(), 10.0);
        // [-10,-5) [-5,0) [0,5) [5,10]
        assert_eq!(histogram.counts, vec![1, 1, 2, 1]);
        assert_eq!(histogram.total(), 5);
        assert!((histogram.mean - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_single_value_gets_one_bin() {
        let histogram = Histogram::new([20.0, 20.0], 10.0).unwrap();
        assert_eq!(histogram.counts, vec![2]);
        assert_eq!(histogram.start, 20.0);
        assert_eq!(histogram.std_dev, 0.0);
    }

    #[test]
    fn test_histogram_population_std_dev() {
        let histogram = Histogram::new([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 1.0).unwrap();
        assert_eq!(histogram.mean, 5.0);
        assert_eq!(histogram.std_dev, 2.0);
    }

    #[test]
    fn test_histogram_rejects_degenerate_input() {
        assert!(Histogram::new([], 5.0).is_none());
        assert!(Histogram::new([1.0], 0.0).is_none());
        assert!(Histogram::new([1.0], -5.0).is_none());
        assert!(Histogram::new([f64::NAN], 5.0).is_none());
    }

    #[test]
    fn test_histogram_tiny_width_is_widened_to_bin_cap() {
        struct TestCase {
            values: Vec<f64>,
            width: f64,
            expected_bins: usize,
        }

        let tests = vec![
            TestCase {
                // TC0: span 165 at 1e-17 would need ~1.6e19 bins
                values: vec![-150.0, 15.0],
                width: 1e-17,
                expected_bins: MAX_HISTOGRAM_BINS,
            },
            TestCase {
                // TC1: ~1.6e11 bins
                values: vec![-150.0, 0.0, 15.0],
                width: 1e-9,
                expected_bins: MAX_HISTOGRAM_BINS,
            },
            TestCase {
                // TC2: exactly at the cap is kept as is
                values: vec![0.0, 512.0],
                width: 1.0,
                expected_bins: MAX_HISTOGRAM_BINS,
            },
            TestCase {
                // TC3: a single repeated value still gets one bin
                values: vec![1e300, 1e300],
                width: 1e-17,
                expected_bins: 1,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let len = test.values.len();
            let histogram = Histogram::new(test.values, test.width).unwrap();
            assert_eq!(histogram.counts.len(), test.expected_bins, "TC{} failed", index);
            assert_eq!(histogram.total(), len, "TC{} failed", index);
        }
    }
}
