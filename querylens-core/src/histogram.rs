//! Skew histograms over per-task samples.
//!
//! The bucket count follows `min(175, floor(sqrt(n)))` so that a stage with a
//! handful of tasks gets a couple of wide buckets while very wide stages are
//! capped at the width of the chart.

/// Upper bound on buckets, roughly the width of a dashboard chart in columns.
pub const MAX_HISTOGRAM_BUCKETS: usize = 175;

/// Bucketed distribution of samples with a label per bucket.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkewHistogram {
    /// Sample count per bucket, lowest range first
    pub counts: Vec<usize>,
    /// `"{low}-{high}"` per bucket, same indexing as `counts`
    pub labels: Vec<String>,
}

impl SkewHistogram {
    /// Bucket `samples`, labelling bucket bounds with `formatter`.
    pub fn compute<F>(samples: &[f64], formatter: F) -> Self
    where
        F: Fn(f64) -> String,
    {
        if samples.is_empty() {
            return Self::default();
        }

        let bucket_count = bucket_count(samples.len());
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let width = (max - min) / bucket_count as f64;

        // All samples identical: everything lands in one bucket.
        if width == 0.0 {
            return Self {
                counts: vec![samples.len()],
                labels: vec![format!("{}-{}", formatter(min), formatter(min))],
            };
        }

        let mut counts = vec![0usize; bucket_count];
        for &value in samples {
            let index = ((value - min) / width).floor() as usize;
            counts[index.min(bucket_count - 1)] += 1;
        }

        let labels = (0..bucket_count)
            .map(|i| {
                let low = min + i as f64 * width;
                let high = min + (i + 1) as f64 * width;
                format!("{}-{}", formatter(low), formatter(high))
            })
            .collect();

        Self { counts, labels }
    }

    pub fn label(&self, bucket: usize) -> Option<&str> {
        self.labels.get(bucket).map(String::as_str)
    }

    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

fn bucket_count(sample_count: usize) -> usize {
    let by_sqrt = (sample_count as f64).sqrt().floor() as usize;
    by_sqrt.clamp(1, MAX_HISTOGRAM_BUCKETS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_duration;

    fn plain(v: f64) -> String {
        format!("{}", v)
    }

    #[test]
    fn test_bucket_count_formula() {
        assert_eq!(bucket_count(1), 1);
        assert_eq!(bucket_count(3), 1);
        assert_eq!(bucket_count(4), 2);
        assert_eq!(bucket_count(99), 9);
        assert_eq!(bucket_count(100), 10);
        assert_eq!(bucket_count(1_000_000), MAX_HISTOGRAM_BUCKETS);
    }

    #[test]
    fn test_counts_sum_to_sample_count() {
        let inputs: Vec<Vec<f64>> = vec![
            vec![1.0],
            vec![1.0, 2.0],
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            (0..1000).map(|i| ((i * 37) % 101) as f64 * 0.3).collect(),
            vec![0.1, 0.2, 0.3, 0.7, 0.7, 0.9, 100.0],
        ];
        for samples in inputs {
            let histogram = SkewHistogram::compute(&samples, plain);
            assert_eq!(histogram.total(), samples.len());
            assert_eq!(histogram.labels.len(), histogram.counts.len());
        }
    }

    #[test]
    fn test_identical_samples_single_bucket() {
        let samples = vec![250.0; 16];
        let histogram = SkewHistogram::compute(&samples, format_duration);
        assert_eq!(histogram.counts, vec![16]);
        assert_eq!(histogram.label(0), Some("250.0ms-250.0ms"));
    }

    #[test]
    fn test_max_value_clamped_into_last_bucket() {
        let samples = vec![0.0, 1.0, 2.0, 3.0];
        let histogram = SkewHistogram::compute(&samples, plain);
        assert_eq!(histogram.bucket_count(), 2);
        // width 1.5: [0, 1.5) holds 0 and 1, the rest including max land last
        assert_eq!(histogram.counts, vec![2, 2]);
        assert_eq!(histogram.label(0), Some("0-1.5"));
        assert_eq!(histogram.label(1), Some("1.5-3"));
        assert_eq!(histogram.label(2), None);
    }

    #[test]
    fn test_empty_input() {
        let histogram = SkewHistogram::compute(&[], plain);
        assert_eq!(histogram.bucket_count(), 0);
        assert_eq!(histogram.total(), 0);
    }
}
