use std::fmt;

use crate::data::model::IndexSeries;

/// Agreement between a computed index and a reference index on the dates
/// where both are defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub overlap: usize,
    /// Pearson correlation; `None` with fewer than two shared dates or a
    /// constant series.
    pub correlation: Option<f64>,
    pub rmse: Option<f64>,
    /// Mean of `computed - reference`.
    pub bias: Option<f64>,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
        write!(
            f,
            "overlap: {} days, correlation: {}, rmse: {}, bias: {}",
            self.overlap,
            show(self.correlation),
            show(self.rmse),
            show(self.bias)
        )
    }
}

pub fn compare(computed: &IndexSeries, reference: &IndexSeries) -> Comparison {
    let pairs: Vec<(f64, f64)> = computed
        .iter()
        .filter_map(|(date, a)| Some((a?, reference.get(date)?)))
        .collect();

    let n = pairs.len();
    if n == 0 {
        return Comparison {
            overlap: 0,
            correlation: None,
            rmse: None,
            bias: None,
        };
    }
    let nf = n as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / nf;
    let (mut cov, mut var_a, mut var_b, mut sq) = (0.0, 0.0, 0.0, 0.0);
    for &(a, b) in &pairs {
        cov += (a - mean_a) * (b - mean_b);
        var_a += (a - mean_a).powi(2);
        var_b += (b - mean_b).powi(2);
        sq += (a - b).powi(2);
    }
    let correlation = (n >= 2 && var_a > 0.0 && var_b > 0.0).then(|| cov / (var_a * var_b).sqrt());

    Comparison {
        overlap: n,
        correlation,
        rmse: Some((sq / nf).sqrt()),
        bias: Some(mean_a - mean_b),
    }
}
