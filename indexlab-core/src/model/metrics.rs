//! Regression error metrics. Empty or mismatched inputs yield NaN.

pub fn rmse(predictions: &[f64], actual: &[f64]) -> f64 {
    if predictions.is_empty() || predictions.len() != actual.len() {
        return f64::NAN;
    }
    let sse: f64 = predictions
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a) * (p - a))
        .sum();
    (sse / predictions.len() as f64).sqrt()
}

pub fn mae(predictions: &[f64], actual: &[f64]) -> f64 {
    if predictions.is_empty() || predictions.len() != actual.len() {
        return f64::NAN;
    }
    let sae: f64 = predictions.iter().zip(actual).map(|(p, a)| (p - a).abs()).sum();
    sae / predictions.len() as f64
}
