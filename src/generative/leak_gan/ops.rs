//! Row-wise numeric kernels over `[batch, width]` arrays.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Floor applied to norms before division
pub const NORM_EPS: f32 = 1e-12;

/// Floor applied to the product of norms in cosine similarity
pub const COSINE_EPS: f32 = 1e-8;

/// Numerically stable softmax over each row
pub fn softmax_rows(x: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = x.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum: f32 = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

/// Numerically stable log-softmax over each row
pub fn log_softmax_rows(x: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = x.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }
    out
}

/// L2 norm of a vector
pub fn l2_norm(v: ArrayView1<'_, f32>) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Divide each row by `max(||row||, NORM_EPS)`
pub fn l2_normalize_rows(x: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = x.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let norm = l2_norm(row.view()).max(NORM_EPS);
        row.mapv_inplace(|v| v / norm);
    }
    out
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let dot = a.dot(&b);
    let denom = (l2_norm(a) * l2_norm(b)).max(COSINE_EPS);
    dot / denom
}

/// Cosine similarity of matching rows; returns one value per row
pub fn cosine_rows(a: ArrayView2<'_, f32>, b: ArrayView2<'_, f32>) -> Vec<f32> {
    a.axis_iter(Axis(0))
        .zip(b.axis_iter(Axis(0)))
        .map(|(ra, rb)| cosine_similarity(ra, rb))
        .collect()
}

/// Logistic sigmoid
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
