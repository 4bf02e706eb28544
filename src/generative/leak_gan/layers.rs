//! Embedding, projection and LSTM cell layers.
//!
//! All layers operate on a whole batch at once: inputs are `[batch, in]`
//! arrays and outputs `[batch, out]`.

use ndarray::{s, Array1, Array2, ArrayView2, ArrayViewD, ArrayViewMutD, Axis};
use rand::Rng;

use super::ops::sigmoid;
use crate::error::{Error, Result};

/// Read-only view of a named parameter
#[derive(Debug)]
pub struct NamedParam<'a> {
    /// Dotted parameter path, e.g. `worker.lstm.w_ih`
    pub name: String,
    /// Parameter values
    pub values: ArrayViewD<'a, f32>,
}

/// Mutable view of a named parameter, handed to an external optimizer
#[derive(Debug)]
pub struct NamedParamMut<'a> {
    /// Dotted parameter path
    pub name: String,
    /// Parameter values
    pub values: ArrayViewMutD<'a, f32>,
}

/// Standard normal sample using the Box-Muller transform
pub(crate) fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u1: f64 = rng.random::<f64>().max(1e-10);
    let u2: f64 = rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}

/// Uniform sample in `[-bound, bound)`
pub(crate) fn sample_uniform<R: Rng + ?Sized>(rng: &mut R, bound: f32) -> f32 {
    (rng.random::<f32>() * 2.0 - 1.0) * bound
}

/// Token embedding table; the padding row is zero at initialisation
#[derive(Debug, Clone)]
pub struct Embedding {
    /// `[vocab_size, dim]`
    pub(crate) weight: Array2<f32>,
}

impl Embedding {
    /// Create an embedding with rows drawn from N(0, 1)
    pub fn new<R: Rng + ?Sized>(vocab_size: usize, dim: usize, pad_idx: u32, rng: &mut R) -> Self {
        let mut weight = Array2::from_shape_fn((vocab_size, dim), |_| sample_normal(rng));
        if (pad_idx as usize) < vocab_size {
            weight.row_mut(pad_idx as usize).fill(0.0);
        }
        Self { weight }
    }

    /// Number of rows in the table
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.weight.nrows()
    }

    /// Embedding width
    #[must_use]
    pub fn dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Look up one row per token
    pub fn forward(&self, tokens: &[u32]) -> Result<Array2<f32>> {
        let vocab_size = self.vocab_size();
        let mut out = Array2::zeros((tokens.len(), self.dim()));
        for (mut row, &token) in out.axis_iter_mut(Axis(0)).zip(tokens) {
            if token as usize >= vocab_size {
                return Err(Error::TokenOutOfRange { token, vocab_size });
            }
            row.assign(&self.weight.row(token as usize));
        }
        Ok(out)
    }

    pub(crate) fn params(&self, prefix: &str) -> Vec<NamedParam<'_>> {
        vec![NamedParam {
            name: format!("{prefix}.weight"),
            values: self.weight.view().into_dyn(),
        }]
    }

    pub(crate) fn params_mut(&mut self, prefix: &str) -> Vec<NamedParamMut<'_>> {
        vec![NamedParamMut {
            name: format!("{prefix}.weight"),
            values: self.weight.view_mut().into_dyn(),
        }]
    }
}

/// Affine projection `y = x W^T + b`
#[derive(Debug, Clone)]
pub struct Linear {
    /// `[out, in]`
    pub(crate) weight: Array2<f32>,
    /// `[out]`
    pub(crate) bias: Option<Array1<f32>>,
}

impl Linear {
    /// Create a projection with weights in U(-1/sqrt(in), 1/sqrt(in))
    pub fn new<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, bias: bool, rng: &mut R) -> Self {
        let bound = 1.0 / (in_dim.max(1) as f32).sqrt();
        let weight = Array2::from_shape_fn((out_dim, in_dim), |_| sample_uniform(rng, bound));
        let bias = bias.then(|| Array1::from_shape_fn(out_dim, |_| sample_uniform(rng, bound)));
        Self { weight, bias }
    }

    /// Input width
    #[must_use]
    pub fn in_dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Output width
    #[must_use]
    pub fn out_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// Project a `[batch, in]` input to `[batch, out]`
    pub fn forward(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.in_dim() {
            return Err(Error::shape("linear input", self.in_dim(), x.ncols()));
        }
        let mut y = x.dot(&self.weight.t());
        if let Some(bias) = &self.bias {
            y += bias;
        }
        Ok(y)
    }

    /// Number of scalar parameters
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, Array1::len)
    }

    pub(crate) fn params(&self, prefix: &str) -> Vec<NamedParam<'_>> {
        let mut params = vec![NamedParam {
            name: format!("{prefix}.weight"),
            values: self.weight.view().into_dyn(),
        }];
        if let Some(bias) = &self.bias {
            params.push(NamedParam {
                name: format!("{prefix}.bias"),
                values: bias.view().into_dyn(),
            });
        }
        params
    }

    pub(crate) fn params_mut(&mut self, prefix: &str) -> Vec<NamedParamMut<'_>> {
        let mut params = vec![NamedParamMut {
            name: format!("{prefix}.weight"),
            values: self.weight.view_mut().into_dyn(),
        }];
        if let Some(bias) = self.bias.as_mut() {
            params.push(NamedParamMut {
                name: format!("{prefix}.bias"),
                values: bias.view_mut().into_dyn(),
            });
        }
        params
    }
}

/// Recurrent state of one policy: hidden output `h` and cell memory `c`
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenState {
    /// Hidden output, `[batch, hidden]`
    pub h: Array2<f32>,
    /// Cell memory, `[batch, hidden]`
    pub c: Array2<f32>,
}

impl HiddenState {
    /// Zero state for a batch
    #[must_use]
    pub fn zeros(batch_size: usize, hidden_size: usize) -> Self {
        Self {
            h: Array2::zeros((batch_size, hidden_size)),
            c: Array2::zeros((batch_size, hidden_size)),
        }
    }

    /// Batch dimension
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.h.nrows()
    }
}

/// Single-layer LSTM cell with gate order (input, forget, cell, output)
#[derive(Debug, Clone)]
pub struct LstmCell {
    /// `[4H, in]`
    pub(crate) w_ih: Array2<f32>,
    /// `[4H, H]`
    pub(crate) w_hh: Array2<f32>,
    /// `[4H]`
    pub(crate) b_ih: Array1<f32>,
    /// `[4H]`
    pub(crate) b_hh: Array1<f32>,
    hidden_size: usize,
}

impl LstmCell {
    /// Create a cell with every parameter in U(-1/sqrt(H), 1/sqrt(H))
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (hidden_size.max(1) as f32).sqrt();
        let gates = 4 * hidden_size;
        Self {
            w_ih: Array2::from_shape_fn((gates, input_size), |_| sample_uniform(rng, bound)),
            w_hh: Array2::from_shape_fn((gates, hidden_size), |_| sample_uniform(rng, bound)),
            b_ih: Array1::from_shape_fn(gates, |_| sample_uniform(rng, bound)),
            b_hh: Array1::from_shape_fn(gates, |_| sample_uniform(rng, bound)),
            hidden_size,
        }
    }

    /// Hidden width
    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Input width
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.w_ih.ncols()
    }

    /// Advance one timestep
    pub fn forward(&self, x: ArrayView2<'_, f32>, state: &HiddenState) -> Result<HiddenState> {
        if x.ncols() != self.input_size() {
            return Err(Error::shape("lstm input", self.input_size(), x.ncols()));
        }
        if x.nrows() != state.batch_size() || state.h.ncols() != self.hidden_size {
            return Err(Error::shape(
                "lstm hidden state",
                (x.nrows(), self.hidden_size),
                state.h.dim(),
            ));
        }

        let gates = x.dot(&self.w_ih.t()) + &self.b_ih + state.h.dot(&self.w_hh.t()) + &self.b_hh;
        let hs = self.hidden_size;
        let i = gates.slice(s![.., 0..hs]).mapv(sigmoid);
        let f = gates.slice(s![.., hs..2 * hs]).mapv(sigmoid);
        let g = gates.slice(s![.., 2 * hs..3 * hs]).mapv(f32::tanh);
        let o = gates.slice(s![.., 3 * hs..4 * hs]).mapv(sigmoid);

        let c = &f * &state.c + &i * &g;
        let h = &o * &c.mapv(f32::tanh);
        Ok(HiddenState { h, c })
    }

    /// Number of scalar parameters
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.w_ih.len() + self.w_hh.len() + self.b_ih.len() + self.b_hh.len()
    }

    pub(crate) fn params(&self, prefix: &str) -> Vec<NamedParam<'_>> {
        vec![
            NamedParam {
                name: format!("{prefix}.w_ih"),
                values: self.w_ih.view().into_dyn(),
            },
            NamedParam {
                name: format!("{prefix}.w_hh"),
                values: self.w_hh.view().into_dyn(),
            },
            NamedParam {
                name: format!("{prefix}.b_ih"),
                values: self.b_ih.view().into_dyn(),
            },
            NamedParam {
                name: format!("{prefix}.b_hh"),
                values: self.b_hh.view().into_dyn(),
            },
        ]
    }

    pub(crate) fn params_mut(&mut self, prefix: &str) -> Vec<NamedParamMut<'_>> {
        vec![
            NamedParamMut {
                name: format!("{prefix}.w_ih"),
                values: self.w_ih.view_mut().into_dyn(),
            },
            NamedParamMut {
                name: format!("{prefix}.w_hh"),
                values: self.w_hh.view_mut().into_dyn(),
            },
            NamedParamMut {
                name: format!("{prefix}.b_ih"),
                values: self.b_ih.view_mut().into_dyn(),
            },
            NamedParamMut {
                name: format!("{prefix}.b_hh"),
                values: self.b_hh.view_mut().into_dyn(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_embedding_pad_row_zero() {
        let mut rng = StdRng::seed_from_u64(42);
        let emb = Embedding::new(10, 4, 0, &mut rng);
        let out = emb.forward(&[0, 3]).unwrap();
        assert!(out.row(0).iter().all(|&v| v == 0.0));
        assert!(out.row(1).iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_embedding_out_of_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let emb = Embedding::new(10, 4, 0, &mut rng);
        let err = emb.forward(&[10]).unwrap_err();
        assert!(matches!(
            err,
            Error::TokenOutOfRange {
                token: 10,
                vocab_size: 10
            }
        ));
    }

    #[test]
    fn test_linear_shapes_and_bias() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Linear::new(3, 5, true, &mut rng);
        let x = Array2::<f32>::zeros((2, 3));
        let y = layer.forward(x.view()).unwrap();
        assert_eq!(y.dim(), (2, 5));
        // Zero input yields the bias on every row
        let bias = layer.bias.as_ref().unwrap();
        for row in y.axis_iter(Axis(0)) {
            for (a, b) in row.iter().zip(bias.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
            }
        }
        assert_eq!(layer.num_parameters(), 20);
    }

    #[test]
    fn test_linear_rejects_wrong_width() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Linear::new(3, 5, false, &mut rng);
        let x = Array2::<f32>::zeros((2, 4));
        assert!(matches!(
            layer.forward(x.view()),
            Err(Error::ShapeMismatch { .. })
        ));
        assert_eq!(layer.params("p").len(), 1);
    }

    #[test]
    fn test_lstm_step_shapes_and_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let cell = LstmCell::new(3, 6, &mut rng);
        let state = HiddenState::zeros(2, 6);
        let x = Array2::from_elem((2, 3), 0.5_f32);
        let next = cell.forward(x.view(), &state).unwrap();
        assert_eq!(next.h.dim(), (2, 6));
        assert_eq!(next.c.dim(), (2, 6));
        // h = o * tanh(c) is bounded by 1 in magnitude
        assert!(next.h.iter().all(|v| v.abs() < 1.0));
        assert_eq!(cell.num_parameters(), 4 * 6 * (3 + 6) + 2 * 4 * 6);
    }

    #[test]
    fn test_lstm_batch_rows_independent() {
        let mut rng = StdRng::seed_from_u64(3);
        let cell = LstmCell::new(2, 4, &mut rng);
        let x = ndarray::array![[0.1_f32, -0.2], [0.1, -0.2]];
        let next = cell.forward(x.view(), &HiddenState::zeros(2, 4)).unwrap();
        assert_eq!(next.h.row(0), next.h.row(1));
    }

    #[test]
    fn test_lstm_rejects_state_mismatch() {
        let mut rng = StdRng::seed_from_u64(3);
        let cell = LstmCell::new(2, 4, &mut rng);
        let x = Array2::<f32>::zeros((3, 2));
        let err = cell.forward(x.view(), &HiddenState::zeros(2, 4)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
