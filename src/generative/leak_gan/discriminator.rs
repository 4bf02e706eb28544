//! Discriminator contract and a small reference implementation.
//!
//! The generator consumes a discriminator only through
//! [`FeatureDiscriminator::get_feature`] (the leaked feature of a prefix) and
//! [`FeatureDiscriminator::score`] (class logits of a full sequence). Both
//! receive pad-filled `[batch, len]` token matrices, including matrices that
//! contain nothing but pad.

use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::layers::{sample_normal, Linear};
use crate::error::{Error, Result};

/// Discriminator seen by the generator
pub trait FeatureDiscriminator {
    /// Width `F` of the leaked feature
    fn feature_dim(&self) -> usize;

    /// Leaked feature of each (possibly partial) sequence, `[batch, F]`
    fn get_feature(&self, tokens: ArrayView2<'_, u32>) -> Result<Array2<f32>>;

    /// Class logits of each sequence, `[batch, num_classes]`
    fn score(&self, tokens: ArrayView2<'_, u32>) -> Result<Array2<f32>>;
}

impl<T: FeatureDiscriminator + ?Sized> FeatureDiscriminator for &T {
    fn feature_dim(&self) -> usize {
        (**self).feature_dim()
    }

    fn get_feature(&self, tokens: ArrayView2<'_, u32>) -> Result<Array2<f32>> {
        (**self).get_feature(tokens)
    }

    fn score(&self, tokens: ArrayView2<'_, u32>) -> Result<Array2<f32>> {
        (**self).score(tokens)
    }
}

/// Configuration for [`PooledDiscriminator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorConfig {
    /// Input vocabulary size
    pub vocab_size: usize,
    /// Embedding dimension for tokens
    pub embed_dim: usize,
    /// Feature widths; the leaked feature is their concatenation
    pub filter_nums: Vec<usize>,
    /// Number of output classes
    pub num_classes: usize,
    /// Padding token, excluded from pooling
    pub pad_idx: u32,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            vocab_size: 5000,
            embed_dim: 64,
            filter_nums: vec![100, 200, 200, 200, 200, 100, 100, 100, 100, 100, 160, 160],
            num_classes: 2,
            pad_idx: 0,
        }
    }
}

/// Reference discriminator: mean-pooled token embeddings passed through one
/// dense bank per filter width (tanh), followed by a linear classifier.
#[derive(Debug, Clone)]
pub struct PooledDiscriminator {
    /// Configuration
    pub config: DiscriminatorConfig,
    embeddings: Array2<f32>,
    banks: Vec<Linear>,
    classifier: Linear,
}

impl PooledDiscriminator {
    /// Create a new discriminator with random initialization
    pub fn new(config: DiscriminatorConfig) -> Self {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::from_os_rng();
        Self::init(config, &mut rng)
    }

    /// Create a new discriminator with a seed for reproducibility
    pub fn with_seed(config: DiscriminatorConfig, seed: u64) -> Self {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        Self::init(config, &mut rng)
    }

    fn init<R: Rng>(config: DiscriminatorConfig, rng: &mut R) -> Self {
        let embed_std = (1.0 / config.embed_dim.max(1) as f32).sqrt();
        let embeddings = Array2::from_shape_fn((config.vocab_size, config.embed_dim), |_| {
            sample_normal(rng) * embed_std
        });
        let banks = config
            .filter_nums
            .iter()
            .map(|&width| Linear::new(config.embed_dim, width, true, rng))
            .collect();
        let feature_dim = config.filter_nums.iter().sum();
        let classifier = Linear::new(feature_dim, config.num_classes, true, rng);
        Self {
            config,
            embeddings,
            banks,
            classifier,
        }
    }

    /// Mean of non-pad token embeddings per row; all-pad rows pool to zero
    fn pool(&self, tokens: ArrayView2<'_, u32>) -> Result<Array2<f32>> {
        let mut pooled = Array2::zeros((tokens.nrows(), self.config.embed_dim));
        for (mut out, row) in pooled.axis_iter_mut(Axis(0)).zip(tokens.axis_iter(Axis(0))) {
            let mut count = 0usize;
            for &token in row.iter().filter(|&&t| t != self.config.pad_idx) {
                if token as usize >= self.config.vocab_size {
                    return Err(Error::TokenOutOfRange {
                        token,
                        vocab_size: self.config.vocab_size,
                    });
                }
                out += &self.embeddings.row(token as usize);
                count += 1;
            }
            if count > 0 {
                out /= count as f32;
            }
        }
        Ok(pooled)
    }

    /// Get number of parameters
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.embeddings.len()
            + self.banks.iter().map(Linear::num_parameters).sum::<usize>()
            + self.classifier.num_parameters()
    }
}

impl FeatureDiscriminator for PooledDiscriminator {
    fn feature_dim(&self) -> usize {
        self.config.filter_nums.iter().sum()
    }

    fn get_feature(&self, tokens: ArrayView2<'_, u32>) -> Result<Array2<f32>> {
        let pooled = self.pool(tokens)?;
        let mut feature = Array2::zeros((tokens.nrows(), self.feature_dim()));
        let mut offset = 0;
        for bank in &self.banks {
            let width = bank.out_dim();
            let activ = bank.forward(pooled.view())?.mapv(f32::tanh);
            feature
                .slice_mut(ndarray::s![.., offset..offset + width])
                .assign(&activ);
            offset += width;
        }
        Ok(feature)
    }

    fn score(&self, tokens: ArrayView2<'_, u32>) -> Result<Array2<f32>> {
        let feature = self.get_feature(tokens)?;
        self.classifier.forward(feature.view())
    }
}
