//! Batched sampling and evaluation-time generation.

use ndarray::{concatenate, s, Array2, ArrayViewMut1, Axis};
use rand::Rng;
use tracing::{debug, warn};

use super::discriminator::FeatureDiscriminator;
use super::generator::LeakGanGenerator;
use super::step_loop::StepLoopOptions;
use crate::error::{Error, Result};

/// Replace every token after the first `end_idx` with `pad_idx`
pub fn truncate_at_end(mut sequence: ArrayViewMut1<'_, u32>, end_idx: u32, pad_idx: u32) {
    if let Some(pos) = sequence.iter().position(|&t| t == end_idx) {
        sequence.slice_mut(s![pos + 1..]).fill(pad_idx);
    }
}

impl LeakGanGenerator {
    /// Sample exactly `num` sequences, `[num, L]`
    ///
    /// Whole batches of `batch_size` are generated and the surplus is
    /// dropped. `train` selects the training temperature schedule.
    pub fn sample<D, R>(&self, num: usize, dis: &D, rng: &mut R, train: bool) -> Result<Array2<u32>>
    where
        D: FeatureDiscriminator + ?Sized,
        R: Rng + ?Sized,
    {
        let batch_size = self.config.batch_size;
        let seq_len = self.config.seq_len();
        let num_batches = num.div_ceil(batch_size);
        if num_batches * batch_size > num {
            warn!(
                requested = num,
                generated = num_batches * batch_size,
                "over-generating to fill whole batches"
            );
        }

        let options = StepLoopOptions {
            train,
            ..StepLoopOptions::eval()
        };
        let mut batches = Vec::with_capacity(num_batches);
        for b in 0..num_batches {
            let trajectory = self.free_running(batch_size, dis, options, rng)?;
            if trajectory.tokens.dim() != (batch_size, seq_len) {
                return Err(Error::shape(
                    "sampled batch",
                    (batch_size, seq_len),
                    trajectory.tokens.dim(),
                ));
            }
            debug!(batch = b, "sampled batch");
            batches.push(trajectory.tokens);
        }

        if batches.is_empty() {
            return Ok(Array2::from_elem((0, seq_len), self.config.vocab.pad_idx));
        }
        let views: Vec<_> = batches.iter().map(Array2::view).collect();
        let samples = concatenate(Axis(0), &views)?;
        Ok(samples.slice(s![..num, ..]).to_owned())
    }

    /// Generate `eval_generate_num` sequences as display tokens
    ///
    /// Each sequence is cut after its first end token; the remainder is pad.
    pub fn generate<D, R>(
        &self,
        idx2token: &[String],
        dis: &D,
        rng: &mut R,
    ) -> Result<Vec<Vec<String>>>
    where
        D: FeatureDiscriminator + ?Sized,
        R: Rng + ?Sized,
    {
        let mut samples = self.sample(self.config.eval_generate_num, dis, rng, false)?;
        let vocab = &self.config.vocab;
        for row in samples.axis_iter_mut(Axis(0)) {
            truncate_at_end(row, vocab.end_idx, vocab.pad_idx);
        }

        samples
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .map(|&token| {
                        idx2token
                            .get(token as usize)
                            .cloned()
                            .ok_or(Error::TokenOutOfRange {
                                token,
                                vocab_size: idx2token.len(),
                            })
                    })
                    .collect()
            })
            .collect()
    }
}
