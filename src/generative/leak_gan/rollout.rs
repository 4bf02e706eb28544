//! Monte-Carlo reward estimation.

use ndarray::{Array2, ArrayView2};
use rand::Rng;
use tracing::{debug, info};

use super::discriminator::FeatureDiscriminator;
use super::generator::LeakGanGenerator;
use super::ops::softmax_rows;
use crate::config::ValidationError;
use crate::error::{Error, Result};

impl LeakGanGenerator {
    /// First kept position of each rollout checkpoint: `t * step_size + 1`
    #[must_use]
    pub fn checkpoints(&self) -> Vec<usize> {
        let step_size = self.schedule.step_size();
        (0..self.config.num_windows())
            .map(|t| t * step_size + 1)
            .collect()
    }

    /// Expected reward of each sequence at each checkpoint, `[B, n_win]`
    ///
    /// For every checkpoint the sequences are truncated, completed
    /// `rollout_num` times, and scored; the reward is the discriminator's
    /// probability of `reward_class`, averaged over the rollouts.
    pub fn get_reward<D, R>(
        &self,
        sentences: ArrayView2<'_, u32>,
        rollout_num: usize,
        dis: &D,
        rng: &mut R,
    ) -> Result<Array2<f32>>
    where
        D: FeatureDiscriminator + ?Sized,
        R: Rng + ?Sized,
    {
        if rollout_num == 0 {
            return Err(ValidationError::InvalidRolloutNum(rollout_num).into());
        }
        let batch = sentences.nrows();
        let checkpoints = self.checkpoints();
        let reward_class = self.config.reward_class;

        let mut rewards = self.context.zeros(batch, checkpoints.len());
        for r in 0..rollout_num {
            for (t, &given_num) in checkpoints.iter().enumerate() {
                let completed = self.rollout(sentences, given_num, dis, rng)?;
                let logits = dis.score(completed.tokens.view())?;
                if logits.nrows() != batch || reward_class >= logits.ncols() {
                    return Err(Error::Discriminator(format!(
                        "score shape {:?} cannot supply class {reward_class} for {batch} sequences",
                        logits.dim()
                    )));
                }
                let probs = softmax_rows(logits.view());
                let mut column = rewards.column_mut(t);
                column += &probs.column(reward_class);
                debug!(rollout = r, checkpoint = t, given_num, "scored rollout");
            }
        }
        rewards /= rollout_num as f32;

        info!(
            batch,
            rollout_num,
            mean_reward = rewards.mean().unwrap_or(0.0),
            "estimated Monte-Carlo rewards"
        );
        Ok(rewards)
    }
}
