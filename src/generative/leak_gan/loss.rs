//! Loss assembly for supervised pretraining and adversarial training.
//!
//! Losses are returned as plain scalars together with the per-element terms
//! they are built from; differentiation belongs to the training driver.

use ndarray::{s, Array1, Array2, ArrayView2, ArrayView3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::discriminator::FeatureDiscriminator;
use super::generator::LeakGanGenerator;
use super::goal::{sum_goal_window, GOAL_WINDOW};
use super::ops::{cosine_rows, l2_normalize_rows};
use super::step_loop::{StepLoopOptions, Trajectory};
use crate::error::{Error, Result};

/// Manager and worker losses of one batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossPair {
    /// Manager (goal alignment) loss
    pub manager: f32,
    /// Worker (token) loss
    pub worker: f32,
}

/// One batch of real sequences
#[derive(Debug, Clone)]
pub struct CorpusBatch {
    /// `[B, max_length]`: start token, content, end token, pad
    pub target_idx: Array2<u32>,
    /// Sequence length excluding the start token
    pub target_length: Array1<usize>,
}

impl CorpusBatch {
    /// Targets without the leading start token, `[B, max_length - 1]`
    #[must_use]
    pub fn targets(&self) -> ArrayView2<'_, u32> {
        self.target_idx.slice(s![.., 1..])
    }

    /// Number of sequences
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.target_idx.nrows()
    }
}

/// Negative log-likelihood of each target token, `[B, L]`; zero at pad
pub fn worker_nll(
    targets: ArrayView2<'_, u32>,
    log_probs: ArrayView3<'_, f32>,
    pad_idx: u32,
) -> Result<Array2<f32>> {
    let (batch, seq_len, vocab_size) = log_probs.dim();
    if targets.dim() != (batch, seq_len) {
        return Err(Error::shape("NLL targets", (batch, seq_len), targets.dim()));
    }
    let mut nll = Array2::zeros((batch, seq_len));
    for ((b, t), &target) in targets.indexed_iter() {
        if target == pad_idx {
            continue;
        }
        if target as usize >= vocab_size {
            return Err(Error::TokenOutOfRange {
                token: target,
                vocab_size,
            });
        }
        nll[[b, t]] = -log_probs[[b, t, target as usize]];
    }
    Ok(nll)
}

/// Cosine between the feature displacement across each window and the real
/// goal of that window, `[B, L / step_size]`
///
/// Window `i` spans features `i * step_size ..= (i + 1) * step_size`. Its real
/// goal is `goal_init` for the first window and the sum of the
/// [`GOAL_WINDOW`] step-goals starting at `(i - 1) * step_size + 1` otherwise.
pub fn manager_cos_loss(
    features: ArrayView3<'_, f32>,
    goals: ArrayView3<'_, f32>,
    goal_init: ArrayView2<'_, f32>,
    step_size: usize,
) -> Result<Array2<f32>> {
    let (batch, steps, width) = features.dim();
    check_histories(features, goals, goal_init, step_size)?;
    let num_windows = (steps - 1) / step_size;

    let mut cos = Array2::zeros((batch, num_windows));
    for i in 0..num_windows {
        let idx = i * step_size;
        let sub_feature = &features.index_axis(Axis(1), idx + step_size)
            - &features.index_axis(Axis(1), idx);
        let real_goal = if i == 0 {
            goal_init.to_owned()
        } else {
            let start = (i - 1) * step_size + 1;
            sum_goal_window(goals, start, start + GOAL_WINDOW)
        };
        debug_assert_eq!(real_goal.ncols(), width);
        let column = cosine_rows(
            l2_normalize_rows(sub_feature.view()).view(),
            l2_normalize_rows(real_goal.view()).view(),
        );
        cos.column_mut(i).assign(&Array1::from(column));
    }
    Ok(cos)
}

/// Intrinsic worker reward per position, `[B, L]`
///
/// For position `t` in window `w = t / step_size`, the reward is the cosine
/// between the feature displacement `f[t + 1] - f[w * step_size]` and the
/// goals accumulated over window `w - 1` (the first step-goal for `w = 0`).
pub fn worker_cos_reward(
    features: ArrayView3<'_, f32>,
    goals: ArrayView3<'_, f32>,
    step_size: usize,
) -> Result<Array2<f32>> {
    let (batch, steps, _) = features.dim();
    if goals.dim() != features.dim() {
        return Err(Error::shape("goal history", features.dim(), goals.dim()));
    }
    if step_size == 0 || steps < 2 {
        return Err(Error::StepSize {
            step_size,
            seq_len: steps.saturating_sub(1),
        });
    }
    let seq_len = steps - 1;

    let mut reward = Array2::zeros((batch, seq_len));
    for t in 0..seq_len {
        let w = t / step_size;
        let displacement =
            &features.index_axis(Axis(1), t + 1) - &features.index_axis(Axis(1), w * step_size);
        let goal = if w > 0 {
            sum_goal_window(goals, (w - 1) * step_size, w * step_size)
        } else {
            goals.index_axis(Axis(1), 0).to_owned()
        };
        let column = cosine_rows(
            l2_normalize_rows(displacement.view()).view(),
            l2_normalize_rows(goal.view()).view(),
        );
        reward.column_mut(t).assign(&Array1::from(column));
    }
    Ok(reward)
}

fn check_histories(
    features: ArrayView3<'_, f32>,
    goals: ArrayView3<'_, f32>,
    goal_init: ArrayView2<'_, f32>,
    step_size: usize,
) -> Result<()> {
    let (batch, steps, width) = features.dim();
    if goals.dim() != features.dim() {
        return Err(Error::shape("goal history", features.dim(), goals.dim()));
    }
    if goal_init.dim() != (batch, width) {
        return Err(Error::shape("initial goal", (batch, width), goal_init.dim()));
    }
    let seq_len = steps.saturating_sub(1);
    if step_size == 0 || seq_len == 0 || seq_len % step_size != 0 {
        return Err(Error::StepSize { step_size, seq_len });
    }
    Ok(())
}

impl LeakGanGenerator {
    /// Manager alignment terms of a trajectory, `[B, n_win]`
    pub fn manager_cos(&self, trajectory: &Trajectory) -> Result<Array2<f32>> {
        self.context.ensure_same(trajectory.device)?;
        let goal_init = self.goal_init_rows(trajectory.batch_size())?;
        manager_cos_loss(
            trajectory.features.view(),
            trajectory.goals.view(),
            goal_init,
            self.schedule.step_size(),
        )
    }

    /// Worker intrinsic rewards of a trajectory, `[B, L]`
    pub fn worker_reward(&self, trajectory: &Trajectory) -> Result<Array2<f32>> {
        self.context.ensure_same(trajectory.device)?;
        worker_cos_reward(
            trajectory.features.view(),
            trajectory.goals.view(),
            self.schedule.step_size(),
        )
    }

    /// Per-token NLL of a trajectory against `targets`, `[B, L]`
    pub fn trajectory_nll(
        &self,
        trajectory: &Trajectory,
        targets: ArrayView2<'_, u32>,
    ) -> Result<Array2<f32>> {
        self.context.ensure_same(trajectory.device)?;
        worker_nll(
            targets,
            trajectory.log_probabilities().view(),
            self.config.vocab.pad_idx,
        )
    }

    /// Supervised pretraining losses on real sequences
    pub fn pretrain_loss<D: FeatureDiscriminator + ?Sized>(
        &self,
        corpus: &CorpusBatch,
        dis: &D,
    ) -> Result<LossPair> {
        let batch = corpus.batch_size();
        if corpus.target_length.len() != batch {
            return Err(Error::shape(
                "target lengths",
                batch,
                corpus.target_length.len(),
            ));
        }
        if let Some(b) = corpus.target_length.iter().position(|&len| len == 0) {
            return Err(Error::shape(
                "target length (excluding start token)",
                format!("sequence {b} with length >= 1"),
                0,
            ));
        }

        let targets = corpus.targets();
        let trajectory = self.teacher_forced(targets, dis, StepLoopOptions::eval())?;

        let cos = self.manager_cos(&trajectory)?;
        let manager = -cos.sum() / cos.len() as f32;

        let nll = self.trajectory_nll(&trajectory, targets)?;
        let per_sequence = nll.sum_axis(Axis(1));
        let worker = per_sequence
            .iter()
            .zip(corpus.target_length.iter())
            .map(|(&total, &len)| total / len as f32)
            .sum::<f32>()
            / batch as f32;

        info!(batch, manager, worker, "pretrain loss");
        Ok(LossPair { manager, worker })
    }

    /// Evaluation NLL: per-sequence NLL sum averaged over the batch
    pub fn calculate_loss<D: FeatureDiscriminator + ?Sized>(
        &self,
        corpus: &CorpusBatch,
        dis: &D,
    ) -> Result<f32> {
        let targets = corpus.targets();
        let trajectory = self.teacher_forced(targets, dis, StepLoopOptions::eval())?;
        let nll = self.trajectory_nll(&trajectory, targets)?;
        let loss = nll.sum() / corpus.batch_size() as f32;
        info!(batch = corpus.batch_size(), nll = loss, "evaluation loss");
        Ok(loss)
    }

    /// Adversarial losses of generated sequences `[B, L]` given their
    /// Monte-Carlo rewards `[B, n_win]`
    pub fn get_adv_loss<D: FeatureDiscriminator + ?Sized>(
        &self,
        target: ArrayView2<'_, u32>,
        rewards: ArrayView2<'_, f32>,
        dis: &D,
    ) -> Result<LossPair> {
        let (batch, seq_len) = target.dim();
        let num_windows = self.config.num_windows();
        if rewards.dim() != (batch, num_windows) {
            return Err(Error::shape("rewards", (batch, num_windows), rewards.dim()));
        }

        let trajectory = self.teacher_forced(target, dis, StepLoopOptions::train())?;

        let cos = self.manager_cos(&trajectory)?;
        let manager = -(&rewards * &cos).sum() / (batch * num_windows) as f32;

        let nll = self.trajectory_nll(&trajectory, target)?;
        let intrinsic = self.worker_reward(&trajectory)?;
        let worker = -(&nll * &intrinsic).sum() / (batch * seq_len) as f32;

        info!(batch, manager, worker, "adversarial loss");
        Ok(LossPair { manager, worker })
    }

    /// Sample one batch in training mode, estimate its rewards and assemble
    /// the adversarial losses
    pub fn adversarial_loss<D, R>(&self, dis: &D, rng: &mut R) -> Result<LossPair>
    where
        D: FeatureDiscriminator + ?Sized,
        R: Rng + ?Sized,
    {
        let samples = self.sample(self.config.batch_size, dis, rng, true)?;
        let rewards = self.get_reward(samples.view(), self.config.monte_carlo_num, dis, rng)?;
        self.get_adv_loss(samples.view(), rewards.view(), dis)
    }
}
