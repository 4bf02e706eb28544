//! Goal composition: real-goal refresh schedule, goal projection, and the
//! bilinear combination of worker scores with the projected goal.

use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use rand::Rng;

use super::layers::{Linear, NamedParam, NamedParamMut};
use super::ops::l2_normalize_rows;
use crate::error::{Error, Result};

/// Number of trailing step-goals summed into a real goal
pub const GOAL_WINDOW: usize = 4;

/// Cadence of real-goal refreshes within a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalSchedule {
    step_size: usize,
}

impl GoalSchedule {
    /// Create a schedule refreshing every `step_size` steps
    pub fn new(step_size: usize) -> Result<Self> {
        if step_size == 0 {
            return Err(Error::StepSize {
                step_size,
                seq_len: 0,
            });
        }
        Ok(Self { step_size })
    }

    /// Steps between refreshes
    #[must_use]
    pub fn step_size(&self) -> usize {
        self.step_size
    }

    /// Whether the real goal is recomputed after step `i`
    #[must_use]
    pub fn is_refresh(&self, i: usize) -> bool {
        i > 0 && i % self.step_size == 0
    }

    /// Whether step `i` is the first refresh of the sequence
    #[must_use]
    pub fn is_first_refresh(&self, i: usize) -> bool {
        i == self.step_size
    }

    /// Recompute the real goal after step `i`
    ///
    /// `goals` holds the step-goals `0..=i`. The result is the sum of the
    /// trailing [`GOAL_WINDOW`] goals, plus `goal_init` on the first refresh.
    pub fn refresh(
        &self,
        i: usize,
        goals: &[Array2<f32>],
        goal_init: ArrayView2<'_, f32>,
    ) -> Result<Array2<f32>> {
        if goals.len() <= i {
            return Err(Error::shape("goal history", i + 1, goals.len()));
        }
        let start = (i + 1).saturating_sub(GOAL_WINDOW);
        let mut real_goal = sum_goals(&goals[start..=i], goal_init.raw_dim())?;
        if self.is_first_refresh(i) {
            real_goal += &goal_init;
        }
        Ok(real_goal)
    }

    /// Ensure goal windows tile a sequence of `seq_len` steps exactly
    pub fn check_divides(&self, seq_len: usize) -> Result<()> {
        if seq_len % self.step_size != 0 {
            return Err(Error::StepSize {
                step_size: self.step_size,
                seq_len,
            });
        }
        Ok(())
    }
}

/// Sum a slice of `[batch, width]` goals; `dim` is used when the slice is empty
pub fn sum_goals(goals: &[Array2<f32>], dim: ndarray::Ix2) -> Result<Array2<f32>> {
    let mut total = Array2::zeros(dim);
    for goal in goals {
        if goal.raw_dim() != dim {
            return Err(Error::shape("goal sum", dim, goal.dim()));
        }
        total += goal;
    }
    Ok(total)
}

/// Sum `goals[:, range, :]` of a `[batch, steps, width]` history
pub fn sum_goal_window(goals: ArrayView3<'_, f32>, start: usize, end: usize) -> Array2<f32> {
    let end = end.min(goals.len_of(Axis(1)));
    let start = start.min(end);
    goals
        .slice(ndarray::s![.., start..end, ..])
        .sum_axis(Axis(1))
}

/// Projects the real goal into the worker's goal subspace
#[derive(Debug, Clone)]
pub struct GoalProjection {
    pub(crate) goal2goal: Linear,
}

impl GoalProjection {
    /// Create a bias-free projection from `goal_out_size` to `goal_size`
    pub fn new<R: Rng + ?Sized>(goal_out_size: usize, goal_size: usize, rng: &mut R) -> Self {
        Self {
            goal2goal: Linear::new(goal_out_size, goal_size, false, rng),
        }
    }

    /// Project and L2-normalise: `[batch, F]` to `[batch, G]`
    pub fn project(&self, real_goal: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let projected = self.goal2goal.forward(real_goal)?;
        Ok(l2_normalize_rows(projected.view()))
    }

    /// Number of scalar parameters
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.goal2goal.num_parameters()
    }

    pub(crate) fn params(&self) -> Vec<NamedParam<'_>> {
        self.goal2goal.params("worker.goal2goal")
    }

    pub(crate) fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        self.goal2goal.params_mut("worker.goal2goal")
    }
}

/// Combine worker scores `[batch, V * G]` with a projected goal `[batch, G]`
/// into vocabulary logits `[batch, V]`
pub fn leak_logits(
    work_out: ArrayView2<'_, f32>,
    goal: ArrayView2<'_, f32>,
    vocab_size: usize,
    goal_size: usize,
) -> Result<Array2<f32>> {
    let batch = work_out.nrows();
    if work_out.ncols() != vocab_size * goal_size {
        return Err(Error::shape(
            "worker scores",
            (batch, vocab_size * goal_size),
            work_out.dim(),
        ));
    }
    if goal.dim() != (batch, goal_size) {
        return Err(Error::shape("projected goal", (batch, goal_size), goal.dim()));
    }

    let scores = work_out.to_shape((batch, vocab_size, goal_size))?;
    let mut logits = Array2::zeros((batch, vocab_size));
    for (b, mut row) in logits.axis_iter_mut(Axis(0)).enumerate() {
        row.assign(&scores.index_axis(Axis(0), b).dot(&goal.row(b)));
    }
    Ok(logits)
}
