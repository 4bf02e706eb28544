//! Manager and worker policies.
//!
//! Both policies share the [`RecurrentPolicy`] contract: given the previous
//! recurrent state and a `[batch, in]` input, produce a `[batch, out]` output
//! and the next state. Neither policy keeps state between calls.

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::layers::{Embedding, HiddenState, Linear, LstmCell, NamedParam, NamedParamMut};
use super::ops::l2_normalize_rows;
use crate::error::Result;

/// Step contract shared by the manager and the worker
pub trait RecurrentPolicy {
    /// Advance one step
    fn advance(
        &self,
        hidden: &HiddenState,
        input: ArrayView2<'_, f32>,
    ) -> Result<(Array2<f32>, HiddenState)>;

    /// Recurrent state width
    fn hidden_size(&self) -> usize;

    /// Fresh zero state for a new sequence
    fn init_hidden(&self, batch_size: usize) -> HiddenState {
        HiddenState::zeros(batch_size, self.hidden_size())
    }
}

/// Manager: reads the leaked discriminator feature and emits a unit-length goal
#[derive(Debug, Clone)]
pub struct ManagerPolicy {
    pub(crate) lstm: LstmCell,
    pub(crate) mana2goal: Linear,
}

impl ManagerPolicy {
    /// Create a manager over features of width `goal_out_size`
    pub fn new<R: Rng + ?Sized>(goal_out_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        Self {
            lstm: LstmCell::new(goal_out_size, hidden_size, rng),
            mana2goal: Linear::new(hidden_size, goal_out_size, true, rng),
        }
    }

    /// Goal width
    #[must_use]
    pub fn goal_out_size(&self) -> usize {
        self.mana2goal.out_dim()
    }

    /// Number of scalar parameters
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.lstm.num_parameters() + self.mana2goal.num_parameters()
    }

    pub(crate) fn params(&self) -> Vec<NamedParam<'_>> {
        let mut params = self.lstm.params("manager.lstm");
        params.extend(self.mana2goal.params("manager.mana2goal"));
        params
    }

    pub(crate) fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        let mut params = self.lstm.params_mut("manager.lstm");
        params.extend(self.mana2goal.params_mut("manager.mana2goal"));
        params
    }
}

impl RecurrentPolicy for ManagerPolicy {
    /// `input` is the leaked feature `[batch, F]`; output is the goal `[batch, F]`
    fn advance(
        &self,
        hidden: &HiddenState,
        input: ArrayView2<'_, f32>,
    ) -> Result<(Array2<f32>, HiddenState)> {
        let next = self.lstm.forward(input, hidden)?;
        let goal = self.mana2goal.forward(next.h.view())?;
        Ok((l2_normalize_rows(goal.view()), next))
    }

    fn hidden_size(&self) -> usize {
        self.lstm.hidden_size()
    }
}

/// Worker: reads the previous token and emits per-token goal-subspace scores
#[derive(Debug, Clone)]
pub struct WorkerPolicy {
    pub(crate) embedding: Embedding,
    pub(crate) lstm: LstmCell,
    pub(crate) work2goal: Linear,
    goal_size: usize,
}

impl WorkerPolicy {
    /// Create a worker emitting `[batch, vocab_size * goal_size]` scores
    pub fn new<R: Rng + ?Sized>(
        vocab_size: usize,
        embedding_size: usize,
        hidden_size: usize,
        goal_size: usize,
        pad_idx: u32,
        rng: &mut R,
    ) -> Self {
        Self {
            embedding: Embedding::new(vocab_size, embedding_size, pad_idx, rng),
            lstm: LstmCell::new(embedding_size, hidden_size, rng),
            work2goal: Linear::new(hidden_size, vocab_size * goal_size, true, rng),
            goal_size,
        }
    }

    /// Embed the current input tokens
    pub fn embed(&self, tokens: &[u32]) -> Result<Array2<f32>> {
        self.embedding.forward(tokens)
    }

    /// Vocabulary size
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.embedding.vocab_size()
    }

    /// Goal subspace size
    #[must_use]
    pub fn goal_size(&self) -> usize {
        self.goal_size
    }

    /// Number of scalar parameters
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.embedding.weight.len() + self.lstm.num_parameters() + self.work2goal.num_parameters()
    }

    pub(crate) fn params(&self) -> Vec<NamedParam<'_>> {
        let mut params = self.embedding.params("worker.embedding");
        params.extend(self.lstm.params("worker.lstm"));
        params.extend(self.work2goal.params("worker.work2goal"));
        params
    }

    pub(crate) fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        let mut params = self.embedding.params_mut("worker.embedding");
        params.extend(self.lstm.params_mut("worker.lstm"));
        params.extend(self.work2goal.params_mut("worker.work2goal"));
        params
    }
}

impl RecurrentPolicy for WorkerPolicy {
    /// `input` is the embedded token `[batch, E]`; output is `[batch, V * G]`
    fn advance(
        &self,
        hidden: &HiddenState,
        input: ArrayView2<'_, f32>,
    ) -> Result<(Array2<f32>, HiddenState)> {
        let next = self.lstm.forward(input, hidden)?;
        let scores = self.work2goal.forward(next.h.view())?;
        Ok((scores, next))
    }

    fn hidden_size(&self) -> usize {
        self.lstm.hidden_size()
    }
}
