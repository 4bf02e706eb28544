//! Step loop: drives the manager and worker across a full sequence.
//!
//! One loop serves three callers. Teacher forcing copies every position from
//! the targets, free running samples every position, and a Monte-Carlo
//! rollout copies a prefix and samples the rest. Histories are appended per
//! step and stacked once the loop completes.

use ndarray::{s, stack, Array2, Array3, ArrayView2, Axis};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use super::discriminator::FeatureDiscriminator;
use super::generator::LeakGanGenerator;
use super::goal::leak_logits;
use super::layers::HiddenState;
use super::ops::{log_softmax_rows, softmax_rows};
use super::policy::RecurrentPolicy;
use crate::config::Device;
use crate::error::{Error, Result};

/// Form of the per-step output distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputForm {
    /// Softmax probabilities
    Probabilities,
    /// Log-softmax
    #[default]
    LogProbabilities,
}

/// Caller options of one step-loop invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepLoopOptions {
    /// Output distribution form
    pub form: OutputForm,
    /// Training mode: temperature is 1.0 from step 2 onwards
    pub train: bool,
}

impl StepLoopOptions {
    /// Log-probabilities at the configured temperature
    #[must_use]
    pub fn eval() -> Self {
        Self::default()
    }

    /// Log-probabilities in training mode
    #[must_use]
    pub fn train() -> Self {
        Self {
            form: OutputForm::LogProbabilities,
            train: true,
        }
    }

    /// Same options with the given output form
    #[must_use]
    pub fn with_form(mut self, form: OutputForm) -> Self {
        self.form = form;
        self
    }
}

/// Histories of one step-loop invocation over `L = seq_len` positions
#[derive(Debug, Clone)]
pub struct Trajectory {
    /// Chosen tokens, `[B, L]`
    pub tokens: Array2<u32>,
    /// Leaked feature of the prefix seen at each step, `[B, L + 1, F]`
    pub features: Array3<f32>,
    /// Manager goal emitted at each step, `[B, L + 1, F]`
    pub goals: Array3<f32>,
    /// Real goal conditioning the worker at each step, `[B, L + 1, F]`
    pub real_goals: Array3<f32>,
    /// Worker output distribution per position, `[B, L, V]`
    pub outputs: Array3<f32>,
    /// Form of `outputs`
    pub form: OutputForm,
    /// Device the histories were allocated on
    pub device: Device,
}

impl Trajectory {
    /// Number of sequences
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.tokens.nrows()
    }

    /// Number of positions
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.tokens.ncols()
    }

    /// Outputs as probabilities
    #[must_use]
    pub fn probabilities(&self) -> Array3<f32> {
        match self.form {
            OutputForm::Probabilities => self.outputs.clone(),
            OutputForm::LogProbabilities => self.outputs.mapv(f32::exp),
        }
    }

    /// Outputs as log-probabilities
    #[must_use]
    pub fn log_probabilities(&self) -> Array3<f32> {
        match self.form {
            OutputForm::Probabilities => self.outputs.mapv(f32::ln),
            OutputForm::LogProbabilities => self.outputs.clone(),
        }
    }
}

/// Recurrent state of both policies
struct PolicyState {
    worker: HiddenState,
    manager: HiddenState,
}

/// Result of advancing both policies by one step
struct StepOutput {
    probs: Array2<f32>,
    output: Array2<f32>,
    goal: Array2<f32>,
    state: PolicyState,
}

impl LeakGanGenerator {
    /// Temperature applied to the logits of step `i`
    #[must_use]
    pub fn temperature_at(&self, i: usize, train: bool) -> f32 {
        if train && i > 1 {
            1.0
        } else {
            self.config.temperature
        }
    }

    /// Run the loop with every position copied from `targets` (`[B, L]`)
    ///
    /// Consumes no random draws.
    pub fn teacher_forced<D: FeatureDiscriminator + ?Sized>(
        &self,
        targets: ArrayView2<'_, u32>,
        dis: &D,
        options: StepLoopOptions,
    ) -> Result<Trajectory> {
        let seq_len = self.config.seq_len();
        if targets.ncols() != seq_len {
            return Err(Error::shape(
                "teacher-forced targets",
                (targets.nrows(), seq_len),
                targets.dim(),
            ));
        }
        self.drive(targets, options, dis, None::<&mut StdRng>)
    }

    /// Sample `batch` sequences autoregressively
    pub fn free_running<D, R>(
        &self,
        batch: usize,
        dis: &D,
        options: StepLoopOptions,
        rng: &mut R,
    ) -> Result<Trajectory>
    where
        D: FeatureDiscriminator + ?Sized,
        R: Rng + ?Sized,
    {
        let empty = Array2::<u32>::zeros((batch, 0));
        self.drive(empty.view(), options, dis, Some(rng))
    }

    /// Keep the first `given_num` tokens of `sentences` and sample the rest
    /// in training mode
    pub fn rollout<D, R>(
        &self,
        sentences: ArrayView2<'_, u32>,
        given_num: usize,
        dis: &D,
        rng: &mut R,
    ) -> Result<Trajectory>
    where
        D: FeatureDiscriminator + ?Sized,
        R: Rng + ?Sized,
    {
        let seq_len = self.config.seq_len();
        if sentences.ncols() != seq_len || given_num > seq_len {
            return Err(Error::shape(
                "rollout prefix",
                format!("[B, {seq_len}] with given_num <= {seq_len}"),
                format!("{:?} with given_num {given_num}", sentences.dim()),
            ));
        }
        let options = StepLoopOptions {
            form: OutputForm::Probabilities,
            train: true,
        };
        self.drive(
            sentences.slice(s![.., ..given_num]),
            options,
            dis,
            Some(rng),
        )
    }

    /// Advance manager and worker by one step
    fn step(
        &self,
        i: usize,
        input: &[u32],
        feature: ArrayView2<'_, f32>,
        real_goal: ArrayView2<'_, f32>,
        state: &PolicyState,
        options: StepLoopOptions,
    ) -> Result<StepOutput> {
        let embedded = self.worker.embed(input)?;
        let (goal, manager) = self.manager.advance(&state.manager, feature)?;
        let projected = self.goal_projection.project(real_goal)?;
        let (scores, worker) = self.worker.advance(&state.worker, embedded.view())?;

        let mut logits = leak_logits(
            scores.view(),
            projected.view(),
            self.worker.vocab_size(),
            self.worker.goal_size(),
        )?;
        logits *= self.temperature_at(i, options.train);

        let probs = softmax_rows(logits.view());
        let output = match options.form {
            OutputForm::Probabilities => probs.clone(),
            OutputForm::LogProbabilities => log_softmax_rows(logits.view()),
        };
        Ok(StepOutput {
            probs,
            output,
            goal,
            state: PolicyState { worker, manager },
        })
    }

    /// Run steps `0..=L`; positions `< forced.ncols()` are copied from
    /// `forced`, the rest are drawn from the step distribution
    fn drive<D, R>(
        &self,
        forced: ArrayView2<'_, u32>,
        options: StepLoopOptions,
        dis: &D,
        mut rng: Option<&mut R>,
    ) -> Result<Trajectory>
    where
        D: FeatureDiscriminator + ?Sized,
        R: Rng + ?Sized,
    {
        let (batch, forced_len) = forced.dim();
        let seq_len = self.config.seq_len();
        let feature_dim = self.config.goal_out_size();
        let vocab_size = self.config.vocab.size;

        if forced_len > seq_len {
            return Err(Error::shape("forced prefix length", seq_len, forced_len));
        }
        if dis.feature_dim() != feature_dim {
            return Err(Error::shape(
                "discriminator feature width",
                feature_dim,
                dis.feature_dim(),
            ));
        }
        if let Some(&token) = forced.iter().find(|&&t| t as usize >= vocab_size) {
            return Err(Error::TokenOutOfRange { token, vocab_size });
        }
        let goal_init = self.goal_init_rows(batch)?;

        debug!(
            batch,
            seq_len,
            forced_len,
            train = options.train,
            "running step loop"
        );

        // Unfilled positions stay pad, so `tokens` doubles as the prefix fed
        // to the discriminator.
        let mut tokens = self
            .context
            .tokens(batch, seq_len, self.config.vocab.pad_idx);
        let mut state = PolicyState {
            worker: self.worker.init_hidden(batch),
            manager: self.manager.init_hidden(batch),
        };
        let mut real_goal = goal_init.to_owned();

        let mut features = Vec::with_capacity(seq_len + 1);
        let mut goals = Vec::with_capacity(seq_len + 1);
        let mut real_goals = Vec::with_capacity(seq_len + 1);
        let mut outputs = Vec::with_capacity(seq_len);

        for i in 0..=seq_len {
            let feature = dis.get_feature(tokens.view())?;
            if feature.dim() != (batch, feature_dim) {
                return Err(Error::shape(
                    "leaked feature",
                    (batch, feature_dim),
                    feature.dim(),
                ));
            }
            let input = if i == 0 {
                vec![self.config.vocab.start_idx; batch]
            } else {
                tokens.column(i - 1).to_vec()
            };

            let step = self.step(
                i,
                &input,
                feature.view(),
                real_goal.view(),
                &state,
                options,
            )?;
            state = step.state;
            features.push(feature);
            real_goals.push(real_goal.clone());
            goals.push(step.goal);

            if self.schedule.is_refresh(i) {
                real_goal = self.schedule.refresh(i, &goals, goal_init)?;
            }

            if i < seq_len {
                if i < forced_len {
                    tokens.column_mut(i).assign(&forced.column(i));
                } else {
                    let Some(rng) = rng.as_deref_mut() else {
                        return Err(Error::Sampling {
                            step: i,
                            reason: "no random source for a free position".to_string(),
                        });
                    };
                    let drawn = sample_tokens(step.probs.view(), i, rng)?;
                    tokens.column_mut(i).assign(&ndarray::Array1::from(drawn));
                }
                outputs.push(step.output);
            }
        }

        Ok(Trajectory {
            tokens,
            features: stack_history(&features)?,
            goals: stack_history(&goals)?,
            real_goals: stack_history(&real_goals)?,
            outputs: stack_history(&outputs)?,
            form: options.form,
            device: self.context.device(),
        })
    }
}

/// Stack per-step `[B, W]` entries into `[B, steps, W]`
fn stack_history(entries: &[Array2<f32>]) -> Result<Array3<f32>> {
    let views: Vec<_> = entries.iter().map(Array2::view).collect();
    Ok(stack(Axis(1), &views)?)
}

/// Draw one token per row of a `[B, V]` probability matrix
fn sample_tokens<R: Rng + ?Sized>(
    probs: ArrayView2<'_, f32>,
    step: usize,
    rng: &mut R,
) -> Result<Vec<u32>> {
    probs
        .axis_iter(Axis(0))
        .map(|row| {
            let dist = WeightedIndex::<f32>::new(row.iter().copied()).map_err(|e| Error::Sampling {
                step,
                reason: e.to_string(),
            })?;
            Ok(dist.sample(rng) as u32)
        })
        .collect()
}
