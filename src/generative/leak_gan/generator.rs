//! LeakGAN generator: owns the learned parameters.

use ndarray::{s, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::device::ExecutionContext;
use super::goal::{GoalProjection, GoalSchedule};
use super::layers::{NamedParam, NamedParamMut};
use super::policy::{ManagerPolicy, WorkerPolicy};
use crate::config::{validate_config, LeakGanConfig};
use crate::error::{Error, Result};

/// Parameter group addressed by an external optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamGroup {
    /// Manager LSTM, manager-to-goal projection, initial goal
    Manager,
    /// Embedding, worker LSTM, worker-to-goal and goal-to-goal projections
    Worker,
}

/// Hierarchical manager/worker generator steered by leaked discriminator features
///
/// The generator never mutates its own parameters: every forward, loss and
/// sampling entry point borrows `&self`. Updates come from an external
/// optimizer through [`LeakGanGenerator::split_params_mut`].
#[derive(Debug, Clone)]
pub struct LeakGanGenerator {
    /// Configuration
    pub config: LeakGanConfig,
    pub(crate) context: ExecutionContext,
    pub(crate) schedule: GoalSchedule,
    pub(crate) manager: ManagerPolicy,
    pub(crate) worker: WorkerPolicy,
    pub(crate) goal_projection: GoalProjection,
    /// `[batch_size, F]`, one learned initial goal per batch slot
    pub(crate) goal_init: Array2<f32>,
}

impl LeakGanGenerator {
    /// Create a new generator with random initialization
    pub fn new(config: LeakGanConfig) -> Result<Self> {
        let mut rng = StdRng::from_os_rng();
        Self::from_rng(config, &mut rng)
    }

    /// Create a new generator with a seed for reproducibility
    pub fn with_seed(config: LeakGanConfig, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::from_rng(config, &mut rng)
    }

    /// Validate `config`, select the execution context and initialise weights
    pub fn from_rng<R: Rng + ?Sized>(config: LeakGanConfig, rng: &mut R) -> Result<Self> {
        validate_config(&config)?;
        let context = ExecutionContext::select(config.device)?;
        let schedule = GoalSchedule::new(config.step_size)?;
        schedule.check_divides(config.seq_len())?;

        let goal_out_size = config.goal_out_size();
        let manager = ManagerPolicy::new(goal_out_size, config.hidden_size, rng);
        let worker = WorkerPolicy::new(
            config.vocab.size,
            config.embedding_size,
            config.hidden_size,
            config.goal_size,
            config.vocab.pad_idx,
            rng,
        );
        let goal_projection = GoalProjection::new(goal_out_size, config.goal_size, rng);
        let goal_init =
            Array2::from_shape_fn((config.batch_size, goal_out_size), |_| rng.random::<f32>());

        let generator = Self {
            config,
            context,
            schedule,
            manager,
            worker,
            goal_projection,
            goal_init,
        };
        debug!(
            device = %generator.context.device(),
            parameters = generator.num_parameters(),
            "initialised LeakGAN generator"
        );
        Ok(generator)
    }

    /// Execution context every history is allocated in
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Real-goal refresh schedule
    #[must_use]
    pub fn schedule(&self) -> &GoalSchedule {
        &self.schedule
    }

    /// Learned initial goal, `[batch_size, F]`
    #[must_use]
    pub fn goal_init(&self) -> ArrayView2<'_, f32> {
        self.goal_init.view()
    }

    /// Initial goal rows for a batch of `batch` sequences
    pub(crate) fn goal_init_rows(&self, batch: usize) -> Result<ArrayView2<'_, f32>> {
        if batch == 0 || batch > self.goal_init.nrows() {
            return Err(Error::shape(
                "batch size (initial goal slots)",
                format!("1..={}", self.goal_init.nrows()),
                batch,
            ));
        }
        Ok(self.goal_init.slice(s![..batch, ..]))
    }

    /// Total number of scalar parameters
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.manager.num_parameters()
            + self.goal_init.len()
            + self.worker.num_parameters()
            + self.goal_projection.num_parameters()
    }

    /// Manager and worker parameter groups, read-only
    #[must_use]
    pub fn split_params(&self) -> (Vec<NamedParam<'_>>, Vec<NamedParam<'_>>) {
        let mut manager = self.manager.params();
        manager.push(NamedParam {
            name: "goal_init".to_string(),
            values: self.goal_init.view().into_dyn(),
        });
        let mut worker = self.worker.params();
        worker.extend(self.goal_projection.params());
        (manager, worker)
    }

    /// Manager and worker parameter groups, mutable
    pub fn split_params_mut(&mut self) -> (Vec<NamedParamMut<'_>>, Vec<NamedParamMut<'_>>) {
        let mut manager = self.manager.params_mut();
        manager.push(NamedParamMut {
            name: "goal_init".to_string(),
            values: self.goal_init.view_mut().into_dyn(),
        });
        let mut worker = self.worker.params_mut();
        worker.extend(self.goal_projection.params_mut());
        (manager, worker)
    }

    /// Parameters of one group
    #[must_use]
    pub fn parameters(&self, group: ParamGroup) -> Vec<NamedParam<'_>> {
        let (manager, worker) = self.split_params();
        match group {
            ParamGroup::Manager => manager,
            ParamGroup::Worker => worker,
        }
    }

    /// Mutable parameters of one group
    pub fn parameters_mut(&mut self, group: ParamGroup) -> Vec<NamedParamMut<'_>> {
        let (manager, worker) = self.split_params_mut();
        match group {
            ParamGroup::Manager => manager,
            ParamGroup::Worker => worker,
        }
    }
}
