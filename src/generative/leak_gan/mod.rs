//! LeakGAN generator for adversarial text generation
//!
//! A manager/worker policy pair steered by features leaked from the
//! discriminator:
//! - Manager: reads the discriminator feature of the current prefix and
//!   emits a unit-length goal every step
//! - Worker: reads the previous token and scores every (token, goal
//!   dimension) pair; the scores are combined with the projected real goal
//!
//! # Architecture
//!
//! ```text
//!  prefix ─► Discriminator.get_feature ─► Manager LSTM ─► goal ─┐
//!                                                               │ sum of last 4,
//!                                                               │ every step_size
//!                                                               ▼
//!  token ──► Embedding ─► Worker LSTM ─► [V x G] ──· goal2goal(real goal) ─► softmax
//! ```
//!
//! # Example
//!
//! ```rust
//! use entrenar_leakgan::config::{LeakGanConfig, VocabSpec};
//! use entrenar_leakgan::generative::{
//!     DiscriminatorConfig, LeakGanGenerator, PooledDiscriminator, StepLoopOptions,
//! };
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let config = LeakGanConfig {
//!     hidden_size: 8,
//!     embedding_size: 8,
//!     max_seq_length: 7,
//!     filter_nums: vec![4, 4],
//!     goal_size: 4,
//!     batch_size: 2,
//!     vocab: VocabSpec { size: 12, ..VocabSpec::default() },
//!     ..LeakGanConfig::default()
//! };
//! let generator = LeakGanGenerator::with_seed(config, 42).unwrap();
//! let dis = PooledDiscriminator::with_seed(
//!     DiscriminatorConfig {
//!         vocab_size: 12,
//!         embed_dim: 8,
//!         filter_nums: vec![4, 4],
//!         ..DiscriminatorConfig::default()
//!     },
//!     7,
//! );
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let trajectory = generator
//!     .free_running(2, &dis, StepLoopOptions::eval(), &mut rng)
//!     .unwrap();
//! assert_eq!(trajectory.tokens.dim(), (2, 8));
//! ```

mod device;
mod discriminator;
mod generator;
mod goal;
mod layers;
mod loss;
pub(crate) mod ops;
mod policy;
mod rollout;
mod sampling;
mod step_loop;

#[cfg(test)]
mod tests;

pub use device::ExecutionContext;
pub use discriminator::{DiscriminatorConfig, FeatureDiscriminator, PooledDiscriminator};
pub use generator::{LeakGanGenerator, ParamGroup};
pub use goal::{leak_logits, GoalProjection, GoalSchedule, GOAL_WINDOW};
pub use layers::{Embedding, HiddenState, Linear, LstmCell, NamedParam, NamedParamMut};
pub use loss::{manager_cos_loss, worker_cos_reward, worker_nll, CorpusBatch, LossPair};
pub use policy::{ManagerPolicy, RecurrentPolicy, WorkerPolicy};
pub use sampling::truncate_at_end;
pub use step_loop::{OutputForm, StepLoopOptions, Trajectory};
