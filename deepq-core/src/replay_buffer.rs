//! Fixed-capacity experience replay.
//!
//! [`ReplayBuffer`] is a ring of [`Transition`]s with a write cursor. Once the
//! buffer is full, every insertion overwrites the oldest transition. Batches
//! are sampled either uniformly with replacement or, when a [`PerConfig`] is
//! given, proportionally to per-slot priorities with importance-sampling
//! weights (prioritized experience replay, PER).
//!
//! # Examples
//!
//! ```rust
//! use deepq_core::{
//!     replay_buffer::{PerConfig, ReplayBuffer, ReplayBufferConfig, WeightNormalizer},
//!     ReplayBufferBase,
//! };
//!
//! let config = ReplayBufferConfig::default()
//!     .capacity(10000)
//!     .seed(42)
//!     .per_config(Some(PerConfig::default()
//!         .alpha(0.6)
//!         .beta_0(0.4)
//!         .normalize(WeightNormalizer::All)));
//!
//! let buffer = ReplayBuffer::build(&config).unwrap();
//! ```
mod base;
mod batch;
mod config;
mod iw_scheduler;
mod sum_tree;
mod transition;
pub use base::ReplayBuffer;
pub use batch::TransitionBatch;
pub use config::{PerConfig, ReplayBufferConfig};
pub use iw_scheduler::IwScheduler;
pub use sum_tree::{SumTree, WeightNormalizer};
pub use transition::Transition;
