#![warn(missing_docs)]
//! Core of deep Q-learning from stacked frames.
//!
//! This crate holds the pieces that do not depend on a tensor backend:
//!
//! * [`Frame`] and [`StackedFrames`], the observation of an agent,
//! * [`Transition`] and the fixed-capacity [`ReplayBuffer`] with uniform or
//!   prioritized sampling,
//! * the [`Env`], [`FramePreprocessor`], [`Policy`] and [`Agent`] traits,
//! * [`Trainer`], the training loop yielding [`EpisodeStats`],
//! * [`record`], timestamped records of training events.
//!
//! [`ReplayBuffer`]: replay_buffer::ReplayBuffer
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Agent, Configurable, Env, ExperienceBufferBase, Policy, ReplayBufferBase, Step,
};

mod frame;
pub use frame::{Frame, FramePreprocessor, IdentityPreprocessor, StackedFrames};

pub use error::DeepqError;
pub use replay_buffer::{Transition, TransitionBatch};

mod trainer;
pub use trainer::{
    EpisodeStats, Phase, StopSignal, Trainer, TrainerConfig, TrainerState, TRAINER_STATE_FILE,
};
