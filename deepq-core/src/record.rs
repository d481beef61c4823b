//! Records of training events and their sinks.
//!
//! The [`Trainer`](crate::Trainer) reports what happens during training as
//! timestamped [`Record`]s written to a [`Recorder`]:
//!
//! * every environment step: `env_steps`, `epsilon`
//! * every optimization step: `env_steps`, `loss`, `max_value`, `grad_norm`
//! * every finished episode: `episode`, `episode_reward`, `episode_length`,
//!   `env_steps`
//!
//! ```rust
//! use deepq_core::record::{BufferedRecorder, Record, Recorder};
//!
//! let recorder = BufferedRecorder::new();
//! let mut sink: Box<dyn Recorder> = Box::new(recorder.clone());
//! sink.write(Record::from_scalar("epsilon", 1.0).timestamped());
//! assert_eq!(recorder.len(), 1);
//! ```
mod base;
mod buffered_recorder;
mod log_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue, TIMESTAMP_KEY};
pub use buffered_recorder::BufferedRecorder;
pub use log_recorder::LogRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
