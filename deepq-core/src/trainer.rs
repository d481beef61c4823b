//! Train [`Agent`].
mod config;
mod state;
use crate::{
    error::DeepqError,
    record::{Record, RecordValue::Scalar, Recorder},
    Agent, Env, ExperienceBufferBase, FramePreprocessor, ReplayBufferBase, StackedFrames,
    Transition,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{debug, info, trace, warn};
pub use state::{EpisodeStats, StopSignal, TrainerState, TRAINER_STATE_FILE};
use std::path::{Path, PathBuf};

/// Phase of the training loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The replay buffer is being filled before the first episode.
    Init,

    /// Episodes are being played and the agent is being optimized.
    Running,

    /// A stop signal was observed at an episode boundary.
    Stopped,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop and the objects it drives.
///
/// A trainer is an infinite, lazy [`Iterator`] of [`EpisodeStats`]: every
/// call to [`next`](Iterator::next) plays one episode and returns its
/// statistics. The caller decides when to stop, either by dropping the
/// iterator or by raising the [`StopSignal`] returned by
/// [`Trainer::stop_signal`].
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Init
///     Init --> Running: warmup_steps done
///     Running --> Running: episode finished
///     Running --> Stopped: stop signal at episode boundary
///     Stopped --> [*]
/// ```
///
/// # Warm-up
///
/// On the first call of `next`, the trainer takes `warmup_steps` environment
/// steps with the exploration policy and pushes the transitions to the
/// replay buffer. No optimization happens and no statistics are yielded.
///
/// # Environment step
///
/// In the running phase, one environment step consists of the following:
///
/// 1. The agent samples an action `a_t` for the stacked frames `s_t` given
///    the global step counter `env_steps`.
/// 2. The environment steps with `a_t` and emits a raw frame, `r_t` and `done_t`.
/// 3. The raw frame is preprocessed and appended to the stacked frames,
///    which gives `s_t+1`.
/// 4. The transition `(s_t, a_t, r_t, s_t+1, done_t)` is pushed to the
///    replay buffer.
/// 5. If `env_steps % opt_interval == 0`, the agent performs an optimization
///    step. The agent skips it while the buffer holds fewer transitions than
///    a batch.
/// 6. If `env_steps % update_target_every == 0`, the online parameters are
///    copied into the target estimator.
/// 7. `env_steps += 1`.
///
/// On `done_t`, or after `max_episode_steps` steps, the episode statistics
/// are reported and the environment and stacked frames are reset. The
/// stacked frames start as `n_stack` copies of the first frame.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|action|B[Env]
///     B -->|raw frame|C[FramePreprocessor]
///     C -->|Frame|D[StackedFrames]
///     D -->|Transition|E[ReplayBuffer]
///     E -->|TransitionBatch|A
/// ```
///
/// # Records
///
/// Timestamped [`Record`]s are written to the [`Recorder`]:
/// `env_steps` and `epsilon` every environment step, the record returned by
/// [`Agent::opt_with_record`] with `env_steps` and `opt_steps` added every
/// optimization step, and `episode`, `episode_reward`, `episode_length`,
/// `env_steps` every episode.
///
/// # Checkpoints
///
/// Every `save_interval` episodes, the agent parameters and [`TrainerState`]
/// are saved in `(model_dir)/(episode)/`. A failed write is logged and
/// training goes on. [`Trainer::resume`] restores a checkpoint.
pub struct Trainer<E, P, A, R>
where
    E: Env,
    P: FramePreprocessor<E::Frame>,
    A: Agent<R>,
    R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase,
{
    config: TrainerConfig,
    env: E,
    preprocessor: P,
    agent: A,
    buffer: R,
    recorder: Box<dyn Recorder>,
    stop_signal: StopSignal,
    phase: Phase,
    state: TrainerState,

    /// Warm-up steps left to take.
    warmup_remaining: usize,
}

impl<E, P, A, R> Trainer<E, P, A, R>
where
    E: Env,
    P: FramePreprocessor<E::Frame>,
    A: Agent<R>,
    R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase,
{
    /// Constructs a trainer, the agent is put in training mode.
    ///
    /// Fails with [`DeepqError::InvalidConfiguration`] if the agent and the
    /// environment disagree on the number of actions.
    pub fn build(
        config: TrainerConfig,
        env: E,
        preprocessor: P,
        mut agent: A,
        buffer: R,
        recorder: Box<dyn Recorder>,
    ) -> Result<Self> {
        config.validate()?;
        if agent.n_actions() != env.n_actions() {
            return Err(DeepqError::invalid_config(format!(
                "agent scores {} actions, the environment has {}",
                agent.n_actions(),
                env.n_actions()
            ))
            .into());
        }
        agent.train();
        Ok(Self {
            warmup_remaining: config.warmup_steps,
            config,
            env,
            preprocessor,
            agent,
            buffer,
            recorder,
            stop_signal: StopSignal::new(),
            phase: Phase::Init,
            state: TrainerState::default(),
        })
    }

    /// Returns a handle to stop training at the next episode boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current counters.
    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// The agent being trained.
    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// The agent being trained.
    pub fn agent_mut(&mut self) -> &mut A {
        &mut self.agent
    }

    /// The replay buffer.
    pub fn buffer(&self) -> &R {
        &self.buffer
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Consumes the trainer and returns the agent.
    pub fn into_agent(self) -> A {
        self.agent
    }

    /// Restores the agent parameters and the counters from a checkpoint
    /// directory written by this trainer.
    ///
    /// The replay buffer is not part of checkpoints. It is refilled by a new
    /// warm-up, during which the restored step counter keeps growing.
    pub fn resume(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        self.agent.load_params(dir)?;
        self.state = TrainerState::load(dir.join(TRAINER_STATE_FILE))?;
        self.phase = Phase::Init;
        self.warmup_remaining = self.config.warmup_steps;
        info!(
            "Resumed from {:?} at episode {}, env_steps {}",
            dir, self.state.episode, self.state.env_steps
        );
        Ok(())
    }

    /// Saves the agent parameters and the counters in
    /// `(model_dir)/(episode)/` and returns the directory.
    pub fn checkpoint(&self) -> Result<PathBuf> {
        let model_dir = self
            .config
            .model_dir
            .as_ref()
            .ok_or_else(|| DeepqError::invalid_config("model_dir is not set"))?;
        let dir = Path::new(model_dir).join(self.state.episode.to_string());
        std::fs::create_dir_all(&dir)?;
        self.agent.save_params(&dir)?;
        self.state.save(dir.join(TRAINER_STATE_FILE))?;
        Ok(dir)
    }

    fn reset_episode(&mut self) -> Result<StackedFrames> {
        let raw = self.env.reset().map_err(env_error)?;
        let frame = self.preprocessor.process(&raw)?;
        StackedFrames::filled(frame, self.config.n_stack)
    }

    /// Takes an environment step from `obs` and pushes the transition.
    ///
    /// Returns `(s_t+1, r_t, done_t)`. The step counter is not advanced.
    fn env_step(&mut self, obs: &StackedFrames) -> Result<(StackedFrames, f32, bool)> {
        let env_steps = self.state.env_steps;
        let act = self.agent.sample(obs, env_steps)?;
        let epsilon = self.agent.epsilon(env_steps);
        self.recorder.write(
            Record::from_slice(&[
                ("env_steps", Scalar(env_steps as f32)),
                ("epsilon", Scalar(epsilon as f32)),
            ])
            .timestamped(),
        );

        let step = self.env.step(act).map_err(env_error)?;
        let frame = self.preprocessor.process(&step.obs)?;
        let next_obs = obs.pushed(frame)?;
        trace!(
            "env_steps={} act={} reward={} done={}",
            env_steps,
            act,
            step.reward,
            step.is_done
        );

        self.buffer.push(Transition::new(
            obs.clone(),
            act,
            step.reward,
            next_obs.clone(),
            step.is_done,
        ))?;

        Ok((next_obs, step.reward, step.is_done))
    }

    fn warmup(&mut self) -> Result<()> {
        if self.warmup_remaining > 0 {
            info!("Warm-up: filling the replay buffer for {} steps", self.warmup_remaining);
        }

        let mut obs = None;
        let mut length = 0;
        while self.warmup_remaining > 0 {
            let current = match obs.take() {
                Some(current) => current,
                None => {
                    length = 0;
                    self.reset_episode()?
                }
            };
            let (next_obs, _, done) = self.env_step(&current)?;
            self.state.env_steps += 1;
            self.warmup_remaining -= 1;
            length += 1;

            if !(done || self.is_truncated(length)) {
                obs = Some(next_obs);
            }
        }

        info!(
            "Warm-up finished, {} transitions in the replay buffer",
            self.buffer.len()
        );
        Ok(())
    }

    fn is_truncated(&self, length: usize) -> bool {
        self.config
            .max_episode_steps
            .map_or(false, |max| length >= max)
    }

    fn opt(&mut self) -> Result<()> {
        if let Some(mut record) = self.agent.opt_with_record(&mut self.buffer)? {
            self.state.opt_steps += 1;
            record.insert("env_steps", Scalar(self.state.env_steps as f32));
            record.insert("opt_steps", Scalar(self.state.opt_steps as f32));
            self.recorder.write(record.timestamped());
        }
        Ok(())
    }

    fn run_episode(&mut self) -> Result<EpisodeStats> {
        let mut obs = self.reset_episode()?;
        let mut length = 0;
        let mut cumulative_reward = 0f32;

        loop {
            let (next_obs, reward, done) = self.env_step(&obs)?;

            if self.state.env_steps % self.config.opt_interval == 0 {
                self.opt()?;
            }

            if self.state.env_steps % self.config.update_target_every == 0 {
                self.agent.sync_target()?;
                debug!(
                    "Copied online parameters to the target at env_steps {}",
                    self.state.env_steps
                );
            }

            self.state.env_steps += 1;
            length += 1;
            cumulative_reward += reward;

            if done || self.is_truncated(length) {
                break;
            }
            obs = next_obs;
        }

        let stats = EpisodeStats {
            episode: self.state.episode,
            length,
            cumulative_reward,
            env_steps: self.state.env_steps,
        };
        self.state.episode += 1;

        info!(
            "Episode {}: reward {}, length {}, env_steps {}",
            stats.episode, stats.cumulative_reward, stats.length, stats.env_steps
        );
        self.recorder.write(
            Record::from_slice(&[
                ("episode", Scalar(stats.episode as f32)),
                ("episode_reward", Scalar(stats.cumulative_reward)),
                ("episode_length", Scalar(stats.length as f32)),
                ("env_steps", Scalar(stats.env_steps as f32)),
            ])
            .timestamped(),
        );

        if self.config.save_interval > 0 && self.state.episode % self.config.save_interval == 0 {
            match self.checkpoint() {
                Ok(dir) => info!("Saved a checkpoint in {:?}", dir),
                Err(e) => warn!("Failed to save a checkpoint: {:#}", e),
            }
        }

        Ok(stats)
    }
}

impl<E, P, A, R> Iterator for Trainer<E, P, A, R>
where
    E: Env,
    P: FramePreprocessor<E::Frame>,
    A: Agent<R>,
    R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase,
{
    type Item = Result<EpisodeStats>;

    /// Plays one episode. Errors abort the episode, the next call starts a
    /// new one.
    fn next(&mut self) -> Option<Self::Item> {
        if self.stop_signal.is_stopped() && self.phase != Phase::Stopped {
            info!("Stop signal received after {} episodes", self.state.episode);
            self.phase = Phase::Stopped;
            self.recorder.flush();
        }

        match self.phase {
            Phase::Stopped => return None,
            Phase::Init => {
                if let Err(e) = self.warmup() {
                    return Some(Err(e));
                }
                self.phase = Phase::Running;
            }
            Phase::Running => {}
        }

        Some(self.run_episode())
    }
}

/// Wraps errors surfaced by an environment into [`DeepqError::Environment`].
fn env_error(err: anyhow::Error) -> anyhow::Error {
    match err.downcast_ref::<DeepqError>() {
        Some(DeepqError::Environment(_)) => err,
        _ => DeepqError::Environment(format!("{:#}", err)).into(),
    }
}
