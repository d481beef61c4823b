use anyhow::Result;
use deepq_core::{
    record::{BufferedRecorder, NullRecorder, Record, Recorder, TIMESTAMP_KEY},
    replay_buffer::{ReplayBuffer, ReplayBufferConfig},
    Agent, DeepqError, Env, ExperienceBufferBase, Frame, IdentityPreprocessor, Phase, Policy,
    ReplayBufferBase, StackedFrames, Step, Trainer, TrainerConfig, TrainerState,
    TRAINER_STATE_FILE,
};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path};
use tempdir::TempDir;

/// Episodes of fixed length. The frame holds the step index in the episode,
/// every step yields reward 1.
struct CountingEnv {
    episode_len: usize,
    fail_at: Option<usize>,
    t: usize,
    n_steps: usize,
}

#[derive(Clone)]
struct CountingEnvConfig {
    episode_len: usize,

    /// Fails once at this global step.
    fail_at: Option<usize>,
}

fn frame(v: usize) -> Frame {
    Frame::new([1, 1], vec![v as f32]).unwrap()
}

impl Env for CountingEnv {
    type Config = CountingEnvConfig;
    type Frame = Frame;
    type Info = ();

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            episode_len: config.episode_len,
            fail_at: config.fail_at,
            t: 0,
            n_steps: 0,
        })
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<Frame> {
        self.t = 0;
        Ok(frame(0))
    }

    fn step(&mut self, _act: usize) -> Result<Step<Self>> {
        if self.fail_at == Some(self.n_steps) {
            self.fail_at = None;
            anyhow::bail!("emulator crashed");
        }
        self.n_steps += 1;
        self.t += 1;
        Ok(Step::new(frame(self.t), 1.0, self.t == self.episode_len, ()))
    }
}

/// Agent optimizing on batches of 4 and counting what the trainer asks.
#[derive(Default, Serialize, Deserialize, PartialEq, Debug)]
struct CountingAgent {
    n_opts: usize,
    n_syncs: usize,
    n_samples: usize,
    #[serde(skip)]
    is_train: bool,
    #[serde(skip)]
    n_actions: usize,
}

impl CountingAgent {
    fn new(n_actions: usize) -> Self {
        Self {
            n_actions,
            ..Self::default()
        }
    }
}

impl Policy for CountingAgent {
    fn sample(&mut self, _obs: &StackedFrames, _env_steps: usize) -> Result<usize> {
        self.n_samples += 1;
        Ok(self.n_samples % 2)
    }
}

impl Agent<ReplayBuffer> for CountingAgent {
    fn train(&mut self) {
        self.is_train = true;
    }

    fn eval(&mut self) {
        self.is_train = false;
    }

    fn is_train(&self) -> bool {
        self.is_train
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn epsilon(&self, env_steps: usize) -> f64 {
        1.0 / (1.0 + env_steps as f64)
    }

    fn opt_with_record(&mut self, buffer: &mut ReplayBuffer) -> Result<Option<Record>> {
        match buffer.batch(4) {
            Ok(batch) => {
                self.n_opts += 1;
                Ok(Some(Record::from_scalar("loss", batch.reward.iter().sum())))
            }
            Err(e) if DeepqError::is_insufficient_data(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn sync_target(&mut self) -> Result<()> {
        self.n_syncs += 1;
        Ok(())
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path.join("agent.yaml"))?;
        file.write_all(serde_yaml::to_string(self)?.as_bytes())?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path.join("agent.yaml"))?;
        *self = Self {
            is_train: true,
            n_actions: self.n_actions,
            ..serde_yaml::from_reader(file)?
        };
        Ok(())
    }
}

type CountingTrainer = Trainer<CountingEnv, IdentityPreprocessor, CountingAgent, ReplayBuffer>;

fn trainer(
    config: TrainerConfig,
    env_config: CountingEnvConfig,
    recorder: Box<dyn Recorder>,
) -> Result<CountingTrainer> {
    let env = CountingEnv::build(&env_config, 0)?;
    let buffer = ReplayBuffer::build(&ReplayBufferConfig::default().capacity(100))?;
    Trainer::build(
        config,
        env,
        IdentityPreprocessor,
        CountingAgent::new(2),
        buffer,
        recorder,
    )
}

fn env_config(episode_len: usize) -> CountingEnvConfig {
    CountingEnvConfig {
        episode_len,
        fail_at: None,
    }
}

#[test]
fn test_warmup_fills_buffer_and_advances_steps() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = TrainerConfig::default().n_stack(2).warmup_steps(5);
    let mut trainer = trainer(config, env_config(3), Box::new(NullRecorder))?;
    assert_eq!(trainer.phase(), Phase::Init);
    assert!(trainer.agent().is_train());

    let stats = trainer.next().unwrap()?;
    assert_eq!(trainer.phase(), Phase::Running);
    assert_eq!(stats.episode, 0);
    assert_eq!(stats.length, 3);
    assert_eq!(stats.cumulative_reward, 3.0);
    assert_eq!(stats.env_steps, 8);
    assert_eq!(trainer.buffer().len(), 8);

    // No optimization during warm-up: 8 transitions, opt from the 4th on.
    assert_eq!(trainer.state().opt_steps, 3);
    Ok(())
}

#[test]
fn test_stacked_frames_in_transitions() -> Result<()> {
    let config = TrainerConfig::default().n_stack(3);
    let mut trainer = trainer(config, env_config(4), Box::new(NullRecorder))?;
    trainer.next().unwrap()?;

    let trs = trainer.buffer().iter().collect::<Vec<_>>();
    assert_eq!(trs.len(), 4);
    assert_eq!(trs[0].state.to_vec(), vec![0.0, 0.0, 0.0]);
    assert_eq!(trs[0].next_state.to_vec(), vec![0.0, 0.0, 1.0]);
    assert_eq!(trs[2].next_state.to_vec(), vec![1.0, 2.0, 3.0]);
    assert_eq!(trs[3].next_state.to_vec(), vec![2.0, 3.0, 4.0]);
    assert!(trs[..3].iter().all(|tr| !tr.done));
    assert!(trs[3].done);
    Ok(())
}

#[test]
fn test_episodes_are_unbounded_until_stop_signal() -> Result<()> {
    let mut trainer = trainer(TrainerConfig::default(), env_config(2), Box::new(NullRecorder))?;
    let stop = trainer.stop_signal();

    let episodes = trainer.by_ref().take(5).collect::<Result<Vec<_>>>()?;
    assert_eq!(
        episodes.iter().map(|s| s.episode).collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );
    assert_eq!(episodes[4].env_steps, 10);

    stop.stop();
    assert!(trainer.next().is_none());
    assert!(trainer.next().is_none());
    assert_eq!(trainer.phase(), Phase::Stopped);
    assert_eq!(trainer.state().episode, 5);
    Ok(())
}

#[test]
fn test_target_sync_cadence() -> Result<()> {
    let config = TrainerConfig::default().update_target_every(4);
    let mut trainer = trainer(config, env_config(5), Box::new(NullRecorder))?;
    trainer.next().unwrap()?;
    trainer.next().unwrap()?;

    // Steps 0..10, synchronized at 0, 4 and 8.
    assert_eq!(trainer.state().env_steps, 10);
    assert_eq!(trainer.agent().n_syncs, 3);
    Ok(())
}

#[test]
fn test_warmup_steps_do_not_sync() -> Result<()> {
    let config = TrainerConfig::default()
        .warmup_steps(8)
        .update_target_every(4);
    let mut trainer = trainer(config, env_config(2), Box::new(NullRecorder))?;
    trainer.next().unwrap()?;

    // Warm-up covers steps 0..8, the episode steps 8 and 9.
    assert_eq!(trainer.agent().n_syncs, 1);
    assert_eq!(trainer.agent().n_samples, 10);
    Ok(())
}

#[test]
fn test_opt_interval() -> Result<()> {
    let config = TrainerConfig::default().opt_interval(2);
    let mut trainer = trainer(config, env_config(10), Box::new(NullRecorder))?;
    trainer.next().unwrap()?;

    // Steps 4, 6 and 8 have at least 4 transitions.
    assert_eq!(trainer.state().opt_steps, 3);
    assert_eq!(trainer.agent().n_opts, 3);
    Ok(())
}

#[test]
fn test_environment_error_aborts_episode() -> Result<()> {
    let env_config = CountingEnvConfig {
        episode_len: 3,
        fail_at: Some(4),
    };
    let mut trainer = trainer(TrainerConfig::default(), env_config, Box::new(NullRecorder))?;

    let stats = trainer.next().unwrap()?;
    assert_eq!(stats.length, 3);

    let err = trainer.next().unwrap().unwrap_err();
    match err.downcast_ref::<DeepqError>() {
        Some(DeepqError::Environment(msg)) => assert!(msg.contains("emulator crashed")),
        e => panic!("unexpected error {:?}", e),
    }

    // The next episode starts from a fresh reset.
    let stats = trainer.next().unwrap()?;
    assert_eq!(stats.episode, 1);
    assert_eq!(stats.length, 3);
    assert_eq!(stats.cumulative_reward, 3.0);
    Ok(())
}

#[test]
fn test_max_episode_steps() -> Result<()> {
    let config = TrainerConfig::default().max_episode_steps(4);
    let mut trainer = trainer(config, env_config(usize::MAX), Box::new(NullRecorder))?;
    let stats = trainer.next().unwrap()?;
    assert_eq!(stats.length, 4);
    assert!(trainer.buffer().iter().all(|tr| !tr.done));
    Ok(())
}

#[test]
fn test_records() -> Result<()> {
    let recorder = BufferedRecorder::new();
    let config = TrainerConfig::default().warmup_steps(2);
    let mut trainer = trainer(config, env_config(3), Box::new(recorder.clone()))?;
    trainer.by_ref().take(2).collect::<Result<Vec<_>>>()?;

    let epsilons = recorder.records_with("epsilon");
    assert_eq!(epsilons.len(), 8);
    for (i, r) in epsilons.iter().enumerate() {
        assert_eq!(r.get_scalar("env_steps")?, i as f32);
        assert_eq!(r.get_scalar("epsilon")?, 1.0 / (1.0 + i as f32));
        assert!(r.get_datetime(TIMESTAMP_KEY).is_ok());
    }

    let losses = recorder.records_with("loss");
    assert_eq!(losses.len(), trainer.state().opt_steps);
    // Batches of 4 are available from step 3 on.
    assert_eq!(losses.len(), 5);
    assert_eq!(losses[0].get_scalar("env_steps")?, 3.0);
    assert_eq!(losses[0].get_scalar("opt_steps")?, 1.0);

    let episodes = recorder.records_with("episode_reward");
    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes[1].get_scalar("episode")?, 1.0);
    assert_eq!(episodes[1].get_scalar("episode_length")?, 3.0);
    assert_eq!(episodes[1].get_scalar("env_steps")?, 8.0);
    Ok(())
}

#[test]
fn test_checkpoint_and_resume() -> Result<()> {
    let dir = TempDir::new("trainer_checkpoint")?;
    let model_dir = dir.path().to_str().unwrap().to_string();
    let config = TrainerConfig::default()
        .update_target_every(2)
        .save_interval(2)
        .model_dir(&model_dir);

    let mut trainer = trainer(config.clone(), env_config(3), Box::new(NullRecorder))?;
    trainer.by_ref().take(4).collect::<Result<Vec<_>>>()?;
    assert!(dir.path().join("2").join(TRAINER_STATE_FILE).is_file());
    assert!(!dir.path().join("3").exists());
    let ckpt = dir.path().join("4");
    assert_eq!(
        TrainerState::load(ckpt.join(TRAINER_STATE_FILE))?,
        trainer.state()
    );

    let mut resumed = self::trainer(config, env_config(3), Box::new(NullRecorder))?;
    resumed.resume(&ckpt)?;
    assert_eq!(resumed.state(), trainer.state());
    assert_eq!(resumed.agent(), trainer.agent());

    // The step counter continues from the restored value.
    let stats = resumed.next().unwrap()?;
    assert_eq!(stats.episode, 4);
    assert_eq!(stats.env_steps, 15);
    Ok(())
}

#[test]
fn test_failed_checkpoint_does_not_stop_training() -> Result<()> {
    let dir = TempDir::new("trainer_checkpoint_fail")?;
    // A file where the model directory should be.
    let blocker = dir.path().join("blocker");
    File::create(&blocker)?;
    let config = TrainerConfig::default()
        .save_interval(1)
        .model_dir(blocker.to_str().unwrap());

    let mut trainer = trainer(config, env_config(2), Box::new(NullRecorder))?;
    assert!(trainer.next().unwrap().is_ok());
    assert!(trainer.next().unwrap().is_ok());
    Ok(())
}

#[test]
fn test_action_count_mismatch_is_rejected() -> Result<()> {
    for n_actions in [1, 3] {
        let env = CountingEnv::build(&env_config(3), 0)?;
        let buffer = ReplayBuffer::build(&ReplayBufferConfig::default())?;
        let err = Trainer::build(
            TrainerConfig::default(),
            env,
            IdentityPreprocessor,
            CountingAgent::new(n_actions),
            buffer,
            Box::new(NullRecorder),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<DeepqError>(),
            Some(DeepqError::InvalidConfiguration(_))
        ));
    }
    Ok(())
}
