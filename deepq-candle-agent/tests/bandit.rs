use anyhow::Result;
use deepq_candle_agent::{
    dqn::{Dqn, DqnConfig, DqnModelConfig, EpsilonGreedy, EpsilonSchedule},
    dueling::{Dueling, DuelingConfig},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
    util::{CriticLoss, OutDim},
};
use deepq_core::{
    record::{BufferedRecorder, NullRecorder, Recorder},
    replay_buffer::{ReplayBuffer, ReplayBufferConfig},
    Agent, Configurable, DeepqError, Env, Frame, IdentityPreprocessor, Policy, ReplayBufferBase,
    StackedFrames, Step, Trainer, TrainerConfig, TrainerState, TRAINER_STATE_FILE,
};
use serde::{de::DeserializeOwned, Serialize};
use tempdir::TempDir;

/// One-step episodes with a constant observation. Action 0 pays `reward`,
/// action 1 pays `-reward`.
struct Bandit {
    reward: f32,
}

#[derive(Clone)]
struct BanditConfig {
    reward: f32,
}

impl Env for Bandit {
    type Config = BanditConfig;
    type Frame = Frame;
    type Info = ();

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            reward: config.reward,
        })
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<Frame> {
        Frame::new([1, 1], vec![1.0])
    }

    fn step(&mut self, act: usize) -> Result<Step<Self>> {
        let reward = match act {
            0 => self.reward,
            _ => -self.reward,
        };
        Ok(Step::new(Frame::new([1, 1], vec![1.0])?, reward, true, ()))
    }
}

fn model_config<Q>(q_config: Q, max_grad_norm: Option<f64>) -> DqnModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    DqnModelConfig::default()
        .q_config(q_config)
        .opt_config(OptimizerConfig::default().learning_rate(0.01))
        .max_grad_norm(max_grad_norm)
}

fn trainer_config() -> TrainerConfig {
    TrainerConfig::default()
        .n_stack(1)
        .warmup_steps(32)
        .update_target_every(10)
}

fn buffer() -> Result<ReplayBuffer> {
    ReplayBuffer::build(&ReplayBufferConfig::default().capacity(1000))
}

type MlpDqn = Dqn<Mlp, ReplayBuffer>;
type DuelingTrainer =
    Trainer<Bandit, IdentityPreprocessor, Dqn<Dueling<Mlp>, ReplayBuffer>, ReplayBuffer>;

#[test]
fn test_bandit_greedy_policy_picks_rewarding_action() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = DqnConfig::default()
        .model_config(model_config(MlpConfig::new(1, vec![16], 2, false), Some(10.0)))
        .batch_size(16)
        .discount_factor(0.9)
        .explorer(EpsilonGreedy::new().schedule(EpsilonSchedule::Exponential { decay_rate: 0.01 }));
    let agent = MlpDqn::build(config)?;
    let env = Bandit::build(&BanditConfig { reward: 1.0 }, 0)?;
    let mut trainer = Trainer::build(
        trainer_config(),
        env,
        IdentityPreprocessor,
        agent,
        buffer()?,
        Box::new(NullRecorder),
    )?;

    let episodes = trainer.by_ref().take(300).collect::<Result<Vec<_>>>()?;
    assert_eq!(episodes.len(), 300);
    assert_eq!(trainer.state().env_steps, 332);

    let mut agent = trainer.into_agent();
    agent.eval();
    let obs = StackedFrames::filled(Frame::new([1, 1], vec![1.0])?, 1)?;
    let q = agent.action_values(&obs)?;
    assert!(q[0] > q[1], "{:?}", q);
    for step in 0..50 {
        assert_eq!(agent.sample(&obs, step)?, 0);
    }
    Ok(())
}

#[test]
fn test_loss_stays_finite_with_huge_rewards() -> Result<()> {
    let config = DqnConfig::default()
        .model_config(model_config(MlpConfig::new(1, vec![16], 2, false), Some(1.0)))
        .batch_size(8)
        .critic_loss(CriticLoss::Mse);
    let agent = MlpDqn::build(config)?;
    let env = Bandit::build(&BanditConfig { reward: 1e6 }, 0)?;
    let recorder = BufferedRecorder::new();
    let mut trainer = Trainer::build(
        trainer_config(),
        env,
        IdentityPreprocessor,
        agent,
        buffer()?,
        Box::new(recorder.clone()),
    )?;

    trainer.by_ref().take(50).collect::<Result<Vec<_>>>()?;

    let records = recorder.records_with("loss");
    assert_eq!(records.len(), 50);
    for record in records.iter() {
        assert!(record.get_scalar("loss")?.is_finite());
        assert!(record.get_scalar("grad_norm")?.is_finite());
    }
    Ok(())
}

#[test]
fn test_dueling_checkpoint_and_resume() -> Result<()> {
    let dir = TempDir::new("dueling")?;
    let model_dir = dir.path().to_str().unwrap().to_string();
    let q_config = DuelingConfig::new(MlpConfig::new(2, vec![8], 8, true), 8, 2);
    let config = DqnConfig::<Dueling<Mlp>>::default()
        .model_config(model_config(q_config, Some(30.0)).opt_config(OptimizerConfig::RmsProp {
            lr: 2e-4,
            alpha: 0.99,
            eps: 1e-8,
        }))
        .batch_size(4)
        .double_dqn(true);
    let trainer_config = TrainerConfig::default()
        .n_stack(2)
        .warmup_steps(4)
        .update_target_every(3)
        .save_interval(5)
        .model_dir(&model_dir);

    let build = || -> Result<DuelingTrainer> {
        Trainer::build(
            trainer_config.clone(),
            Bandit::build(&BanditConfig { reward: 1.0 }, 0)?,
            IdentityPreprocessor,
            Dqn::build(config.clone())?,
            buffer()?,
            Box::new(NullRecorder) as Box<dyn Recorder>,
        )
    };

    let mut trainer = build()?;
    trainer.by_ref().take(10).collect::<Result<Vec<_>>>()?;
    let ckpt = dir.path().join("10");
    for file in [
        "qnet.safetensors",
        "qnet_tgt.safetensors",
        "opt.safetensors",
        TRAINER_STATE_FILE,
    ] {
        assert!(ckpt.join(file).exists(), "{} is missing", file);
    }
    let state = TrainerState::load(ckpt.join(TRAINER_STATE_FILE))?;
    assert_eq!(state.episode, 10);
    assert_eq!(state.env_steps, 14);

    let mut resumed = build()?;
    resumed.resume(&ckpt)?;
    assert_eq!(resumed.agent().n_opts(), trainer.agent().n_opts());
    assert_eq!(resumed.state(), trainer.state());

    let stats = resumed.next().unwrap()?;
    assert_eq!(stats.episode, 10);
    // 4 warm-up steps and one episode step on top of the restored counter
    assert_eq!(stats.env_steps, 19);
    Ok(())
}

#[test]
fn test_extra_network_outputs_are_rejected() -> Result<()> {
    let config = DqnConfig::default()
        .model_config(model_config(MlpConfig::new(1, vec![16], 3, false), None));
    let agent = MlpDqn::build(config)?;
    assert_eq!(agent.n_actions(), 3);
    let env = Bandit::build(&BanditConfig { reward: 1.0 }, 0)?;
    let err = Trainer::build(
        trainer_config(),
        env,
        IdentityPreprocessor,
        agent,
        buffer()?,
        Box::new(NullRecorder),
    )
    .err()
    .unwrap();
    assert!(matches!(
        err.downcast_ref::<DeepqError>(),
        Some(DeepqError::InvalidConfiguration(_))
    ));
    Ok(())
}
