//! DQN agent implemented with candle.
use super::{
    config::DqnConfig,
    explorer::{greedy_action, EpsilonGreedy},
    model::DqnModel,
};
use crate::{
    model::SubModel1,
    util::{td_target, CriticLoss, OutDim},
};
use anyhow::Result;
use candle_core::{shape::D, Device, Tensor};
use deepq_core::{
    record::{Record, RecordValue},
    Agent, Configurable, DeepqError, Policy, ReplayBufferBase, StackedFrames, TransitionBatch,
};
use log::{info, trace};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, marker::PhantomData, path::Path};

const QNET_FILE: &str = "qnet.safetensors";
const QNET_TGT_FILE: &str = "qnet_tgt.safetensors";
const OPT_FILE: &str = "opt.safetensors";

#[allow(clippy::upper_case_acronyms)]
/// DQN agent implemented with candle.
///
/// `qnet` is trained by gradient steps on batches sampled from the replay
/// buffer. `qnet_tgt` has the same architecture and independent parameters,
/// overwritten with those of `qnet` in [`Agent::sync_target`].
///
/// With a dueling network as `Q`, this is the Dueling-DQN agent.
pub struct Dqn<Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch>,
{
    pub(in crate::dqn) qnet: DqnModel<Q>,
    pub(in crate::dqn) qnet_tgt: DqnModel<Q>,
    pub(in crate::dqn) batch_size: usize,
    pub(in crate::dqn) discount_factor: f64,
    pub(in crate::dqn) double_dqn: bool,
    pub(in crate::dqn) critic_loss: CriticLoss,
    pub(in crate::dqn) explorer: EpsilonGreedy,
    pub(in crate::dqn) train: bool,
    pub(in crate::dqn) device: Device,
    pub(in crate::dqn) n_opts: usize,
    rng: SmallRng,
    phantom: PhantomData<R>,
}

/// Result of a gradient step on a batch.
struct CriticUpdate {
    loss: f32,
    max_value: f32,
    grad_norm: f32,

    /// Absolute TD errors, computed only for weighted batches.
    td_errs: Option<Vec<f32>>,
}

fn action_values<Q>(qnet: &DqnModel<Q>, device: &Device, obs: &StackedFrames) -> Result<Vec<f32>>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    let obs = Tensor::from_vec(obs.to_vec(), obs.shape().to_vec(), device)?.unsqueeze(0)?;
    Ok(qnet.predict(&obs)?.squeeze(0)?.to_vec1::<f32>()?)
}

impl<Q, R> Dqn<Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch>,
{
    /// Action values of a single observation.
    pub fn action_values(&self, obs: &StackedFrames) -> Result<Vec<f32>> {
        action_values(&self.qnet, &self.device, obs)
    }

    /// The online estimator.
    pub fn qnet(&self) -> &DqnModel<Q> {
        &self.qnet
    }

    /// The target estimator.
    pub fn qnet_tgt(&self) -> &DqnModel<Q> {
        &self.qnet_tgt
    }

    /// Number of optimization steps performed.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Max of the target estimator over actions for the next observations.
    ///
    /// With double DQN the action is chosen by the online estimator and
    /// evaluated by the target estimator.
    fn next_values(&self, next_obs: &Tensor) -> Result<Tensor> {
        let q_tgt = self.qnet_tgt.predict(next_obs)?.detach();
        let v = match self.double_dqn {
            true => {
                let act = self
                    .qnet
                    .predict(next_obs)?
                    .detach()
                    .argmax_keepdim(D::Minus1)?;
                q_tgt.gather(&act, D::Minus1)?.squeeze(D::Minus1)?
            }
            false => q_tgt.max(D::Minus1)?,
        };
        Ok(v)
    }

    fn update_critic(&mut self, batch: TransitionBatch) -> Result<CriticUpdate> {
        let obs_shape = batch.obs_shape().to_vec();
        let n = obs_shape[0];
        let (obs, act, next_obs, reward, is_done, _ixs, weight) = batch.unpack();
        let obs = Tensor::from_vec(obs, obs_shape.clone(), &self.device)?;
        let next_obs = Tensor::from_vec(next_obs, obs_shape, &self.device)?;
        let act = Tensor::from_vec(act, n, &self.device)?;
        let reward = Tensor::from_vec(reward, n, &self.device)?;
        let is_done = {
            let is_done = is_done.into_iter().map(u8::from).collect::<Vec<_>>();
            Tensor::from_vec(is_done, n, &self.device)?
        };
        let weight = match weight {
            Some(w) => Some(Tensor::from_vec(w, n, &self.device)?),
            None => None,
        };

        let pred = self.qnet.select_action_value(&obs, &act)?;
        let tgt = {
            let next_v = self.next_values(&next_obs)?;
            td_target(&reward, &is_done, &next_v, self.discount_factor)?.detach()
        };
        let loss = self.critic_loss.loss(&pred, &tgt, weight.as_ref())?;

        let td_errs = match weight {
            Some(_) => Some((&pred - &tgt)?.abs()?.to_vec1::<f32>()?),
            None => None,
        };
        let max_value = pred.max(0)?.to_scalar::<f32>()?;
        let grad_norm = self.qnet.update(&loss)?;

        Ok(CriticUpdate {
            loss: loss.to_scalar::<f32>()?,
            max_value,
            grad_norm,
            td_errs,
        })
    }
}

impl<Q, R> Policy for Dqn<Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch>,
{
    /// In evaluation mode, always takes the greedy action.
    fn sample(&mut self, obs: &StackedFrames, env_steps: usize) -> Result<usize> {
        if !self.train {
            return Ok(greedy_action(&self.action_values(obs)?));
        }

        let (qnet, device) = (&self.qnet, &self.device);
        self.explorer
            .action(env_steps, qnet.n_actions(), &mut self.rng, || {
                Ok(greedy_action(&action_values(qnet, device, obs)?))
            })
    }
}

impl<Q, R> Configurable for Dqn<Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch>,
{
    type Config = DqnConfig<Q>;

    /// Constructs DQN agent.
    ///
    /// The target estimator starts as a copy of the online estimator.
    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let device = config.device.to_candle()?;
        let qnet = DqnModel::build(config.model_config.clone(), &device)?;
        let mut qnet_tgt = DqnModel::build(config.model_config, &device)?;
        qnet_tgt.sync_from(&qnet)?;

        Ok(Dqn {
            qnet,
            qnet_tgt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            double_dqn: config.double_dqn,
            critic_loss: config.critic_loss,
            explorer: config.explorer,
            train: false,
            device,
            n_opts: 0,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }
}

impl<Q, R> Agent<R> for Dqn<Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R: ReplayBufferBase<Batch = TransitionBatch>,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn n_actions(&self) -> usize {
        self.qnet.n_actions()
    }

    fn epsilon(&self, env_steps: usize) -> f64 {
        match self.train {
            true => self.explorer.epsilon(env_steps),
            false => 0.0,
        }
    }

    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        let batch = match buffer.batch(self.batch_size) {
            Ok(batch) => batch,
            Err(err) if DeepqError::is_insufficient_data(&err) => {
                trace!("skip optimization: {}", err);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let ixs = batch.ix_sample.clone();

        let update = self.update_critic(batch)?;
        if let Some(td_errs) = &update.td_errs {
            buffer.update_priority(&ixs, td_errs);
        }
        self.n_opts += 1;

        Ok(Some(Record::from_slice(&[
            ("loss", RecordValue::Scalar(update.loss)),
            ("max_value", RecordValue::Scalar(update.max_value)),
            ("grad_norm", RecordValue::Scalar(update.grad_norm)),
        ])))
    }

    fn sync_target(&mut self) -> Result<()> {
        self.qnet_tgt.sync_from(&self.qnet)?;
        trace!("Synchronized the target estimator after {} updates", self.n_opts);
        Ok(())
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.qnet.save(path.join(QNET_FILE))?;
        self.qnet_tgt.save(path.join(QNET_TGT_FILE))?;
        self.qnet.save_opt(path.join(OPT_FILE))?;
        info!("Save DQN agent to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(path.join(QNET_FILE))?;
        self.qnet_tgt.load(path.join(QNET_TGT_FILE))?;
        self.qnet.load_opt(path.join(OPT_FILE))?;
        self.n_opts = self.qnet.n_updates();
        info!("Load DQN agent from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dqn::DqnModelConfig,
        mlp::{Mlp, MlpConfig},
        opt::OptimizerConfig,
    };
    use deepq_core::{
        replay_buffer::{PerConfig, ReplayBuffer, ReplayBufferConfig},
        ExperienceBufferBase, Frame, Transition,
    };
    use tempdir::TempDir;

    type TestDqn = Dqn<Mlp, ReplayBuffer>;

    fn config(seed: u64) -> DqnConfig<Mlp> {
        let model_config = DqnModelConfig::default()
            .q_config(MlpConfig::new(2, vec![16], 2, false))
            .opt_config(OptimizerConfig::default().learning_rate(0.01))
            .max_grad_norm(Some(10.0));
        DqnConfig::default()
            .model_config(model_config)
            .batch_size(4)
            .discount_factor(0.9)
            .seed(seed)
    }

    fn obs(x: f32) -> StackedFrames {
        StackedFrames::filled(Frame::new([1, 2], vec![x, -x]).unwrap(), 1).unwrap()
    }

    fn buffer(n: usize, per: bool) -> ReplayBuffer {
        let per_config = match per {
            true => Some(PerConfig::default()),
            false => None,
        };
        let config = ReplayBufferConfig::default()
            .capacity(32)
            .per_config(per_config);
        let mut buffer = ReplayBuffer::build(&config).unwrap();
        for i in 0..n {
            let x = i as f32 / 10.0;
            let tr = Transition::new(obs(x), i % 2, 1.0 - x, obs(x + 0.1), i % 3 == 0);
            buffer.push(tr).unwrap();
        }
        buffer
    }

    fn probe(agent: &DqnModel<Mlp>) -> Vec<f32> {
        let xs = Tensor::new(&[0.3f32, -0.3], &Device::Cpu)
            .unwrap()
            .reshape((1, 1, 1, 2))
            .unwrap();
        agent.predict(&xs).unwrap().flatten_all().unwrap().to_vec1().unwrap()
    }

    #[test]
    fn test_target_starts_synchronized() -> Result<()> {
        let agent = TestDqn::build(config(0))?;
        assert_eq!(probe(agent.qnet()), probe(agent.qnet_tgt()));
        Ok(())
    }

    #[test]
    fn test_insufficient_data_skips_update() -> Result<()> {
        let mut agent = TestDqn::build(config(0))?;
        let mut buffer = buffer(3, false);
        assert!(agent.opt_with_record(&mut buffer)?.is_none());
        assert_eq!(agent.n_opts(), 0);
        Ok(())
    }

    #[test]
    fn test_update_leaves_target_until_sync() -> Result<()> {
        let mut agent = TestDqn::build(config(0))?;
        let mut buffer = buffer(10, false);
        let tgt_before = probe(agent.qnet_tgt());

        let record = agent.opt_with_record(&mut buffer)?.unwrap();
        assert!(record.get_scalar("loss")?.is_finite());
        assert!(record.get_scalar("max_value")?.is_finite());
        assert!(record.get_scalar("grad_norm")? >= 0.0);
        assert_eq!(agent.n_opts(), 1);
        assert_eq!(probe(agent.qnet_tgt()), tgt_before);
        assert_ne!(probe(agent.qnet()), tgt_before);

        agent.sync_target()?;
        assert_eq!(probe(agent.qnet()), probe(agent.qnet_tgt()));
        Ok(())
    }

    #[test]
    fn test_prioritized_and_double_dqn() -> Result<()> {
        let mut agent = TestDqn::build(config(0).double_dqn(true))?;
        let mut buffer = buffer(10, true);
        for _ in 0..5 {
            let record = agent.opt_with_record(&mut buffer)?.unwrap();
            assert!(record.get_scalar("loss")?.is_finite());
        }
        assert_eq!(agent.n_opts(), 5);
        Ok(())
    }

    #[test]
    fn test_eval_mode_is_greedy() -> Result<()> {
        let mut agent = TestDqn::build(config(0))?;
        agent.train();
        assert_eq!(agent.epsilon(0), 1.0);

        agent.eval();
        assert_eq!(agent.epsilon(0), 0.0);
        for i in 0..10 {
            let o = obs(i as f32);
            let greedy = greedy_action(&agent.action_values(&o)?);
            assert_eq!(agent.sample(&o, 0)?, greedy);
        }
        Ok(())
    }

    #[test]
    fn test_save_load_params() -> Result<()> {
        let dir = TempDir::new("dqn")?;
        let mut agent = TestDqn::build(config(0))?;
        let mut buffer = buffer(10, false);
        for _ in 0..3 {
            agent.opt_with_record(&mut buffer)?;
        }
        agent.save_params(dir.path())?;
        assert!(dir.path().join(QNET_FILE).exists());
        assert!(dir.path().join(QNET_TGT_FILE).exists());
        assert!(dir.path().join(OPT_FILE).exists());

        let mut agent2 = TestDqn::build(config(1))?;
        agent2.load_params(dir.path())?;
        assert_eq!(probe(agent.qnet()), probe(agent2.qnet()));
        assert_eq!(probe(agent.qnet_tgt()), probe(agent2.qnet_tgt()));
        assert_eq!(agent2.n_opts(), 3);
        Ok(())
    }
}
