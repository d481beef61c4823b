//! Collated batch of transitions.
use super::Transition;

/// A batch of transitions collated into aligned arrays.
///
/// Row `i` of every field describes the same transition. Observations are
/// flattened with shape `[batch, n_stack, height, width]`.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionBatch {
    /// Observations `s_t`.
    pub obs: Vec<f32>,

    /// Action ids `a_t`.
    pub act: Vec<u32>,

    /// Next observations `s_t+1`.
    pub next_obs: Vec<f32>,

    /// Rewards `r_t`.
    pub reward: Vec<f32>,

    /// Termination flags `done_t`.
    pub is_done: Vec<bool>,

    /// Buffer slots the rows were sampled from.
    pub ix_sample: Vec<usize>,

    /// Importance-sampling weights, only with prioritized sampling.
    pub weight: Option<Vec<f32>>,

    /// Shape of a single observation, `[n_stack, height, width]`.
    pub state_shape: [usize; 3],
}

impl TransitionBatch {
    /// Collates transitions taken from buffer slots `ix_sample`.
    ///
    /// `transitions` must not be empty.
    pub(crate) fn collate(
        transitions: &[&Transition],
        ix_sample: Vec<usize>,
        weight: Option<Vec<f32>>,
    ) -> Self {
        let state_shape = transitions[0].state.shape();
        let numel = state_shape.iter().product::<usize>() * transitions.len();
        let mut obs = Vec::with_capacity(numel);
        let mut next_obs = Vec::with_capacity(numel);

        for tr in transitions.iter() {
            tr.state.extend_into(&mut obs);
            tr.next_state.extend_into(&mut next_obs);
        }

        Self {
            obs,
            act: transitions.iter().map(|tr| tr.action as u32).collect(),
            next_obs,
            reward: transitions.iter().map(|tr| tr.reward).collect(),
            is_done: transitions.iter().map(|tr| tr.done).collect(),
            ix_sample,
            weight,
            state_shape,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch has no row.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Shape of the observation arrays, `[batch, n_stack, height, width]`.
    pub fn obs_shape(&self) -> [usize; 4] {
        let [n, h, w] = self.state_shape;
        [self.len(), n, h, w]
    }

    /// Unpacks the data `(o_t, a_t, o_t+1, r_t, done_t, ixs, weight)`.
    #[allow(clippy::type_complexity)]
    pub fn unpack(
        self,
    ) -> (
        Vec<f32>,
        Vec<u32>,
        Vec<f32>,
        Vec<f32>,
        Vec<bool>,
        Vec<usize>,
        Option<Vec<f32>>,
    ) {
        (
            self.obs,
            self.act,
            self.next_obs,
            self.reward,
            self.is_done,
            self.ix_sample,
            self.weight,
        )
    }
}
