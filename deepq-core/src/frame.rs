//! Preprocessed frames and the rolling window of stacked frames.
use crate::error::DeepqError;
use anyhow::Result;
use std::{collections::VecDeque, sync::Arc};

/// A preprocessed, single-channel frame of fixed shape `[height, width]`.
///
/// Pixel data is immutable and shared between the stacked-frame windows
/// that contain the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    shape: [usize; 2],
    data: Arc<[f32]>,
}

impl Frame {
    /// Creates a frame. `data` is in row-major order.
    pub fn new(shape: [usize; 2], data: Vec<f32>) -> Result<Self> {
        if data.len() != shape[0] * shape[1] {
            return Err(DeepqError::invalid_config(format!(
                "frame of shape {:?} needs {} values, got {}",
                shape,
                shape[0] * shape[1],
                data.len()
            ))
            .into());
        }
        Ok(Self {
            shape,
            data: data.into(),
        })
    }

    /// Shape `[height, width]`.
    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    /// Pixel values in row-major order.
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// The last `n_stack` frames of an episode, oldest first.
///
/// The window always holds exactly `n_stack` frames of a single shape.
/// Appending a frame drops the oldest one.
#[derive(Clone, Debug, PartialEq)]
pub struct StackedFrames {
    frames: VecDeque<Frame>,
}

impl StackedFrames {
    /// Creates a window filled with `n_stack` copies of `frame`.
    ///
    /// This is how a window is initialised at the start of an episode.
    pub fn filled(frame: Frame, n_stack: usize) -> Result<Self> {
        if n_stack == 0 {
            return Err(DeepqError::invalid_config("n_stack must be positive").into());
        }
        Ok(Self {
            frames: std::iter::repeat(frame).take(n_stack).collect(),
        })
    }

    /// Appends `frame` and drops the oldest frame.
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        let expected = self.frame_shape();
        if frame.shape() != expected {
            return Err(DeepqError::FrameShape {
                expected,
                actual: frame.shape(),
            }
            .into());
        }
        self.frames.pop_front();
        self.frames.push_back(frame);
        Ok(())
    }

    /// Returns a new window with `frame` appended, leaving `self` untouched.
    pub fn pushed(&self, frame: Frame) -> Result<Self> {
        let mut next = self.clone();
        next.push(frame)?;
        Ok(next)
    }

    /// Number of frames in the window.
    pub fn n_stack(&self) -> usize {
        self.frames.len()
    }

    /// Shape of a single frame.
    pub fn frame_shape(&self) -> [usize; 2] {
        // The window is never empty, see `filled`.
        self.frames[0].shape()
    }

    /// Shape of the window, `[n_stack, height, width]`.
    pub fn shape(&self) -> [usize; 3] {
        let [h, w] = self.frame_shape();
        [self.n_stack(), h, w]
    }

    /// Number of values in the flattened window.
    pub fn numel(&self) -> usize {
        let [n, h, w] = self.shape();
        n * h * w
    }

    /// Frames, oldest first.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// The most recent frame.
    pub fn latest(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    /// Appends the flattened window to `buf`, oldest frame first.
    pub fn extend_into(&self, buf: &mut Vec<f32>) {
        for frame in self.frames.iter() {
            buf.extend_from_slice(frame.data());
        }
    }

    /// Returns the flattened window, oldest frame first.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut buf = Vec::with_capacity(self.numel());
        self.extend_into(&mut buf);
        buf
    }
}

/// Converts a raw environment frame into a fixed-shape [`Frame`].
///
/// Resizing, grayscale conversion and cropping belong here. Closures
/// `Fn(&F) -> Result<Frame>` implement this trait.
pub trait FramePreprocessor<F> {
    /// Processes a raw frame.
    fn process(&self, raw: &F) -> Result<Frame>;
}

impl<F, T> FramePreprocessor<F> for T
where
    T: Fn(&F) -> Result<Frame>,
{
    fn process(&self, raw: &F) -> Result<Frame> {
        self(raw)
    }
}

/// Passes through environments which already emit [`Frame`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityPreprocessor;

impl FramePreprocessor<Frame> for IdentityPreprocessor {
    fn process(&self, raw: &Frame) -> Result<Frame> {
        Ok(raw.clone())
    }
}
