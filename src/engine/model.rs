//! Compiled model handles and the built-in convolutional backend.
//!
//! The loader constructs the two attribute networks in-process and hands
//! them to the registry as opaque [`Model`] handles. The shipped backend is
//! a small deterministic conv net evaluated with `ndarray`: one strided
//! 3x3 convolution, ReLU, global average pooling, and a dense head. Age
//! ends in a sigmoid scalar, gender in a two-class softmax.

use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::engine::preprocess::INPUT_SIZE;
use crate::engine::tensor::{TensorArena, TensorBuffer};
use crate::error::PipelineError;
use crate::utils::math::softmax;

/// A compiled model: one forward pass over an owned input buffer.
pub trait Model: Send + Sync {
    fn name(&self) -> &'static str;

    /// Length of the flat output vector this model produces.
    fn output_len(&self) -> usize;

    /// Runs a single forward pass. The output buffer is allocated from
    /// `arena`; intermediates are released before this returns.
    fn forward(
        &self,
        input: &TensorBuffer,
        arena: &Arc<TensorArena>,
    ) -> Result<TensorBuffer, PipelineError>;
}

const KERNEL: usize = 3;
const STRIDE: usize = 2;
const FILTERS: usize = 8;

/// Output activation of the dense head.
enum Head {
    /// Single sigmoid unit in (0, 1).
    Sigmoid,
    /// Softmax over all units; outputs sum to 1.
    Softmax,
}

/// Small convolutional network with seeded deterministic weights.
pub struct ConvNet {
    name: &'static str,
    conv_w: Vec<f32>, // [FILTERS, 3, KERNEL, KERNEL], row-major
    conv_b: Vec<f32>, // [FILTERS]
    dense_w: Array2<f32>,
    dense_b: Array1<f32>,
    head: Head,
}

impl ConvNet {
    /// Builds the age regression network (scalar sigmoid output).
    pub fn age() -> Result<Self, PipelineError> {
        Self::build("age", 1, Head::Sigmoid, 0x5f3a_1c9b)
    }

    /// Builds the gender classification network ([male, female] softmax).
    pub fn gender() -> Result<Self, PipelineError> {
        Self::build("gender", 2, Head::Softmax, 0x2e8d_77f1)
    }

    fn build(
        name: &'static str,
        out_units: usize,
        head: Head,
        seed: u64,
    ) -> Result<Self, PipelineError> {
        let mut next = weight_stream(seed);
        let conv_w: Vec<f32> = (0..FILTERS * 3 * KERNEL * KERNEL).map(|_| next()).collect();
        let conv_b: Vec<f32> = (0..FILTERS).map(|_| next()).collect();
        let dense_vals: Vec<f32> = (0..out_units * FILTERS).map(|_| next()).collect();
        let dense_w = Array2::from_shape_vec((out_units, FILTERS), dense_vals)
            .map_err(|e| PipelineError::Load(format!("dense weights for {name}: {e}")))?;
        let dense_b = Array1::from_vec((0..out_units).map(|_| next()).collect());

        Ok(Self {
            name,
            conv_w,
            conv_b,
            dense_w,
            dense_b,
            head,
        })
    }

    fn conv_out_side() -> usize {
        (INPUT_SIZE as usize - KERNEL) / STRIDE + 1
    }
}

impl Model for ConvNet {
    fn name(&self) -> &'static str {
        self.name
    }

    fn output_len(&self) -> usize {
        self.dense_b.len()
    }

    fn forward(
        &self,
        input: &TensorBuffer,
        arena: &Arc<TensorArena>,
    ) -> Result<TensorBuffer, PipelineError> {
        let side = INPUT_SIZE as usize;
        input.expect_shape(&[1, side, side, 3])?;

        let out_side = Self::conv_out_side();
        let pixels = input.as_slice();

        // Strided 3x3 convolution with ReLU into an arena-tracked feature map.
        let mut feature_map = arena.alloc(&[1, out_side, out_side, FILTERS]);
        {
            let fm = feature_map.as_mut_slice();
            for oy in 0..out_side {
                for ox in 0..out_side {
                    for f in 0..FILTERS {
                        let mut acc = self.conv_b[f];
                        for ky in 0..KERNEL {
                            for kx in 0..KERNEL {
                                let iy = oy * STRIDE + ky;
                                let ix = ox * STRIDE + kx;
                                let pixel_base = (iy * side + ix) * 3;
                                let weight_base = ((f * 3) * KERNEL + ky) * KERNEL + kx;
                                for c in 0..3 {
                                    let w = self.conv_w
                                        [weight_base + c * KERNEL * KERNEL];
                                    acc += w * pixels[pixel_base + c];
                                }
                            }
                        }
                        fm[(oy * out_side + ox) * FILTERS + f] = acc.max(0.0);
                    }
                }
            }
        }

        // Global average pooling per filter.
        let mut pooled = Array1::<f32>::zeros(FILTERS);
        {
            let fm = feature_map.as_slice();
            for chunk in fm.chunks_exact(FILTERS) {
                for (f, &v) in chunk.iter().enumerate() {
                    pooled[f] += v;
                }
            }
            let count = (out_side * out_side) as f32;
            pooled.mapv_inplace(|v| v / count);
        }
        feature_map.release();

        // Dense head.
        let logits = self.dense_w.dot(&pooled) + &self.dense_b;
        let values: Vec<f32> = match self.head {
            Head::Sigmoid => logits.iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect(),
            Head::Softmax => softmax(logits.as_slice().unwrap_or(&[])),
        };

        arena.from_vec(&[1, values.len()], values)
    }
}

/// Deterministic weight stream (splitmix-style), values in [-0.1, 0.1].
fn weight_stream(seed: u64) -> impl FnMut() -> f32 {
    let mut state = seed;
    move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let unit = ((state >> 33) as f32) / (u32::MAX >> 1) as f32; // [0, 2)
        (unit - 1.0) * 0.1
    }
}
