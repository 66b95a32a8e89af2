//! Owned tensor buffers with tracked lifetimes.
//!
//! Every buffer that flows through the pipeline is allocated from a
//! [`TensorArena`], which keeps a live-buffer count. A [`TensorBuffer`]
//! returns itself to the arena when dropped, so release happens exactly once
//! on every exit path. The counter lets tests assert that a failed decode,
//! normalization, or forward pass leaves nothing outstanding.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::PipelineError;

/// Allocation tracker for tensor buffers.
pub struct TensorArena {
    live: AtomicUsize,
}

impl TensorArena {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            live: AtomicUsize::new(0),
        })
    }

    /// Allocates a zero-filled buffer of the given shape.
    pub fn alloc(self: &Arc<Self>, shape: &[usize]) -> TensorBuffer {
        let len = shape.iter().product();
        self.live.fetch_add(1, Ordering::SeqCst);
        TensorBuffer {
            data: Some(vec![0.0; len]),
            shape: shape.to_vec(),
            arena: Arc::clone(self),
        }
    }

    /// Wraps an existing value vector, validating it against the shape.
    pub fn from_vec(
        self: &Arc<Self>,
        shape: &[usize],
        data: Vec<f32>,
    ) -> Result<TensorBuffer, PipelineError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(PipelineError::ShapeMismatch {
                expected: shape.to_vec(),
                actual: vec![data.len()],
            });
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(TensorBuffer {
            data: Some(data),
            shape: shape.to_vec(),
            arena: Arc::clone(self),
        })
    }

    /// Number of buffers currently alive.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// An owned, fixed-shape f32 buffer tied to its arena.
///
/// The data vector sits behind an `Option` so `drop` can take it exactly
/// once; explicit [`release`](TensorBuffer::release) is just a move into
/// `drop`.
pub struct TensorBuffer {
    data: Option<Vec<f32>>,
    shape: Vec<usize>,
    arena: Arc<TensorArena>,
}

impl TensorBuffer {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        self.data.as_ref().expect("buffer already released")
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        self.data.as_mut().expect("buffer already released")
    }

    /// Releases the buffer immediately instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }

    /// Checks this buffer against a required shape.
    pub fn expect_shape(&self, expected: &[usize]) -> Result<(), PipelineError> {
        if self.shape != expected {
            return Err(PipelineError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: self.shape.clone(),
            });
        }
        Ok(())
    }
}

impl Drop for TensorBuffer {
    fn drop(&mut self) {
        if self.data.take().is_some() {
            self.arena.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for TensorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorBuffer")
            .field("shape", &self.shape)
            .field("live", &self.data.is_some())
            .finish()
    }
}
