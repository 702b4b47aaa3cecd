use thiserror::Error;

use crate::graph::Task;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error(
        "matrix {name} is {size}x{size} in {block_size} blocks, graph expects {expected_size}x{expected_size} in {expected_block_size} blocks"
    )]
    LayoutMismatch {
        name: &'static str,
        size: usize,
        block_size: usize,
        expected_size: usize,
        expected_block_size: usize,
    },
    #[error("block task {task} failed on {backend} backend: {source}")]
    TaskFailed {
        task: Task,
        backend: String,
        #[source]
        source: bm_tensor::TensorError,
    },
    #[error("tensor error: {0}")]
    TensorError(#[from] bm_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, SchedError>;
