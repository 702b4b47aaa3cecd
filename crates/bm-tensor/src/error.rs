use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("matrix size {matrix_size} is not a multiple of block size {block_size}")]
    NotBlockAligned {
        matrix_size: usize,
        block_size: usize,
    },
    #[error("invalid size: {0}")]
    InvalidSize(String),
    #[error("{op}: buffer length {got} but expected {expected}")]
    BufferLength {
        op: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("cannot allocate {elements} elements ({bytes} bytes) for a {size}x{size} matrix")]
    Allocation {
        size: usize,
        elements: usize,
        bytes: usize,
    },
    #[error("{backend} backend failed: {message}")]
    Backend { backend: String, message: String },
}

pub type Result<T> = std::result::Result<T, TensorError>;
