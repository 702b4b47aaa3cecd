use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("tensor error: {0}")]
    TensorError(#[from] bm_tensor::TensorError),
    #[error("scheduler error: {0}")]
    SchedError(#[from] bm_sched::SchedError),
    #[error("check error: {0}")]
    CheckError(#[from] bm_check::CheckError),
}

pub type Result<T> = std::result::Result<T, BenchError>;
