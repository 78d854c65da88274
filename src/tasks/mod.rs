//! Background certificate dispatch: durable queue, retry policy and workers.

mod dispatch;
mod queue;
mod worker;

#[cfg(test)]
pub mod memory;

pub use dispatch::{
    CertificateDispatch, DispatchFailure, DispatchScheduler, DispatchSuccess, JobOutcome, TaskError,
    MAX_ATTEMPTS, RETRY_DELAY, TASK_NAME,
};
pub use queue::{DispatchJob, QueueError, RedisQueue, TaskQueue, DEFAULT_LEASE};
pub use worker::WorkerPool;
