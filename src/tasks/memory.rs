use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::queue::{DispatchJob, QueueError, TaskQueue, DEFAULT_LEASE};

#[derive(Default)]
struct Slots {
    ready: Vec<(Instant, DispatchJob)>,
    leased: Vec<(Instant, DispatchJob)>,
    failing_pushes: u32,
}

/// In-process delayed queue on tokio's clock, so paused-time tests can step it.
pub struct MemoryQueue {
    slots: Mutex<Slots>,
    lease: Duration,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::with_lease(DEFAULT_LEASE)
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lease(lease: Duration) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            lease,
        }
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Jobs waiting to be claimed, ready or delayed.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().ready.len()
    }

    /// Jobs claimed but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.slots.lock().unwrap().leased.len()
    }

    /// The next `times` pushes fail as if the broker were unreachable.
    pub fn fail_pushes(&self, times: u32) {
        self.slots.lock().unwrap().failing_pushes = times;
    }
}

fn unreachable_broker() -> QueueError {
    QueueError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "broker unreachable",
    )))
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn push(&self, job: &DispatchJob, delay: Duration) -> Result<(), QueueError> {
        let mut slots = self.slots.lock().unwrap();
        if slots.failing_pushes > 0 {
            slots.failing_pushes -= 1;
            return Err(unreachable_broker());
        }
        slots.ready.push((Instant::now() + delay, job.clone()));
        Ok(())
    }

    async fn pop_ready(&self) -> Result<Option<DispatchJob>, QueueError> {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap();
        let ready = slots
            .ready
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| *at <= now)
            .min_by_key(|(_, (at, _))| *at)
            .map(|(index, _)| index);
        let Some(index) = ready else {
            return Ok(None);
        };
        let (_, job) = slots.ready.remove(index);
        slots.leased.push((now + self.lease, job.clone()));
        Ok(Some(job))
    }

    async fn ack(&self, job: &DispatchJob) -> Result<(), QueueError> {
        let mut slots = self.slots.lock().unwrap();
        if let Some(index) = slots.leased.iter().position(|(_, leased)| leased == job) {
            slots.leased.remove(index);
        }
        Ok(())
    }

    async fn requeue_expired(&self) -> Result<usize, QueueError> {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap();
        let (expired, live): (Vec<_>, Vec<_>) = slots.leased.drain(..).partition(|(deadline, _)| *deadline <= now);
        slots.leased = live;
        let moved = expired.len();
        slots.ready.extend(expired.into_iter().map(|(_, job)| (now, job)));
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_jobs_come_back_after_their_lease() {
        let queue = MemoryQueue::with_lease(Duration::from_secs(30));
        let job = DispatchJob::first(Uuid::now_v7(), Uuid::now_v7());
        queue.push(&job, Duration::ZERO).await.unwrap();

        assert_eq!(queue.pop_ready().await.unwrap(), Some(job.clone()));
        assert_eq!(queue.pop_ready().await.unwrap(), None);
        assert_eq!(queue.in_flight(), 1);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(queue.requeue_expired().await.unwrap(), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(queue.requeue_expired().await.unwrap(), 1);
        assert_eq!(queue.pop_ready().await.unwrap(), Some(job.clone()));

        queue.ack(&job).await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(queue.requeue_expired().await.unwrap(), 0);
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn failed_pushes_leave_nothing_behind() {
        let queue = MemoryQueue::new();
        queue.fail_pushes(1);
        let job = DispatchJob::first(Uuid::now_v7(), Uuid::now_v7());

        assert!(queue.push(&job, Duration::ZERO).await.is_err());
        assert_eq!(queue.len(), 0);
        queue.push(&job, Duration::ZERO).await.unwrap();
        assert_eq!(queue.len(), 1);
    }
}
