// Background task handle with a cancellation token and an observable outcome

use std::future::Future;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Running,
    Completed(T),
    Failed(String),
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskOutcome::Running)
    }
}

/// Error returned by a task body: a cooperative stop or a real failure.
#[derive(Debug)]
pub enum TaskError {
    Cancelled,
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Failed(err)
    }
}

#[derive(Clone)]
pub struct TaskHandle<T> {
    cancel: CancellationToken,
    outcome: watch::Receiver<TaskOutcome<T>>,
}

impl<T> TaskHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawns `body` on the runtime. The body receives the token and is
    /// expected to stop at its next safe point once it is cancelled.
    pub fn spawn<F, Fut>(cancel: CancellationToken, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(TaskOutcome::Running);
        let fut = body(cancel.clone());
        tokio::spawn(async move {
            let outcome = match fut.await {
                Ok(value) => TaskOutcome::Completed(value),
                Err(TaskError::Cancelled) => TaskOutcome::Cancelled,
                Err(TaskError::Failed(err)) => TaskOutcome::Failed(format!("{err:#}")),
            };
            let _ = tx.send(outcome);
        });
        Self {
            cancel,
            outcome: rx,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn outcome(&self) -> TaskOutcome<T> {
        self.outcome.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_finished()
    }

    /// Waits until the task settles.
    pub async fn wait(&self) -> TaskOutcome<T> {
        let mut rx = self.outcome.clone();
        loop {
            {
                let current = rx.borrow_and_update();
                if current.is_finished() {
                    return current.clone();
                }
            }
            if rx.changed().await.is_err() {
                let last = rx.borrow().clone();
                return match last {
                    TaskOutcome::Running => TaskOutcome::Failed("task aborted".to_string()),
                    settled => settled,
                };
            }
        }
    }
}
