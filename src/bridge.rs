//! One-shot hand-off from an asynchronous completion to a blocked caller.
//!
//! [`pending_call`] returns a producer ([`Completion`]) and a consumer
//! ([`PendingCall`]). The producer reports exactly one of completed, failed
//! or cancelled. Each of those methods takes `self`, so a second report
//! does not compile. The consumer's [`PendingCall::wait`] also takes `self`
//! and can only run once.

use std::error::Error as StdError;
use std::future::Future;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{HubError, Result};

type BoxError = Box<dyn StdError + Send + Sync>;

enum Outcome<T> {
    Completed(T),
    Failed(BoxError),
    Cancelled,
}

/// Creates a linked producer/consumer pair.
pub fn pending_call<T>() -> (Completion<T>, PendingCall<T>) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx }, PendingCall { rx })
}

/// Producer side: reports the single outcome of an asynchronous call.
#[derive(Debug)]
pub struct Completion<T> {
    tx: oneshot::Sender<Outcome<T>>,
}

impl<T> Completion<T> {
    /// Delivers `value` to the waiter.
    pub fn completed(self, value: T) {
        self.resolve(Outcome::Completed(value));
    }

    /// Reports a failure. A [`HubError`] keeps its kind on the consumer side;
    /// anything else arrives as [`HubError::Execution`].
    pub fn failed<E>(self, error: E)
    where
        E: Into<BoxError>,
    {
        self.resolve(Outcome::Failed(error.into()));
    }

    /// Releases the waiter with [`HubError::Cancelled`].
    pub fn cancelled(self) {
        self.resolve(Outcome::Cancelled);
    }

    fn resolve(self, outcome: Outcome<T>) {
        // The consumer may have been dropped; nobody is left to tell.
        let _ = self.tx.send(outcome);
    }
}

/// Consumer side: blocks until the producer reports.
#[derive(Debug)]
pub struct PendingCall<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> PendingCall<T> {
    /// Blocks the current thread until the outcome arrives.
    ///
    /// Must not be called from a thread driving an async runtime; tokio
    /// panics in that case. Use it from plain threads or
    /// `tokio::task::spawn_blocking`.
    pub fn wait(self) -> Result<T> {
        match self.rx.blocking_recv() {
            Ok(outcome) => into_result(outcome),
            Err(_) => Err(dropped_without_outcome()),
        }
    }

    /// Awaits the outcome without blocking a thread.
    pub async fn wait_async(self) -> Result<T> {
        match self.rx.await {
            Ok(outcome) => into_result(outcome),
            Err(_) => Err(dropped_without_outcome()),
        }
    }
}

impl<T: Send + 'static> PendingCall<T> {
    /// Runs `future` on `handle` and reports its result through a
    /// [`Completion`].
    pub fn spawn<F>(handle: &Handle, future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (completion, pending) = pending_call();
        handle.spawn(async move {
            match future.await {
                Ok(value) => completion.completed(value),
                Err(HubError::Cancelled) => completion.cancelled(),
                Err(err) => completion.failed(err),
            }
        });
        pending
    }

    /// Like [`PendingCall::spawn`], but reports cancelled as soon as
    /// `cancel` fires and drops `future` without polling it further.
    pub fn spawn_cancellable<F>(handle: &Handle, cancel: CancellationToken, future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::spawn(handle, async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(HubError::Cancelled),
                result = future => result,
            }
        })
    }
}

fn into_result<T>(outcome: Outcome<T>) -> Result<T> {
    match outcome {
        Outcome::Completed(value) => Ok(value),
        Outcome::Failed(error) => Err(match error.downcast::<HubError>() {
            Ok(hub) => *hub,
            Err(other) => HubError::Execution(other),
        }),
        Outcome::Cancelled => Err(HubError::Cancelled),
    }
}

fn dropped_without_outcome() -> HubError {
    HubError::Execution("completion dropped without reporting an outcome".into())
}

impl<T> std::fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed(_) => f.write_str("Completed"),
            Self::Failed(err) => write!(f, "Failed({err})"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::thread;
    use std::time::{Duration, Instant};

    use tokio_util::sync::CancellationToken;

    use super::{pending_call, PendingCall};
    use crate::HubError;

    #[test]
    fn completed_value_is_returned() {
        let (completion, pending) = pending_call();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            completion.completed("done");
        });

        assert_eq!(pending.wait().expect("must complete"), "done");
        producer.join().expect("producer must not panic");
    }

    #[test]
    fn hub_error_keeps_its_kind() {
        let (completion, pending) = pending_call::<()>();
        completion.failed(HubError::Http {
            status: 409,
            message: "conflict".to_owned(),
            transient: false,
            retry_after: None,
        });

        match pending.wait() {
            Err(HubError::Http { status, .. }) => assert_eq!(status, 409),
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[test]
    fn foreign_error_is_wrapped_as_execution_failure() {
        let (completion, pending) = pending_call::<()>();
        completion.failed(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));

        match pending.wait() {
            Err(HubError::Execution(inner)) => assert!(inner.to_string().contains("pipe closed")),
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn cancelled_is_reported_distinctly() {
        let (completion, pending) = pending_call::<u8>();
        completion.cancelled();
        assert!(matches!(pending.wait(), Err(HubError::Cancelled)));
    }

    #[test]
    fn dropped_completion_releases_the_waiter() {
        let (completion, pending) = pending_call::<u8>();
        drop(completion);
        assert!(matches!(pending.wait(), Err(HubError::Execution(_))));
    }

    #[test]
    fn spawned_future_result_crosses_into_blocking_caller() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime must start");
        let pending = PendingCall::spawn(runtime.handle(), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(41 + 1)
        });
        assert_eq!(pending.wait().expect("must complete"), 42);
    }

    #[test]
    fn cancellation_releases_blocked_waiter_promptly() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime must start");
        let cancel = CancellationToken::new();
        let pending = PendingCall::<()>::spawn_cancellable(
            runtime.handle(),
            cancel.clone(),
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
        );

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
        });

        let started = Instant::now();
        assert!(matches!(pending.wait(), Err(HubError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        trigger.join().expect("trigger must not panic");
    }

    #[tokio::test]
    async fn async_wait_sees_the_same_outcome() {
        let (completion, pending) = pending_call();
        tokio::spawn(async move { completion.completed(5u32) });
        assert_eq!(pending.wait_async().await.expect("must complete"), 5);
    }
}
