//! One-shot background work.
//!
//! [`dispatch`] runs a blocking task on tokio's blocking pool and reports back
//! through a oneshot channel carrying exactly one [`WorkerEvent`].

use std::any::Any;

use thiserror::Error;
use tokio::sync::oneshot;

/// The single event a worker sends back.
#[derive(Debug)]
pub enum WorkerEvent<T> {
    Message(T),
    Error(String),
}

/// Failure reported by a dispatched worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker {name}: an error occurred: {message}")]
    Failed { name: String, message: String },
    #[error("worker {name} exited without reporting")]
    Disconnected { name: String },
}

/// Run `task` off the async runtime and wait for its single result.
///
/// The payload of a successful task is returned unchanged. A task error or
/// panic becomes [`WorkerError::Failed`] carrying the original text. Nothing
/// is retried.
pub async fn dispatch<T, F>(name: &str, task: F) -> Result<T, WorkerError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel::<WorkerEvent<T>>();

    let handle = tokio::task::spawn_blocking(move || {
        let event = match task() {
            Ok(value) => WorkerEvent::Message(value),
            Err(e) => WorkerEvent::Error(format!("{e:#}")),
        };
        // The receiver only disappears if the caller was dropped.
        let _ = tx.send(event);
    });

    tracing::debug!(worker = name, "worker dispatched");

    match rx.await {
        Ok(WorkerEvent::Message(value)) => Ok(value),
        Ok(WorkerEvent::Error(message)) => {
            tracing::warn!(worker = name, error = %message, "worker failed");
            Err(WorkerError::Failed {
                name: name.to_string(),
                message,
            })
        }
        Err(_) => match handle.await {
            Err(join) if join.is_panic() => {
                let message = panic_message(join.into_panic());
                tracing::warn!(worker = name, error = %message, "worker panicked");
                Err(WorkerError::Failed {
                    name: name.to_string(),
                    message,
                })
            }
            _ => Err(WorkerError::Disconnected {
                name: name.to_string(),
            }),
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    #[tokio::test]
    async fn test_message_resolves_unchanged() {
        let value = dispatch("echo", || Ok(vec![1u64, 2, 3])).await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_error_keeps_original_text() {
        let err = dispatch::<(), _>("failing", || bail!("snapshot is empty"))
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("snapshot is empty"), "{text}");
        assert!(text.contains("failing"), "{text}");
        assert!(matches!(err, WorkerError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_error_context_chain_is_preserved() {
        let err = dispatch::<(), _>("chained", || {
            Err(anyhow::anyhow!("root cause").context("building report"))
        })
        .await
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("building report"), "{text}");
        assert!(text.contains("root cause"), "{text}");
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let err = dispatch::<(), _>("panicky", || panic!("boom"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
    }
}
