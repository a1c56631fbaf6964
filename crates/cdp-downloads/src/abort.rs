use std::sync::Arc;

use tokio::sync::watch;

use crate::error::DownloadError;

/// One-shot failure cell shared between event listeners and the waiting task.
///
/// The first failure wins; later ones are ignored. Waiters wake as soon as it is set.
#[derive(Clone)]
pub struct AbortSignal {
    cell: Arc<watch::Sender<Option<DownloadError>>>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn new() -> Self {
        let (cell, _) = watch::channel(None);
        Self {
            cell: Arc::new(cell),
        }
    }

    /// Record `err` unless a failure is already set. Returns whether it was recorded.
    pub fn fail(&self, err: DownloadError) -> bool {
        self.cell.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(err);
            true
        })
    }

    pub fn failure(&self) -> Option<DownloadError> {
        self.cell.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.cell.borrow().is_some()
    }

    /// Resolves with the failure once one is recorded.
    pub async fn wait(&self) -> DownloadError {
        let mut rx = self.cell.subscribe();
        loop {
            if let Some(err) = rx.borrow_and_update().clone() {
                return err;
            }
            if rx.changed().await.is_err() {
                // The sender lives as long as `self`, so this cannot happen while we wait.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn action(msg: &str) -> DownloadError {
        DownloadError::Action(msg.to_string())
    }

    #[test]
    fn first_failure_wins() {
        let signal = AbortSignal::new();
        assert!(signal.failure().is_none());
        assert!(signal.fail(action("first")));
        assert!(!signal.fail(action("second")));
        assert_eq!(signal.failure().unwrap().to_string(), "Download action failed: first");
    }

    #[tokio::test]
    async fn waiter_wakes_on_failure() {
        let signal = AbortSignal::new();
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            setter.fail(action("late"));
        });

        let err = tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("waiter should wake");
        assert_eq!(err.kind_label(), "action");
    }

    #[tokio::test]
    async fn waiter_sees_failure_set_before_waiting() {
        let signal = AbortSignal::new();
        signal.fail(action("early"));
        let err = tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .unwrap();
        assert!(err.to_string().contains("early"));
        assert!(signal.is_set());
    }
}
