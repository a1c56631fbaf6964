//! Actions that make the browser start a download.

use std::future::Future;

use async_trait::async_trait;
use cdp_adapter::{DevTools, DispatchMouseEvent, ElementSource, MouseEventType};
use tracing::debug;

use crate::error::DownloadError;

/// Something done to the page that is expected to trigger a download.
///
/// Errors propagate out of the session unchanged.
#[async_trait]
pub trait DownloadAction: Send + Sync {
    async fn perform(&self, devtools: &DevTools, target: &dyn ElementSource)
        -> Result<(), DownloadError>;
}

/// Left click in the middle of the target element.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClickAction;

#[async_trait]
impl DownloadAction for ClickAction {
    async fn perform(
        &self,
        devtools: &DevTools,
        target: &dyn ElementSource,
    ) -> Result<(), DownloadError> {
        let anchor = target.resolve(devtools).await?;
        debug!(element = %target.description(), x = anchor.x, y = anchor.y, "click");
        devtools
            .send(&DispatchMouseEvent::left(MouseEventType::MousePressed, &anchor))
            .await?;
        devtools
            .send(&DispatchMouseEvent::left(MouseEventType::MouseReleased, &anchor))
            .await?;
        Ok(())
    }
}

/// Action backed by an async closure that ignores the page and element.
pub struct FnAction<F> {
    run: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DownloadError>> + Send,
{
    pub fn new(run: F) -> Self {
        Self { run }
    }
}

#[async_trait]
impl<F, Fut> DownloadAction for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DownloadError>> + Send,
{
    async fn perform(
        &self,
        _devtools: &DevTools,
        _target: &dyn ElementSource,
    ) -> Result<(), DownloadError> {
        (self.run)().await
    }
}
