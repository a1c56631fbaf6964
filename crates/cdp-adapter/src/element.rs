//! Element lookup capability used by actions that need a point on the page.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::sleep;

use crate::commands::{Anchor, Evaluate};
use crate::devtools::DevTools;
use crate::error::{AdapterError, AdapterErrorKind};

#[async_trait]
pub trait ElementSource: Send + Sync {
    async fn resolve(&self, devtools: &DevTools) -> Result<Anchor, AdapterError>;

    /// Human readable search criteria, used in error messages.
    fn description(&self) -> String;
}

/// Element located by a CSS selector in the attached page, retried until `wait` elapses.
#[derive(Clone, Debug)]
pub struct SelectorElement {
    selector: String,
    wait: Duration,
    poll: Duration,
}

impl SelectorElement {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            wait: Duration::from_secs(4),
            poll: Duration::from_millis(100),
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    fn expression(&self) -> Result<String, AdapterError> {
        let selector = serde_json::to_string(&self.selector).map_err(AdapterError::protocol)?;
        Ok(format!(
            "(() => {{\n    const el = document.querySelector({selector});\n    if (!el) {{ return null; }}\n    el.scrollIntoView({{ block: 'center', inline: 'center' }});\n    const rect = el.getBoundingClientRect();\n    return {{ x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 }};\n}})()"
        ))
    }
}

#[async_trait]
impl ElementSource for SelectorElement {
    async fn resolve(&self, devtools: &DevTools) -> Result<Anchor, AdapterError> {
        let command = Evaluate {
            expression: self.expression()?,
            return_by_value: true,
        };
        let deadline = Instant::now() + self.wait;

        loop {
            let response = devtools.send(&command).await?;
            let point = response.get("result").and_then(|res| res.get("value"));
            if let Some(point) = point.filter(|value| value.is_object()) {
                let x = point.get("x").and_then(|v| v.as_f64());
                let y = point.get("y").and_then(|v| v.as_f64());
                return match (x, y) {
                    (Some(x), Some(y)) => Ok(Anchor {
                        backend_node_id: None,
                        x,
                        y,
                    }),
                    _ => Err(AdapterError::new(AdapterErrorKind::Protocol)
                        .with_hint(format!("no coordinates for '{}'", self.selector))),
                };
            }

            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("element '{}' not found", self.selector)));
            }
            sleep(self.poll).await;
        }
    }

    fn description(&self) -> String {
        format!("css:{}", self.selector)
    }
}

/// Wrapper that resolves its delegate once and replays the anchor afterwards.
pub struct LazyElementSnapshot<S> {
    delegate: S,
    snapshot: OnceCell<Anchor>,
}

impl<S: ElementSource> LazyElementSnapshot<S> {
    pub fn wrap(delegate: S) -> Self {
        Self {
            delegate,
            snapshot: OnceCell::new(),
        }
    }

    pub fn delegate(&self) -> &S {
        &self.delegate
    }

    pub fn is_resolved(&self) -> bool {
        self.snapshot.initialized()
    }
}

#[async_trait]
impl<S: ElementSource> ElementSource for LazyElementSnapshot<S> {
    async fn resolve(&self, devtools: &DevTools) -> Result<Anchor, AdapterError> {
        self.snapshot
            .get_or_try_init(|| self.delegate.resolve(devtools))
            .await
            .cloned()
    }

    fn description(&self) -> String {
        self.delegate.description()
    }
}
