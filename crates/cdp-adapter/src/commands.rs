//! Typed protocol commands sent through [`crate::DevTools::send`].

use serde::{Deserialize, Serialize};

/// Which connection a command is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// The browser target itself (no session id).
    Browser,
    /// The attached page session.
    Page,
}

/// A protocol command with a fixed method name and serializable params.
pub trait Command: Serialize + Send + Sync {
    const METHOD: &'static str;
    const SCOPE: Scope;
}

/// Resolved element position. The download engine only needs a point to click.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub backend_node_id: Option<u64>,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PageEnable {}

impl Command for PageEnable {
    const METHOD: &'static str = "Page.enable";
    const SCOPE: Scope = Scope::Page;
}

#[derive(Clone, Debug, Serialize)]
pub struct Navigate {
    pub url: String,
}

impl Command for Navigate {
    const METHOD: &'static str = "Page.navigate";
    const SCOPE: Scope = Scope::Page;
}

/// `Browser.setDownloadBehavior` modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadBehavior {
    Deny,
    #[default]
    Allow,
    AllowAndName,
    Default,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDownloadBehavior {
    pub behavior: DownloadBehavior,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_enabled: Option<bool>,
}

impl SetDownloadBehavior {
    /// Behaviour with progress events switched on, which the download engine relies on.
    pub fn with_events(behavior: DownloadBehavior, download_path: Option<String>) -> Self {
        Self {
            behavior,
            browser_context_id: None,
            download_path,
            events_enabled: Some(true),
        }
    }
}

impl Command for SetDownloadBehavior {
    const METHOD: &'static str = "Browser.setDownloadBehavior";
    const SCOPE: Scope = Scope::Browser;
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluate {
    pub expression: String,
    pub return_by_value: bool,
}

impl Command for Evaluate {
    const METHOD: &'static str = "Runtime.evaluate";
    const SCOPE: Scope = Scope::Page;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseEventType {
    MousePressed,
    MouseReleased,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchMouseEvent {
    #[serde(rename = "type")]
    pub event_type: MouseEventType,
    pub x: f64,
    pub y: f64,
    pub button: String,
    pub buttons: u32,
    pub click_count: u32,
    pub pointer_type: String,
}

impl DispatchMouseEvent {
    pub fn left(event_type: MouseEventType, anchor: &Anchor) -> Self {
        Self {
            event_type,
            x: anchor.x,
            y: anchor.y,
            button: "left".to_string(),
            buttons: 1,
            click_count: 1,
            pointer_type: "mouse".to_string(),
        }
    }
}

impl Command for DispatchMouseEvent {
    const METHOD: &'static str = "Input.dispatchMouseEvent";
    const SCOPE: Scope = Scope::Page;
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GetTargets {}

impl Command for GetTargets {
    const METHOD: &'static str = "Target.getTargets";
    const SCOPE: Scope = Scope::Browser;
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateTarget {
    pub url: String,
}

impl Command for CreateTarget {
    const METHOD: &'static str = "Target.createTarget";
    const SCOPE: Scope = Scope::Browser;
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTarget {
    pub target_id: String,
    pub flatten: bool,
}

impl Command for AttachToTarget {
    const METHOD: &'static str = "Target.attachToTarget";
    const SCOPE: Scope = Scope::Browser;
}

/// Subset of `Target.TargetInfo` used to pick a page to attach to.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub url: String,
}
