//! Per-call notification options.

use serde_json::{Map, Value};

/// Optional settings of one notification call. Unset fields fall back to
/// the configured notification defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotifyOptions {
    pub title: String,
    pub icon: String,
    /// Display duration in milliseconds.
    pub duration: Option<u64>,
    pub position: Option<String>,
    pub redirect_url: Option<String>,
    /// Swap the response into the form fragment instead of the
    /// notification area.
    pub replace_form: bool,
    /// CSS selector the client should target.
    pub target: Option<String>,
    pub swap: Option<String>,
    /// Answer with the SSE notification stream instead.
    pub sse_stream: bool,
    pub data: Map<String, Value>,
    pub tags: Vec<String>,
    pub source: Option<String>,
}

impl NotifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn redirect_opt(mut self, url: Option<String>) -> Self {
        self.redirect_url = url;
        self
    }

    pub fn replace_form(mut self, replace: bool) -> Self {
        self.replace_form = replace;
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn swap(mut self, swap: impl Into<String>) -> Self {
        self.swap = Some(swap.into());
        self
    }

    pub fn sse_stream(mut self, stream: bool) -> Self {
        self.sse_stream = stream;
        self
    }

    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
