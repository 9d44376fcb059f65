use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies what is being rendered so callers can trace and attribute output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RenderTarget {
    /// Body of a stored post.
    PostBody(Uuid),
    /// Body of a stored comment.
    Comment(Uuid),
    /// Unsaved text, for example the editor preview.
    Preview,
}

impl RenderTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderTarget::PostBody(_) => "post_body",
            RenderTarget::Comment(_) => "comment",
            RenderTarget::Preview => "preview",
        }
    }
}

/// Rendering request passed into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub target: RenderTarget,
    /// Author-entered markup. Missing content renders as an empty string.
    pub content: Option<String>,
}

impl RenderRequest {
    pub fn new(target: RenderTarget, content: impl Into<String>) -> Self {
        Self {
            target,
            content: Some(content.into()),
        }
    }

    pub fn preview(content: Option<String>) -> Self {
        Self {
            target: RenderTarget::Preview,
            content,
        }
    }
}

/// Counts of the generated elements, surfaced alongside the HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContentMetrics {
    pub video_embeds: u32,
    /// Video markers whose URL had no recognisable id.
    pub video_links: u32,
    pub images: u32,
    pub headings: u32,
    pub bold_spans: u32,
}

/// Deterministic rendering result returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    /// Markup safe to inject into a page.
    pub html: String,
    #[serde(default)]
    pub metrics: ContentMetrics,
}

impl RenderOutput {
    pub fn empty() -> Self {
        Self {
            html: String::new(),
            metrics: ContentMetrics::default(),
        }
    }
}

/// Rendering never fails; every input maps to some markup.
pub trait RenderService: Send + Sync {
    fn render(&self, request: &RenderRequest) -> RenderOutput;
}
