//! Content rendering.
//!
//! The pipeline is pure: it accepts author-entered markup and produces
//! deterministic HTML through an ordered table of substitutions. It reads no
//! external state and has no failure modes.

mod excerpt;
mod rules;
mod service;
mod types;

pub use excerpt::{EXCERPT_MAX_CHARS, excerpt};
pub use rules::{RULES, Rule, RuleKind, extract_video_id};
pub use service::{RuleRenderService, render_content, render_recorded, render_service};
pub use types::{ContentMetrics, RenderOutput, RenderRequest, RenderService, RenderTarget};
