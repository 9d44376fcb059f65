use std::sync::Arc;

use metrics::counter;
use once_cell::sync::Lazy;
use tracing::trace;

use super::rules::{RULES, Rule};
use super::types::{ContentMetrics, RenderOutput, RenderRequest, RenderService};

/// Applies the ordered rule table to a document.
pub struct RuleRenderService {
    rules: &'static [Rule],
}

impl RuleRenderService {
    fn new() -> Self {
        Self { rules: &RULES }
    }

    pub fn render_text(&self, content: Option<&str>) -> RenderOutput {
        let Some(text) = content.filter(|text| !text.is_empty()) else {
            return RenderOutput::empty();
        };

        let mut metrics = ContentMetrics::default();
        let html = self
            .rules
            .iter()
            .fold(text.to_owned(), |acc, rule| rule.apply(&acc, &mut metrics));

        RenderOutput { html, metrics }
    }
}

impl Default for RuleRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderService for RuleRenderService {
    fn render(&self, request: &RenderRequest) -> RenderOutput {
        self.render_text(request.content.as_deref())
    }
}

static RENDER_SERVICE: Lazy<Arc<RuleRenderService>> =
    Lazy::new(|| Arc::new(RuleRenderService::new()));

/// Access the shared render service instance.
pub fn render_service() -> Arc<RuleRenderService> {
    Arc::clone(&RENDER_SERVICE)
}

/// Render a document to HTML. Absent or empty input yields an empty string.
pub fn render_content(content: Option<&str>) -> String {
    RENDER_SERVICE.render_text(content).html
}

/// Render through `renderer`, counting the call per target kind.
pub fn render_recorded(renderer: &dyn RenderService, request: &RenderRequest) -> RenderOutput {
    let output = renderer.render(request);
    counter!("autostocker_render_total", "target" => request.target.kind()).increment(1);
    trace!(
        target = "autostocker::application::render",
        render_target = request.target.kind(),
        html_bytes = output.html.len(),
        "content rendered"
    );
    output
}
