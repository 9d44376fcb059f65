//! Ordered substitution rules for the content markup.
//!
//! Each rule is a compiled pattern plus a handler producing the replacement
//! for one match. [`RULES`] fixes the application order: escaping runs first
//! so no later rule can reintroduce raw markup from the source text, and line
//! breaks run last because the heading rule is anchored on newlines.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::types::ContentMetrics;

pub(crate) const EMBED_BASE_URL: &str = "https://www.youtube.com/embed/";

const VIDEO_CONTAINER_CLASS: &str = "aspect-video my-6 w-full";
const VIDEO_FRAME_CLASS: &str =
    "w-full h-full rounded-xl shadow-lg border border-slate-200 dark:border-slate-700";
const VIDEO_LINK_CLASS: &str = "text-cyan-500 underline";
const IMAGE_CLASS: &str = "rounded-xl w-full max-h-[500px] object-cover my-6 shadow-md border border-slate-200 dark:border-slate-700";
const HEADING_CLASS: &str = "text-2xl font-bold mt-8 mb-4 text-slate-900 dark:text-white";
const BOLD_CLASS: &str = "font-bold text-cyan-700 dark:text-cyan-400";

// `R` keeps `\r` out of `.` and makes `^`/`$` aware of CRLF line endings.
static ESCAPE: Lazy<Regex> = Lazy::new(|| compile(r"[<>]"));
static VIDEO: Lazy<Regex> = Lazy::new(|| compile(r"(?R)\[youtube\]\((.*?)\)"));
static VIDEO_ID: Lazy<Regex> = Lazy::new(|| compile(r"(?:youtu\.be/|v=)([^&\n]{11})"));
static IMAGE: Lazy<Regex> = Lazy::new(|| compile(r"(?R)!\[(.*?)\]\((.*?)\)"));
static HEADING: Lazy<Regex> = Lazy::new(|| compile(r"(?mR)^### (.*)$"));
static BOLD: Lazy<Regex> = Lazy::new(|| compile(r"(?R)\*\*(.*?)\*\*"));
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| compile(r"\n"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in render pattern must compile")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Escape,
    VideoEmbed,
    Image,
    Heading,
    Bold,
    LineBreak,
}

type Handler = fn(&Captures<'_>, &mut ContentMetrics) -> String;

/// A single substitution: every match of `pattern` is replaced by `handler`.
pub struct Rule {
    pub kind: RuleKind,
    pattern: &'static Lazy<Regex>,
    handler: Handler,
}

impl Rule {
    /// Apply the rule to every occurrence in `input`.
    pub fn apply(&self, input: &str, metrics: &mut ContentMetrics) -> String {
        let handler = self.handler;
        self.pattern
            .replace_all(input, |caps: &Captures<'_>| handler(caps, metrics))
            .into_owned()
    }
}

pub static RULES: [Rule; 6] = [
    Rule {
        kind: RuleKind::Escape,
        pattern: &ESCAPE,
        handler: escape_angle_bracket,
    },
    Rule {
        kind: RuleKind::VideoEmbed,
        pattern: &VIDEO,
        handler: video_embed,
    },
    Rule {
        kind: RuleKind::Image,
        pattern: &IMAGE,
        handler: image,
    },
    Rule {
        kind: RuleKind::Heading,
        pattern: &HEADING,
        handler: heading,
    },
    Rule {
        kind: RuleKind::Bold,
        pattern: &BOLD,
        handler: bold,
    },
    Rule {
        kind: RuleKind::LineBreak,
        pattern: &LINE_BREAK,
        handler: line_break,
    },
];

fn escape_angle_bracket(caps: &Captures<'_>, _metrics: &mut ContentMetrics) -> String {
    match &caps[0] {
        "<" => "&lt;".to_string(),
        _ => "&gt;".to_string(),
    }
}

fn video_embed(caps: &Captures<'_>, metrics: &mut ContentMetrics) -> String {
    let url = &caps[1];
    match extract_video_id(url) {
        Some(id) => {
            metrics.video_embeds += 1;
            format!(
                r#"<div class="{VIDEO_CONTAINER_CLASS}"><iframe class="{VIDEO_FRAME_CLASS}" src="{EMBED_BASE_URL}{id}" allowfullscreen></iframe></div>"#,
                id = escape_attribute(id),
            )
        }
        None => {
            metrics.video_links += 1;
            format!(
                r#"<a href="{href}" target="_blank" class="{VIDEO_LINK_CLASS}">{url}</a>"#,
                href = escape_attribute(url),
            )
        }
    }
}

fn image(caps: &Captures<'_>, metrics: &mut ContentMetrics) -> String {
    metrics.images += 1;
    format!(
        r#"<img src="{src}" alt="{alt}" class="{IMAGE_CLASS}" />"#,
        src = escape_attribute(&caps[2]),
        alt = escape_attribute(&caps[1]),
    )
}

fn heading(caps: &Captures<'_>, metrics: &mut ContentMetrics) -> String {
    metrics.headings += 1;
    format!(r#"<h3 class="{HEADING_CLASS}">{}</h3>"#, &caps[1])
}

fn bold(caps: &Captures<'_>, metrics: &mut ContentMetrics) -> String {
    metrics.bold_spans += 1;
    format!(r#"<strong class="{BOLD_CLASS}">{}</strong>"#, &caps[1])
}

fn line_break(_caps: &Captures<'_>, _metrics: &mut ContentMetrics) -> String {
    "<br />".to_string()
}

/// Find the 11-character video id in a `v=` parameter or a `youtu.be/` path.
pub fn extract_video_id(url: &str) -> Option<&str> {
    VIDEO_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str())
}

/// Quote-escape text placed inside a double-quoted attribute.
fn escape_attribute(value: &str) -> String {
    value.replace('"', "&quot;")
}
