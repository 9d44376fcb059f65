//! Plain-text previews of a document for listings.

use once_cell::sync::Lazy;
use regex::Regex;

pub const EXCERPT_MAX_CHARS: usize = 200;

static VIDEO_TOKEN: Lazy<Regex> = Lazy::new(|| compile(r"(?R)\[youtube\]\(.*?\)"));
static IMAGE_TOKEN: Lazy<Regex> = Lazy::new(|| compile(r"(?R)!\[.*?\]\(.*?\)"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in excerpt pattern must compile")
}

/// Strip markup tokens and collapse the text to a single line of at most
/// [`EXCERPT_MAX_CHARS`] characters, marking truncation with `...`.
pub fn excerpt(text: &str) -> String {
    let without_videos = VIDEO_TOKEN.replace_all(text, "");
    let without_images = IMAGE_TOKEN.replace_all(&without_videos, "");
    let plain = without_images
        .replace("###", "")
        .replace("**", "")
        .replace('\n', " ");
    let plain = plain.trim();

    match plain.char_indices().nth(EXCERPT_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &plain[..cut]),
        None => plain.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_tokens() {
        let text = "### Intro\n**Ciao** a tutti ![foto](a.png)\n[youtube](https://youtu.be/abcdefghijk) fine";
        assert_eq!(excerpt(text), "Intro Ciao a tutti   fine");
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(excerpt("  hello  "), "hello");
        assert_eq!(excerpt(""), "");
    }

    #[test]
    fn long_text_is_cut_at_two_hundred_characters() {
        let text = "è".repeat(250);
        let result = excerpt(&text);
        assert!(result.ends_with("..."));
        assert_eq!(result.chars().count(), EXCERPT_MAX_CHARS + 3);
    }

    #[test]
    fn exactly_two_hundred_characters_is_not_truncated() {
        let text = "a".repeat(EXCERPT_MAX_CHARS);
        assert_eq!(excerpt(&text), text);
    }
}
