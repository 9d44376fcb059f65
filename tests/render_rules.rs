use autostocker::application::render::{
    RenderRequest, RenderService, RenderTarget, excerpt, render_content, render_service,
};
use uuid::Uuid;

fn render(text: &str) -> String {
    render_content(Some(text))
}

#[test]
fn absent_and_empty_documents_render_nothing() {
    assert_eq!(render_content(None), "");
    assert_eq!(render(""), "");
}

#[test]
fn source_angle_brackets_never_survive() {
    let samples = [
        "<script>alert(1)</script>",
        "a < b > c",
        "<<>>",
        "line one\n<b>line two</b>\n",
        "x<y\r\n>z",
    ];

    for sample in samples {
        let html = render(sample).replace("<br />", "");
        assert!(
            !html.contains('<') && !html.contains('>'),
            "raw bracket leaked for {sample:?}: {html}"
        );
    }
}

#[test]
fn markup_inside_tokens_is_escaped() {
    let html = render("![<img onerror=x>](https://example.com/a.png)");
    assert!(html.contains(r#"alt="&lt;img onerror=x&gt;""#));

    let html = render("**<i>hi</i>**");
    assert!(html.contains(">&lt;i&gt;hi&lt;/i&gt;</strong>"));
}

#[test]
fn heading_becomes_h3() {
    let html = render("### Title");
    assert!(html.starts_with("<h3 "));
    assert!(html.ends_with(">Title</h3>"));
}

#[test]
fn heading_requires_line_start_and_space() {
    assert_eq!(render("a ### b"), "a ### b");
    assert_eq!(render("###Title"), "###Title");
}

#[test]
fn bold_becomes_strong() {
    let html = render("**bold**");
    assert!(html.starts_with("<strong "));
    assert!(html.ends_with(">bold</strong>"));
}

#[test]
fn recognised_video_embeds_an_iframe() {
    let html = render("[youtube](https://www.youtube.com/watch?v=dQw4w9WgXcQ)");
    assert!(html.contains("<iframe"));
    assert!(html.contains(r#"src="https://www.youtube.com/embed/dQw4w9WgXcQ""#));
}

#[test]
fn unrecognised_video_falls_back_to_link() {
    let html = render("[youtube](https://example.com/not-a-video)");
    assert!(!html.contains("<iframe"));
    assert!(html.starts_with(r#"<a href="https://example.com/not-a-video" target="_blank""#));
    assert!(html.ends_with(">https://example.com/not-a-video</a>"));
}

#[test]
fn image_keeps_alt_and_src() {
    let html = render("![alt text](https://example.com/a.png)");
    assert!(html.starts_with(r#"<img src="https://example.com/a.png" alt="alt text""#));
    assert!(html.ends_with(" />"));
}

#[test]
fn newlines_become_breaks() {
    let html = render("line1\nline2");
    assert_eq!(html, "line1<br />line2");
    assert!(!html.contains('\n'));
}

#[test]
fn combined_document_keeps_element_order() {
    let html = render("### Hi\n**bold** and [youtube](https://youtu.be/abcdefghijk)");
    insta::assert_snapshot!(html, @r#"<h3 class="text-2xl font-bold mt-8 mb-4 text-slate-900 dark:text-white">Hi</h3><br /><strong class="font-bold text-cyan-700 dark:text-cyan-400">bold</strong> and <div class="aspect-video my-6 w-full"><iframe class="w-full h-full rounded-xl shadow-lg border border-slate-200 dark:border-slate-700" src="https://www.youtube.com/embed/abcdefghijk" allowfullscreen></iframe></div>"#);
}

#[test]
fn service_reports_metrics_per_request() {
    let request = RenderRequest::new(
        RenderTarget::PostBody(Uuid::new_v4()),
        "### A\n![x](y.png) **b**\n[youtube](https://youtu.be/abcdefghijk)",
    );
    let output = render_service().render(&request);

    assert_eq!(output.metrics.headings, 1);
    assert_eq!(output.metrics.images, 1);
    assert_eq!(output.metrics.bold_spans, 1);
    assert_eq!(output.metrics.video_embeds, 1);
    assert_eq!(output.metrics.video_links, 0);
    assert_eq!(output.html, render_content(request.content.as_deref()));
}

#[test]
fn excerpt_matches_listing_preview() {
    let text = "### Novità\n**AutoStocker** cresce ![foto](a.png)";
    assert_eq!(excerpt(text), "Novità AutoStocker cresce");
}
