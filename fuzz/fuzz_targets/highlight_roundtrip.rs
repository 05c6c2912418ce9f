#![no_main]

use highlight::{DomHighlighter, HighlightRequest, MatchLocator, NormalizedText, Scope};
use html::Document;
use libfuzzer_sys::fuzz_target;
use normalize::{HighlightOptions, NormalizationEngine};

// Input layout: one flag byte, then `query \0 text`.
fuzz_target!(|data: &[u8]| {
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let Ok(input) = std::str::from_utf8(rest) else {
        return;
    };
    let (query, text) = input.split_once('\0').unwrap_or((input, "apple banana"));
    let options = HighlightOptions::default()
        .split_words(flags & 1 != 0)
        .exact_match(flags & 2 != 0)
        .normalizers(if flags & 4 != 0 { "strict" } else { "default" });
    let engine = NormalizationEngine::new();

    let chain = engine.resolve(&options.normalizers);
    let terms = engine.terms(query, &options);
    let Ok(locator) = MatchLocator::new(&terms, options.exact_match) else {
        return;
    };
    let normalized = NormalizedText::build(text, &engine, &chain);
    let mapped = normalized.map_ranges(&locator.locate(normalized.as_str()));
    for pair in mapped.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
    for range in &mapped {
        assert!(range.start < range.end && range.end <= text.len());
        assert!(text.is_char_boundary(range.start) && text.is_char_boundary(range.end));
    }

    let mut doc = Document::new();
    let root = doc.root();
    let Ok(container) = doc.create_element("p") else {
        return;
    };
    let Ok(node) = doc.create_text(text) else {
        return;
    };
    if doc.set_attribute(container, "highlightable", None).is_err()
        || doc.append_child(container, node).is_err()
        || doc.append_child(root, container).is_err()
    {
        return;
    }
    let pristine = doc.inner_html(root);
    let mut highlighter = DomHighlighter::default();
    let request = HighlightRequest {
        query,
        options: &options,
        engine: &engine,
    };
    let outcome = highlighter.highlight(&mut doc, Scope::whole(root), request);
    assert_eq!(outcome.marks, mapped.len());
    assert_eq!(doc.text_content(root), text);
    let once = doc.inner_html(root);
    highlighter.highlight(&mut doc, Scope::whole(root), request);
    assert_eq!(doc.inner_html(root), once);
    highlighter.reset(&mut doc, Scope::whole(root));
    assert_eq!(doc.inner_html(root), pristine);
});
