use highlight::{DomHighlighter, HighlightConfig, HighlightRequest, MatchLocator, NormalizedText, Scope, locate};
use html::Document;
use html_test_support::assert_html_eq;
use normalize::{HighlightOptions, NormalizationEngine, NormalizerSpec};

const TEXTS: &[&str] = &[
    "I like apple pie and banana bread",
    "Crème brûlée, Straße, Äpfel und Öl",
    "aaaa aaaa",
    "He is manly and a man.",
    "ﬁne ligatures, e\u{301}te\u{301} and 日本語テキスト",
    "",
];

const QUERIES: &[&str] = &["apple banana", "a aa", "creme strasse", "man", "ete", "日本", "  "];

fn options_grid() -> Vec<HighlightOptions> {
    let mut out = Vec::new();
    for split in [false, true] {
        for exact in [false, true] {
            for preset in ["default", "strict"] {
                out.push(
                    HighlightOptions::default()
                        .split_words(split)
                        .exact_match(exact)
                        .normalizers(preset),
                );
            }
        }
    }
    out
}

fn assert_sorted_disjoint(ranges: &[core_types::MatchRange], context: &str) {
    for pair in ranges.windows(2) {
        assert!(pair[0].end <= pair[1].start, "{context}: {ranges:?}");
    }
    for range in ranges {
        assert!(range.start < range.end, "{context}: {ranges:?}");
    }
}

#[test]
fn mapped_ranges_never_overlap_and_land_on_char_boundaries() {
    let engine = NormalizationEngine::new();
    for options in options_grid() {
        let chain = engine.resolve(&options.normalizers);
        for query in QUERIES {
            let terms = engine.terms(query, &options);
            let locator = MatchLocator::new(&terms, options.exact_match).unwrap();
            for text in TEXTS {
                let normalized = NormalizedText::build(text, &engine, &chain);
                let found = locator.locate(normalized.as_str());
                let context = format!("{query:?} in {text:?} ({options:?})");
                assert_sorted_disjoint(&found, &context);
                let mapped = normalized.map_ranges(&found);
                assert_sorted_disjoint(&mapped, &context);
                for range in &mapped {
                    assert!(text.is_char_boundary(range.start), "{context}");
                    assert!(text.is_char_boundary(range.end), "{context}");
                }
            }
        }
    }
}

#[test]
fn exact_match_skips_partial_words() {
    let ranges = locate("He is manly and a man.", &["man".to_string()], true).unwrap();
    assert_eq!(ranges.len(), 1);
    assert_eq!(&"He is manly and a man."[ranges[0].start..ranges[0].end], "man");
    assert_eq!(ranges[0].start, 18);
}

#[test]
fn highlight_is_idempotent_and_reset_round_trips() {
    let markup = "<section><h1 highlightable>Crème brûlée</h1>\
        <p highlightable>I like <i>apple</i> pie and banana bread. Straße!</p>\
        <p>apple outside any container</p>\
        <div highlightable><span highlightable>nested apple</span> and apple</div></section>";
    let engine = NormalizationEngine::new();
    for options in options_grid() {
        for query in QUERIES {
            let mut doc = Document::from_html(markup).unwrap();
            let root = doc.root();
            let pristine = doc.inner_html(root);
            let mut highlighter = DomHighlighter::default();
            let request = HighlightRequest {
                query,
                options: &options,
                engine: &engine,
            };
            let first = highlighter.highlight(&mut doc, Scope::whole(root), request);
            let once = doc.inner_html(root);
            let second = highlighter.highlight(&mut doc, Scope::whole(root), request);
            assert_html_eq(&once, &doc.inner_html(root));
            assert_eq!(first, second);

            highlighter.reset(&mut doc, Scope::whole(root));
            assert_html_eq(&pristine, &doc.inner_html(root));
            for container in doc.descendants(root) {
                if let Some(snapshot) = highlighter.pristine(container) {
                    assert_eq!(html::fragment_html(snapshot), doc.inner_html(container));
                }
            }
        }
    }
}

#[test]
fn empty_query_reports_no_match() {
    let mut doc = Document::from_html("<p highlightable>apple</p>").unwrap();
    let root = doc.root();
    let engine = NormalizationEngine::new();
    let options = HighlightOptions::default();
    let mut highlighter = DomHighlighter::default();
    for query in ["", "   ", "\t\n"] {
        let outcome = highlighter.highlight(
            &mut doc,
            Scope::whole(root),
            HighlightRequest {
                query,
                options: &options,
                engine: &engine,
            },
        );
        assert!(!outcome.has_local_match);
        assert_eq!(doc.inner_html(root), "<p highlightable>apple</p>");
    }
}

#[test]
fn nested_containers_own_their_text() {
    let mut doc =
        Document::from_html("<div highlightable>apple <span highlightable>apple</span></div>")
            .unwrap();
    let root = doc.root();
    let engine = NormalizationEngine::new();
    let mut highlighter = DomHighlighter::default();
    let outcome = highlighter.highlight(
        &mut doc,
        Scope::whole(root),
        HighlightRequest {
            query: "apple",
            options: &HighlightOptions::default(),
            engine: &engine,
        },
    );
    assert_eq!(outcome.marks, 2);
    assert_eq!(highlighter.tracked_containers(), 2);
    assert_html_eq(
        "<div highlightable><mark>apple</mark> <span highlightable><mark>apple</mark></span></div>",
        &doc.inner_html(root),
    );
}

#[test]
fn config_drives_markup_names() {
    let config = HighlightConfig::from_toml_str(
        r#"
        normalizers = "strict"
        marker_attribute = "data-find"
        mark_element = "strong"
        "#,
    )
    .unwrap();
    let mut doc = Document::from_html("<p data-find>a-b c</p><p highlightable>abc</p>").unwrap();
    let root = doc.root();
    let engine = NormalizationEngine::new();
    let options = config.options();
    assert!(matches!(options.normalizers, NormalizerSpec::Preset(_)));
    let mut highlighter = DomHighlighter::new(config.settings());
    highlighter.highlight(
        &mut doc,
        Scope::whole(root),
        HighlightRequest {
            query: "abc",
            options: &options,
            engine: &engine,
        },
    );
    assert_html_eq(
        "<p data-find><strong>a-b c</strong></p><p highlightable>abc</p>",
        &doc.inner_html(root),
    );
}
