#![no_main]

use html::Document;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(doc) = Document::from_html(input) else {
        return;
    };
    // Serializing and reparsing is stable after one round.
    let once = doc.inner_html(doc.root());
    let Ok(again) = Document::from_html(&once) else {
        panic!("reparse of serialized markup failed: {once:?}");
    };
    assert_eq!(again.inner_html(again.root()), once);
});
