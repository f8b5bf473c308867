use jobrank_core::tokenizer::{tokenize, StopWords, Tokenizer};

#[test]
fn it_filters_stopwords() {
    assert_eq!(tokenize("the quick fox in the box"), vec!["quick", "fox", "box"]);
}

#[test]
fn it_drops_single_char_tokens() {
    assert_eq!(tokenize("a bb ccc"), vec!["bb", "ccc"]);
}

#[test]
fn it_is_idempotent() {
    let inputs = [
        "The quick brown fox and the lazy dog",
        "<p>Build REST APIs</p> with Laravel & Vue.js (3+ years)",
        "C# / .NET — Azure; e-mail: jobs@example.com",
        "   ",
        "",
        "İstanbul Ünternehmen ß straße",
    ];
    for tokenizer in [Tokenizer::new(StopWords::Base), Tokenizer::new(StopWords::Extended)] {
        for input in inputs {
            let once = tokenizer.tokenize(input);
            let twice = tokenizer.tokenize(&once.join(" "));
            assert_eq!(once, twice, "input: {input:?}");
        }
    }
}

#[test]
fn empty_and_stripped_input_yield_nothing() {
    assert!(tokenize("").is_empty());
    assert!(tokenize("!!! ... ---").is_empty());
    assert!(tokenize("a of the b").is_empty());
}

#[test]
fn terms_are_lowercase_word_characters() {
    for term in tokenize("Kubernetes, GoLang & PostgreSQL@AWS") {
        assert!(term.len() >= 2);
        assert!(term.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }
}
