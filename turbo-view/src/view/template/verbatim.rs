//! `@verbatim ... @endverbatim` blocks.
//!
//! Before translation, each block is replaced with a placeholder no directive
//! matches. After translation, placeholders are decoded back into the original text,
//! escaped so the template language prints it byte-for-byte.
//!
//! Blocks can't be nested: the first `@endverbatim` closes the block.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)@verbatim(.*?)@endverbatim").expect("verbatim block regex")
});

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@__verbatim__\(([A-Za-z0-9+/=]*)\)__").expect("verbatim placeholder regex")
});

/// Replace verbatim blocks with placeholders.
pub fn protect(source: &str) -> String {
    BLOCK
        .replace_all(source, |captures: &Captures| {
            let content = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            format!("@__verbatim__({})__", STANDARD.encode(content))
        })
        .into_owned()
}

/// Put the original content of verbatim blocks back into the executable source.
pub fn restore(executable: &str) -> String {
    let mut result = String::with_capacity(executable.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(executable) {
        let (Some(placeholder), Some(encoded)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        // Not something we encoded, leave it alone.
        let content = match STANDARD
            .decode(encoded.as_str())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        {
            Some(content) => content,
            None => continue,
        };

        push_text(&mut result, &executable[last..placeholder.start()]);
        push_text(&mut result, &content.replace("<%", "<%%"));
        last = placeholder.end();
    }

    push_text(&mut result, &executable[last..]);

    result
}

// `<` at the end of one piece of text followed by `%` at the start of the
// next one would open a code block, so the `%` is doubled.
fn push_text(result: &mut String, text: &str) {
    if result.ends_with('<') && text.starts_with('%') {
        result.push('%');
    }

    result.push_str(text);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_protect_restore() {
        let source = "a @verbatim {{ raw }} @if(x) @endverbatim b @verbatim\n<%= y %>\n@endverbatim";
        let protected = protect(source);

        assert!(!protected.contains("{{ raw }}"));
        assert!(!protected.contains("@if"));
        assert_eq!(protected.matches("@__verbatim__(").count(), 2);

        assert_eq!(
            restore(&protected),
            "a  {{ raw }} @if(x)  b \n<%%= y %>\n"
        );
    }

    #[test]
    fn test_boundaries() {
        let protected = protect("<@verbatim%@endverbatim");
        assert_eq!(restore(&protected), "<%%");

        let protected = protect("@verbatim<@endverbatim%");
        assert_eq!(restore(&protected), "<%%");
    }

    #[test]
    fn test_unterminated() {
        let source = "@verbatim {{ x }}";
        assert_eq!(protect(source), source);
    }
}
