//! Turbo View is the template engine of TurboFrame, written in Rust. Templates are plain markup with
//! `{{ interpolations }}` and `@directives`, translated into a small executable language and interpreted at runtime.
//! Compiled templates are cached in process memory and on disk, rendered fragments can be memoized,
//! and pages compose through layouts and named sections.
//!
//! # Getting started
//!
//! ```
//! use turbo_view::prelude::*;
//!
//! let template = Template::from_str("<h1>{{ title }}</h1>").unwrap();
//! let mut context = Context::new();
//! context.set("title", "<Hello>").unwrap();
//!
//! assert_eq!(template.render(&context).unwrap(), "<h1>&lt;Hello&gt;</h1>");
//! ```
//!
//! ### Engine
//!
//! Templates stored on disk are rendered through the [`view::Engine`], which resolves dotted names
//! (`layouts.main`) to files in the views directory, caches compiled templates and follows
//! `@extends` layout chains:
//!
//! ```rust,ignore
//! use turbo_view::prelude::*;
//!
//! let engine = Engine::new(Config::default());
//! engine.share("app_name", "TurboFrame")?;
//!
//! let html = engine.render("welcome", [("user", "Lev")])?;
//! ```
pub mod cache;
pub mod colors;
pub mod config;
pub mod csrf;
pub mod logging;
pub mod prelude;
pub mod view;

/// Serde is used for (de)serialization.
pub use serde;
/// Tokio is an asynchronous runtime for Rust.
pub use tokio;

/// Convert text to snake_case.
pub fn snake_case(string: &str) -> String {
    let mut result = "".to_string();

    for (i, c) in string.chars().enumerate() {
        if c.is_ascii_uppercase() && i != 0 {
            result.push('_');
            result.push(c.to_ascii_lowercase());
        } else if c == '-' {
            result.push('_');
        } else {
            result.push(c.to_ascii_lowercase());
        }
    }

    result
}

/// Convert the first letter of the string to uppercase lettering.
pub fn capitalize(string: &str) -> String {
    let mut iter = string.chars();
    match iter.next() {
        None => String::new(),
        Some(letter) => letter.to_uppercase().chain(iter).collect(),
    }
}

/// Convert string to PascalCase (often confused with camelCase).
pub fn pascal_case(string: &str) -> String {
    string
        .split('_')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join("")
}

/// Remove unsafe characters from a string printed
/// inside an HTML template.
///
/// All five characters with special meaning in markup and attribute values
/// are replaced: `&`, `<`, `>`, `"` and `'`.
pub fn escape_html(string: &str) -> String {
    let mut result = String::with_capacity(string.len());

    for c in string.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#039;"),
            c => result.push(c),
        }
    }

    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="/?a=1&b='2'">"#),
            "&lt;a href=&quot;/?a=1&amp;b=&#039;2&#039;&quot;&gt;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(snake_case("UserProfile"), "user_profile");
        assert_eq!(pascal_case("user_profile"), "UserProfile");
        assert_eq!(capitalize("hello"), "Hello");
    }
}
