//! Directive translator.
//!
//! Turns template source written with `{{ interpolations }}` and `@directives`
//! into executable source, e.g.:
//!
//! ```text
//! @if($user) Hello, {{ $user->name }} @endif
//! ```
//!
//! becomes
//!
//! ```text
//! <% if ($user) %> Hello, <%= $user->name %> <% end %>
//! ```
//!
//! The source is scanned once, left to right. At each position the rules are tried in order
//! and the first one that matches is applied; its output is never scanned again.
//! Anything no rule matches is copied as text, with `<%` escaped as `<%%`.
use super::verbatim;

use once_cell::sync::Lazy;
use regex::Regex;

static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([A-Za-z_][A-Za-z0-9_]*)").expect("directive regex"));

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        // Comments
        Rule::delimited("{{--", "--}}", false, |_| String::new()),
        // Output
        Rule::delimited("{{{", "}}}", true, |expr| format!("<%= {} %>", expr)),
        Rule::delimited("{!!", "!!}", true, |expr| format!("<%- {} %>", expr)),
        Rule::delimited("{{", "}}", true, |expr| format!("<%= {} %>", expr)),
        // Partials
        Rule::call("calling", |args| format!("<%- render({}) %>", args)),
        // Control flow
        Rule::call("if", |expr| format!("<% if ({}) %>", expr)),
        Rule::call("elseif", |expr| format!("<% elsif ({}) %>", expr)),
        Rule::directive("else", |_| "<% else %>".into()),
        Rule::directive("endif", |_| "<% end %>".into()),
        Rule::call("unless", |expr| format!("<% if !({}) %>", expr)),
        Rule::directive("endunless", |_| "<% end %>".into()),
        Rule::call("foreach", |expr| format!("<% foreach {} %>", expr)),
        Rule::directive("endforeach", |_| "<% end %>".into()),
        // Forms
        Rule::directive("csrf", |_| "<%- csrf_field() %>".into()),
        // Fragment cache
        Rule::call("cache", |args| format!("<% if fragment_start({}) %>", args)),
        Rule::directive("endcache", |_| "<% fragment_end() %><% end %>".into()),
        // Code
        Rule::block("php", "@endphp", |code| format!("<% {} %>", code.trim())),
        // Layouts
        Rule::call("extends", |name| format!("<% extends({}) %>", name)),
        Rule::call("section", |args| format!("<% section_start({}) %>", args)),
        Rule::directive("endsection", |_| "<% section_end() %>".into()),
        Rule::call("yield", |args| format!("<%- yield_section({}) %>", args)),
    ]
});

#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// `open ... close`, e.g. `{{ name }}`. Only `quoted` content is
    /// an expression; quotes in it can contain the closing delimiter.
    Delimited {
        open: &'static str,
        close: &'static str,
        quoted: bool,
    },

    /// `@name`
    Directive(&'static str),

    /// `@name(arguments)`, parentheses balanced and quote-aware.
    Call(&'static str),

    /// `@name ... close`, content copied without translation.
    Block {
        name: &'static str,
        close: &'static str,
    },
}

/// A translation rule: what to match and how to rewrite it.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    matcher: Matcher,
    rewrite: fn(&str) -> String,
}

impl Rule {
    fn delimited(
        open: &'static str,
        close: &'static str,
        quoted: bool,
        rewrite: fn(&str) -> String,
    ) -> Self {
        Self {
            matcher: Matcher::Delimited {
                open,
                close,
                quoted,
            },
            rewrite,
        }
    }

    fn directive(name: &'static str, rewrite: fn(&str) -> String) -> Self {
        Self {
            matcher: Matcher::Directive(name),
            rewrite,
        }
    }

    fn call(name: &'static str, rewrite: fn(&str) -> String) -> Self {
        Self {
            matcher: Matcher::Call(name),
            rewrite,
        }
    }

    fn block(name: &'static str, close: &'static str, rewrite: fn(&str) -> String) -> Self {
        Self {
            matcher: Matcher::Block { name, close },
            rewrite,
        }
    }

    /// Try the rule at the start of `rest`. `directive` is the name of the
    /// directive starting there, if any. Returns the rewritten text and how
    /// many bytes of `rest` it replaces.
    fn apply(&self, rest: &str, directive: Option<&str>) -> Option<(String, usize)> {
        match self.matcher {
            Matcher::Delimited {
                open,
                close,
                quoted,
            } => {
                let inner = rest.strip_prefix(open)?;

                let end = if quoted {
                    let end = find_unquoted(inner, close)?;
                    // Expressions are a single line, and not empty.
                    if inner[..end].contains('\n') || inner[..end].trim().is_empty() {
                        return None;
                    }
                    end
                } else {
                    inner.find(close)?
                };

                let content = inner[..end].trim();
                Some(((self.rewrite)(content), open.len() + end + close.len()))
            }

            Matcher::Directive(name) => {
                if directive? != name {
                    return None;
                }

                Some(((self.rewrite)(""), name.len() + 1))
            }

            Matcher::Call(name) => {
                if directive? != name {
                    return None;
                }

                let after = &rest[name.len() + 1..];
                let spaces = after.len() - after.trim_start_matches([' ', '\t']).len();
                let (args, len) = arguments(&after[spaces..])?;

                Some(((self.rewrite)(args.trim()), name.len() + 1 + spaces + len))
            }

            Matcher::Block { name, close } => {
                if directive? != name {
                    return None;
                }

                let body = &rest[name.len() + 1..];
                let end = body.find(close)?;

                Some((
                    (self.rewrite)(&body[..end]),
                    name.len() + 1 + end + close.len(),
                ))
            }
        }
    }
}

/// Translate template source into executable source.
///
/// Translation is deterministic: the same source always produces the same output.
pub fn translate(source: &str) -> String {
    let source = verbatim::protect(source);
    let mut output = String::with_capacity(source.len() + source.len() / 4);
    let mut rest = source.as_str();

    while let Some(c) = rest.chars().next() {
        let rewritten = match c {
            '{' => RULES.iter().find_map(|rule| rule.apply(rest, None)),
            '@' => {
                let directive = DIRECTIVE
                    .captures(rest)
                    .and_then(|captures| captures.get(1))
                    .map(|name| name.as_str());

                match directive {
                    Some(directive) => RULES
                        .iter()
                        .find_map(|rule| rule.apply(rest, Some(directive))),
                    None => None,
                }
            }
            _ => None,
        };

        match rewritten {
            Some((text, consumed)) => {
                output.push_str(&text);
                rest = &rest[consumed..];
            }

            None => {
                // A literal `<%` is printed as-is.
                if c == '%' && output.ends_with('<') {
                    output.push('%');
                }

                output.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    verbatim::restore(&output)
}

// Find `needle` in `text`, skipping over string literals.
fn find_unquoted(text: &str, needle: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }

            None => {
                if text[i..].starts_with(needle) {
                    return Some(i);
                }

                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
            }
        }
    }

    None
}

// Parenthesized arguments at the start of `text`. Returns the text between the
// parentheses and the length of the whole group.
fn arguments(text: &str) -> Option<(&str, usize)> {
    if !text.starts_with('(') {
        return None;
    }

    let mut depth = 0;
    let mut quote = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }

            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((&text[1..i], i + 1));
                    }
                }
                _ => (),
            },
        }
    }

    None
}
