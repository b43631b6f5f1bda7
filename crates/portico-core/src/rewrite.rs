//! Resource URL rewriting.
//!
//! Fragments are embedded under a different origin than the backend that
//! rendered them, so every resource reference has to be made absolute
//! against the backend origin before injection.

/// Rewrites origin-relative URLs onto the backend origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRewriter {
    /// `scheme://host[:port]` without a trailing slash.
    origin: String,
    /// Scheme of `origin`, used for protocol-relative references.
    scheme: String,
}

impl UrlRewriter {
    pub fn new(origin: &str) -> Self {
        let origin = origin.trim().trim_end_matches('/').to_string();
        let scheme = origin
            .split_once("://")
            .map(|(s, _)| s.to_ascii_lowercase())
            .unwrap_or_else(|| "https".to_string());
        Self { origin, scheme }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Make `url` absolute.
    ///
    /// `http:`, `https:` and `data:` URLs (any case) are returned unchanged.
    /// `//host/x` takes the origin's scheme. Anything else is joined to the
    /// origin with exactly one `/`.
    pub fn rewrite(&self, url: &str) -> String {
        let trimmed = url.trim_start();
        if is_passthrough(trimmed) {
            return url.to_string();
        }
        if trimmed.starts_with("//") && !trimmed.starts_with("///") {
            return format!("{}:{}", self.scheme, trimmed);
        }
        format!("{}/{}", self.origin, trimmed.trim_start_matches('/'))
    }

    /// Rewrite the target of every `url(...)` token in a CSS string.
    ///
    /// Quoted and bare forms are both handled and the original quoting is
    /// kept. An unterminated `url(` leaves the remainder untouched.
    pub fn rewrite_css_urls(&self, css: &str) -> String {
        let mut out = String::with_capacity(css.len());
        let mut rest = css;

        while let Some(start) = find_url_function(rest) {
            let (before, after_open) = rest.split_at(start + 4);
            out.push_str(before);
            match parse_url_argument(after_open) {
                Some(arg) => {
                    out.push_str(arg.leading);
                    if arg.value.is_empty() {
                        out.push_str(arg.raw);
                    } else {
                        let rewritten = self.rewrite(arg.value);
                        match arg.quote {
                            Some(q) => {
                                out.push(q);
                                out.push_str(&rewritten);
                                out.push(q);
                            },
                            None => out.push_str(&rewritten),
                        }
                    }
                    out.push_str(arg.trailing);
                    out.push(')');
                    rest = &after_open[arg.consumed..];
                },
                None => {
                    out.push_str(after_open);
                    rest = "";
                },
            }
        }
        out.push_str(rest);
        out
    }

    /// Rewrite every candidate URL in a `srcset` attribute, keeping the
    /// width/density descriptors.
    pub fn rewrite_srcset(&self, srcset: &str) -> String {
        let mut candidates = Vec::new();
        let mut rest = srcset;
        loop {
            rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
            if rest.is_empty() {
                break;
            }
            let url_end = rest
                .find(|c: char| c.is_ascii_whitespace())
                .unwrap_or(rest.len());
            let mut url = &rest[..url_end];
            rest = &rest[url_end..];

            // A URL glued to the next candidate by a comma ends there.
            let descriptor = if url.ends_with(',') {
                url = url.trim_end_matches(',');
                ""
            } else {
                let end = rest.find(',').unwrap_or(rest.len());
                let d = rest[..end].trim();
                rest = &rest[end..];
                d
            };

            let rewritten = self.rewrite(url);
            if descriptor.is_empty() {
                candidates.push(rewritten);
            } else {
                candidates.push(format!("{rewritten} {descriptor}"));
            }
        }
        candidates.join(", ")
    }
}

/// Whether a URL starts with a scheme that is left alone.
fn is_passthrough(url: &str) -> bool {
    ["http://", "https://", "data:"].iter().any(|prefix| {
        url.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Byte offset of the next `url(` whose name is not part of a longer
/// identifier.
fn find_url_function(css: &str) -> Option<usize> {
    let bytes = css.as_bytes();
    let mut from = 0;
    while from + 4 <= bytes.len() {
        let pos = from
            + bytes[from..]
                .windows(4)
                .position(|w| w.eq_ignore_ascii_case(b"url("))?;
        let boundary = css[..pos].chars().next_back().is_none_or(|c| !is_ident_char(c));
        if boundary {
            return Some(pos);
        }
        from = pos + 4;
    }
    None
}

/// The inside of a `url(...)` token.
struct UrlArgument<'a> {
    /// Whitespace between `(` and the value.
    leading: &'a str,
    quote: Option<char>,
    value: &'a str,
    /// Everything between the `(` and `)` as written.
    raw: &'a str,
    /// Whitespace between the value and `)`.
    trailing: &'a str,
    /// Bytes consumed, including the closing `)`.
    consumed: usize,
}

/// Parse the argument following `url(`; `None` when unterminated.
fn parse_url_argument(s: &str) -> Option<UrlArgument<'_>> {
    let value_start = s.len() - s.trim_start().len();
    let leading = &s[..value_start];
    let body = &s[value_start..];

    let (quote, value, after_value) = match body.chars().next() {
        Some(q @ ('"' | '\'')) => {
            let mut escaped = false;
            let mut close = None;
            for (i, c) in body[1..].char_indices() {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    c if c == q => {
                        close = Some(i + 1);
                        break;
                    },
                    _ => {},
                }
            }
            let close = close?;
            (Some(q), &body[1..close], value_start + close + 1)
        },
        _ => {
            let end = body.find(')')?;
            let value = body[..end].trim_end();
            (None, value, value_start + value.len())
        },
    };

    let remainder = &s[after_value..];
    let trailing_len = remainder.len() - remainder.trim_start().len();
    if !remainder[trailing_len..].starts_with(')') {
        return None;
    }
    Some(UrlArgument {
        leading,
        quote,
        value,
        raw: &s[value_start..after_value],
        trailing: &remainder[..trailing_len],
        consumed: after_value + trailing_len + 1,
    })
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------
