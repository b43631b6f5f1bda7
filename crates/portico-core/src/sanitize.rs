//! Style sanitizer.
//!
//! Embedded fragments share layout context with the host shell, so any
//! `transform` or `zoom` they carry would shift the shell's coordinate
//! system. This is not a CSS parser: a small tokenizer splits the text into
//! segments at top-level `;`, `{` and `}` (skipping comments, strings and
//! parenthesised values) and each declaration segment is judged by its
//! property name alone.

/// Remove `transform`/`zoom` declarations and neutralize `scale(...)`.
///
/// Works on full stylesheets and on bare declaration lists (inline `style`
/// attributes). Removed declarations take their terminating `;` with them.
pub fn sanitize(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    for segment in Segments::new(css) {
        match segment.terminator {
            Some('{') => {
                out.push_str(segment.text);
                out.push('{');
            },
            terminator => {
                let keep = match property_name(segment.text) {
                    Some(name) if is_blocked_property(&name) => {
                        log::trace!("Dropping `{name}` declaration");
                        false
                    },
                    Some(_) => true,
                    None => true,
                };
                if keep {
                    out.push_str(&neutralize_scale(segment.text));
                    if let Some(t) = terminator {
                        out.push(t);
                    }
                } else if terminator == Some('}') {
                    out.push('}');
                }
            },
        }
    }
    out
}

/// `transform`, `-<vendor>-transform`, or `zoom`.
fn is_blocked_property(name: &str) -> bool {
    if name == "transform" || name == "zoom" {
        return true;
    }
    name.strip_prefix('-')
        .and_then(|rest| rest.strip_suffix("-transform"))
        .is_some_and(|vendor| {
            !vendor.is_empty() && vendor.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

// -------------------------------------------------------------------
// Segmenting
// -------------------------------------------------------------------

/// A run of text ending at a top-level `;`, `{`, `}` or end of input.
struct Segment<'a> {
    text: &'a str,
    terminator: Option<char>,
}

struct Segments<'a> {
    css: &'a str,
    pos: usize,
}

impl<'a> Segments<'a> {
    fn new(css: &'a str) -> Self {
        Self { css, pos: 0 }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        if self.pos >= self.css.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.css[start..];
        let mut scanner = Scanner::default();

        for (i, c) in rest.char_indices() {
            if scanner.is_top_level() && matches!(c, ';' | '{' | '}') {
                self.pos = start + i + 1;
                return Some(Segment {
                    text: &rest[..i],
                    terminator: Some(c),
                });
            }
            scanner.feed(rest, i, c);
        }

        self.pos = self.css.len();
        Some(Segment {
            text: rest,
            terminator: None,
        })
    }
}

/// Lexical state shared by the segmenter and the property finder.
#[derive(Default)]
struct Scanner {
    in_comment: bool,
    /// Byte offset where the current comment opened, so `/*/` is not a
    /// complete comment.
    comment_start: usize,
    quote: Option<char>,
    escaped: bool,
    depth: usize,
}

impl Scanner {
    fn is_top_level(&self) -> bool {
        !self.in_comment && self.quote.is_none() && self.depth == 0
    }

    fn feed(&mut self, text: &str, i: usize, c: char) {
        if self.in_comment {
            if c == '/' && i > self.comment_start + 2 && text[..i].ends_with('*') {
                self.in_comment = false;
            }
            return;
        }
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
            return;
        }
        match c {
            '/' if text[i + 1..].starts_with('*') => {
                self.in_comment = true;
                self.comment_start = i;
            },
            '"' | '\'' => self.quote = Some(c),
            '(' => self.depth += 1,
            ')' => self.depth = self.depth.saturating_sub(1),
            _ => {},
        }
    }
}

/// Lowercased property name of a declaration segment, comments removed.
/// `None` when the segment has no top-level `:`.
fn property_name(segment: &str) -> Option<String> {
    let mut scanner = Scanner::default();
    let mut name = String::new();
    for (i, c) in segment.char_indices() {
        let was_comment = scanner.in_comment;
        if scanner.is_top_level() && c == ':' {
            let name = name.trim().to_ascii_lowercase();
            return (!name.is_empty()).then_some(name);
        }
        scanner.feed(segment, i, c);
        if !was_comment && !scanner.in_comment {
            name.push(c);
        }
    }
    None
}

// -------------------------------------------------------------------
// scale()
// -------------------------------------------------------------------

/// Replace every `scale(...)` call (whole identifier, any case) with
/// `scale(1)`.
fn neutralize_scale(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search = 0;

    while let Some(found) = lower[search..].find("scale(") {
        let start = search + found;
        let boundary = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        let args_start = start + "scale(".len();
        if !boundary {
            search = args_start;
            continue;
        }
        let Some(close) = matching_paren(&text[args_start..]) else {
            break;
        };
        out.push_str(&text[copied..start]);
        out.push_str("scale(1)");
        copied = args_start + close + 1;
        search = copied;
    }
    out.push_str(&text[copied..]);
    out
}

/// Offset of the `)` closing a group whose `(` precedes `s`.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {},
        }
    }
    None
}

// -------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_transform_and_zoom_with_semicolon() {
        assert_eq!(
            sanitize(".a{color:red;transform:translateX(10px);zoom:1.5;margin:0}"),
            ".a{color:red;margin:0}"
        );
    }

    #[test]
    fn last_declaration_before_brace() {
        assert_eq!(sanitize(".a{color:red;transform:none}"), ".a{color:red;}");
        assert_eq!(sanitize(".a{zoom:2}.b{x:y}"), ".a{}.b{x:y}");
    }

    #[test]
    fn vendor_prefixes_and_case() {
        let css = ".a{-webkit-transform:rotate(1deg);-MS-Transform:none; TRANSFORM : x ;top:0}";
        assert_eq!(sanitize(css), ".a{top:0}");
    }

    #[test]
    fn unrelated_properties_sharing_a_substring_survive() {
        let css = ".a{text-transform:uppercase;transform-origin:0 0;zoom-level:2;-webkit-transform-origin:0}";
        assert_eq!(sanitize(css), css);
    }

    #[test]
    fn scale_becomes_identity() {
        assert_eq!(
            sanitize(".a{scale-hint:1;animation:pulse 1s;b:scale(1.5) SCALE(2, 3)}"),
            ".a{scale-hint:1;animation:pulse 1s;b:scale(1) scale(1)}"
        );
        let untouched = ".a{b:upscale(2);c:scale3d(1,2,3)}";
        assert_eq!(sanitize(untouched), untouched);
        assert_eq!(sanitize(".a{b:scale(calc(1 + 1))}"), ".a{b:scale(1)}");
    }

    #[test]
    fn preludes_untouched() {
        let css = "@media (max-width: 600px){.zoom:hover{color:red}}";
        assert_eq!(sanitize(css), css);
        assert_eq!(
            sanitize("@media print{.a{transform:none;color:red}}"),
            "@media print{.a{color:red}}"
        );
    }

    #[test]
    fn semicolons_in_strings_and_urls_do_not_split() {
        let css = r#".a{background:url("data:image/png;base64,AA");content:"x;transform:y"}"#;
        assert_eq!(sanitize(css), css);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(sanitize(".a{/* x; */transform:none;color:red}"), ".a{color:red}");
        assert_eq!(sanitize(".a{/* keep */color:red}"), ".a{/* keep */color:red}");
    }

    #[test]
    fn inline_declaration_lists() {
        assert_eq!(sanitize("transform: scale(2); color: red"), " color: red");
        assert_eq!(sanitize("width: 10px; transform: none"), "width: 10px;");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn at_rules_without_colon_kept() {
        let css = "@import url(https://h.example/a.css);.a{b:c}";
        assert_eq!(sanitize(css), css);
    }

    #[test]
    fn blocked_property_names() {
        assert!(is_blocked_property("transform"));
        assert!(is_blocked_property("-moz-transform"));
        assert!(is_blocked_property("zoom"));
        assert!(!is_blocked_property("--transform"));
        assert!(!is_blocked_property("-webkit-transform-style"));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn arb_declaration() -> impl Strategy<Value = String> {
            prop_oneof![
                "(color|margin|padding|text-transform|transform-origin|top)\\s?:\\s?[a-z0-9 #]{1,8}",
                "(transform|TRANSFORM|-webkit-transform|-moz-transform|zoom|Zoom)\\s{0,2}:\\s{0,2}[a-z0-9(). ]{1,12}",
                "(transform|b)\\s?:\\s?scale\\([0-9.]{1,3}\\)",
            ]
        }

        fn arb_rule() -> impl Strategy<Value = String> {
            proptest::collection::vec(arb_declaration(), 0..6)
                .prop_map(|decls| format!(".x{{{}}}", decls.join(";")))
        }

        fn declarations(css: &str) -> Vec<(String, String)> {
            Segments::new(css)
                .filter(|s| s.terminator != Some('{'))
                .filter_map(|s| {
                    let name = property_name(s.text)?;
                    let value = s.text.split_once(':')?.1.to_string();
                    Some((name, value))
                })
                .collect()
        }

        proptest! {
            #[test]
            fn no_blocked_declarations_survive(css in arb_rule()) {
                let out = sanitize(&css);
                for (name, _) in declarations(&out) {
                    prop_assert!(!is_blocked_property(&name), "{name} survived in {out}");
                }
            }

            #[test]
            fn every_scale_is_identity(css in arb_rule()) {
                let out = sanitize(&css).to_ascii_lowercase();
                let mut rest = out.as_str();
                while let Some(i) = rest.find("scale(") {
                    prop_assert!(rest[i..].starts_with("scale(1)"), "in {out}");
                    rest = &rest[i + 6..];
                }
            }

            #[test]
            fn sanitize_is_idempotent(css in arb_rule()) {
                let once = sanitize(&css);
                prop_assert_eq!(sanitize(&once), once.clone());
            }
        }
    }
}
