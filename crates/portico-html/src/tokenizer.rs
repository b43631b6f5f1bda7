//! HTML tokenizer.
//!
//! Consumes a UTF-8 `&str` and emits a flat `Vec<Token>`. This is the subset
//! of the WHATWG tokenization rules that server-rendered pages need: tags,
//! quoted/unquoted attributes, comments, DOCTYPE, character references,
//! raw text (`<script>`, `<style>`) and RCDATA (`<title>`, `<textarea>`).
//! Malformed input never panics; a tag cut off by end-of-file is dropped.

use crate::entities;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// A single token emitted by the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartTag(StartTagToken),
    EndTag(EndTagToken),
    Character(String),
    Comment(String),
    Doctype(String),
    Eof,
}

/// An opening tag with attributes and the self-closing flag.
#[derive(Debug, Clone, PartialEq)]
pub struct StartTagToken {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
}

/// A closing tag. Attributes on end tags are discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct EndTagToken {
    pub name: String,
}

/// A single `name="value"` attribute pair, value already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Content model after a start tag that switches the tokenizer.
#[derive(Debug, Clone, PartialEq)]
enum TextMode {
    /// `script` / `style`: no character references.
    Raw(String),
    /// `title` / `textarea`: character references decoded.
    RcData(String),
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// HTML tokenizer.
///
/// Construct with [`Tokenizer::new`], then call [`Tokenizer::tokenize`].
pub struct Tokenizer {
    input: Vec<char>,
    pos: usize,
    text_mode: Option<TextMode>,
}

impl Tokenizer {
    /// Create a new tokenizer over the given input.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            text_mode: None,
        }
    }

    /// Consume the input and return the token stream, ending in `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token == Token::Eof;
            if let Token::Character(ref new_text) = token
                && let Some(Token::Character(prev)) = tokens.last_mut()
            {
                prev.push_str(new_text);
                continue;
            }
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    // -- helpers ------------------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    /// Case-insensitive look-ahead at `offset` from the current position.
    fn matches_ci_at(&self, offset: usize, s: &str) -> bool {
        s.chars().enumerate().all(|(i, expected)| {
            self.input
                .get(self.pos + offset + i)
                .is_some_and(|c| c.eq_ignore_ascii_case(&expected))
        })
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consume characters up to (not including) `terminator`, then skip the
    /// terminator. Returns the consumed text. Runs to EOF if not found.
    fn consume_until(&mut self, terminator: &str) -> String {
        let mut out = String::new();
        while self.pos < self.input.len() {
            if self.matches_ci_at(0, terminator) {
                self.pos += terminator.chars().count();
                return out;
            }
            out.push(self.input[self.pos]);
            self.pos += 1;
        }
        out
    }

    // -- main dispatch ------------------------------------------------------

    fn next_token(&mut self) -> Token {
        if let Some(mode) = self.text_mode.take() {
            let text = self.consume_text_content(&mode);
            if !text.is_empty() {
                return Token::Character(text);
            }
        }

        let Some(ch) = self.peek() else {
            return Token::Eof;
        };

        if ch == '<' {
            if let Some(token) = self.tag_open() {
                return token;
            }
            // Not markup after all: emit the `<` as text.
            self.pos += 1;
            return Token::Character("<".to_string());
        }

        self.data()
    }

    /// Text up to the next `<`, with character references decoded.
    fn data(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '<') {
            self.pos += 1;
        }
        let raw: String = self.input[start..self.pos].iter().collect();
        Token::Character(entities::decode(&raw).into_owned())
    }

    /// Raw text or RCDATA content up to the matching end tag.
    fn consume_text_content(&mut self, mode: &TextMode) -> String {
        let (name, decode) = match mode {
            TextMode::Raw(name) => (name.as_str(), false),
            TextMode::RcData(name) => (name.as_str(), true),
        };
        let start = self.pos;
        while self.pos < self.input.len() {
            if self.input[self.pos] == '<'
                && self.peek_at(1) == Some('/')
                && self.matches_ci_at(2, name)
                && self
                    .peek_at(2 + name.len())
                    .is_none_or(|c| c.is_ascii_whitespace() || c == '/' || c == '>')
            {
                break;
            }
            self.pos += 1;
        }
        let raw: String = self.input[start..self.pos].iter().collect();
        if decode {
            entities::decode(&raw).into_owned()
        } else {
            raw
        }
    }

    /// Handle `<`. Returns `None` when the `<` does not start markup.
    fn tag_open(&mut self) -> Option<Token> {
        match self.peek_at(1)? {
            '!' => Some(self.markup_declaration()),
            '/' => self.end_tag(),
            '?' => {
                self.pos += 2;
                Some(Token::Comment(self.consume_until(">")))
            },
            c if c.is_ascii_alphabetic() => self.start_tag(),
            _ => None,
        }
    }

    /// `<!--...-->`, `<!DOCTYPE ...>`, or a bogus comment.
    fn markup_declaration(&mut self) -> Token {
        if self.matches_ci_at(2, "--") {
            self.pos += 4;
            return Token::Comment(self.consume_until("-->"));
        }
        if self.matches_ci_at(2, "doctype") {
            self.pos += 9;
            let body = self.consume_until(">");
            return Token::Doctype(body.trim().to_ascii_lowercase());
        }
        if self.matches_ci_at(2, "[CDATA[") {
            self.pos += 9;
            return Token::Comment(self.consume_until("]]>"));
        }
        self.pos += 2;
        Token::Comment(self.consume_until(">"))
    }

    fn end_tag(&mut self) -> Option<Token> {
        match self.peek_at(2) {
            Some(c) if c.is_ascii_alphabetic() => {
                self.pos += 2;
                let name = self.tag_name();
                // Attributes on end tags are ignored.
                self.consume_until(">");
                Some(Token::EndTag(EndTagToken { name }))
            },
            Some('>') => {
                // `</>` is dropped entirely.
                self.pos += 3;
                Some(Token::Character(String::new()))
            },
            Some(_) => {
                self.pos += 2;
                Some(Token::Comment(self.consume_until(">")))
            },
            None => None,
        }
    }

    fn tag_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() || c == '/' || c == '>' {
                break;
            }
            name.push(c.to_ascii_lowercase());
            self.pos += 1;
        }
        name
    }

    fn start_tag(&mut self) -> Option<Token> {
        self.pos += 1;
        let name = self.tag_name();
        let mut attributes: Vec<Attribute> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    // EOF inside a tag: the tag is dropped.
                    return Some(Token::Eof);
                },
                Some('>') => {
                    self.pos += 1;
                    break;
                },
                Some('/') => {
                    self.pos += 1;
                    if self.peek() == Some('>') {
                        self_closing = true;
                        self.pos += 1;
                        break;
                    }
                },
                Some(_) => {
                    if let Some(attr) = self.attribute()
                        && !attributes.iter().any(|a| a.name == attr.name)
                    {
                        attributes.push(attr);
                    }
                },
            }
        }

        match name.as_str() {
            "script" | "style" => self.text_mode = Some(TextMode::Raw(name.clone())),
            "title" | "textarea" => self.text_mode = Some(TextMode::RcData(name.clone())),
            _ => {},
        }

        Some(Token::StartTag(StartTagToken {
            name,
            attributes,
            self_closing,
        }))
    }

    /// Parse one attribute. Returns `None` for an empty name.
    fn attribute(&mut self) -> Option<Attribute> {
        let mut name = String::new();
        // A leading `=` is part of the name per the tokenizer rules.
        if self.peek() == Some('=') {
            name.push('=');
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() || c == '/' || c == '>' || c == '=' {
                break;
            }
            name.push(c.to_ascii_lowercase());
            self.pos += 1;
        }

        self.skip_whitespace();
        let mut value = String::new();
        if self.peek() == Some('=') {
            self.pos += 1;
            self.skip_whitespace();
            match self.peek() {
                Some(quote @ ('"' | '\'')) => {
                    self.pos += 1;
                    let raw = self.consume_until(&quote.to_string());
                    value = entities::decode(&raw).into_owned();
                },
                _ => {
                    let start = self.pos;
                    while self
                        .peek()
                        .is_some_and(|c| !c.is_ascii_whitespace() && c != '>')
                    {
                        self.pos += 1;
                    }
                    let raw: String = self.input[start..self.pos].iter().collect();
                    value = entities::decode(&raw).into_owned();
                },
            }
        }

        if name.is_empty() {
            // Guarantee progress on stray characters.
            if self.peek().is_some_and(|c| c != '>' && c != '/') {
                self.pos += 1;
            }
            return None;
        }
        Some(Attribute { name, value })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
