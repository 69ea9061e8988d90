//! Best-effort repair of near-JSON model output.
//!
//! The repair pass is the last stage of the response parser. It only rewrites
//! text; the parser still decides whether the result is usable.

use serde_json::Value;

/// Rewrites malformed JSON-like text into something a strict parser may accept.
pub trait JsonRepair: Send + Sync {
    fn repair(&self, text: &str) -> String;
}

/// Heuristic fixer for the slips models make most often.
///
/// Handles: prose around the object, trailing commas, unquoted keys,
/// single-quoted strings, bare text values, raw control characters inside strings, Python
/// literals (`True`/`False`/`None`), `//` and `/* */` comments, and
/// truncated output (unterminated strings and unclosed brackets).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicRepair;

impl JsonRepair for HeuristicRepair {
    fn repair(&self, text: &str) -> String {
        let starts: Vec<usize> = text.match_indices(['{', '[']).map(|(i, _)| i).collect();
        let Some(&first) = starts.first() else {
            return text.trim().to_string();
        };
        // Prose before the payload may hold brackets of its own ("step [1]").
        for &start in &starts {
            let fixed = Repairer::new(&text[start..]).run();
            if serde_json::from_str::<Value>(&fixed).is_ok_and(|value| value.is_object()) {
                return fixed;
            }
        }
        Repairer::new(&text[first..]).run()
    }
}

struct Repairer {
    chars: Vec<char>,
    pos: usize,
    out: String,
    closers: Vec<char>,
}

impl Repairer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            out: String::with_capacity(text.len()),
            closers: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(mut self) -> String {
        while let Some(c) = self.peek(0) {
            match c {
                '"' | '\'' => {
                    self.pos += 1;
                    if !self.string(c) {
                        // Truncated inside a string.
                        self.out.push('"');
                        break;
                    }
                }
                '{' => self.open(c, '}'),
                '[' => self.open(c, ']'),
                '}' | ']' => {
                    self.pos += 1;
                    if self.close() {
                        return self.out;
                    }
                }
                '/' if self.peek(1) == Some('/') => self.skip_line_comment(),
                '/' if self.peek(1) == Some('*') => self.skip_block_comment(),
                '-' | '0'..='9' => self.number(),
                c if c.is_alphabetic() || c == '_' || c == '$' => self.word(),
                _ => {
                    self.out.push(c);
                    self.pos += 1;
                }
            }
        }

        self.drop_trailing_comma();
        while let Some(closer) = self.closers.pop() {
            self.out.push(closer);
        }
        self.out
    }

    fn open(&mut self, c: char, closer: char) {
        self.out.push(c);
        self.closers.push(closer);
        self.pos += 1;
    }

    /// Emit the expected closer. Returns true once the top-level value is complete.
    fn close(&mut self) -> bool {
        let Some(closer) = self.closers.pop() else {
            return false;
        };
        self.drop_trailing_comma();
        self.out.push(closer);
        self.closers.is_empty()
    }

    fn drop_trailing_comma(&mut self) {
        let kept = self.out.trim_end().len();
        if self.out[..kept].ends_with(',') {
            self.out.truncate(kept - 1);
        }
    }

    /// Copy a string body as a double-quoted JSON string. Returns false if unterminated.
    fn string(&mut self, quote: char) -> bool {
        self.out.push('"');
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            match c {
                '\\' => match self.peek(0) {
                    Some('\'') => {
                        self.out.push('\'');
                        self.pos += 1;
                    }
                    Some(next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                        self.out.push('\\');
                        self.out.push(next);
                        self.pos += 1;
                    }
                    // Lone backslash: keep it literally.
                    _ => self.out.push_str("\\\\"),
                },
                c if c == quote => {
                    self.out.push('"');
                    return true;
                }
                '"' => self.out.push_str("\\\""),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if (c as u32) < 0x20 => self.out.push_str(&format!("\\u{:04x}", c as u32)),
                c => self.out.push(c),
            }
        }
        false
    }

    fn number(&mut self) {
        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// A bare word is either an unquoted key or the start of an unquoted value.
    fn word(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek(0) {
            if c.is_alphanumeric() || matches!(c, '_' | '$' | '-') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        let mut lookahead = self.pos;
        while self.chars.get(lookahead).is_some_and(|c| c.is_whitespace()) {
            lookahead += 1;
        }
        if self.chars.get(lookahead) == Some(&':') {
            self.out.push('"');
            self.out.push_str(&word);
            self.out.push('"');
            return;
        }

        // Bare value: runs to the next delimiter, so `Old English` stays one string.
        let mut end = self.pos;
        while let Some(&c) = self.chars.get(end) {
            let comment = c == '/' && self.chars.get(end + 1) == Some(&'/');
            if matches!(c, ',' | '}' | ']' | '\n') || comment {
                break;
            }
            end += 1;
        }
        let bare: String = self.chars[start..end].iter().collect();
        self.pos = end;

        match bare.trim_end() {
            "true" | "True" => self.out.push_str("true"),
            "false" | "False" => self.out.push_str("false"),
            "null" | "None" | "undefined" => self.out.push_str("null"),
            text => self.out.push_str(&Value::String(text.to_string()).to_string()),
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.peek(0).is_some() {
            if self.peek(0) == Some('*') && self.peek(1) == Some('/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }
}
