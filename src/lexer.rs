use crate::error::{Error, Location, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    BlockStart, // {%
    BlockEnd,   // %}
    VarStart,   // {{
    VarEnd,     // }}

    // Keywords
    If,
    Elif,
    Else,
    EndIf,
    For,
    In,
    EndFor,
    And,
    Or,
    Not,
    True,
    False,

    // Symbols
    EqEq,     // ==
    NotEq,    // !=
    Plus,     // +
    Dot,      // .
    LBracket, // [
    RBracket, // ]
    LParen,   // (
    RParen,   // )

    // Data
    Ident(String),
    StringLit(String),
    Int(i64),
    Float(f64),
}

/// Streaming scanner over template source. Outside tags it emits literal
/// text runs verbatim; inside a `{{ ... }}` or `{% ... %}` tag it emits
/// keyword/symbol/literal tokens. Pure function of the input: building a
/// fresh tokenizer over the same source always yields the same stream.
#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    in_tag: bool,
    trim_blocks: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, trim_blocks: bool) -> Self {
        Self {
            input,
            cursor: 0,
            in_tag: false,
            trim_blocks,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    fn error_here(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, Location::from_offset(self.input, self.cursor))
    }

    /// Next token plus its starting byte offset, or `None` at end of
    /// input. Reaching end of input while inside an unclosed tag is a
    /// syntax error.
    pub fn next_token(&mut self) -> Result<Option<(Token, usize)>> {
        if !self.in_tag {
            let rest = self.remaining();
            if rest.is_empty() {
                return Ok(None);
            }
            let start = self.cursor;

            // Greedy leftmost: the first `{{` or `{%` after the cursor wins.
            let next_tag = rest.find("{%").into_iter().chain(rest.find("{{")).min();

            match next_tag {
                Some(0) => {
                    self.advance(2);
                    self.in_tag = true;
                    if rest.starts_with("{%") {
                        Ok(Some((Token::BlockStart, start)))
                    } else {
                        Ok(Some((Token::VarStart, start)))
                    }
                }
                Some(idx) => {
                    let text = rest[..idx].to_string();
                    self.advance(idx);
                    Ok(Some((Token::Text(text), start)))
                }
                None => {
                    let text = rest.to_string();
                    self.advance(rest.len());
                    Ok(Some((Token::Text(text), start)))
                }
            }
        } else {
            // In tag: skip whitespace first.
            let rest = self.remaining();
            let trimmed = rest.trim_start();
            self.advance(rest.len() - trimmed.len());

            let rest = self.remaining();
            if rest.is_empty() {
                return Err(self.error_here("unclosed tag at end of template"));
            }
            let start = self.cursor;

            if rest.starts_with("%}") {
                self.advance(2);
                self.in_tag = false;

                if self.trim_blocks {
                    let after = self.remaining();
                    if after.starts_with("\r\n") {
                        self.advance(2);
                    } else if after.starts_with('\n') {
                        self.advance(1);
                    }
                }

                return Ok(Some((Token::BlockEnd, start)));
            }
            if rest.starts_with("}}") {
                self.advance(2);
                self.in_tag = false;
                return Ok(Some((Token::VarEnd, start)));
            }

            if rest.starts_with("==") {
                self.advance(2);
                return Ok(Some((Token::EqEq, start)));
            }
            if rest.starts_with("!=") {
                self.advance(2);
                return Ok(Some((Token::NotEq, start)));
            }
            if rest.starts_with('+') {
                self.advance(1);
                return Ok(Some((Token::Plus, start)));
            }
            if rest.starts_with('.') {
                self.advance(1);
                return Ok(Some((Token::Dot, start)));
            }
            if rest.starts_with('[') {
                self.advance(1);
                return Ok(Some((Token::LBracket, start)));
            }
            if rest.starts_with(']') {
                self.advance(1);
                return Ok(Some((Token::RBracket, start)));
            }
            if rest.starts_with('(') {
                self.advance(1);
                return Ok(Some((Token::LParen, start)));
            }
            if rest.starts_with(')') {
                self.advance(1);
                return Ok(Some((Token::RParen, start)));
            }

            let first = match rest.chars().next() {
                Some(c) => c,
                None => return Err(self.error_here("unclosed tag at end of template")),
            };

            if first == '\'' || first == '"' {
                return self.scan_string(first, start);
            }

            if first.is_ascii_digit() {
                return self.scan_number(start);
            }

            if first.is_alphabetic() || first == '_' {
                let ident: String = rest
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                self.advance(ident.len());

                let token = match ident.as_str() {
                    "if" => Token::If,
                    "elif" => Token::Elif,
                    "else" => Token::Else,
                    "endif" => Token::EndIf,
                    "for" => Token::For,
                    "in" => Token::In,
                    "endfor" => Token::EndFor,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(ident),
                };
                return Ok(Some((token, start)));
            }

            Err(self.error_here(format!("unexpected character `{}` in tag", first)))
        }
    }

    fn scan_string(&mut self, quote: char, start: usize) -> Result<Option<(Token, usize)>> {
        let rest = self.remaining();
        let mut consumed = 1; // opening quote
        let mut s = String::new();
        let mut chars = rest[1..].chars();
        while let Some(c) = chars.next() {
            if c == quote {
                self.advance(consumed + 1);
                return Ok(Some((Token::StringLit(s), start)));
            }
            if c == '\\' {
                consumed += 1;
                if let Some(esc) = chars.next() {
                    consumed += esc.len_utf8();
                    match esc {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        _ => s.push(esc),
                    }
                }
            } else {
                consumed += c.len_utf8();
                s.push(c);
            }
        }
        Err(Error::syntax(
            "unterminated string literal",
            Location::from_offset(self.input, start),
        ))
    }

    fn scan_number(&mut self, start: usize) -> Result<Option<(Token, usize)>> {
        let rest = self.remaining();
        let int_len = rest
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .count();

        // A dot only belongs to the number when a digit follows it;
        // otherwise leave it for the parser to reject as attribute access.
        let after_int = &rest[int_len..];
        let is_float = after_int.starts_with('.')
            && after_int[1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit());

        if is_float {
            let frac_len = after_int[1..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .count();
            let text = &rest[..int_len + 1 + frac_len];
            let parsed = text.parse::<f64>().map_err(|_| {
                Error::syntax(
                    format!("invalid number literal `{}`", text),
                    Location::from_offset(self.input, start),
                )
            })?;
            self.advance(text.len());
            Ok(Some((Token::Float(parsed), start)))
        } else {
            let text = &rest[..int_len];
            let parsed = text.parse::<i64>().map_err(|_| {
                Error::syntax(
                    format!("number literal `{}` out of range", text),
                    Location::from_offset(self.input, start),
                )
            })?;
            self.advance(text.len());
            Ok(Some((Token::Int(parsed), start)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(input: &str) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new(input, false);
        let mut tokens = Vec::new();
        while let Some((token, _)) = tokenizer.next_token().unwrap() {
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn plain_text_is_one_literal_token() {
        assert_eq!(
            all_tokens("Hello, world!"),
            vec![Token::Text("Hello, world!".into())]
        );
    }

    #[test]
    fn variable_tag_tokens() {
        assert_eq!(
            all_tokens("Hello, {{ name }}!"),
            vec![
                Token::Text("Hello, ".into()),
                Token::VarStart,
                Token::Ident("name".into()),
                Token::VarEnd,
                Token::Text("!".into()),
            ]
        );
    }

    #[test]
    fn block_tag_keywords_and_path() {
        assert_eq!(
            all_tokens("{% for item in order.lines %}"),
            vec![
                Token::BlockStart,
                Token::For,
                Token::Ident("item".into()),
                Token::In,
                Token::Ident("order".into()),
                Token::Dot,
                Token::Ident("lines".into()),
                Token::BlockEnd,
            ]
        );
    }

    #[test]
    fn number_literals() {
        assert_eq!(
            all_tokens("{{ items[0] == 1.5 }}"),
            vec![
                Token::VarStart,
                Token::Ident("items".into()),
                Token::LBracket,
                Token::Int(0),
                Token::RBracket,
                Token::EqEq,
                Token::Float(1.5),
                Token::VarEnd,
            ]
        );
    }

    #[test]
    fn unclosed_var_tag_is_syntax_error() {
        let mut tokenizer = Tokenizer::new("oops {{ name", false);
        loop {
            match tokenizer.next_token() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected a syntax error"),
                Err(err) => {
                    assert!(matches!(err, Error::Syntax { .. }));
                    break;
                }
            }
        }
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let mut tokenizer = Tokenizer::new("{{ 'open", false);
        tokenizer.next_token().unwrap(); // {{
        let err = tokenizer.next_token().unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn trim_blocks_eats_newline_after_block_end() {
        let mut tokenizer = Tokenizer::new("{% if x %}\nbody", true);
        let mut tokens = Vec::new();
        while let Some((token, _)) = tokenizer.next_token().unwrap() {
            tokens.push(token);
        }
        assert_eq!(
            tokens,
            vec![
                Token::BlockStart,
                Token::If,
                Token::Ident("x".into()),
                Token::BlockEnd,
                Token::Text("body".into()),
            ]
        );
    }

    #[test]
    fn literal_runs_are_verbatim_slices_of_the_source() {
        let source = "a {{ x }} b {% if x %}c{% endif %} d";
        let mut tokenizer = Tokenizer::new(source, false);
        let mut literals = Vec::new();
        while let Some((token, offset)) = tokenizer.next_token().unwrap() {
            if let Token::Text(text) = token {
                assert_eq!(&source[offset..offset + text.len()], text);
                literals.push(text);
            }
        }
        assert_eq!(literals.concat(), "a  b c d");
    }

    #[test]
    fn without_trim_blocks_newline_survives() {
        let tokens = all_tokens("{% if x %}\nbody{% endif %}");
        assert!(tokens.contains(&Token::Text("\nbody".into())));
    }
}
