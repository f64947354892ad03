//! Tokenizer for story expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
}

/// Split an expression into tokens.
///
/// Literals: integers, floats (`1.5`, `.5`, `2e3`), single- or double-quoted
/// strings with `\` escapes, `True`/`False` (either case). Keywords `and`,
/// `or`, `not`. Everything else that is not an operator or identifier is a
/// parse error.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && i + 1 < len && chars[i + 1].is_ascii_digit()) {
            let (token, next) = read_number(&chars, i)?;
            tokens.push(token);
            i = next;
            continue;
        }

        if c == '"' || c == '\'' {
            let (s, next) = read_string(&chars, i)?;
            tokens.push(Token::Str(s));
            i = next;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "True" | "true" => Token::True,
                "False" | "false" => Token::False,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                _ => Token::Ident(word),
            });
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('*', Some('*')) => (Token::StarStar, 2),
            ('/', Some('/')) => (Token::SlashSlash, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::LtEq, 2),
            ('>', Some('=')) => (Token::GtEq, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            _ => {
                return Err(ExprError::Parse(format!(
                    "unexpected character '{}' at {}",
                    c, i
                )))
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> Result<(Token, usize), ExprError> {
    let len = chars.len();
    let mut i = start;
    let mut is_float = false;

    while i < len && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < len && chars[i] == '.' {
        is_float = true;
        i += 1;
        while i < len && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < len && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < len && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < len && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < len && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    if i < len && (chars[i].is_alphabetic() || chars[i] == '_') {
        return Err(ExprError::Parse(format!(
            "invalid number literal at {}",
            start
        )));
    }

    let text: String = chars[start..i].iter().collect();
    let token = if is_float {
        Token::Float(
            text.parse()
                .map_err(|_| ExprError::Parse(format!("invalid number '{}'", text)))?,
        )
    } else {
        Token::Int(
            text.parse()
                .map_err(|_| ExprError::Parse(format!("integer '{}' out of range", text)))?,
        )
    };
    Ok((token, i))
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), ExprError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((out, i + 1)),
            '\\' if i + 1 < chars.len() => {
                out.push(match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(ExprError::Parse("unterminated string literal".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_arithmetic() {
        let t = tokenize("gold + 10 * 2").unwrap();
        assert_eq!(
            t,
            vec![
                Token::Ident("gold".to_string()),
                Token::Plus,
                Token::Int(10),
                Token::Star,
                Token::Int(2),
            ]
        );
    }

    #[test]
    fn tokenize_two_char_operators() {
        let t = tokenize("a ** b // c == d != e <= f >= g").unwrap();
        assert!(t.contains(&Token::StarStar));
        assert!(t.contains(&Token::SlashSlash));
        assert!(t.contains(&Token::EqEq));
        assert!(t.contains(&Token::NotEq));
        assert!(t.contains(&Token::LtEq));
        assert!(t.contains(&Token::GtEq));
    }

    #[test]
    fn tokenize_numbers() {
        assert_eq!(tokenize("1.5").unwrap(), vec![Token::Float(1.5)]);
        assert_eq!(tokenize(".5").unwrap(), vec![Token::Float(0.5)]);
        assert_eq!(tokenize("2e3").unwrap(), vec![Token::Float(2000.0)]);
        assert_eq!(tokenize("42").unwrap(), vec![Token::Int(42)]);
        assert!(tokenize("12abc").is_err());
        assert!(tokenize("99999999999999999999").is_err());
    }

    #[test]
    fn tokenize_strings_and_keywords() {
        let t = tokenize(r#"name == 'Ana' and not "x\"y""#).unwrap();
        assert_eq!(t[2], Token::Str("Ana".to_string()));
        assert_eq!(t[3], Token::And);
        assert_eq!(t[4], Token::Not);
        assert_eq!(t[5], Token::Str("x\"y".to_string()));
    }

    #[test]
    fn tokenize_rejects_unknown_characters() {
        assert!(tokenize("a = b").is_err());
        assert!(tokenize("a.b").is_err());
        assert!(tokenize("__import__('os')").is_ok());
        assert!(tokenize("'open").is_err());
    }
}
