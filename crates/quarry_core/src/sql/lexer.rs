//! Tokenizer.

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Tok {
    /// Identifier or keyword, as written.
    Word(String),
    Int(i64),
    Float(f64),
    Str(String),
    Param(usize),
    Sym(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub tok: Tok,
    pub offset: usize,
}

// Longest first.
const SYMBOLS: [&str; 21] = [
    "&&", "||", "==", "!=", "<>", "<=", ">=", "(", ")", ",", ";", ".", "*", "/", "%", "+", "-",
    "<", ">", "=", "!",
];

pub(super) fn tokenize(src: &str) -> CoreResult<Vec<Token>> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if src[i..].starts_with("--") {
            i = src[i..].find('\n').map_or(bytes.len(), |n| i + n);
            continue;
        }
        let offset = i;
        let tok = if c.is_ascii_alphabetic() || c == b'_' {
            let end = scan_while(bytes, i, |b| b.is_ascii_alphanumeric() || b == b'_');
            let word = src[i..end].to_string();
            i = end;
            Tok::Word(word)
        } else if c.is_ascii_digit() {
            let (tok, end) = number(src, i)?;
            i = end;
            tok
        } else if c == b'"' || c == b'\'' {
            let (s, end) = string(src, i)?;
            i = end;
            Tok::Str(s)
        } else if c == b'$' {
            let end = scan_while(bytes, i + 1, |b| b.is_ascii_digit());
            let n: usize = src[i + 1..end]
                .parse()
                .map_err(|_| CoreError::syntax(offset, "expected parameter number after $"))?;
            if n == 0 {
                return Err(CoreError::syntax(offset, "parameters are numbered from $1"));
            }
            i = end;
            Tok::Param(n)
        } else {
            let sym = SYMBOLS
                .iter()
                .find(|s| src[i..].starts_with(**s))
                .ok_or_else(|| {
                    let c = src[i..].chars().next().unwrap_or_default();
                    CoreError::syntax(offset, format!("unexpected character {c:?}"))
                })?;
            i += sym.len();
            Tok::Sym(sym)
        };
        out.push(Token { tok, offset });
    }
    out.push(Token {
        tok: Tok::Eof,
        offset: src.len(),
    });
    Ok(out)
}

fn scan_while(bytes: &[u8], mut i: usize, f: impl Fn(u8) -> bool) -> usize {
    while i < bytes.len() && f(bytes[i]) {
        i += 1;
    }
    i
}

fn number(src: &str, start: usize) -> CoreResult<(Tok, usize)> {
    let bytes = src.as_bytes();
    let mut i = scan_while(bytes, start, |b| b.is_ascii_digit());
    let mut float = false;
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        float = true;
        i = scan_while(bytes, i + 1, |b| b.is_ascii_digit());
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            float = true;
            i = scan_while(bytes, j, |b| b.is_ascii_digit());
        }
    }
    let text = &src[start..i];
    let tok = if float {
        Tok::Float(
            text.parse()
                .map_err(|_| CoreError::syntax(start, format!("invalid number {text}")))?,
        )
    } else {
        Tok::Int(
            text.parse()
                .map_err(|_| CoreError::syntax(start, format!("integer {text} out of range")))?,
        )
    };
    Ok((tok, i))
}

fn string(src: &str, start: usize) -> CoreResult<(String, usize)> {
    let quote = src.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = src[start + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, start + 1 + i + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, c)) => out.push(c),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(CoreError::syntax(start, "unterminated string"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn words_numbers_and_symbols() {
        assert_eq!(
            toks("SELECT a.b, 12, 1.5e2 FROM t WHERE x <= $2"),
            vec![
                Tok::Word("SELECT".into()),
                Tok::Word("a".into()),
                Tok::Sym("."),
                Tok::Word("b".into()),
                Tok::Sym(","),
                Tok::Int(12),
                Tok::Sym(","),
                Tok::Float(150.0),
                Tok::Word("FROM".into()),
                Tok::Word("t".into()),
                Tok::Word("WHERE".into()),
                Tok::Word("x".into()),
                Tok::Sym("<="),
                Tok::Param(2),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            toks(r#""a\"b" 'c\n'"#),
            vec![Tok::Str("a\"b".into()), Tok::Str("c\n".into()), Tok::Eof]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(toks("1 -- two\n3"), vec![Tok::Int(1), Tok::Int(3), Tok::Eof]);
    }

    #[test]
    fn errors_carry_offsets() {
        let err = tokenize("SELECT 'abc").unwrap_err();
        assert_eq!(err.to_string(), "syntax error at offset 7: unterminated string");
        assert!(tokenize("$0").is_err());
        assert!(tokenize("99999999999999999999").is_err());
        assert!(tokenize("a ? b").is_err());
    }
}
