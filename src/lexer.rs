//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of PDF byte streams: numbers, strings, names,
//! keywords and delimiters. The entry point [`token`] skips whitespace
//! (space, \t, \r, \n, \0, \f) and `%` comments, then dispatches on the
//! first significant byte. Keywords are matched as whole words bounded by
//! whitespace or a delimiter.

use nom::IResult;
use nom::error::ErrorKind;

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string bytes (content of `(...)`), escapes not yet decoded
    LiteralString(&'a [u8]),

    /// Hexadecimal string bytes (content of `<...>`), not yet decoded
    HexString(&'a [u8]),

    /// Name (e.g., "Type" from "/Type"), `#XX` escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter `[`
    ArrayStart,

    /// Array end delimiter `]`
    ArrayEnd,

    /// Dictionary start delimiter `<<`
    DictStart,

    /// Dictionary end delimiter `>>`
    DictEnd,

    /// Indirect object start keyword `obj`
    ObjStart,

    /// Indirect object end keyword `endobj`
    ObjEnd,

    /// Stream start keyword `stream`
    StreamStart,

    /// Stream end keyword `endstream`
    StreamEnd,

    /// Reference keyword `R`
    R,

    /// Cross-reference section keyword `xref`
    Xref,

    /// Trailer keyword `trailer`
    Trailer,

    /// Startxref keyword `startxref`
    StartXref,
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn lex_err(input: &[u8], kind: ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Advance past whitespace and `%` comments.
fn skip_insignificant(mut input: &[u8]) -> &[u8] {
    loop {
        match input.first() {
            Some(&byte) if is_whitespace(byte) => input = &input[1..],
            Some(b'%') => {
                let eol = input
                    .iter()
                    .position(|&c| c == b'\r' || c == b'\n')
                    .unwrap_or(input.len());
                input = &input[eol..];
            },
            _ => return input,
        }
    }
}

/// Length of the regular-character run starting the slice (up to the
/// first whitespace or delimiter byte).
fn regular_run(input: &[u8]) -> usize {
    input
        .iter()
        .position(|&b| is_whitespace(b) || is_delimiter(b))
        .unwrap_or(input.len())
}

/// Match a whole keyword word.
fn lex_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let len = regular_run(input);
    let tok = match &input[..len] {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        b"xref" => Token::Xref,
        b"trailer" => Token::Trailer,
        b"startxref" => Token::StartXref,
        _ => return Err(lex_err(input, ErrorKind::Tag)),
    };
    Ok((&input[len..], tok))
}

/// Lex an integer or real number.
///
/// PDF numbers allow a leading sign, a leading decimal point (.5) and a
/// trailing decimal point (5.); exponents do not exist in PDF syntax.
fn lex_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let mut len = 0;
    if matches!(input.first(), Some(b'+') | Some(b'-')) {
        len += 1;
    }
    let int_digits = input[len..].iter().take_while(|b| b.is_ascii_digit()).count();
    len += int_digits;

    let mut frac_digits = 0;
    let mut is_real = false;
    if input.get(len) == Some(&b'.') {
        is_real = true;
        len += 1;
        frac_digits = input[len..].iter().take_while(|b| b.is_ascii_digit()).count();
        len += frac_digits;
    }

    if int_digits == 0 && frac_digits == 0 {
        return Err(lex_err(input, ErrorKind::Digit));
    }

    let text = std::str::from_utf8(&input[..len]).map_err(|_| lex_err(input, ErrorKind::Digit))?;
    let tok = if is_real {
        Token::Real(text.parse().map_err(|_| lex_err(input, ErrorKind::Digit))?)
    } else {
        Token::Integer(text.parse().map_err(|_| lex_err(input, ErrorKind::Digit))?)
    };
    Ok((&input[len..], tok))
}

/// Lex a literal string `(...)` with balanced nested parentheses.
///
/// The byte after a backslash never affects nesting, so scanning only
/// needs to hop over it; escape decoding happens at the parser level.
fn lex_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let mut depth = 1usize;
    let mut i = 1;
    while i < input.len() {
        match input[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], Token::LiteralString(&input[1..i])));
                }
            },
            _ => {},
        }
        i += 1;
    }
    Err(lex_err(input, ErrorKind::Tag))
}

/// Lex a hex string `<...>`. Only hex digits and whitespace may appear
/// before the closing `>`.
fn lex_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    for (i, &byte) in input.iter().enumerate().skip(1) {
        if byte == b'>' {
            return Ok((&input[i + 1..], Token::HexString(&input[1..i])));
        }
        if !byte.is_ascii_hexdigit() && !byte.is_ascii_whitespace() {
            return Err(lex_err(input, ErrorKind::HexDigit));
        }
    }
    Err(lex_err(input, ErrorKind::Tag))
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decode `#XX` escape sequences in a raw name body.
///
/// Each decoded byte (and each raw byte) maps to the char with the same
/// code point, so the resulting `String` carries name bytes losslessly in
/// the 0x00-0xFF range and the serializer can reproduce them exactly.
/// Invalid sequences are preserved literally.
///
/// # Examples
///
/// ```
/// # use pdf_sello::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"caf#E9"), "caf\u{e9}");
/// assert_eq!(decode_name_escapes(b"A#"), "A#"); // invalid sequence preserved
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            let pair = (
                raw.get(i + 1).copied().and_then(hex_digit),
                raw.get(i + 2).copied().and_then(hex_digit),
            );
            if let (Some(hi), Some(lo)) = pair {
                out.push(char::from((hi << 4) | lo));
                i += 3;
                continue;
            }
        }
        out.push(char::from(raw[i]));
        i += 1;
    }
    out
}

/// Lex a name starting with `/`.
fn lex_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let body = &input[1..];
    let len = regular_run(body);
    Ok((&body[len..], Token::Name(decode_name_escapes(&body[..len]))))
}

/// Lex a single PDF token.
///
/// Skips whitespace and comments, then dispatches on the first
/// significant byte: `/` names, digits/sign/dot numbers, `(` literal
/// strings, `<` hex strings or `<<`, the bracket delimiters, and keyword
/// words for everything else.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_insignificant(input);
    let Some(&first) = input.first() else {
        return Err(lex_err(input, ErrorKind::Eof));
    };

    match first {
        b'/' => lex_name(input),
        b'[' => Ok((&input[1..], Token::ArrayStart)),
        b']' => Ok((&input[1..], Token::ArrayEnd)),
        b'<' if input.get(1) == Some(&b'<') => Ok((&input[2..], Token::DictStart)),
        b'<' => lex_hex_string(input),
        b'>' if input.get(1) == Some(&b'>') => Ok((&input[2..], Token::DictEnd)),
        b'(' => lex_literal_string(input),
        b'+' | b'-' | b'.' | b'0'..=b'9' => lex_number(input),
        _ => lex_keyword(input),
    }
}
