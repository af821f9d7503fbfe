//! PDF object and structure parsing.
//!
//! Two layers live here:
//!
//! 1. [`parse_object`] combines lexer tokens into complete objects
//!    (recursive descent, `n g R` lookahead for references).
//! 2. The structural reader: [`parse_structure`] locates the last
//!    `startxref`, walks the cross-reference chain (classic tables and
//!    xref streams, following `/Prev`), and yields the merged table plus
//!    the newest trailer; [`find_object`] loads one indirect object record
//!    through that table.

use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Dict, IndirectObject, Object, ObjectRef};
use crate::xref::{CrossRefTable, XRefEntry};
use nom::IResult;
use std::collections::HashSet;
use std::io::Read;

/// Decode escape sequences in PDF literal strings.
///
/// Handles the single-character escapes, octal `\ddd` (1-3 digits) and
/// line continuations; an unknown escape keeps the backslash literally
/// and leaves the following byte to be read as ordinary content.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw;

    while let Some((&byte, after)) = rest.split_first() {
        if byte != b'\\' {
            out.push(byte);
            rest = after;
            continue;
        }

        let Some((&escape, tail)) = after.split_first() else {
            // Dangling backslash at the end of the string
            out.push(b'\\');
            break;
        };

        rest = tail;
        match escape {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(8),
            b'f' => out.push(12),
            b'(' | b')' | b'\\' => out.push(escape),
            // Line continuation: an escaped EOL disappears
            b'\n' => {},
            b'\r' => {
                if rest.first() == Some(&b'\n') {
                    rest = &rest[1..];
                }
            },
            b'0'..=b'7' => {
                // Up to two more octal digits extend the escape
                let mut value = (escape - b'0') as u32;
                for _ in 0..2 {
                    match rest.split_first() {
                        Some((&digit, more)) if (b'0'..=b'7').contains(&digit) => {
                            value = value * 8 + (digit - b'0') as u32;
                            rest = more;
                        },
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            },
            _ => {
                out.push(b'\\');
                rest = after;
            },
        }
    }

    out
}

/// Decode a hex string body to bytes. Whitespace is ignored; an odd
/// trailing digit is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    fn digit(c: u8) -> Result<u8> {
        match c {
            b'0'..=b'9' => Ok(c - b'0'),
            b'a'..=b'f' => Ok(c - b'a' + 10),
            b'A'..=b'F' => Ok(c - b'A' + 10),
            _ => Err(Error::Parse {
                offset: 0,
                reason: format!("invalid hex digit: {:?}", c as char),
            }),
        }
    }

    let mut result = Vec::with_capacity(hex_bytes.len() / 2 + 1);
    let mut pending: Option<u8> = None;

    for &c in hex_bytes {
        if c.is_ascii_whitespace() {
            continue;
        }
        let d = digit(c)?;
        match pending.take() {
            Some(hi) => result.push((hi << 4) | d),
            None => pending = Some(d),
        }
    }
    if let Some(hi) = pending {
        result.push(hi << 4);
    }

    Ok(result)
}

/// Parse a PDF object from input bytes.
///
/// Handles all value forms including `n g R` indirect references (via
/// two-token lookahead). Stream payloads are handled one level up, at the
/// indirect-object record, because a stream is a property of the record
/// rather than of the value.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),

        Token::Integer(i) => {
            // Could be a plain integer or the start of "obj_num gen R"
            if let Ok((input2, Token::Integer(gen))) = token(input) {
                if let Ok((input3, Token::R)) = token(input2) {
                    return Ok((input3, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                }
            }
            Ok((input, Object::Integer(i)))
        },

        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::LiteralString(bytes) => {
            let decoded = decode_literal_string_escapes(bytes);
            Ok((input, Object::String(decoded)))
        },

        Token::HexString(hex_bytes) => match decode_hex(hex_bytes) {
            Ok(decoded) => Ok((input, Object::HexString(decoded))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Fail,
            ))),
        },

        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => parse_array(input),

        Token::DictStart => parse_dictionary(input),

        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Parse array elements after `[` until `]`.
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        if let Ok((inp, Token::ArrayEnd)) = token(remaining) {
            return Ok((inp, Object::Array(objects)));
        }

        let (inp, obj) = parse_object(remaining)?;
        objects.push(obj);
        remaining = inp;
    }
}

/// Parse dictionary entries after `<<` until `>>`. Keys must be names.
fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Object> {
    let mut dict = Dict::new();
    let mut remaining = input;

    loop {
        let (inp, tok) = token(remaining)?;

        match tok {
            Token::DictEnd => return Ok((inp, Object::Dictionary(dict))),
            Token::Name(key) => {
                let (inp, value) = parse_object(inp)?;
                dict.set(key, value);
                remaining = inp;
            },
            _ => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Tag,
                )));
            },
        }
    }
}

/// Parsed file structure: everything the document model needs from the
/// raw bytes before any object is loaded.
#[derive(Debug, Clone)]
pub struct Structure {
    /// Header version of the form `PDF-1.x`
    pub version: String,
    /// Trailer dictionary of the newest revision
    pub trailer: Dict,
    /// Merged cross-reference table (newest entries shadow older ones)
    pub xref: CrossRefTable,
    /// Byte offset of the newest xref section
    pub xref_position: u64,
    /// Version governing the newest revision's xref style (`PDF-1.x`).
    ///
    /// A classic table pins this below 1.5 so appended revisions stay
    /// classic; an xref stream pins it to at least 1.5.
    pub xref_version: String,
    /// Whether the trailer carries an `/Encrypt` entry
    pub encrypted: bool,
}

/// Minor digit of a `PDF-1.x` version string.
pub(crate) fn version_minor(version: &str) -> Option<u8> {
    version
        .strip_prefix("PDF-1.")
        .and_then(|minor| minor.parse::<u8>().ok())
        .filter(|m| *m <= 7)
}

fn parse_err(offset: usize, reason: impl Into<String>) -> Error {
    Error::Parse {
        offset,
        reason: reason.into(),
    }
}

/// Extract the header version from the first bytes of the file.
fn parse_header(bytes: &[u8]) -> Result<String> {
    let window = &bytes[..bytes.len().min(1024)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| parse_err(0, "missing %PDF- header"))?;

    let rest = &window[pos + 5..];
    if rest.len() < 3 {
        return Err(parse_err(pos, "truncated header version"));
    }
    let version = format!("PDF-{}", String::from_utf8_lossy(&rest[..3]));
    if version_minor(&version).is_none() {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(version)
}

/// Scan the file tail for the last `startxref` offset.
fn find_startxref(bytes: &[u8]) -> Result<u64> {
    let tail_len = bytes.len().min(2048);
    let tail = &bytes[bytes.len() - tail_len..];

    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| parse_err(bytes.len(), "startxref not found"))?;

    let mut rest = &tail[pos + keyword.len()..];
    while let Some((&c, r)) = rest.split_first() {
        if c.is_ascii_whitespace() {
            rest = r;
        } else {
            break;
        }
    }
    let digits: Vec<u8> = rest.iter().copied().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(parse_err(bytes.len(), "startxref offset missing"));
    }
    String::from_utf8_lossy(&digits)
        .parse::<u64>()
        .map_err(|_| parse_err(bytes.len(), "startxref offset not a number"))
}

/// Skip PDF whitespace in a slice, returning the new position.
fn skip_pdf_ws(slice: &[u8], mut pos: usize) -> usize {
    while pos < slice.len()
        && matches!(slice[pos], b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
    {
        pos += 1;
    }
    pos
}

/// Read an unsigned decimal number from a slice.
fn read_uint(slice: &[u8], pos: &mut usize) -> Result<u64> {
    let start = *pos;
    let mut value: u64 = 0;
    while *pos < slice.len() && slice[*pos].is_ascii_digit() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((slice[*pos] - b'0') as u64))
            .ok_or_else(|| parse_err(start, "number overflow"))?;
        *pos += 1;
    }
    if *pos == start {
        return Err(parse_err(start, "expected a number"));
    }
    Ok(value)
}

/// Parse one classic `xref` section at `offset`: entries plus the trailer
/// dictionary that follows it.
fn parse_classic_section(bytes: &[u8], offset: u64) -> Result<(CrossRefTable, Dict)> {
    let base = offset as usize;
    if base >= bytes.len() {
        return Err(parse_err(base, "xref offset beyond end of file"));
    }
    let slice = &bytes[base..];
    let mut pos = skip_pdf_ws(slice, 0);

    if !slice[pos..].starts_with(b"xref") {
        return Err(parse_err(base + pos, "expected 'xref' keyword"));
    }
    pos += 4;

    let mut table = CrossRefTable::new();

    loop {
        pos = skip_pdf_ws(slice, pos);
        if slice[pos..].starts_with(b"trailer") {
            pos += 7;
            break;
        }

        let start_id = read_uint(slice, &mut pos)? as u32;
        pos = skip_pdf_ws(slice, pos);
        let count = read_uint(slice, &mut pos)? as u32;
        if count > 1_000_000 {
            return Err(parse_err(base + pos, "xref subsection count exceeds limit"));
        }

        for id in start_id..start_id + count {
            pos = skip_pdf_ws(slice, pos);
            let entry_offset = read_uint(slice, &mut pos)?;
            pos = skip_pdf_ws(slice, pos);
            let generation = read_uint(slice, &mut pos)? as u16;
            pos = skip_pdf_ws(slice, pos);
            let kind = *slice
                .get(pos)
                .ok_or_else(|| parse_err(base + pos, "truncated xref entry"))?;
            pos += 1;

            let entry = match kind {
                b'n' => XRefEntry::uncompressed(entry_offset, generation),
                b'f' => XRefEntry::free(entry_offset, generation),
                other => {
                    return Err(parse_err(
                        base + pos,
                        format!("bad xref entry kind: {:?}", other as char),
                    ));
                },
            };
            table.add_entry(id, entry);
        }
    }

    let (_, trailer_obj) = parse_object(&slice[pos..])
        .map_err(|_| parse_err(base + pos, "malformed trailer dictionary"))?;
    let trailer = match trailer_obj {
        Object::Dictionary(d) => d,
        other => {
            return Err(parse_err(
                base + pos,
                format!("trailer is not a dictionary but {}", other.type_name()),
            ));
        },
    };

    Ok((table, trailer))
}

/// Inflate FlateDecode data.
pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| parse_err(0, format!("flate decode failed: {}", e)))?;
    Ok(out)
}

/// Undo a PNG predictor applied to fixed-width rows.
fn undo_png_predictor(data: &[u8], columns: usize, bpp: usize) -> Result<Vec<u8>> {
    if columns == 0 {
        return Err(parse_err(0, "predictor with zero columns"));
    }
    let row_len = columns + 1;
    if data.len() % row_len != 0 {
        return Err(parse_err(0, "predictor data not a whole number of rows"));
    }

    let mut out = Vec::with_capacity(data.len() / row_len * columns);
    let mut prior = vec![0u8; columns];

    for row in data.chunks(row_len) {
        let filter = row[0];
        let mut current = row[1..].to_vec();

        for i in 0..columns {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prior[i];
            let up_left = if i >= bpp { prior[i - bpp] } else { 0 };

            current[i] = match filter {
                0 => current[i],
                1 => current[i].wrapping_add(left),
                2 => current[i].wrapping_add(up),
                3 => current[i].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => {
                    let p = left as i16 + up as i16 - up_left as i16;
                    let pa = (p - left as i16).abs();
                    let pb = (p - up as i16).abs();
                    let pc = (p - up_left as i16).abs();
                    let predictor = if pa <= pb && pa <= pc {
                        left
                    } else if pb <= pc {
                        up
                    } else {
                        up_left
                    };
                    current[i].wrapping_add(predictor)
                },
                other => {
                    return Err(parse_err(0, format!("unknown PNG filter type {}", other)));
                },
            };
        }

        out.extend_from_slice(&current);
        prior = current;
    }

    Ok(out)
}

/// Decode an xref stream's payload according to its `/Filter` and
/// `/DecodeParms`.
fn decode_stream_payload(dict: &Dict, data: &[u8], field_total: usize) -> Result<Vec<u8>> {
    let filter = match dict.get("Filter") {
        None | Some(Object::Null) => return Ok(data.to_vec()),
        Some(Object::Name(name)) => name.clone(),
        Some(Object::Array(arr)) if arr.len() == 1 => arr[0]
            .as_name()
            .ok_or_else(|| parse_err(0, "bad /Filter entry"))?
            .to_string(),
        Some(other) => {
            return Err(parse_err(0, format!("unsupported /Filter: {}", other.type_name())));
        },
    };

    if filter != "FlateDecode" {
        return Err(parse_err(0, format!("unsupported stream filter: {}", filter)));
    }

    let inflated = inflate(data)?;

    let parms = match dict.get("DecodeParms") {
        Some(Object::Dictionary(d)) => Some(d),
        Some(Object::Array(arr)) => arr.iter().find_map(|o| o.as_dict()),
        _ => None,
    };

    let Some(parms) = parms else {
        return Ok(inflated);
    };

    let predictor = parms.get("Predictor").and_then(|o| o.as_integer()).unwrap_or(1);
    if predictor < 10 {
        return Ok(inflated);
    }

    let columns = parms
        .get("Columns")
        .and_then(|o| o.as_integer())
        .unwrap_or(field_total as i64) as usize;
    let colors = parms.get("Colors").and_then(|o| o.as_integer()).unwrap_or(1) as usize;
    let bits = parms
        .get("BitsPerComponent")
        .and_then(|o| o.as_integer())
        .unwrap_or(8) as usize;
    let bpp = (colors * bits).div_ceil(8);

    undo_png_predictor(&inflated, columns * bpp, bpp)
}

/// Read one big-endian field of `width` bytes.
fn read_field(data: &[u8], pos: usize, width: usize) -> u64 {
    let mut value: u64 = 0;
    for i in 0..width {
        value = (value << 8) | data[pos + i] as u64;
    }
    value
}

/// Parse one cross-reference stream section at `offset`.
fn parse_stream_section(bytes: &[u8], offset: u64) -> Result<(CrossRefTable, Dict)> {
    let base = offset as usize;
    if base >= bytes.len() {
        return Err(parse_err(base, "xref offset beyond end of file"));
    }

    let record = parse_indirect_at(bytes, base, None)?;
    let dict = record
        .dict()
        .ok_or_else(|| parse_err(base, "xref stream object has no dictionary"))?
        .clone();
    let data = record
        .stream
        .as_ref()
        .ok_or_else(|| parse_err(base, "xref object carries no stream"))?;

    if dict.get("Type").and_then(|o| o.as_name()) != Some("XRef") {
        return Err(parse_err(base, "object at startxref is not /Type /XRef"));
    }

    let w = dict
        .get("W")
        .and_then(|o| o.as_array())
        .ok_or_else(|| parse_err(base, "xref stream missing /W"))?;
    let widths: Vec<usize> = w
        .iter()
        .map(|o| o.as_integer().map(|i| i as usize))
        .collect::<Option<_>>()
        .ok_or_else(|| parse_err(base, "bad /W widths"))?;
    if widths.len() != 3 {
        return Err(parse_err(base, "xref stream /W must have three fields"));
    }
    let record_len: usize = widths.iter().sum();
    if record_len == 0 {
        return Err(parse_err(base, "xref stream /W sums to zero"));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| parse_err(base, "xref stream missing /Size"))?;

    let index: Vec<i64> = match dict.get("Index") {
        Some(Object::Array(arr)) => arr
            .iter()
            .map(|o| o.as_integer())
            .collect::<Option<_>>()
            .ok_or_else(|| parse_err(base, "bad /Index"))?,
        _ => vec![0, size],
    };
    if index.len() % 2 != 0 {
        return Err(parse_err(base, "/Index must hold pairs"));
    }

    let decoded = decode_stream_payload(&dict, data, record_len)?;

    let mut table = CrossRefTable::new();
    let mut pos = 0;

    for pair in index.chunks(2) {
        let (start, count) = (pair[0] as u32, pair[1] as u32);
        for id in start..start + count {
            if pos + record_len > decoded.len() {
                return Err(parse_err(base, "xref stream data shorter than /Index claims"));
            }
            // A zero-width type field defaults to type 1
            let type_code = if widths[0] == 0 {
                1
            } else {
                read_field(&decoded, pos, widths[0])
            };
            let field2 = read_field(&decoded, pos + widths[0], widths[1]);
            let field3 = read_field(&decoded, pos + widths[0] + widths[1], widths[2]) as u16;
            pos += record_len;

            let entry = match type_code {
                0 => XRefEntry::free(field2, field3),
                1 => XRefEntry::uncompressed(field2, field3),
                2 => XRefEntry::compressed(field2, field3),
                other => {
                    log::debug!("ignoring xref entry of unknown type {}", other);
                    continue;
                },
            };
            table.add_entry(id, entry);
        }
    }

    Ok((table, dict))
}

/// Parse an `id gen obj ... endobj` record starting at `base`.
///
/// `expect_id` checks the record's object number when supplied. Stream
/// payloads are read through `/Length` when it is a direct integer and by
/// scanning for `endstream` otherwise.
fn parse_indirect_at(bytes: &[u8], base: usize, expect_id: Option<u32>) -> Result<IndirectObject> {
    let slice = &bytes[base..];

    let (rest, id_tok) =
        token(slice).map_err(|_| parse_err(base, "expected object number"))?;
    let Token::Integer(id) = id_tok else {
        return Err(parse_err(base, "expected object number"));
    };
    let (rest, gen_tok) = token(rest).map_err(|_| parse_err(base, "expected generation"))?;
    let Token::Integer(gen) = gen_tok else {
        return Err(parse_err(base, "expected generation number"));
    };
    let (rest, obj_tok) = token(rest).map_err(|_| parse_err(base, "expected 'obj'"))?;
    if obj_tok != Token::ObjStart {
        return Err(parse_err(base, "expected 'obj' keyword"));
    }

    if let Some(expected) = expect_id {
        if id as u32 != expected {
            log::warn!("xref pointed at object {} but found {}", expected, id);
        }
    }

    let (rest, value) = parse_object(rest)
        .map_err(|_| parse_err(base, format!("malformed body of object {}", id)))?;

    // A stream keyword directly after a dictionary body makes this a
    // stream record. A trailing endobj is not required.
    let mut stream = None;
    if let Some(dict) = value.as_dict() {
        if let Ok((after_kw, Token::StreamStart)) = token(rest) {
            let (_, data) = read_stream_data(after_kw, dict, base)?;
            stream = Some(bytes::Bytes::from(data));
        }
    }

    let stream_filtered = stream.is_some()
        && value
            .as_dict()
            .map(|d| d.contains_key("Filter"))
            .unwrap_or(false);

    Ok(IndirectObject {
        id: id as u32,
        gen: gen as u16,
        value,
        stream,
        stream_filtered,
    })
}

/// Read stream data after the `stream` keyword.
fn read_stream_data<'a>(input: &'a [u8], dict: &Dict, base: usize) -> Result<(&'a [u8], Vec<u8>)> {
    // The keyword must be followed by CRLF or LF; tolerate CR alone.
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        log::warn!("no newline after 'stream' keyword");
        input
    };

    if let Some(length) = dict.get("Length").and_then(|o| o.as_integer()) {
        let length = length as usize;
        if input.len() < length {
            return Err(parse_err(base, "stream length exceeds file size"));
        }
        let data = input[..length].to_vec();
        let mut remaining = &input[length..];
        if let Ok((rest, Token::StreamEnd)) = token(remaining) {
            remaining = rest;
        }
        return Ok((remaining, data));
    }

    // /Length missing or indirect: scan for the endstream keyword
    let pos = input
        .windows(b"endstream".len())
        .position(|w| w == b"endstream")
        .ok_or_else(|| parse_err(base, "unterminated stream"))?;
    let mut data = &input[..pos];
    // The EOL before endstream is not part of the data
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    Ok((&input[pos + b"endstream".len()..], data.to_vec()))
}

/// Parse the file structure: header version, xref chain and trailer.
///
/// This is the entry point the document model builds on. The returned
/// [`Structure`] carries the merged cross-reference table (following
/// `/Prev` pointers, newest entries winning) and the style of the newest
/// revision, which pins the style of every appended revision.
pub fn parse_structure(bytes: &[u8]) -> Result<Structure> {
    let version = parse_header(bytes)?;
    let xref_position = find_startxref(bytes)?;

    let mut table: Option<CrossRefTable> = None;
    let mut trailer: Option<Dict> = None;
    let mut newest_is_stream: Option<bool> = None;

    let mut visited: HashSet<u64> = HashSet::new();
    let mut next = Some(xref_position);

    while let Some(offset) = next {
        if !visited.insert(offset) {
            return Err(parse_err(offset as usize, "circular /Prev chain"));
        }
        if offset as usize >= bytes.len() {
            return Err(parse_err(offset as usize, "xref offset beyond end of file"));
        }

        let probe = skip_pdf_ws(bytes, offset as usize);
        let is_classic = bytes[probe..].starts_with(b"xref");
        let (section, dict) = if is_classic {
            parse_classic_section(bytes, offset)?
        } else {
            parse_stream_section(bytes, offset)?
        };

        if newest_is_stream.is_none() {
            newest_is_stream = Some(!is_classic);
        }
        if dict.contains_key("XRefStm") {
            log::debug!("hybrid-reference file: ignoring /XRefStm entries");
        }

        next = dict.get("Prev").and_then(|o| o.as_integer()).map(|p| p as u64);

        match table.as_mut() {
            Some(merged) => merged.merge_older(section),
            None => table = Some(section),
        }
        if trailer.is_none() {
            trailer = Some(dict);
        }
    }

    let trailer = trailer.ok_or_else(|| parse_err(0, "no trailer found"))?;
    let xref = table.unwrap_or_default();

    let minor = version_minor(&version).unwrap_or(4);
    let xref_version = if newest_is_stream == Some(true) {
        // An xref stream means the revision level is at least 1.5
        format!("PDF-1.{}", minor.max(5))
    } else {
        // A classic table must stay classic across appended revisions
        format!("PDF-1.{}", minor.min(4))
    };

    let encrypted = trailer.contains_key("Encrypt");
    if encrypted {
        log::warn!("document declares /Encrypt; stream contents will not be decrypted");
    }

    Ok(Structure {
        version,
        trailer,
        xref,
        xref_position,
        xref_version,
        encrypted,
    })
}

/// Load one indirect object through the cross-reference table.
pub fn find_object(bytes: &[u8], xref: &CrossRefTable, id: u32) -> Result<IndirectObject> {
    let entry = xref
        .get(id)
        .ok_or_else(|| parse_err(0, format!("object {} not in xref", id)))?;

    match entry.entry_type {
        crate::xref::XRefEntryType::Uncompressed => {},
        crate::xref::XRefEntryType::Free => {
            return Err(parse_err(0, format!("object {} is free", id)));
        },
        crate::xref::XRefEntryType::Compressed => {
            return Err(parse_err(
                0,
                format!("object {} lives in an object stream, which is not supported", id),
            ));
        },
    }

    let offset = entry.offset as usize;
    if offset >= bytes.len() {
        return Err(parse_err(offset, format!("offset of object {} beyond end of file", id)));
    }

    parse_indirect_at(bytes, offset, Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_object(b"null").unwrap().1, Object::Null);
        assert_eq!(parse_object(b"true").unwrap().1, Object::Boolean(true));
        assert_eq!(parse_object(b"42").unwrap().1, Object::Integer(42));
        assert_eq!(parse_object(b"-2.5").unwrap().1, Object::Real(-2.5));
        assert_eq!(parse_object(b"/Type").unwrap().1, Object::Name("Type".to_string()));
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(
            parse_object(b"(Hello \\(World\\))").unwrap().1,
            Object::String(b"Hello (World)".to_vec())
        );
        assert_eq!(
            parse_object(b"(Section \\247)").unwrap().1,
            Object::String(b"Section \xa7".to_vec())
        );
        assert_eq!(
            parse_object(b"<48656C6C6F>").unwrap().1,
            Object::HexString(b"Hello".to_vec())
        );
        assert_eq!(
            parse_object(b"<ABC>").unwrap().1,
            Object::HexString(vec![0xAB, 0xC0])
        );
    }

    #[test]
    fn test_literal_string_escape_decoding() {
        assert_eq!(decode_literal_string_escapes(b"a\\nb"), b"a\nb");
        assert_eq!(decode_literal_string_escapes(b"oct \\53 end"), b"oct + end");
        // Octal stops at the first non-octal digit
        assert_eq!(decode_literal_string_escapes(b"v\\128"), b"v\n8");
        // Escaped EOLs are line continuations
        assert_eq!(decode_literal_string_escapes(b"long \\\nline"), b"long line");
        assert_eq!(decode_literal_string_escapes(b"long \\\r\nline"), b"long line");
        // Unknown escapes keep the backslash, dangling ones too
        assert_eq!(decode_literal_string_escapes(b"keep\\q"), b"keep\\q");
        assert_eq!(decode_literal_string_escapes(b"tail\\"), b"tail\\");
    }

    #[test]
    fn test_parse_reference_lookahead() {
        assert_eq!(
            parse_object(b"10 0 R").unwrap().1,
            Object::Reference(ObjectRef::new(10, 0))
        );
        assert_eq!(parse_object(b"10").unwrap().1, Object::Integer(10));
    }

    #[test]
    fn test_parse_array() {
        let (_, obj) = parse_object(b"[ 1 [ 2 3 ] /N (s) 4 0 R ]").unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 5);
        assert_eq!(arr[1].as_array().unwrap().len(), 2);
        assert_eq!(arr[4].as_reference(), Some(ObjectRef::new(4, 0)));
    }

    #[test]
    fn test_parse_dictionary_keeps_order() {
        let (_, obj) = parse_object(b"<< /Type /Page /MediaBox [ 0 0 612 792 ] /Count 3 >>").unwrap();
        let dict = obj.as_dict().unwrap();
        let keys: Vec<&str> = dict.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Type", "MediaBox", "Count"]);
    }

    #[test]
    fn test_parse_dictionary_rejects_non_name_key() {
        assert!(parse_object(b"<< 123 /Value >>").is_err());
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header(b"%PDF-1.4\nrest").unwrap(), "PDF-1.4");
        assert!(parse_header(b"not a pdf").is_err());
        assert!(matches!(
            parse_header(b"%PDF-1.9\n"),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_find_startxref() {
        let bytes = b"junk\nstartxref\n1234\n%%EOF\n";
        assert_eq!(find_startxref(bytes).unwrap(), 1234);
    }

    #[test]
    fn test_find_startxref_uses_last() {
        let bytes = b"startxref\n10\n%%EOF\nstartxref\n999\n%%EOF\n";
        assert_eq!(find_startxref(bytes).unwrap(), 999);
    }

    #[test]
    fn test_classic_section_roundtrip() {
        let section = b"xref\n0 3\n0000000000 65535 f \n0000000018 00000 n \n0000000100 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF\n";
        let (table, trailer) = parse_classic_section(section, 0).unwrap();
        assert_eq!(table.len(), 3);
        assert!(!table.get(0).unwrap().in_use());
        assert_eq!(table.get(1).unwrap().offset, 18);
        assert_eq!(trailer.get("Size").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_parse_indirect_with_stream() {
        let record = b"7 0 obj\n<< /Length 5 >>\nstream\nhello\nendstream\nendobj\n";
        let obj = parse_indirect_at(record, 0, Some(7)).unwrap();
        assert_eq!(obj.id, 7);
        assert_eq!(obj.stream.as_deref(), Some(&b"hello"[..]));
        assert!(!obj.stream_filtered);
    }

    #[test]
    fn test_parse_indirect_stream_without_length_scans() {
        let record = b"7 0 obj\n<< >>\nstream\nhello\nendstream\nendobj\n";
        let obj = parse_indirect_at(record, 0, None).unwrap();
        assert_eq!(obj.stream.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_undo_png_predictor_up() {
        // Two rows of three columns, filter type 2 (Up)
        let data = [2, 5, 5, 5, 2, 1, 1, 1];
        let out = undo_png_predictor(&data, 3, 1).unwrap();
        assert_eq!(out, vec![5, 5, 5, 6, 6, 6]);
    }

    #[test]
    fn test_decode_hex_rejects_garbage() {
        assert!(decode_hex(b"XYZ").is_err());
        assert_eq!(decode_hex(b"48 65").unwrap(), vec![0x48, 0x65]);
    }
}
