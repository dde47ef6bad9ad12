//! C-style string literal decoding for template files.

use crate::payload::PayloadBuffer;

/// Decode one double-quoted literal at the start of `line` into `buffer`.
///
/// Supported escapes: `\ooo` (one to three octal digits), `\xHH` (up to two
/// hex digits), `\a \b \f \n \r \t \v`; any other escaped character stands
/// for itself. A literal without a closing quote ends at the end of the
/// line. Returns the part of `line` after the closing quote, or `line`
/// unchanged if it does not start with `"`.
pub fn decode_c_string<'a>(line: &'a [u8], buffer: &mut PayloadBuffer) -> &'a [u8] {
    let [b'"', body @ ..] = line else {
        return line;
    };

    let mut i = 0;
    while i < body.len() && body[i] != b'"' {
        if body[i] != b'\\' {
            buffer.push(body[i]);
            i += 1;
            continue;
        }

        i += 1;
        let Some(&c) = body.get(i) else {
            break;
        };

        match c {
            b'0'..=b'7' => {
                let digits = body[i..]
                    .iter()
                    .take(3)
                    .take_while(|b| matches!(b, b'0'..=b'7'))
                    .count();
                let value = body[i..i + digits]
                    .iter()
                    .fold(0u32, |acc, &d| acc * 8 + (d - b'0') as u32);
                buffer.push(value as u8);
                i += digits;
            }
            b'x' => {
                i += 1;
                let digits = body[i..]
                    .iter()
                    .take(2)
                    .take_while(|b| b.is_ascii_hexdigit())
                    .count();
                let value = body[i..i + digits]
                    .iter()
                    .fold(0u32, |acc, &d| acc * 16 + hex_value(d));
                buffer.push(value as u8);
                i += digits;
            }
            _ => {
                buffer.push(control_escape(c));
                i += 1;
            }
        }
    }

    match body.get(i) {
        Some(b'"') => &body[i + 1..],
        _ => &body[body.len()..],
    }
}

fn control_escape(c: u8) -> u8 {
    match c {
        b'a' => 0x07,
        b'b' => 0x08,
        b'f' => 0x0C,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'v' => 0x0B,
        other => other,
    }
}

fn hex_value(c: u8) -> u32 {
    match c {
        b'0'..=b'9' => (c - b'0') as u32,
        b'a'..=b'f' => (c - b'a' + 10) as u32,
        b'A'..=b'F' => (c - b'A' + 10) as u32,
        _ => 0,
    }
}

/// Decode the fixed literal `"\t\n\r\x1f\123"` and check the result
pub fn selftest() -> bool {
    let mut buffer = PayloadBuffer::new(1024);
    decode_c_string(br#""\t\n\r\x1f\123""#, &mut buffer);
    buffer.as_slice() == b"\t\n\r\x1f\x53"
}
