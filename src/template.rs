//! Reader and writer for nmap-payloads style template files.
//!
//! ```text
//! # comment
//! udp 53,5353
//!   "\x00\x00\x01\x00"
//!   "\x00\x01\x00\x00\x00\x00\x00\x00"
//!   source 53
//! ```
//!
//! Each record is the `udp` marker, a port specification, zero or more
//! quoted literals concatenated into one payload, and an optional
//! `source <port>`. Tokens may share a line; whatever is left of a line
//! after one step is handed to the next.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::error::{PayloadError, Result};
use crate::escape::decode_c_string;
use crate::payload::{MAX_TEMPLATE_PAYLOAD, PayloadBuffer};
use crate::ports::PortSet;
use crate::registry::PayloadRegistry;

/// Line source that skips blank and comment lines and keeps the unconsumed
/// remainder of the current line.
struct LineCursor<R> {
    reader: R,
    file: String,
    line_number: usize,
    pending: Vec<u8>,
}

impl<R: BufRead> LineCursor<R> {
    fn new(reader: R, file: &str) -> Self {
        Self {
            reader,
            file: file.to_string(),
            line_number: 0,
            pending: Vec::new(),
        }
    }

    /// Current line, reading ahead if the previous one was used up.
    /// `None` at end of input.
    fn next_line(&mut self) -> Result<Option<&[u8]>> {
        if self.pending.is_empty() {
            let mut raw = Vec::new();
            loop {
                raw.clear();
                let read = self
                    .reader
                    .read_until(b'\n', &mut raw)
                    .map_err(|source| PayloadError::Read {
                        file: self.file.clone(),
                        source,
                    })?;
                if read == 0 {
                    return Ok(None);
                }
                self.line_number += 1;

                let line = raw.trim_ascii();
                if line.is_empty() || is_comment(line) {
                    continue;
                }
                self.pending = line.to_vec();
                break;
            }
        }
        Ok(Some(self.pending.as_slice()))
    }

    /// Replace the current line with what is left of it
    fn keep(&mut self, rest: &[u8]) {
        self.pending = rest.trim_ascii().to_vec();
    }

    fn syntax(&self, message: &str) -> PayloadError {
        PayloadError::syntax(self.file.as_str(), self.line_number, message)
    }
}

fn is_comment(line: &[u8]) -> bool {
    matches!(line.first(), Some(b'#' | b'/' | b';'))
}

/// Strip `keyword` from the front of `line` when it stands as a whole word
fn strip_keyword<'a>(line: &'a [u8], keyword: &[u8]) -> Option<&'a [u8]> {
    let rest = line.strip_prefix(keyword)?;
    match rest.first() {
        None => Some(rest),
        Some(b) if b.is_ascii_whitespace() => Some(rest),
        Some(_) => None,
    }
}

/// Parse the leading unsigned integer of `text` the way C `strtoul(.., 0)`
/// does: `0x` hex, leading `0` octal, otherwise decimal. Digits are read up
/// to the first byte that is not valid in the base, so `53abc` is 53, `08`
/// is 0 and a bare `0x` is 0. Values too large for `u64` saturate.
fn parse_c_integer(text: &[u8]) -> u64 {
    let (radix, digits) = match text {
        [b'0', b'x' | b'X', rest @ ..] => (16, rest),
        [b'0', rest @ ..] => (8, rest),
        _ => (10, text),
    };

    digits
        .iter()
        .map_while(|&b| (b as char).to_digit(radix))
        .fold(0u64, |acc, digit| {
            acc.saturating_mul(radix as u64).saturating_add(digit as u64)
        })
}

/// Read template records from `reader` into `registry`.
///
/// `file` names the source in diagnostics. Returns the number of ports that
/// did not already have a payload. A syntax error stops the read; records
/// inserted before it are kept.
pub fn read_templates<R: BufRead>(
    reader: R,
    file: &str,
    registry: &mut PayloadRegistry,
) -> Result<usize> {
    let mut cursor = LineCursor::new(reader, file);
    let mut added = 0;

    loop {
        // [udp]
        let Some(line) = cursor.next_line()? else {
            break;
        };
        let Some(rest) = strip_keyword(line, b"udp") else {
            return Err(cursor.syntax("syntax error, expected \"udp\"."));
        };
        let rest = rest.to_vec();
        cursor.keep(&rest);

        // [ports]
        let Some(line) = cursor.next_line()? else {
            break;
        };
        let (ports, rest) = match PortSet::parse_prefix(line) {
            Ok((ports, rest)) => (ports, rest.to_vec()),
            Err(e) => return Err(cursor.syntax(&format!("expected port list: {}", e))),
        };
        cursor.keep(&rest);
        let record_line = cursor.line_number;

        // [C strings]
        let mut buffer = PayloadBuffer::new(MAX_TEMPLATE_PAYLOAD);
        while let Some(line) = cursor.next_line()? {
            if line.first() != Some(&b'"') {
                break;
            }
            let rest = decode_c_string(line, &mut buffer).to_vec();
            cursor.keep(&rest);
        }

        // [source]
        let mut source_port = None;
        if let Some(line) = cursor.next_line()? {
            if let Some(rest) = strip_keyword(line, b"source") {
                let number = rest.trim_ascii_start();
                if !number.first().is_some_and(u8::is_ascii_digit) {
                    return Err(cursor.syntax("expected source port"));
                }
                let port = parse_c_integer(number);
                let port =
                    u16::try_from(port).map_err(|_| cursor.syntax("source port out of range"))?;
                source_port = Some(port);
                cursor.keep(&[]);
            }
        }

        if buffer.is_truncated() {
            warn!(
                "{}:{}: payload truncated to {} bytes ({} bytes dropped)",
                file,
                record_line,
                buffer.len(),
                buffer.dropped()
            );
        }

        added += registry.insert(&ports, buffer.as_slice(), source_port);
    }

    Ok(added)
}

/// Read a template file by path.
///
/// Errors are logged here as well as returned so the caller can simply move
/// on to the next file.
pub fn read_template_file<P: AsRef<Path>>(
    path: P,
    registry: &mut PayloadRegistry,
) -> Result<usize> {
    let path = path.as_ref();
    let name = path.display().to_string();
    debug!("payloads:'{}': opening template file", name);

    let file = File::open(path).map_err(|source| {
        let e = PayloadError::Open {
            path: path.to_path_buf(),
            source,
        };
        warn!("{}", e);
        e
    })?;

    match read_templates(BufReader::new(file), &name, registry) {
        Ok(added) => {
            info!("payloads:'{}': imported {} unique payloads", name, added);
            Ok(added)
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}

/// Write every record of `registry` in template syntax.
///
/// Printable ASCII other than `"` and `\` is written as is and everything
/// else as `\xNN`, so the output reads back into the same records.
pub fn write_templates<W: Write>(registry: &PayloadRegistry, mut out: W) -> std::io::Result<()> {
    for record in registry {
        writeln!(out, "udp {}", record.port())?;
        write!(out, "  \"")?;
        for &b in record.bytes() {
            if (b.is_ascii_graphic() || b == b' ') && b != b'"' && b != b'\\' {
                out.write_all(&[b])?;
            } else {
                write!(out, "\\x{:02x}", b)?;
            }
        }
        writeln!(out, "\"")?;
        if let Some(source_port) = record.source_port() {
            writeln!(out, "  source {}", source_port)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(text: &str, registry: &mut PayloadRegistry) -> Result<usize> {
        read_templates(Cursor::new(text.as_bytes()), "test.payloads", registry)
    }

    #[test]
    fn test_multiline_record() {
        let text = "\
# DNS status request
udp 53
  \"\\x00\\x00\\x10\\x00\"
  \"\\x00\\x00\\x00\\x00\"

udp 7,9
  \"\\r\\n\\r\\n\"
  source 0x400
";
        let mut registry = PayloadRegistry::new();
        assert_eq!(read(text, &mut registry).unwrap(), 3);

        let dns = registry.lookup(53).unwrap();
        assert_eq!(dns.bytes(), &[0, 0, 0x10, 0, 0, 0, 0, 0]);
        assert_eq!(dns.source_port(), None);

        for port in [7, 9] {
            let echo = registry.lookup(port).unwrap();
            assert_eq!(echo.bytes(), b"\r\n\r\n");
            assert_eq!(echo.source_port(), Some(1024));
        }
    }

    #[test]
    fn test_single_line_records() {
        let text = "udp 123 \"\\xe3\\x00\" \"\\x04\" source 123\nudp 161 \"x\"\n";
        let mut registry = PayloadRegistry::new();
        read(text, &mut registry).unwrap();

        let ntp = registry.lookup(123).unwrap();
        assert_eq!(ntp.bytes(), &[0xe3, 0x00, 0x04]);
        assert_eq!(ntp.source_port(), Some(123));
        assert_eq!(registry.lookup(161).unwrap().bytes(), b"x");
    }

    #[test]
    fn test_comments_and_whitespace_are_skipped() {
        let text = "\n   # hash\n/ slash\n; semicolon\n\t udp \t\n  1900  \n \"M-SEARCH\"  \n";
        let mut registry = PayloadRegistry::new();
        read(text, &mut registry).unwrap();
        assert_eq!(registry.lookup(1900).unwrap().bytes(), b"M-SEARCH");
    }

    #[test]
    fn test_record_without_strings_is_empty_payload() {
        let mut registry = PayloadRegistry::new();
        read("udp 9999\n", &mut registry).unwrap();
        assert!(registry.lookup(9999).unwrap().is_empty());
    }

    #[test]
    fn test_record_cut_off_before_ports_is_dropped() {
        let mut registry = PayloadRegistry::new();
        assert_eq!(read("udp\n", &mut registry).unwrap(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_udp_marker_is_syntax_error() {
        let text = "# header\nudp 53 \"a\"\ntcp 80\nudp 161 \"b\"\n";
        let mut registry = PayloadRegistry::new();
        let err = read(text, &mut registry).unwrap_err();

        assert!(err.is_syntax());
        assert_eq!(err.to_string(), "test.payloads:3: syntax error, expected \"udp\".");
        assert!(registry.lookup(53).is_some());
        assert!(registry.lookup(161).is_none());
    }

    #[test]
    fn test_bad_source_port_is_syntax_error() {
        let mut registry = PayloadRegistry::new();
        let err = read("udp 53\n\"a\"\nsource foo\n", &mut registry).unwrap_err();
        assert_eq!(err.to_string(), "test.payloads:3: expected source port");
        assert!(registry.is_empty());

        let err = read("udp 53\n\"a\"\nsource\n", &mut registry).unwrap_err();
        assert!(err.is_syntax());

        let err = read("udp 53 \"a\" source 70000\n", &mut registry).unwrap_err();
        assert_eq!(err.to_string(), "test.payloads:1: source port out of range");
    }

    #[test]
    fn test_source_port_reads_leading_number() {
        let text = "\
udp 1 \"a\" source 53abc
udp 2 \"b\" source 08
udp 3 \"c\" source 0x
udp 4 \"d\" source 017
udp 5 \"e\" source 0X1f 99
";
        let mut registry = PayloadRegistry::new();
        assert_eq!(read(text, &mut registry).unwrap(), 5);

        let sources: Vec<Option<u16>> = registry.iter().map(|r| r.source_port()).collect();
        assert_eq!(sources, vec![Some(53), Some(0), Some(0), Some(15), Some(31)]);
    }

    #[test]
    fn test_parse_c_integer_bases() {
        assert_eq!(parse_c_integer(b"1024"), 1024);
        assert_eq!(parse_c_integer(b"0x400"), 1024);
        assert_eq!(parse_c_integer(b"02000"), 1024);
        assert_eq!(parse_c_integer(b"0"), 0);
        assert_eq!(parse_c_integer(b"0xzz"), 0);
        assert_eq!(parse_c_integer(b"99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn test_keywords_must_stand_alone() {
        let mut registry = PayloadRegistry::new();
        let err = read("udp\"\\x00\"\n", &mut registry).unwrap_err();
        assert_eq!(err.to_string(), "test.payloads:1: syntax error, expected \"udp\".");

        // `source53` is not a source clause, so it is read as the next record
        let err = read("udp 53 \"a\"\nsource53\n", &mut registry).unwrap_err();
        assert_eq!(err.to_string(), "test.payloads:2: syntax error, expected \"udp\".");
        assert_eq!(registry.lookup(53).unwrap().source_port(), None);
    }

    #[test]
    fn test_bad_port_list_is_syntax_error() {
        let mut registry = PayloadRegistry::new();
        let err = read("udp\n\"abc\"\n", &mut registry).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.to_string().starts_with("test.payloads:2: expected port list"));
    }

    #[test]
    fn test_template_overrides_builtin() {
        let mut registry = PayloadRegistry::with_builtins();
        let size = registry.len();
        assert_eq!(read("udp 53 \"\\x12\\x34\"\n", &mut registry).unwrap(), 0);
        assert_eq!(registry.len(), size);
        assert_eq!(registry.lookup(53).unwrap().checksum(), 0x1234);
    }

    #[test]
    fn test_malformed_file_leaves_other_sources_alone() {
        let mut registry = PayloadRegistry::with_builtins();
        let before: Vec<(u16, Vec<u8>)> = registry
            .iter()
            .map(|r| (r.port(), r.bytes().to_vec()))
            .collect();

        assert!(read("# x\n161 \"oops\"\n", &mut registry).is_err());

        let after: Vec<(u16, Vec<u8>)> = registry
            .iter()
            .map(|r| (r.port(), r.bytes().to_vec()))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_oversized_payload_is_truncated() {
        let literal = "\\xff".repeat(MAX_TEMPLATE_PAYLOAD + 10);
        let text = format!("udp 1234\n\"{}\"\n", literal);
        let mut registry = PayloadRegistry::new();
        read(&text, &mut registry).unwrap();
        assert_eq!(registry.lookup(1234).unwrap().len(), MAX_TEMPLATE_PAYLOAD);
    }

    #[test]
    fn test_write_then_read_matches() {
        let mut registry = PayloadRegistry::with_builtins();
        read("udp 7 \"quote\\\" slash\\\\ \\x00\" source 7\n", &mut registry).unwrap();

        let mut out = Vec::new();
        write_templates(&registry, &mut out).unwrap();

        let mut reread = PayloadRegistry::new();
        read_templates(Cursor::new(out), "dump", &mut reread).unwrap();

        assert_eq!(reread.len(), registry.len());
        for (a, b) in registry.iter().zip(reread.iter()) {
            assert_eq!(a.port(), b.port());
            assert_eq!(a.bytes(), b.bytes());
            assert_eq!(a.source_port(), b.source_port());
            assert_eq!(a.checksum(), b.checksum());
        }
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let mut registry = PayloadRegistry::new();
        let err = read_template_file("/nonexistent/nmap-payloads", &mut registry).unwrap_err();
        assert!(matches!(err, PayloadError::Open { .. }));
    }
}
