use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

use pcap_file::DataLink;
use pcap_file::pcap::PcapReader;
use tracing::{debug, info, trace, warn};

use crate::error::{PayloadError, Result};
use crate::payload::MAX_FRAME_LEN;
use crate::ports::PortSet;
use crate::preprocess::{LinkType, preprocess_frame};
use crate::registry::PayloadRegistry;

/// One frame read from a capture
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp: Duration,
    pub captured_length: u32,
    pub original_length: u32,
    pub data: Vec<u8>,
}

impl From<DataLink> for LinkType {
    fn from(datalink: DataLink) -> Self {
        match datalink {
            DataLink::ETHERNET => LinkType::Ethernet,
            DataLink::LINUX_SLL => LinkType::LinuxSll,
            DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => LinkType::RawIp,
            other => LinkType::Unsupported(u32::from(other)),
        }
    }
}

/// Sequential reader over a libpcap-format capture
pub struct CaptureReader<R: Read> {
    capture: PcapReader<R>,
    link_type: LinkType,
    file_name: String,
    frames: u64,
}

impl CaptureReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("payloads:'{}': opening packet capture", path.display());

        let file = File::open(path).map_err(|source| PayloadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(BufReader::new(file), &path.display().to_string())
    }
}

impl<R: Read> CaptureReader<R> {
    pub fn new(reader: R, file_name: &str) -> Result<Self> {
        let capture = PcapReader::new(reader).map_err(|source| PayloadError::Capture {
            file: file_name.to_string(),
            source,
        })?;
        let link_type = LinkType::from(capture.header().datalink);

        Ok(Self {
            capture,
            link_type,
            file_name: file_name.to_string(),
            frames: 0,
        })
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Next frame, or `None` once the capture is exhausted.
    ///
    /// A damaged record ends the capture: the file offset of the next record
    /// cannot be trusted after it.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let packet = match self.capture.next_packet()? {
            Ok(packet) => packet,
            Err(e) => {
                warn!(
                    "payloads:'{}': error reading frame #{}: {}",
                    self.file_name,
                    self.frames + 1,
                    e
                );
                return None;
            }
        };
        self.frames += 1;

        let mut data = packet.data.into_owned();
        data.truncate(MAX_FRAME_LEN);

        Some(Frame {
            timestamp: packet.timestamp,
            captured_length: data.len() as u32,
            original_length: packet.orig_len,
            data,
        })
    }
}

/// Import the UDP payloads of every frame in `reader` into `registry`,
/// keyed by destination port.
///
/// Frames that are not UDP (or DNS over UDP), or that cannot be parsed, are
/// skipped. Returns the number of ports that did not have a payload before.
pub fn read_pcap_payloads<R: Read>(
    reader: R,
    file_name: &str,
    registry: &mut PayloadRegistry,
) -> Result<usize> {
    let mut capture = CaptureReader::new(reader, file_name)?;
    Ok(import_frames(&mut capture, registry))
}

/// Import payloads from the capture at `path`.
///
/// Failures are logged here as well as returned.
pub fn read_pcap_file<P: AsRef<Path>>(path: P, registry: &mut PayloadRegistry) -> Result<usize> {
    let path = path.as_ref();
    let result =
        CaptureReader::open(path).map(|mut capture| import_frames(&mut capture, registry));

    match &result {
        Ok(_) => debug!("payloads:'{}': closed packet capture", path.display()),
        Err(e) => warn!("{}", e),
    }
    result
}

fn import_frames<R: Read>(
    capture: &mut CaptureReader<R>,
    registry: &mut PayloadRegistry,
) -> usize {
    let file_name = capture.file_name.clone();
    let link_type = capture.link_type();
    if let LinkType::Unsupported(link) = link_type {
        warn!("payloads:'{}': unsupported link type {}", file_name, link);
    }

    let mut added = 0;
    while let Some(frame) = capture.next_frame() {
        let Some(parsed) = preprocess_frame(&frame.data, link_type) else {
            trace!("payloads:'{}': skipping corrupt frame #{}", file_name, capture.frames);
            continue;
        };
        if !parsed.is_udp() {
            continue;
        }

        added += registry.insert(
            &PortSet::single(parsed.port_dst),
            parsed.app_payload(&frame.data),
            None,
        );
    }

    info!("payloads:'{}': imported {} unique payloads", file_name, added);
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::tests::{tcp_frame, udp_frame};
    use pcap_file::pcap::{PcapPacket, PcapWriter};
    use std::io::Cursor;

    fn capture(frames: &[Vec<u8>]) -> Vec<u8> {
        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        for (i, frame) in frames.iter().enumerate() {
            let timestamp = Duration::from_millis(i as u64);
            let packet = PcapPacket::new(timestamp, frame.len() as u32, frame);
            writer.write_packet(&packet).unwrap();
        }
        writer.into_writer()
    }

    #[test]
    fn test_reader_yields_frames() {
        let frames = vec![udp_frame(1, 53, b"a"), udp_frame(1, 161, b"bc")];
        let bytes = capture(&frames);

        let mut reader = CaptureReader::new(Cursor::new(bytes), "mem.pcap").unwrap();
        assert_eq!(reader.link_type(), LinkType::Ethernet);

        let first = reader.next_frame().unwrap();
        assert_eq!(first.data, frames[0]);
        assert_eq!(first.captured_length, frames[0].len() as u32);
        assert_eq!(first.original_length, frames[0].len() as u32);
        assert_eq!(first.timestamp, Duration::from_millis(0));

        assert!(reader.next_frame().is_some());
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_udp_payloads_imported_by_destination_port() {
        let mut not_udp = udp_frame(1, 9, b"zz");
        not_udp[12] = 0x08;
        not_udp[13] = 0x06;

        let frames = vec![
            udp_frame(40000, 1900, b"M-SEARCH"),
            udp_frame(40001, 53, b"\x12\x34"),
            not_udp,
            vec![0u8; 10],
            udp_frame(40002, 1900, b"NOTIFY"),
        ];
        let bytes = capture(&frames);

        let mut registry = PayloadRegistry::new();
        let added = read_pcap_payloads(Cursor::new(bytes), "mem.pcap", &mut registry).unwrap();

        assert_eq!(added, 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(1900).unwrap().bytes(), b"NOTIFY");
        assert_eq!(registry.lookup(53).unwrap().checksum(), 0x1234);
        assert_eq!(registry.lookup(53).unwrap().source_port(), None);
        assert!(registry.lookup(9).is_none());
    }

    #[test]
    fn test_tcp_frames_are_not_imported() {
        let frames = vec![
            tcp_frame(40000, 80, b"GET / HTTP/1.0\r\n\r\n"),
            udp_frame(1, 123, b"\xe3"),
        ];
        let bytes = capture(&frames);

        let mut registry = PayloadRegistry::new();
        let added = read_pcap_payloads(Cursor::new(bytes), "mem.pcap", &mut registry).unwrap();

        assert_eq!(added, 1);
        assert!(registry.lookup(80).is_none());
        assert_eq!(registry.lookup(123).unwrap().bytes(), b"\xe3");
    }

    #[test]
    fn test_capture_read_from_disk() {
        let path = std::env::temp_dir().join(format!("payloads-{}.pcap", std::process::id()));
        std::fs::write(&path, capture(&[udp_frame(1, 5353, b"mdns")])).unwrap();

        let reader = CaptureReader::open(&path).unwrap();
        assert_eq!(reader.link_type(), LinkType::Ethernet);
        drop(reader);

        let mut registry = PayloadRegistry::new();
        let added = read_pcap_file(&path, &mut registry);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(added.unwrap(), 1);
        assert_eq!(registry.lookup(5353).unwrap().bytes(), b"mdns");
    }

    #[test]
    fn test_capture_overrides_builtins() {
        let bytes = capture(&[udp_frame(1, 161, b"community")]);
        let mut registry = PayloadRegistry::with_builtins();
        let added = read_pcap_payloads(Cursor::new(bytes), "mem.pcap", &mut registry).unwrap();

        assert_eq!(added, 0);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.lookup(161).unwrap().bytes(), b"community");
    }

    #[test]
    fn test_truncated_capture_keeps_earlier_frames() {
        let mut bytes = capture(&[udp_frame(1, 7, b"echo"), udp_frame(1, 9, b"discard")]);
        bytes.truncate(bytes.len() - 5);

        let mut registry = PayloadRegistry::new();
        read_pcap_payloads(Cursor::new(bytes), "mem.pcap", &mut registry).unwrap();
        assert_eq!(registry.ports().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_bad_header_and_missing_file() {
        let mut registry = PayloadRegistry::new();
        let err = read_pcap_payloads(Cursor::new(b"not a pcap".to_vec()), "junk", &mut registry)
            .unwrap_err();
        assert!(matches!(err, PayloadError::Capture { .. }));

        let err = read_pcap_file("/nonexistent/payloads.pcap", &mut registry).unwrap_err();
        assert!(matches!(err, PayloadError::Open { .. }));
        assert!(registry.is_empty());
    }
}
