//! UDP probe payloads.
//!
//! Payloads are byte strings sent to a UDP port to get a reply from
//! services that ignore empty datagrams. They come from a built-in table,
//! nmap-payloads style template files and packet captures, and end up in a
//! [`PayloadRegistry`] sorted by destination port.

pub mod builtin;
pub mod checksum;
pub mod error;
pub mod escape;
pub mod loader;
pub mod payload;
pub mod pcap_reader;
pub mod ports;
pub mod preprocess;
pub mod registry;
pub mod template;

pub use builtin::{BUILTIN_PAYLOADS, BuiltinPayload, PayloadLength};
pub use checksum::partial_checksum;
pub use error::{PayloadError, Result};
pub use escape::{decode_c_string, selftest};
pub use loader::{LoadOptions, load};
pub use payload::{MAX_FRAME_LEN, MAX_TEMPLATE_PAYLOAD, PayloadBuffer, PayloadRecord};
pub use pcap_reader::{CaptureReader, Frame, read_pcap_file, read_pcap_payloads};
pub use ports::{PortRange, PortSet, PortSpecError};
pub use preprocess::{Found, LinkType, PreprocessedFrame, preprocess_frame};
pub use registry::PayloadRegistry;
pub use template::{read_template_file, read_templates, write_templates};
