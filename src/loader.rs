use std::path::PathBuf;

use tracing::{info, warn};

use crate::pcap_reader::read_pcap_file;
use crate::ports::PortSet;
use crate::registry::PayloadRegistry;
use crate::template::read_template_file;

/// Inputs of the startup ingestion phase
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Seed with the built-in payloads first
    pub builtins: bool,
    /// Captures whose UDP payloads are imported
    pub pcap_files: Vec<PathBuf>,
    /// nmap-payloads style template files
    pub template_files: Vec<PathBuf>,
    /// Final target ports; the registry is trimmed to these when set
    pub ports: Option<PortSet>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self {
            builtins: true,
            ..Default::default()
        }
    }
}

/// Build the payload registry.
///
/// Built-ins go in first, then captures, then template files, so later
/// sources override earlier ones port by port. A file that cannot be read
/// or has a syntax error is skipped after whatever it contributed before
/// the failure.
pub fn load(options: &LoadOptions) -> PayloadRegistry {
    let mut registry = if options.builtins {
        PayloadRegistry::with_builtins()
    } else {
        PayloadRegistry::new()
    };

    let mut failed = 0;
    for path in &options.pcap_files {
        if read_pcap_file(path, &mut registry).is_err() {
            failed += 1;
        }
    }
    for path in &options.template_files {
        if read_template_file(path, &mut registry).is_err() {
            failed += 1;
        }
    }
    if failed > 0 {
        warn!("payloads: {} payload file(s) were not fully loaded", failed);
    }

    if let Some(ports) = &options.ports {
        registry.trim(ports);
    }

    info!("payloads: {} payloads ready", registry.len());
    registry
}
