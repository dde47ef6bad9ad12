use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;

use probe_payloads::{LoadOptions, PayloadRecord, PortSet, load, selftest, write_templates};

#[derive(Parser, Debug)]
#[command(name = "probe-payloads")]
#[command(about = "Load, inspect and check UDP probe payload templates")]
#[command(version)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where payloads come from
#[derive(clap::Args, Debug)]
struct Sources {
    /// nmap-payloads style template file (repeatable)
    #[arg(long = "nmap-payloads", value_name = "FILE")]
    nmap_payloads: Vec<PathBuf>,

    /// Packet capture whose UDP payloads are imported (repeatable)
    #[arg(long = "pcap-payloads", value_name = "FILE")]
    pcap_payloads: Vec<PathBuf>,

    /// Target UDP ports; payloads for other ports are dropped
    #[arg(short, long, value_name = "SPEC")]
    ports: Option<String>,

    /// Do not seed the built-in payloads
    #[arg(long)]
    no_builtins: bool,
}

impl Sources {
    fn to_options(&self) -> Result<LoadOptions> {
        let ports = match &self.ports {
            Some(spec) => Some(
                spec.parse::<PortSet>()
                    .with_context(|| format!("Invalid port specification: {}", spec))?,
            ),
            None => None,
        };

        Ok(LoadOptions {
            builtins: !self.no_builtins,
            pcap_files: self.pcap_payloads.clone(),
            template_files: self.nmap_payloads.clone(),
            ports,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the string-literal decoder against a known vector
    Selftest,
    /// Print every loaded payload in template syntax
    Dump {
        #[command(flatten)]
        sources: Sources,
    },
    /// Show the payload that would be sent to one port
    Lookup {
        /// Destination UDP port
        port: u16,

        #[command(flatten)]
        sources: Sources,
    },
}

fn print_record(out: &mut impl Write, record: &PayloadRecord) -> io::Result<()> {
    writeln!(out, "port:        {}", record.port())?;
    writeln!(out, "length:      {}", record.len())?;
    match record.source_port() {
        Some(port) => writeln!(out, "source port: {}", port)?,
        None => writeln!(out, "source port: (any)")?,
    }
    writeln!(out, "checksum:    0x{:04x}", record.checksum())?;
    for (i, line) in record.bytes().chunks(16).enumerate() {
        write!(out, "  {:04x} ", i * 16)?;
        for b in line {
            write!(out, " {:02x}", b)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    match args.command {
        Commands::Selftest => {
            if !selftest() {
                bail!("payloads: selftest failed");
            }
            info!("payloads: selftest passed");
            println!("selftest: success");
        }
        Commands::Dump { sources } => {
            let registry = load(&sources.to_options()?);
            let stdout = io::stdout();
            write_templates(&registry, stdout.lock()).context("Failed to write payloads")?;
        }
        Commands::Lookup { port, sources } => {
            let registry = load(&sources.to_options()?);
            match registry.lookup(port as u32) {
                Some(record) => {
                    let stdout = io::stdout();
                    print_record(&mut stdout.lock(), record).context("Failed to write payload")?;
                }
                None => bail!("no payload for udp/{}", port),
            }
        }
    }

    Ok(())
}
