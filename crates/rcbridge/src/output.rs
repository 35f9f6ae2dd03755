use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rcbridge_channels::{Packet, ResolvedValue};
use rcbridge_frame::{encode_csv, BridgeMessage, Inbound};
use rcbridge_session::{SentRecord, StatusSnapshot};
use rcbridge_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    csv: String,
    #[serde(flatten)]
    packet: &'a Packet,
}

pub fn print_packet(packet: &Packet, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&PacketOutput {
            csv: packet.csv(),
            packet,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["KEY", "LABEL", "VALUE"]);
            for channel in &packet.channels {
                table.add_row(vec![
                    channel.key.clone(),
                    channel.label.clone(),
                    resolved_text(channel.value),
                ]);
            }
            println!("{table}");
            println!("{}", packet.csv());
        }
        OutputFormat::Pretty => println!("{}", packet.csv()),
    }
}

fn resolved_text(value: ResolvedValue) -> String {
    match value {
        ResolvedValue::Byte(v) => v.to_string(),
        ResolvedValue::Float(v) => format!("{v:.2}"),
        ResolvedValue::Flag(v) => if v { "on" } else { "off" }.to_string(),
    }
}

pub fn print_sent(record: &SentRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FORMAT", "SENT AT", "RAW"]);
            table.add_row(vec![
                record.format.to_string(),
                record.sent_at.to_string(),
                record.raw.clone(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("sent {} {}", record.format, record.raw),
    }
}

pub fn print_inbound(item: &Inbound, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(item),
        OutputFormat::Table => {
            let (kind, text) = inbound_summary(item);
            let mut table = new_table(vec!["TYPE", "CONTENT"]);
            table.add_row(vec![kind.to_string(), text]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let (kind, text) = inbound_summary(item);
            println!("{kind:<8} {text}");
        }
    }
}

fn inbound_summary(item: &Inbound) -> (&'static str, String) {
    match item {
        Inbound::Payload { payload } => ("payload", encode_csv(payload)),
        Inbound::Message { message } => {
            let kind = match message {
                BridgeMessage::Command { .. } => "command",
                BridgeMessage::Status { .. } => "status",
                BridgeMessage::Event { .. } => "event",
                BridgeMessage::Error { .. } => "error",
                BridgeMessage::Other { .. } => "message",
            };
            let text = match message.payload() {
                Some(payload) => encode_csv(payload),
                None => serde_json::to_string(message.body()).unwrap_or_default(),
            };
            (kind, text)
        }
        Inbound::Text { line } => ("text", line.clone()),
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    description: &'a str,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|p| PortOutput {
                    name: &p.name,
                    kind: p.kind.as_str(),
                    description: &p.description,
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "KIND", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.as_str().to_string(),
                    port.description.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in ports {
                println!("{} ({}) {}", port.name, port.kind.as_str(), port.description);
            }
        }
    }
}

pub fn print_status(status: &StatusSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(status),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (field, value) in status_rows(status) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in status_rows(status) {
                println!("{field}: {value}");
            }
        }
    }
}

fn status_rows(status: &StatusSnapshot) -> Vec<(&'static str, String)> {
    vec![
        ("port", status.port.clone()),
        (
            "baud",
            status.baud.map_or_else(|| "-".to_string(), |b| b.to_string()),
        ),
        ("state", status.state.as_str().to_string()),
        (
            "last_packet",
            status
                .last_packet
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.raw.clone()),
        ),
        (
            "last_received",
            status
                .last_received
                .as_ref()
                .map_or_else(|| "-".to_string(), |r| encode_csv(&r.payload)),
        ),
        (
            "last_error",
            status.last_error.clone().unwrap_or_else(|| "-".to_string()),
        ),
        ("frames_decoded", status.frames_decoded.to_string()),
        ("frames_dropped", status.frames_dropped.to_string()),
        (
            "recent_lines",
            status.recent_inbound_lines.len().to_string(),
        ),
    ]
}
