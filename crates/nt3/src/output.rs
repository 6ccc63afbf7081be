use std::fmt::Write as _;
use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nt3_frame::{Entry, EntryValue, ReadEvent};
use nt3_pipeline::{EntryTable, HandshakeResult};
use serde::Serialize;

const EVENT_SCHEMA: &str = "https://schemas.3leaps.dev/nt3prims/cli/v1/event.schema.json";
const HELLO_SCHEMA: &str = "https://schemas.3leaps.dev/nt3prims/cli/v1/server-hello.schema.json";
const ENTRIES_SCHEMA: &str = "https://schemas.3leaps.dev/nt3prims/cli/v1/entries.schema.json";

/// Longest raw payload shown in full; longer ones are summarized.
const RAW_PREVIEW_LIMIT: usize = 64;

#[derive(Clone, Debug, Copy, ValueEnum)]
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

#[derive(Serialize)]
struct EventOutput<'a> {
    schema_id: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seq: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flags: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    timestamp: String,
}

impl<'a> EventOutput<'a> {
    fn new(kind: &'static str) -> Self {
        Self {
            schema_id: EVENT_SCHEMA,
            kind,
            name: None,
            id: None,
            seq: None,
            flags: None,
            entry_type: None,
            value: None,
            timestamp: now_unix_seconds(),
        }
    }

    fn from_event(event: &'a ReadEvent) -> Self {
        let mut out = Self::new(event.kind().name());
        match event {
            ReadEvent::EntryAssignment(entry) => {
                out.name = Some(&entry.name);
                out.id = Some(entry.id);
                out.seq = Some(entry.seq);
                out.flags = Some(entry.flags);
                out.entry_type = Some(entry.entry_type().name());
                out.value = Some(json_value(&entry.value));
            }
            ReadEvent::EntryUpdate(update) => {
                out.id = Some(update.id);
                out.seq = Some(update.seq);
                out.entry_type = Some(update.entry_type().name());
                out.value = Some(json_value(&update.value));
            }
            ReadEvent::EntryFlagsUpdate { id, flags } => {
                out.id = Some(*id);
                out.flags = Some(*flags);
            }
            ReadEvent::EntryDelete { id } => out.id = Some(*id),
            ReadEvent::ServerHello(hello) => {
                out.name = Some(&hello.server_identity);
                out.flags = Some(hello.flags);
            }
            ReadEvent::RpcResponse(response) => {
                out.id = Some(response.id);
                out.seq = Some(response.call_uid);
                out.value = Some(serde_json::Value::String(hex(&response.result)));
            }
            ReadEvent::KeepAlive | ReadEvent::ServerHelloComplete | ReadEvent::ClearAllEntries => {}
        }
        out
    }
}

#[derive(Serialize)]
struct HelloOutput<'a> {
    schema_id: &'a str,
    server_identity: &'a str,
    flags: u8,
    client_seen: bool,
    entries: usize,
    peer: &'a str,
}

#[derive(Serialize)]
struct EntryOutput<'a> {
    name: &'a str,
    id: u16,
    seq: u16,
    flags: u8,
    persistent: bool,
    entry_type: &'static str,
    value: serde_json::Value,
}

#[derive(Serialize)]
struct EntriesOutput<'a> {
    schema_id: &'a str,
    count: usize,
    entries: Vec<EntryOutput<'a>>,
}

pub fn print_event(event: &ReadEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EventOutput::from_event(event)),
        OutputFormat::Table => {
            let (id, detail) = event_columns(event);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "ID", "DETAIL"])
                .add_row(vec![event.kind().name().to_string(), id, detail]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{event}"),
    }
}

pub fn print_hello(hello: &HandshakeResult, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&HelloOutput {
            schema_id: HELLO_SCHEMA,
            server_identity: &hello.server.server_identity,
            flags: hello.server.flags,
            client_seen: hello.server.client_seen(),
            entries: hello.entries.len(),
            peer,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "SERVER", "CLIENT SEEN", "ENTRIES"])
                .add_row(vec![
                    peer.to_string(),
                    display_identity(&hello.server.server_identity),
                    hello.server.client_seen().to_string(),
                    hello.entries.len().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "connected peer={} server={} client_seen={} entries={}",
            peer,
            display_identity(&hello.server.server_identity),
            hello.server.client_seen(),
            hello.entries.len()
        ),
    }
}

pub fn print_entries(entries: &EntryTable, format: OutputFormat) {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    match format {
        OutputFormat::Json => print_json(&EntriesOutput {
            schema_id: ENTRIES_SCHEMA,
            count: sorted.len(),
            entries: sorted
                .iter()
                .map(|entry| EntryOutput {
                    name: &entry.name,
                    id: entry.id,
                    seq: entry.seq,
                    flags: entry.flags,
                    persistent: entry.is_persistent(),
                    entry_type: entry.entry_type().name(),
                    value: json_value(&entry.value),
                })
                .collect(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "ID", "TYPE", "SEQ", "FLAGS", "VALUE"]);
            for entry in &sorted {
                table.add_row(vec![
                    entry.name.clone(),
                    entry.id.to_string(),
                    entry.entry_type().name().to_string(),
                    entry.seq.to_string(),
                    format!("0x{:02x}", entry.flags),
                    value_preview(&entry.value),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in sorted {
                println!(
                    "{} = {} ({}, id={}, seq={})",
                    entry.name,
                    value_preview(&entry.value),
                    entry.entry_type().name(),
                    entry.id,
                    entry.seq
                );
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn event_columns(event: &ReadEvent) -> (String, String) {
    match event {
        ReadEvent::EntryAssignment(entry) => (
            entry.id.to_string(),
            format!("{} = {}", entry.name, value_preview(&entry.value)),
        ),
        ReadEvent::EntryUpdate(update) => (
            update.id.to_string(),
            format!("seq={} {}", update.seq, value_preview(&update.value)),
        ),
        ReadEvent::EntryFlagsUpdate { id, flags } => (id.to_string(), format!("flags=0x{flags:02x}")),
        ReadEvent::EntryDelete { id } => (id.to_string(), String::new()),
        ReadEvent::ServerHello(hello) => (
            String::new(),
            format!("server={}", display_identity(&hello.server_identity)),
        ),
        ReadEvent::RpcResponse(response) => (
            response.id.to_string(),
            format!("call_uid={} result=<{} bytes>", response.call_uid, response.result.len()),
        ),
        ReadEvent::KeepAlive | ReadEvent::ServerHelloComplete | ReadEvent::ClearAllEntries => {
            (String::new(), String::new())
        }
    }
}

fn json_value(value: &EntryValue) -> serde_json::Value {
    match value {
        EntryValue::Boolean(value) => serde_json::Value::Bool(*value),
        EntryValue::Double(value) => serde_json::Number::from_f64(*value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        EntryValue::String(value) => serde_json::Value::String(value.clone()),
        EntryValue::Raw(bytes) => serde_json::Value::String(hex(bytes)),
    }
}

fn value_preview(value: &EntryValue) -> String {
    match value {
        EntryValue::Raw(bytes) if bytes.len() > RAW_PREVIEW_LIMIT => {
            format!("<raw {} bytes>", bytes.len())
        }
        EntryValue::Raw(bytes) => hex(bytes),
        other => other.to_string(),
    }
}

fn display_identity(identity: &str) -> String {
    if identity.is_empty() {
        "-".to_string()
    } else {
        identity.to_string()
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
