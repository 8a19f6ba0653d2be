//! Response rendering for the command line.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::Response;

/// Writes status, headers and (when non-blank) the body of `response`.
pub fn write_response<W: Write>(out: &mut W, response: &Response) -> io::Result<()> {
    writeln!(out, "Status Code: {}", response.status)?;
    writeln!(out)?;
    writeln!(out, "Headers:")?;
    for (name, value) in &response.headers {
        writeln!(out, "{name}: {value}")?;
    }

    let text = response.text();
    if !text.trim().is_empty() {
        writeln!(out)?;
        writeln!(out, "Response Body:")?;
        writeln!(out, "{}", format_body(&text))?;
    }
    Ok(())
}

/// Pretty-prints `text` with 4-space indentation if it is JSON, otherwise
/// returns it unchanged.
pub fn format_body(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| to_pretty_json(&value))
        .unwrap_or_else(|| text.to_owned())
}

fn to_pretty_json(value: &serde_json::Value) -> Option<String> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer).ok()?;
    String::from_utf8(buf).ok()
}
