//! JSON output for the CLI
//!
//! One JSON object per successful command on stdout, UTF-8 only. Log
//! lines share stdout, so the response is always a single line. Errors are
//! reported once, by the binary, on stderr.

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

fn response(data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "data": data
    })
}

fn write_line<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&mut io::stdout(), &response(data))
}
