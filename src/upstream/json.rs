//! JSON decoding with error messages that point at the offending field.

use anyhow::Result;

/// Deserialize `body`, reporting the serde path, the type mismatch, and a
/// snippet of the failing line on error.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    match serde_path_to_error::deserialize(jd) {
        Ok(value) => Ok(value),
        Err(err) => {
            let inner = err.inner();
            let (line, column) = (inner.line(), inner.column());
            let path = err.path().to_string();

            let msg = inner.to_string();
            let loc = format!(" at line {line} column {column}");
            let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

            let mut out = String::new();
            if !path.is_empty() && path != "." {
                out.push_str(&format!("at path '{path}': "));
            }
            out.push_str(&format!(
                "{} (line {line} col {column})\n{}",
                describe_mismatch(msg),
                snippet(body, line, column, 24)
            ));
            Err(anyhow::anyhow!(out))
        }
    }
}

/// Rewrite "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {expected}, got {actual}");
    }
    msg.to_string()
}

fn snippet(body: &str, line: usize, column: usize, width: usize) -> String {
    let target: Vec<char> = body
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or("")
        .chars()
        .collect();
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    // serde_json columns count bytes; close enough for a pointer in ASCII payloads.
    let at = column.saturating_sub(1).min(target.len());
    let start = at.saturating_sub(width / 2);
    let end = (at + width / 2).min(target.len());
    let slice: String = target[start..end].iter().collect();
    let pointer = " ".repeat(at - start) + "^";

    format!("...{slice}...\n   {pointer}")
}
