//! zsh extended history: `: <epoch>:<duration>;<command>`.

use chrono::{DateTime, TimeZone, Utc};

/// Byte zsh uses to escape "special" bytes in the history file
const META: u8 = 0x83;

/// Undo zsh's metafication: `0x83 b` encodes the byte `b ^ 32`.
pub fn unmetafy(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();
    while let Some(&b) = iter.next() {
        if b == META {
            if let Some(&next) = iter.next() {
                out.push(next ^ 32);
            }
        } else {
            out.push(b);
        }
    }
    out
}

/// Parse a single extended-history record.
///
/// Returns `None` for lines without the `;` separator or a numeric timestamp.
pub fn parse_line(line: &str) -> Option<(DateTime<Utc>, String)> {
    let (meta, command) = line.split_once(';')?;

    let mut fields = meta.split(':');
    let _leading = fields.next()?;
    let epoch = fields.next()?.trim().parse::<i64>().ok()?;
    let _duration = fields.next()?;

    let timestamp = Utc.timestamp_opt(epoch, 0).single()?;
    let command = command.trim();
    if command.is_empty() {
        return None;
    }
    Some((timestamp, command.to_string()))
}

/// Parse a whole history file, rejoining `\`-continued multi-line commands
pub fn parse(text: &str) -> Vec<(DateTime<Utc>, String)> {
    let mut entries = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let mut record = line.to_string();
        while record.ends_with('\\') {
            match lines.next() {
                Some(next) => {
                    record.pop();
                    record.push('\n');
                    record.push_str(next);
                }
                None => break,
            }
        }

        match parse_line(&record) {
            Some(entry) => entries.push(entry),
            None => tracing::trace!(line = %record, "skipping unparseable zsh history line"),
        }
    }

    entries
}
