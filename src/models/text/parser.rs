// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tracing::debug;

use crate::error::IscsiError;

/// Handler invoked with the value part of a matched `key=value` record.
pub type KeyHandler<C> = fn(&mut C, &str) -> Result<(), IscsiError>;

/// One row of a key dispatch table. `key` excludes the `=`.
pub struct TextKey<C> {
    pub key: &'static str,
    pub handler: KeyHandler<C>,
}

impl<C> TextKey<C> {
    pub const fn new(key: &'static str, handler: KeyHandler<C>) -> Self {
        Self { key, handler }
    }
}

/// Iterate over the NUL-terminated records of a text data segment, bounded
/// by `data.len()`. A trailing record without its terminator is dropped.
pub fn split_records(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = data;
    std::iter::from_fn(move || {
        let end = rest.iter().position(|&b| b == 0)?;
        let (record, tail) = rest.split_at(end);
        rest = &tail[1..];
        Some(record)
    })
}

/// Dispatch every complete record whose key appears in `table`. Records
/// with unknown keys, no `=`, or non-UTF-8 bytes are ignored.
pub fn handle_text_keys<C>(
    ctx: &mut C,
    table: &[TextKey<C>],
    data: &[u8],
) -> Result<(), IscsiError> {
    for record in split_records(data) {
        let Ok(record) = std::str::from_utf8(record) else {
            debug!("ignoring non UTF-8 text record");
            continue;
        };
        let Some((key, value)) = record.split_once('=') else {
            debug!(record, "ignoring text record without '='");
            continue;
        };
        match table.iter().find(|row| row.key == key) {
            Some(row) => {
                debug!(key, value, "handling text key");
                (row.handler)(ctx, value)?;
            },
            None => debug!(key, "ignoring unknown text key"),
        }
    }
    Ok(())
}
