//! Reshaping of driver rows into application records.
//!
//! Rows come back flat, sometimes with prefixed aliases for joined entities
//! (`author_id`, `author_name`). [`RecordNormalizer`] picks and renames those columns
//! and turns epoch-second timestamps into formatted strings; [`split_nested`] and
//! [`merge_nested`] move a sub-object between `key.sub` nesting and `key_sub` columns.

use chrono::{DateTime, FixedOffset, Local};
use serde_json::Value as JsonValue;

use crate::sql_builder::{bare_name, render_field_list};
use crate::types::Record;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Output of [`RecordNormalizer::select_and_rename`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The application-shaped record.
    pub record: Record,
    /// The input with every consumed column removed.
    pub residual: Record,
}

/// Field selection, renaming and timestamp coercion for one entity.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    fields: Vec<String>,
    timestamp_fields: Vec<String>,
    utc_offset: Option<FixedOffset>,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            timestamp_fields: vec!["utime".to_string(), "ctime".to_string()],
            utc_offset: None,
        }
    }
}

impl RecordNormalizer {
    /// Normalizer whose default field list is `fields`.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Replace the epoch-second columns to coerce (default `utime`, `ctime`).
    #[must_use]
    pub fn with_timestamp_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Format timestamps in a fixed offset instead of the host's local zone.
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Projection list over the default fields, see [`render_field_list`].
    #[must_use]
    pub fn render_fields(&self, prefix: &str, rename_as: &str) -> String {
        render_field_list(prefix, rename_as, &self.fields)
    }

    /// Pick `rename_prefix + bare_name(field)` out of `record` for every field and store
    /// it under the bare name.
    ///
    /// The output starts empty, or as a full copy of `record` when `copy_whole` is set.
    /// Consumed columns are removed from the residual. Two fields with the same bare name
    /// read the same source column, so the first one consumes it and the second is a
    /// no-op. Timestamp coercion runs on the output last.
    #[must_use]
    pub fn select_and_rename<S: AsRef<str>>(
        &self,
        record: Record,
        rename_prefix: &str,
        fields: &[S],
        copy_whole: bool,
    ) -> Normalized {
        let mut residual = record;
        let mut out = if copy_whole {
            residual.clone()
        } else {
            Record::new()
        };

        for field in fields {
            let name = bare_name(field.as_ref());
            let source = format!("{rename_prefix}{name}");
            if let Some(value) = residual.remove(&source) {
                out.insert(name, value);
            }
        }

        self.coerce_timestamps(&mut out);
        Normalized {
            record: out,
            residual,
        }
    }

    /// [`select_and_rename`](Self::select_and_rename) over the default field list.
    #[must_use]
    pub fn select_fields(
        &self,
        record: Record,
        rename_prefix: &str,
        copy_whole: bool,
    ) -> Normalized {
        self.select_and_rename(record, rename_prefix, &self.fields, copy_whole)
    }

    /// Normalize one unprefixed row, keeping every column.
    #[must_use]
    pub fn normalize(&self, record: Record) -> Record {
        self.select_fields(record, "", true).record
    }

    /// [`normalize`](Self::normalize) every row, preserving order.
    #[must_use]
    pub fn normalize_many(&self, records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .map(|record| self.normalize(record))
            .collect()
    }

    /// Replace epoch-second timestamp columns with formatted strings.
    ///
    /// Integers, floats and numeric strings are converted; absent, null and
    /// non-numeric values stay as they are.
    pub fn coerce_timestamps(&self, record: &mut Record) {
        for name in &self.timestamp_fields {
            let Some(value) = record.get_mut(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match epoch_seconds(value).and_then(|secs| self.format_epoch(secs)) {
                Some(formatted) => *value = JsonValue::String(formatted),
                None => tracing::debug!(field = %name, ?value, "timestamp left as is"),
            }
        }
    }

    /// Format epoch seconds as `YYYY-MM-DDTHH:MM:SS+HH:MM`. `None` when out of range.
    #[must_use]
    pub fn format_epoch(&self, secs: i64) -> Option<String> {
        let utc = DateTime::from_timestamp(secs, 0)?;
        let formatted = match self.utc_offset {
            Some(offset) => utc.with_timezone(&offset).format(TIMESTAMP_FORMAT),
            None => utc.with_timezone(&Local).format(TIMESTAMP_FORMAT),
        };
        Some(formatted.to_string())
    }
}

fn epoch_seconds(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.floor() as i64))
        }
        _ => None,
    }
}

/// Current time in epoch seconds, for stamping `ctime`/`utime` on writes.
#[must_use]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Flatten `record[target]` into `target_<name>` columns for each of `subfields`, then
/// drop `record[target]`. Records without an object under `target` come back unchanged.
#[must_use]
pub fn split_nested<S: AsRef<str>>(mut record: Record, target: &str, subfields: &[S]) -> Record {
    if !matches!(record.get(target), Some(JsonValue::Object(_))) {
        return record;
    }
    let Some(JsonValue::Object(mut nested)) = record.remove(target) else {
        return record;
    };

    for name in subfields {
        let name = name.as_ref();
        let flat = format!("{target}_{name}");
        match nested.remove(name) {
            Some(value) => {
                record.insert(flat, value);
            }
            None => {
                record.remove(&flat);
            }
        }
    }
    record
}

/// Inverse of [`split_nested`]: move `target_<name>` columns into `record[target]`.
/// A missing or non-object `record[target]` starts out as an empty object.
#[must_use]
pub fn merge_nested<S: AsRef<str>>(mut record: Record, target: &str, subfields: &[S]) -> Record {
    let mut nested = match record.remove(target) {
        Some(JsonValue::Object(map)) => map,
        _ => Record::new(),
    };

    for name in subfields {
        let name = name.as_ref();
        match record.remove(&format!("{target}_{name}")) {
            Some(value) => {
                nested.insert(name.to_string(), value);
            }
            None => {
                nested.remove(name);
            }
        }
    }
    record.insert(target.to_string(), JsonValue::Object(nested));
    record
}
