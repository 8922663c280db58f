//! Joined per-user output.
//!
//! Users are written bucket by bucket to `<output>/joined/<bucket:05>.tsv`
//! as a flat, tab-separated event log:
//!
//! ```text
//! user_id  endpoint_ts  event_type  param_0 ... param_{w-1}
//! u1       2016-01-02   create      US        false
//! u1       1520000000   vote        AskReddit t3_abc  link  up
//! ```
//!
//! Each user contributes one `create` row built from the profile, followed
//! by its actions in timestamp order. An action's `event_type` column, if its
//! dataset has one, is used as the event type; otherwise the dataset's event
//! label is. The remaining fields become the params, padded to the width.

use crate::io::delimited::RecordWriter;
use crate::join::{AggregatedUser, EVENT_TYPE, UserAction};
use crate::record::{Record, Value};
use crate::schema::{Column, Schema};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Subdirectory of the output directory holding joined files.
pub const JOINED_DIR: &str = "joined";

/// Params in a `create` row: country code and suspension flag.
const PROFILE_PARAMS: usize = 2;

pub struct JoinWriter {
    dir: PathBuf,
    schema: Schema,
    width: usize,
}

impl JoinWriter {
    /// Writer rooted at `<output_dir>/joined` with `width` param columns
    /// (at least enough for a profile row).
    #[must_use]
    pub fn new(output_dir: &Path, width: usize) -> Self {
        let width = width.max(PROFILE_PARAMS);
        let mut columns = vec![
            Column::string("user_id"),
            Column::string("endpoint_ts"),
            Column::string("event_type"),
        ];
        columns.extend((0..width).map(|i| Column::string(format!("param_{i}"))));
        Self {
            dir: output_dir.join(JOINED_DIR),
            schema: Schema::new(columns),
            width,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn path_for(&self, bucket: usize) -> PathBuf {
        self.dir.join(format!("{bucket:05}.tsv"))
    }

    /// Write one bucket of users. The file is created even if `users` is
    /// empty.
    ///
    /// # Returns
    /// The number of event rows written.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn write_bucket(&self, bucket: usize, users: &[AggregatedUser]) -> Result<usize> {
        let mut w = RecordWriter::create(self.path_for(bucket), &self.schema, b'\t')?;
        for user in users {
            for row in self.rows_for(user) {
                w.write(&row)?;
            }
        }
        w.finish()
    }

    /// Event rows for one user: the `create` row then every action.
    #[must_use]
    pub fn rows_for(&self, user: &AggregatedUser) -> Vec<Record> {
        let p = &user.profile;
        let mut rows = Vec::with_capacity(user.actions.len() + 1);
        rows.push(self.row(
            &p.id,
            &p.registration_date,
            "create",
            vec![p.country_code.clone(), p.is_suspended.to_string()],
        ));
        for action in &user.actions {
            let (event, params) = split_event(action);
            rows.push(self.row(&p.id, &action.timestamp, &event, params));
        }
        rows
    }

    fn row(&self, user: &str, ts: &str, event: &str, mut params: Vec<String>) -> Record {
        params.resize(self.width, String::new());
        let mut values = Vec::with_capacity(3 + self.width);
        values.push(Value::Str(user.to_string()));
        values.push(Value::Str(ts.to_string()));
        values.push(Value::Str(event.to_string()));
        values.extend(params.into_iter().map(Value::Str));
        Record::new(values)
    }
}

/// Event type and params of an action.
fn split_event(action: &UserAction) -> (String, Vec<String>) {
    let mut event = None;
    let mut params = Vec::with_capacity(action.params.len());
    for (name, value) in action.fields() {
        if name == EVENT_TYPE {
            event = Some(value.to_string());
        } else {
            params.push(value.to_string());
        }
    }
    let event = event.unwrap_or_else(|| action.kind.event_label().to_string());
    (event, params)
}
