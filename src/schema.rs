//! Column schemas for each dataset type.
//!
//! The [`SchemaRegistry`] is built once at startup and shared read-only by
//! every job, so lookups need no locking.

use crate::dataset::DatasetType;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of a single column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Int,
    Bool,
}

/// A named, typed column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::String)
    }
}

/// Ordered list of columns for one dataset type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Schema where every column is a string.
    #[must_use]
    pub fn strings(names: &[&str]) -> Self {
        Self::new(names.iter().map(|n| Column::string(*n)).collect())
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of the column called `name`, if any.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Static mapping from dataset type to schema.
#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    schemas: HashMap<DatasetType, Schema>,
}

impl SchemaRegistry {
    /// An empty registry. Mostly useful in tests.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Registry for the Reddit user-action export.
    #[must_use]
    pub fn reddit() -> Self {
        let mut r = Self::empty();
        r.register(
            DatasetType::User,
            Schema::new(vec![
                Column::string("registration_dt"),
                Column::string("user_id"),
                Column::string("registration_country_code"),
                Column::new("is_suspended", ColumnType::Bool),
            ]),
        );
        r.register(
            DatasetType::Vote,
            Schema::strings(&[
                "endpoint_ts",
                "user_id",
                "sr_name",
                "target_fullname",
                "target_type",
                "vote_direction",
            ]),
        );
        r.register(
            DatasetType::Comment,
            Schema::strings(&[
                "endpoint_ts",
                "user_id",
                "sr_name",
                "comment_fullname",
                "comment_body",
                "parent_fullname",
                "post_fullname",
            ]),
        );
        r.register(
            DatasetType::Submission,
            Schema::strings(&[
                "endpoint_ts",
                "user_id",
                "sr_name",
                "post_fullname",
                "post_type",
                "post_title",
                "post_target_url",
                "post_body",
            ]),
        );
        r.register(
            DatasetType::Subscription,
            Schema::strings(&["endpoint_ts", "user_id", "sr_name", "event_type"]),
        );
        r.register(
            DatasetType::Removal,
            Schema::strings(&[
                "endpoint_ts",
                "user_id",
                "sr_name",
                "event_type",
                "target_fullname",
                "target_type",
                "user_type",
            ]),
        );
        r.register(
            DatasetType::Report,
            Schema::strings(&[
                "endpoint_ts",
                "user_id",
                "sr_name",
                "target_fullname",
                "target_type",
                "process_notes",
                "details_text",
            ]),
        );
        r
    }

    /// Add or replace the schema for `dataset`.
    pub fn register(&mut self, dataset: DatasetType, schema: Schema) {
        self.schemas.insert(dataset, schema);
    }

    /// Look up the schema for `dataset`.
    ///
    /// # Errors
    /// [`ConfigError::UnregisteredDataset`] if nothing was registered; this
    /// is a programming error and is checked before any work is scheduled.
    pub fn schema_for(&self, dataset: DatasetType) -> Result<&Schema, ConfigError> {
        self.schemas
            .get(&dataset)
            .ok_or(ConfigError::UnregisteredDataset(dataset))
    }

    /// Check that `key` exists in the schema of every listed dataset type.
    ///
    /// # Errors
    /// The first missing schema or key column.
    pub fn validate_key(
        &self,
        key: &str,
        datasets: impl IntoIterator<Item = DatasetType>,
    ) -> Result<(), ConfigError> {
        for dataset in datasets {
            let schema = self.schema_for(dataset)?;
            if schema.index_of(key).is_none() {
                return Err(ConfigError::MissingKeyColumn {
                    dataset,
                    column: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::reddit()
    }
}
