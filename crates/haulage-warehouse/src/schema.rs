//! Declared table layouts and write dispositions.
//!
//! Tables are declared up front; nothing here infers or evolves a schema.
//! Every column is stored as `VARCHAR`. Scalars keep their textual form and
//! nested arrays or objects are kept whole as JSON text (max nesting 0).

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::WarehouseError;

/// How a load treats rows already present in the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Prior contents are discarded and replaced with the batch.
    Replace,
    /// Rows are upserted by primary key; unmatched rows are retained.
    Merge,
}

impl WriteDisposition {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
        }
    }
}

impl Display for WriteDisposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout of one destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    dataset: String,
    name: String,
    columns: Vec<String>,
    primary_key: Vec<String>,
    write_disposition: WriteDisposition,
}

impl TableSchema {
    /// Declare a table. Identifiers are validated so they can be quoted into DDL.
    pub fn new<I, S>(
        dataset: &str,
        name: &str,
        columns: I,
        write_disposition: WriteDisposition,
    ) -> Result<Self, WarehouseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_identifier(dataset)?;
        validate_identifier(name)?;
        let columns = columns.into_iter().map(Into::into).collect::<Vec<String>>();
        if columns.is_empty() {
            return Err(WarehouseError::InvalidSchema(format!(
                "table '{name}' declares no columns"
            )));
        }
        for column in &columns {
            validate_identifier(column)?;
        }

        Ok(Self {
            dataset: dataset.to_owned(),
            name: name.to_owned(),
            columns,
            primary_key: Vec::new(),
            write_disposition,
        })
    }

    /// Attach primary key columns; each must already be a declared column.
    pub fn with_primary_key<I, S>(mut self, key: I) -> Result<Self, WarehouseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into_iter().map(Into::into).collect::<Vec<String>>();
        if let Some(missing) = key.iter().find(|column| !self.columns.contains(column)) {
            return Err(WarehouseError::InvalidSchema(format!(
                "primary key column '{missing}' is not declared on '{}'",
                self.name
            )));
        }
        self.primary_key = key;
        Ok(self)
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub const fn write_disposition(&self) -> WriteDisposition {
        self.write_disposition
    }

    /// Fully qualified, quoted table reference.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote(&self.dataset), quote(&self.name))
    }

    pub(crate) fn create_sql(&self) -> String {
        let mut definitions = self
            .columns
            .iter()
            .map(|column| format!("{} VARCHAR", quote(column)))
            .collect::<Vec<_>>();

        // Replace tables keep the key as metadata only: report rows can repeat
        // per hour for the same day and ad.
        if self.write_disposition == WriteDisposition::Merge && !self.primary_key.is_empty() {
            let key = self
                .primary_key
                .iter()
                .map(|column| quote(column))
                .collect::<Vec<_>>()
                .join(", ");
            definitions.push(format!("PRIMARY KEY ({key})"));
        }

        format!(
            "CREATE SCHEMA IF NOT EXISTS {dataset};\n\
             CREATE TABLE IF NOT EXISTS {table} ({definitions});",
            dataset = quote(&self.dataset),
            table = self.qualified_name(),
            definitions = definitions.join(", "),
        )
    }

    pub(crate) fn insert_sql(&self) -> String {
        let verb = match self.write_disposition {
            WriteDisposition::Merge if !self.primary_key.is_empty() => "INSERT OR REPLACE INTO",
            _ => "INSERT INTO",
        };
        let columns = self
            .columns
            .iter()
            .map(|column| quote(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; self.columns.len()].join(", ");

        format!(
            "{verb} {table} ({columns}) VALUES ({placeholders})",
            table = self.qualified_name()
        )
    }
}

fn validate_identifier(value: &str) -> Result<(), WarehouseError> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
    if !valid_start || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(WarehouseError::InvalidSchema(format!(
            "'{value}' is not a valid identifier"
        )));
    }
    Ok(())
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}
