use std::path::PathBuf;

use thiserror::Error;

use crate::models::SlotKey;

/// Structural problems in a source sheet. Fatal for the file that raised them.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("{source_name} has no header row at physical row {row}")]
    MissingHeader { source_name: String, row: usize },

    #[error("{source_name} has no teacher-name column at position {position}")]
    MissingNameColumn { source_name: String, position: usize },

    #[error("indicator column '{column}' not found in {source_name}")]
    MissingIndicatorColumn { column: String, source_name: String },

    #[error("{source_name} has none of the expected indicator columns")]
    NoIndicatorColumns { source_name: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("{path} is not a supported spreadsheet (expected .xlsx, .xls, .xlsb, .ods or .csv)")]
    UnsupportedFormat { path: PathBuf },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("{key} holds an invalid record: {message}")]
    InvalidRecord { key: SlotKey, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// User-facing login failures. The session is left untouched.
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("Please fill in both username and password.")]
    EmptyFields,

    #[error("Wrong username or password.")]
    InvalidCredentials,

    #[error("Invalid username format. Use: teachername{domain}")]
    MalformedAccount { domain: String },

    #[error("Username '{0}' was not found in the teacher data.")]
    UnknownTeacher(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("Access denied. Only the admin can change data.")]
    AccessDenied,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid {field} '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("row belongs to {row}, but the open table is {table}")]
    SlotMismatch { row: SlotKey, table: SlotKey },

    #[error("row {index} is out of range for a table of {len} rows")]
    RowOutOfRange { index: usize, len: usize },

    #[error("no dataset loaded for {0}")]
    UnknownSlot(SlotKey),

    #[error("{key} rejected record: {message}")]
    InvalidRecord { key: SlotKey, message: String },
}
