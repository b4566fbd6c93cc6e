use std::fmt;

use thiserror::Error;

/// Why a single input row was left out of the sequential scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MalformedKind {
    UnparsableDate,
    MissingTeamId,
    SameTeamBothSides,
    InvalidNumber,
    InvalidOutcome,
    DuplicateGame,
    MissingGameId,
    NegativeValue,
    InvalidEncoding,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MalformedKind::UnparsableDate => "unparsable date",
            MalformedKind::MissingTeamId => "missing team id",
            MalformedKind::SameTeamBothSides => "same team on both sides",
            MalformedKind::InvalidNumber => "invalid number",
            MalformedKind::InvalidOutcome => "invalid outcome",
            MalformedKind::DuplicateGame => "duplicate game id",
            MalformedKind::MissingGameId => "missing game id",
            MalformedKind::NegativeValue => "negative box-score value",
            MalformedKind::InvalidEncoding => "invalid UTF-8",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum FeatureError {
    /// A mandatory column is absent from the input table
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A row that cannot take part in the scan
    #[error("Malformed record at row {row} ({kind}): {detail}")]
    MalformedRecord {
        row: usize,
        kind: MalformedKind,
        detail: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FeatureError {
    pub fn malformed(row: usize, kind: MalformedKind, detail: impl Into<String>) -> Self {
        FeatureError::MalformedRecord {
            row,
            kind,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeatureError>;
