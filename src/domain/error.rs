//! Domain error types.

use chrono::NaiveDate;

/// Why a single date's holdings computation failed.
///
/// These are recovered per date: the simulator turns them into a history
/// reset, never a crash. Kept separate from [`ArborError`], which covers
/// fatal configuration and IO problems.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("no data for {identifier} on {date}")]
    DataUnavailable {
        identifier: String,
        date: NaiveDate,
    },

    #[error("{indicator} for {identifier} is not a number on {date}")]
    IndicatorUndefined {
        identifier: String,
        indicator: String,
        date: NaiveDate,
    },
}

/// Top-level error type for arbor.
#[derive(Debug, thiserror::Error)]
pub enum ArborError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("strategy parse error: {reason}")]
    StrategyParse { reason: String },

    #[error("invalid strategy: {reason}")]
    StrategyInvalid { reason: String },

    #[error("weight list has {weights} entries for {tasks} tasks")]
    StructuralMismatch { weights: usize, tasks: usize },

    #[error("data error for {identifier}: {reason}")]
    Data { identifier: String, reason: String },

    #[error("calendar error: {reason}")]
    Calendar { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ArborError> for std::process::ExitCode {
    fn from(err: &ArborError) -> Self {
        let code: u8 = match err {
            ArborError::Io(_) => 1,
            ArborError::ConfigParse { .. }
            | ArborError::ConfigMissing { .. }
            | ArborError::ConfigInvalid { .. } => 2,
            ArborError::StrategyParse { .. }
            | ArborError::StrategyInvalid { .. }
            | ArborError::StructuralMismatch { .. } => 3,
            ArborError::Data { .. } => 4,
            ArborError::Calendar { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
