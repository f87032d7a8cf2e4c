use serde::{Deserialize, Serialize};
use std::fmt;

/// Application errors of the calculator handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalcError {
    /// An aggregate was requested over zero values.
    EmptyInput,
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty input"),
        }
    }
}

impl std::error::Error for CalcError {}

pub type CalcResult<T> = Result<T, calc_rpc_stream::error::RpcError<CalcError>>;
