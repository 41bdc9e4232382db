use serde::Serialize;

use crate::ast::{FilterNode, PipeStage};

/// Complete compiled query.
///
/// Represents a full pipeline from the leading search to the last command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    /// Pre-filter for the scan; `None` matches everything
    pub filter: Option<FilterNode>,

    /// Pipe stages in execution order
    pub pipeline: Vec<PipeStage>,

    /// Resolved `earliest=`/`latest=` window
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
}
