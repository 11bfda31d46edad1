use thiserror::Error;
use uuid::Uuid;

use crate::source::Dependency;

/// Reasons a team report cannot be produced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("team {0} not found")]
    TeamNotFound(Uuid),

    #[error("You do not have permission to view this team's progress.")]
    PermissionDenied { viewer: String, team: Uuid },

    /// A collaborator call failed mid-aggregation. No partial report is produced.
    #[error("aggregation failed: upstream data unavailable ({dependency})")]
    Upstream {
        dependency: Dependency,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl ReportError {
    pub fn upstream(dependency: Dependency, source: anyhow::Error) -> Self {
        ReportError::Upstream {
            dependency,
            source: source.into(),
        }
    }
}
