use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::transformation::TransformationSpec;

/// Message sent from the API to the worker. It deliberately carries no image
/// id: the worker only knows where to read and where to write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformJob {
    pub job_id: Uuid,
    pub source_path: String,
    pub destination_path: String,
    pub spec: TransformationSpec,
    pub enqueued_at: DateTime<Utc>,
}

impl TransformJob {
    pub fn new(source_path: String, destination_path: String, spec: TransformationSpec) -> Self {
        TransformJob {
            job_id: Uuid::new_v4(),
            source_path,
            destination_path,
            spec,
            enqueued_at: Utc::now(),
        }
    }
}

/// Report published by the worker once a job has finished, keyed by the
/// destination path the API allocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        job_id: Uuid,
        destination_path: String,
    },
    Failed {
        job_id: Uuid,
        destination_path: String,
        reason: String,
    },
}

impl JobOutcome {
    pub fn destination_path(&self) -> &str {
        match self {
            JobOutcome::Completed { destination_path, .. } => destination_path,
            JobOutcome::Failed { destination_path, .. } => destination_path,
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            JobOutcome::Completed { job_id, .. } | JobOutcome::Failed { job_id, .. } => *job_id,
        }
    }
}
