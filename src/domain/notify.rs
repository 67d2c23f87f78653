//! Message contract between the fetch jobs and the warehouse loader.
//!
//! The field names on the wire are fixed by the loader, which predates the
//! S3 staging bucket and still calls the reference `gcsReference`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// How a load affects the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteDisposition {
    /// Fail the load if the table already holds rows.
    IfEmpty,
    /// Replace the table contents.
    Truncate,
    /// Append to the existing rows.
    Append,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::IfEmpty => "ifempty",
            WriteDisposition::Truncate => "truncate",
            WriteDisposition::Append => "append",
        }
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteDisposition {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ifempty" => Ok(WriteDisposition::IfEmpty),
            "truncate" => Ok(WriteDisposition::Truncate),
            "append" => Ok(WriteDisposition::Append),
            other => Err(PipelineError::Decode {
                context: "writeMode".to_string(),
                message: format!("cannot decode {:?} as a write disposition", other),
            }),
        }
    }
}

/// Load-job description published once a CSV has been staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyMessage {
    /// URI of the staged object, e.g. `s3://bucket/key`.
    #[serde(rename = "gcsReference")]
    pub object_reference: String,
    #[serde(rename = "datasetID")]
    pub dataset_id: String,
    #[serde(rename = "tableID")]
    pub table_id: String,
    #[serde(rename = "writeMode")]
    pub write_mode: WriteDisposition,
}

impl NotifyMessage {
    pub fn to_vec(&self) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec(self).map_err(|e| PipelineError::Notification(e.to_string()))
    }

    /// Decodes a message as the loader receives it.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PipelineError> {
        serde_json::from_slice(bytes).map_err(|e| PipelineError::Decode {
            context: "notify message".to_string(),
            message: e.to_string(),
        })
    }
}
