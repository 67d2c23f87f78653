use csv::WriterBuilder;
use tracing::{debug, info, error};
use crate::domain::{error::PipelineError, models::StagedRow};

/// Renders `rows` as headerless CSV. The writer is flushed and unwrapped
/// before the bytes are handed back, so a short write surfaces here.
pub fn encode_csv<R: StagedRow>(rows: &[R]) -> Result<Vec<u8>, PipelineError> {
    debug!("Creating CSV writer for {} rows", rows.len());
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    for (row_count, row) in rows.iter().enumerate() {
        writer.write_record(row.fields()).map_err(|e| {
            error!("Failed to write CSV record at row {}: {}", row_count + 1, e);
            PipelineError::Storage(e.to_string())
        })?;

        if (row_count + 1) % 10000 == 0 {
            debug!("Encoded {} CSV rows", row_count + 1);
        }
    }

    writer.flush().map_err(|e| {
        error!("Failed to flush CSV writer: {}", e);
        PipelineError::Storage(e.to_string())
    })?;
    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::Storage(e.to_string()))?;

    info!("Encoded {} rows into {} bytes of CSV", rows.len(), bytes.len());
    Ok(bytes)
}
