//! Execution records written as JSON lines.

use async_trait::async_trait;
use nodeflow_trigger::{ExecutionSink, TriggerError};
use nodeflow_workflow::ExecutionRecord;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Writes each finished record as one JSON line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> ExecutionSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn record(&self, record: &ExecutionRecord) -> Result<(), TriggerError> {
        let mut line = serde_json::to_vec(record).map_err(|e| TriggerError::StorageFailed {
            reason: e.to_string(),
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| TriggerError::StorageFailed { reason: e.to_string() })?;
        writer
            .flush()
            .await
            .map_err(|e| TriggerError::StorageFailed { reason: e.to_string() })
    }
}
