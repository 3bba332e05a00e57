//! Outbound event delivery

use crate::error::SinkError;
use dockwright_core::PipelineEvent;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Destination of progress, failure and completion events
#[allow(async_fn_in_trait)]
pub trait EventSink {
    async fn emit(&self, event: PipelineEvent) -> Result<(), SinkError>;
}

impl EventSink for mpsc::Sender<PipelineEvent> {
    async fn emit(&self, event: PipelineEvent) -> Result<(), SinkError> {
        self.send(event).await.map_err(|_| SinkError::Closed)
    }
}

impl EventSink for mpsc::UnboundedSender<PipelineEvent> {
    async fn emit(&self, event: PipelineEvent) -> Result<(), SinkError> {
        self.send(event).map_err(|_| SinkError::Closed)
    }
}

/// Collects events in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EventSink for MemorySink {
    async fn emit(&self, event: PipelineEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockwright_core::{EventKind, PipelineState};

    #[tokio::test]
    async fn test_channel_sink_reports_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let event = PipelineEvent::new("rel-1", EventKind::Release, PipelineState::Fetching);
        assert!(matches!(tx.emit(event).await, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        for state in [PipelineState::Fetching, PipelineState::Building] {
            sink.emit(PipelineEvent::new("rel-1", EventKind::Release, state))
                .await
                .unwrap();
        }
        let states: Vec<_> = sink.events().iter().map(|e| e.state).collect();
        assert_eq!(states, vec![PipelineState::Fetching, PipelineState::Building]);
    }
}
