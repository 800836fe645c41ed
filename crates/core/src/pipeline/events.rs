//! # Progress Events
//!
//! Emitted by the orchestrator after each phase transition. Delivery to a
//! UI (socket, SSE, terminal) is the caller's business.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::AgentRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Working,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Role id of the agent the event is about
    pub agent: AgentRole,
    pub status: AgentStatus,
    pub message: String,
    /// Overall run progress, 0 to 100
    pub progress: u8,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(agent: AgentRole, status: AgentStatus, message: impl Into<String>, progress: u8) -> Self {
        Self {
            agent,
            status,
            message: message.into(),
            progress: progress.min(100),
            timestamp: Utc::now(),
        }
    }

    pub fn working(agent: AgentRole, message: impl Into<String>, progress: u8) -> Self {
        Self::new(agent, AgentStatus::Working, message, progress)
    }

    pub fn completed(agent: AgentRole, message: impl Into<String>, progress: u8) -> Self {
        Self::new(agent, AgentStatus::Completed, message, progress)
    }

    pub fn error(agent: AgentRole, message: impl Into<String>, progress: u8) -> Self {
        Self::new(agent, AgentStatus::Error, message, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ProgressEvent::working(AgentRole::Designer, "Designing", 140);
        assert_eq!(event.progress, 100);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["agent"], "ui");
        assert_eq!(json["status"], "working");
        assert!(json["timestamp"].is_string());
    }
}
