//! Core data types for the Engram actor runtime
//!
//! This module defines the fundamental data structures used throughout engram:
//! actor state, short- and long-term memory records, work inputs, and the
//! event payloads delivered to subscribers.

use crate::engine::EngineEventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an actor (an agent instance bound to a user/role)
pub type ActorId = i64;

/// Identifier of a role an actor is cloned from
pub type RoleId = i64;

/// Store-assigned identifier of a memory record
pub type MemoryId = i64;

/// Role id assigned to actors created implicitly on first state update
pub const DEFAULT_ROLE_ID: RoleId = 1;

/// Durable per-actor state persisted in the actor state store
///
/// Owned exclusively by the store; mutated only through the worker's
/// read-merge-write `update_state` path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorState {
    /// Actor id (also the document id in the store)
    pub id: ActorId,

    /// Role the actor is bound to
    pub role_id: RoleId,

    /// Ordered sequence of opaque memory-buffer entries
    #[serde(default)]
    pub memory_buffer: Vec<serde_json::Value>,
}

impl ActorState {
    /// State used when an unknown actor is first written to
    pub fn with_defaults(id: ActorId) -> Self {
        Self {
            id,
            role_id: DEFAULT_ROLE_ID,
            memory_buffer: Vec::new(),
        }
    }
}

/// Ephemeral, non-indexed memory record kept for recent context
///
/// Append-only; never mutated, deletable only via snapshot restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortTermMemory {
    /// Store-assigned id; absent until appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MemoryId>,

    /// Owning actor
    #[serde(default)]
    pub actor_id: ActorId,

    /// The os when the actor saw the messages
    pub os: String,

    /// The statement when the actor saw the messages
    pub statement: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Durable, searchable, categorized statement record
///
/// Append-only at the entity level; indexing into search backends happens
/// synchronously as part of the same logical append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTermMemory {
    /// Store-assigned id; must be unset on insert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MemoryId>,

    /// Owning actor
    #[serde(default)]
    pub actor_id: ActorId,

    /// Primary category
    pub index0: String,

    /// Secondary category
    pub index1: String,

    /// Key terms for search
    pub keywords: Vec<String>,

    /// The os when the actor saw the messages
    pub os: String,

    /// The statement when the actor saw the messages
    pub statement: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// One input submitted to a worker via `work`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WorkInput {
    /// Plain text input
    Text {
        /// The text forwarded to the reasoning engine's context
        content: String,
    },

    /// Reserved for future extension; `work` rejects it today
    Image {
        /// Location of the image
        url: String,
    },
}

/// A `work` call payload: caller metadata plus an ordered input sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkRequest {
    /// Opaque caller metadata forwarded to the reasoning engine
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Ordered inputs; currently exactly one text input is accepted
    pub inputs: Vec<WorkInput>,
}

impl WorkRequest {
    /// Convenience constructor for the single supported input shape
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            metadata: serde_json::Value::Null,
            inputs: vec![WorkInput::Text {
                content: content.into(),
            }],
        }
    }
}

/// Worker status visible to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorStatus {
    /// A run is in flight
    Running,
    /// The resting state between runs
    Idle,
}

/// A typed event appended to the worker's per-run event buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActorEvent {
    /// A message originated by the worker itself
    Message {
        /// Human-readable content
        content: String,
    },

    /// An event forwarded from the underlying reasoning engine
    AgentEvent {
        /// Engine event kind (e.g. run-finished, token-usage)
        name: EngineEventKind,
        /// Engine-defined payload
        content: serde_json::Value,
    },
}

/// Payload delivered to every subscriber on each broadcast
///
/// `events` is always the entire accumulated buffer for the current run,
/// not a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorResponse {
    /// Worker status at broadcast time
    pub status: ActorStatus,

    /// Full cumulative event buffer
    pub events: Vec<ActorEvent>,
}

/// Result of searching an actor's long-term memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchActorMemoryResult {
    /// The long-term memories found, in backend-defined order
    pub items: Vec<LongTermMemory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_event_wire_shape() {
        let event = ActorEvent::Message {
            content: "hello".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "message");
        assert_eq!(json["content"], "hello");

        let event = ActorEvent::AgentEvent {
            name: EngineEventKind::RunFinished,
            content: serde_json::json!({ "ok": true }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "agentEvent");
        assert_eq!(json["name"], "runFinished");
        assert_eq!(json["content"]["ok"], true);
    }

    #[test]
    fn test_actor_state_defaults() {
        let state = ActorState::with_defaults(42);
        assert_eq!(state.id, 42);
        assert_eq!(state.role_id, DEFAULT_ROLE_ID);
        assert!(state.memory_buffer.is_empty());
    }

    #[test]
    fn test_long_term_memory_document_shape() {
        let memory = LongTermMemory {
            id: None,
            actor_id: 3,
            index0: "food".to_string(),
            index1: "fruit".to_string(),
            keywords: vec!["apple".to_string()],
            os: "linux".to_string(),
            statement: "likes apples".to_string(),
            created_at: Utc::now(),
        };
        let doc = serde_json::to_value(&memory).unwrap();
        // ids are store-assigned; an unset id must not appear in the document
        assert!(doc.get("id").is_none());
        assert_eq!(doc["actorId"], 3);
        assert_eq!(doc["index0"], "food");
    }

    #[test]
    fn test_work_request_text() {
        let request = WorkRequest::text("hi");
        assert_eq!(request.inputs.len(), 1);
        assert!(matches!(request.inputs[0], WorkInput::Text { .. }));
    }
}
