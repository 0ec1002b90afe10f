//! Conditional Reference Counter
//!
//! At-most-once handling of replies. Each (message, reply) pair has a
//! reference record holding the embedded message, a processing count and the
//! timestamp of the last accepted reply. Registering a reply is one
//! conditional update:
//!
//! ```text
//! SET processed_count = processed_count + 1, ts = :incoming
//! IF attribute_exists(pk) AND ts < :incoming
//! ```
//!
//! Only the caller whose update produces `processed_count == 1` receives the
//! message. Stale, duplicate and unknown replies get `None`. The store's
//! conditional write is the only point of serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tideline_core::{
    require_non_empty, Condition, Key, ReturnValues, Store, TidelineConfig, TidelineError,
    TidelineResult, UpdateExpr, UpdateOutcome, UpdateRequest,
};

/// Attribute holding the embedded message
pub const MESSAGE_ATTRIBUTE: &str = "message";
/// Attribute holding the processing count
pub const COUNT_ATTRIBUTE: &str = "processed_count";
/// Attribute holding the last accepted reply timestamp
pub const TIMESTAMP_ATTRIBUTE: &str = "ts";

/// A message awaiting replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier
    pub id: String,
    /// Message content forwarded to whoever claims the reply
    #[serde(default)]
    pub body: Value,
}

/// A reply correlated with a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Reply identifier
    pub id: String,
    /// Event time of the reply; must be newer than the stored timestamp
    pub timestamp: i64,
}

/// Conditional reference counter over one table
#[derive(Clone)]
pub struct ReferenceCounter {
    store: Arc<dyn Store>,
    table: String,
    key_attribute: String,
    delimiter: String,
}

impl ReferenceCounter {
    /// Create a reference counter
    pub fn new(
        store: Arc<dyn Store>,
        table: impl Into<String>,
        key_attribute: impl Into<String>,
        delimiter: impl Into<String>,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            key_attribute: key_attribute.into(),
            delimiter: delimiter.into(),
        }
    }

    /// Reference counter over the configured references table
    pub fn from_config(store: Arc<dyn Store>, config: &TidelineConfig) -> Self {
        Self::new(
            store,
            config.tables.references.clone(),
            config.tables.references_key.clone(),
            config.tables.references_delimiter.clone(),
        )
    }

    /// Composite reference id: `<message id><delimiter><reply id>`
    pub fn reference_id(&self, message_id: &str, reply_id: &str) -> String {
        format!("{}{}{}", message_id, self.delimiter, reply_id)
    }

    fn key(&self, message_id: &str, reply_id: &str) -> TidelineResult<Key> {
        require_non_empty("message id", message_id)?;
        require_non_empty("reply id", reply_id)?;
        let mut key = Key::new();
        key.insert(
            self.key_attribute.clone(),
            Value::String(self.reference_id(message_id, reply_id)),
        );
        Ok(key)
    }

    /// Claim a reply
    ///
    /// Returns the embedded message when this call is the first accepted
    /// claim, `None` otherwise. Only store faults are errors.
    pub async fn register_reply(
        &self,
        message: &Message,
        reply: &Reply,
    ) -> TidelineResult<Option<Value>> {
        let key = self.key(&message.id, &reply.id)?;

        let outcome = self
            .store
            .conditional_update(UpdateRequest {
                table: self.table.clone(),
                key,
                update: UpdateExpr::new()
                    .increment(COUNT_ATTRIBUTE, 1)
                    .set(TIMESTAMP_ATTRIBUTE, reply.timestamp),
                condition: Some(
                    Condition::exists(self.key_attribute.as_str())
                        .and(Condition::lt(TIMESTAMP_ATTRIBUTE, reply.timestamp)),
                ),
                return_values: ReturnValues::AllNew,
            })
            .await?;

        let attributes = match outcome {
            UpdateOutcome::Applied { attributes } => attributes.unwrap_or_default(),
            UpdateOutcome::ConditionFailed => {
                tracing::debug!(
                    target: "tideline::reference",
                    message_id = %message.id,
                    reply_id = %reply.id,
                    timestamp = reply.timestamp,
                    "reply rejected: stale, duplicate or unknown"
                );
                return Ok(None);
            }
        };

        if attributes.get(COUNT_ATTRIBUTE).and_then(Value::as_i64) == Some(1) {
            Ok(attributes.get(MESSAGE_ATTRIBUTE).cloned())
        } else {
            tracing::debug!(
                target: "tideline::reference",
                message_id = %message.id,
                reply_id = %reply.id,
                "reply already claimed"
            );
            Ok(None)
        }
    }

    /// Create the reference record for an expected reply
    ///
    /// Returns false if the record already exists; nothing is overwritten.
    pub async fn arm(
        &self,
        message: &Message,
        reply_id: &str,
        initial_ts: i64,
    ) -> TidelineResult<bool> {
        let key = self.key(&message.id, reply_id)?;
        let embedded = serde_json::to_value(message)
            .map_err(|e| TidelineError::invalid_input(format!("message is not encodable: {}", e)))?;

        let outcome = self
            .store
            .conditional_update(UpdateRequest {
                table: self.table.clone(),
                key,
                update: UpdateExpr::new()
                    .set(MESSAGE_ATTRIBUTE, embedded)
                    .set(COUNT_ATTRIBUTE, 0)
                    .set(TIMESTAMP_ATTRIBUTE, initial_ts),
                condition: Some(Condition::not_exists(self.key_attribute.as_str())),
                return_values: ReturnValues::None,
            })
            .await?;
        Ok(outcome.is_applied())
    }
}

impl std::fmt::Debug for ReferenceCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCounter")
            .field("table", &self.table)
            .field("key_attribute", &self.key_attribute)
            .finish()
    }
}
