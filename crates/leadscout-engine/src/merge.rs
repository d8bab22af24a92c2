use std::collections::HashSet;

use chrono::{DateTime, Utc};
use leadscout_schema::{Conversation, Intent, Message};

/// A batch of freshly extracted messages for one counterparty.
#[derive(Debug, Clone)]
pub struct IncomingBatch {
    pub counterparty_id: String,
    pub profile_ref: String,
    pub messages: Vec<Message>,
}

/// Reconcile an extraction batch against the stored conversation.
///
/// Produces a new record: existing messages are never dropped, incoming
/// duplicates (by the `(sender, text, timestamp)` identity) are never
/// appended twice, and `has_positive_intent` is recomputed from scratch.
/// Calling merge again with the same batch yields an equal value.
pub fn merge(
    existing: Option<&Conversation>,
    incoming: IncomingBatch,
    self_name: &str,
) -> Conversation {
    let mut messages: Vec<Message> = existing
        .map(|c| c.messages.clone())
        .unwrap_or_default();

    let mut seen: HashSet<(String, String, Option<String>)> = messages
        .iter()
        .map(|m| (m.sender.clone(), m.text.clone(), m.timestamp.clone()))
        .collect();

    for msg in incoming.messages {
        let key = (msg.sender.clone(), msg.text.clone(), msg.timestamp.clone());
        if seen.insert(key) {
            messages.push(msg);
        }
    }

    sort_by_observed_time(&mut messages);

    let has_positive_intent = messages
        .iter()
        .any(|m| m.sender != self_name && m.intent == Intent::Positive);

    let (counterparty_id, profile_ref) = match existing {
        // counterparty_id is stable for the lifetime of the record; the
        // profile ref may be refined by a later, non-empty observation.
        Some(c) => (
            c.counterparty_id.clone(),
            if incoming.profile_ref.is_empty() {
                c.profile_ref.clone()
            } else {
                incoming.profile_ref
            },
        ),
        None => (incoming.counterparty_id, incoming.profile_ref),
    };

    Conversation {
        counterparty_id,
        profile_ref,
        messages,
        has_positive_intent,
    }
}

/// Stable sort with carried timestamps. Each message's key is the most
/// recent parseable timestamp at or before it in the sequence, so
/// untimestamped entries keep their relative order and travel with the last
/// timestamped entry before them. A prefix with no timestamp sorts first.
///
/// The keys are invariant under the sort itself, which is what makes the
/// merge idempotent.
fn sort_by_observed_time(messages: &mut Vec<Message>) {
    let keys: Vec<Option<DateTime<Utc>>> = messages
        .iter()
        .scan(None, |carried, m| {
            if let Some(t) = m.parsed_timestamp() {
                *carried = Some(t);
            }
            Some(*carried)
        })
        .collect();

    let mut paired: Vec<(Option<DateTime<Utc>>, Message)> =
        keys.into_iter().zip(std::mem::take(messages)).collect();
    paired.sort_by_key(|(key, _)| *key);
    *messages = paired.into_iter().map(|(_, m)| m).collect();
}
