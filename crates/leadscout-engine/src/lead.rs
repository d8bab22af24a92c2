use leadscout_schema::{Conversation, Intent, Lead};

/// Derive the lead summary for a conversation: the last counterparty
/// message with positive intent, by the conversation's final sort order.
///
/// Returns None when no such message exists. Leads are additive summaries:
/// the caller upserts on Some and leaves any previously stored lead alone on
/// None, so history is never subtracted.
pub fn project_lead(convo: &Conversation, self_name: &str) -> Option<Lead> {
    let positives: Vec<&leadscout_schema::Message> = convo
        .messages
        .iter()
        .filter(|m| m.sender != self_name && m.intent == Intent::Positive)
        .collect();

    let last = positives.last()?;
    Some(Lead {
        counterparty_id: convo.counterparty_id.clone(),
        profile_ref: convo.profile_ref.clone(),
        last_positive_message: last.text.clone(),
        last_positive_timestamp: last.timestamp.clone(),
        positive_message_count: positives.len() as u32,
    })
}
