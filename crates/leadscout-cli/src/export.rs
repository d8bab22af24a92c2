//! CSV rendering of the harvested records. Fields are always quoted, with
//! embedded quotes doubled, so message text with commas and newlines stays
//! intact in spreadsheet imports.

use leadscout_schema::{Conversation, Intent, Lead};

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn leads_csv(leads: &[Lead]) -> String {
    let mut out = String::from(
        "counterparty_id,profile_ref,last_positive_message,last_positive_timestamp,positive_message_count\n",
    );
    for lead in leads {
        out.push_str(&csv_row(&[
            &lead.counterparty_id,
            &lead.profile_ref,
            &lead.last_positive_message,
            lead.last_positive_timestamp.as_deref().unwrap_or(""),
            &lead.positive_message_count.to_string(),
        ]));
        out.push('\n');
    }
    out
}

/// One row per message, flattened across all conversations.
pub fn conversations_csv(conversations: &[Conversation]) -> String {
    let mut out = String::from("counterparty_id,profile_ref,sender,text,timestamp,intent\n");
    for convo in conversations {
        for msg in &convo.messages {
            out.push_str(&csv_row(&[
                &convo.counterparty_id,
                &convo.profile_ref,
                &msg.sender,
                &msg.text,
                msg.timestamp.as_deref().unwrap_or(""),
                intent_label(msg.intent),
            ]));
            out.push('\n');
        }
    }
    out
}

fn intent_label(intent: Intent) -> &'static str {
    match intent {
        Intent::Positive => "positive",
        Intent::Negative => "negative",
        Intent::Neutral => "neutral",
        Intent::Unset => "",
    }
}
