//! Prompt construction for the generative stages

use chorus_core::{Cluster, Conversation, ConversationSummary};
use std::fmt::Write;

const MAX_TRANSCRIPT_CHARS: usize = 10_000;

pub const SUMMARY_SYSTEM: &str = "You summarise user conversations for later thematic clustering. \
     Reply with JSON: {\"summary\": \"<one or two sentences describing the user's request>\"}. \
     Never include names or other personally identifying details.";

pub const CLUSTER_SYSTEM: &str = "You name groups of related conversation summaries. \
     Reply with JSON: {\"name\": \"<short imperative name>\", \
     \"summary\": \"<two sentence description of the group>\"}.";

pub const META_CLUSTER_SYSTEM: &str = "You name a higher-level category covering several \
     conversation clusters. Reply with JSON: {\"name\": \"<short category name>\", \
     \"summary\": \"<two sentence description of the category>\"}.";

pub fn summary_prompt(conversation: &Conversation) -> String {
    let mut transcript = String::new();
    for message in &conversation.messages {
        let _ = writeln!(transcript, "{}: {}", message.role, message.content);
    }
    format!(
        "Summarise the following conversation:\n\n{}",
        truncate_chars(&transcript, MAX_TRANSCRIPT_CHARS)
    )
}

pub fn cluster_naming_prompt(summaries: &[&ConversationSummary]) -> String {
    let mut prompt = String::from("Name the common theme of these conversation summaries:\n\n");
    for summary in summaries {
        let _ = writeln!(prompt, "- {}", summary.summary);
    }
    prompt
}

pub fn meta_cluster_prompt(clusters: &[&Cluster]) -> String {
    let mut prompt = String::from("Name a category that covers these clusters:\n\n");
    for cluster in clusters {
        let _ = writeln!(prompt, "- {}: {}", cluster.name, cluster.description);
    }
    prompt
}

/// Truncate on a character boundary
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
