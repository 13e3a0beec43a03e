use std::collections::HashMap;

use crate::config::constants::tools;
use crate::llm::ToolDefinition;
use crate::tools::traits::PlatformTool;
use serde_json::{Value, json};

fn declaration(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition::function(name.to_string(), description.to_string(), parameters)
}

fn memory_block_schema(verb: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": format!("Name of the core memory block to {verb}. Example: 'persona', 'human', 'identity'")},
            "content": {"type": "string", "description": "Full content of the block"}
        },
        "required": ["name", "content"]
    })
}

/// Schemas for every builtin tool, keyed by name. Includes tools that are
/// hidden from the model so a direct lookup never misses.
pub fn build_function_declarations() -> Vec<ToolDefinition> {
    vec![
        // Core memory
        declaration(
            tools::CORE_MEMORY_INSERT,
            "Saves a named block of core memory. Core memory is always visible in your context, so use it for durable facts about yourself and the people you talk to.",
            memory_block_schema("create or overwrite"),
        ),
        declaration(
            tools::CORE_MEMORY_REPLACE,
            "Replaces the content of a named core memory block. Use when something you already keep in core memory has changed.",
            memory_block_schema("replace"),
        ),
        declaration(
            tools::UPDATE_CORE_MEMORY,
            "Alias of core_memory_replace.",
            memory_block_schema("replace"),
        ),

        // Archival memory
        declaration(
            tools::ARCHIVAL_MEMORY_INSERT,
            "Archives information for later retrieval. Archived records are not shown in your context by default; search them with archival_memory_search.",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "Information to archive"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Optional tags"},
                    "summary": {"type": "string", "description": "Optional one-line summary"}
                },
                "required": ["content"]
            }),
        ),
        declaration(
            tools::ARCHIVAL_MEMORY_SEARCH,
            "Searches archived memories by text.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Text to look for"},
                    "limit": {"type": "integer", "description": "Max results. Default: 10", "default": 10}
                },
                "required": ["query"]
            }),
        ),
        declaration(
            tools::MEMORY_SEARCH,
            "Searches everything you remember: facts, core memory blocks and topics.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Text to look for"},
                    "limit": {"type": "integer", "description": "Max results. Default: 10", "default": 10}
                },
                "required": ["query"]
            }),
        ),

        // Knowledge graph
        declaration(
            tools::CREATE_FACT,
            "Stores a standalone fact, optionally attributed to the user who told it and linked to topics. Write the fact so it makes sense without the conversation around it.",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The fact. Example: 'Alice keeps bees'"},
                    "source": {"type": "string", "description": "Where the fact came from. Default: 'conversation'"},
                    "topics": {"type": "array", "items": {"type": "string"}, "description": "Topic names the fact is about"},
                    "user_id": {"type": "string", "description": "User who told you. Default: the current user"}
                },
                "required": ["content"]
            }),
        ),
        declaration(
            tools::SEARCH_FACTS,
            "Lists known facts about a topic.",
            json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string", "description": "Topic name (case-insensitive)"}
                },
                "required": ["topic"]
            }),
        ),
        declaration(
            tools::GET_USER_CONTEXT,
            "Returns everything known about a user: profile, facts they told you, interests and activity.",
            json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string", "description": "User to look up. Default: the current user"}
                }
            }),
        ),

        // Topics
        declaration(
            tools::CREATE_TOPIC,
            "Creates a topic, or updates its description if it already exists.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Topic name"},
                    "description": {"type": "string", "description": "Optional description"}
                },
                "required": ["name"]
            }),
        ),
        declaration(
            tools::LINK_TOPICS,
            "Links two topics. Topics are created if missing.",
            json!({
                "type": "object",
                "properties": {
                    "topic1": {"type": "string", "description": "Source topic"},
                    "topic2": {"type": "string", "description": "Target topic"},
                    "relationship": {"type": "string", "description": "'RELATED_TO' or 'SUBTOPIC_OF'", "default": "RELATED_TO"}
                },
                "required": ["topic1", "topic2"]
            }),
        ),
        declaration(
            tools::FIND_RELATED_TOPICS,
            "Finds topics connected to a topic, nearest first.",
            json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string", "description": "Starting topic"},
                    "depth": {"type": "integer", "description": "How many links to follow (1-5). Default: 2", "default": 2}
                },
                "required": ["topic"]
            }),
        ),
        declaration(
            tools::LINK_USER_TO_TOPIC,
            "Records that a user is interested in a topic.",
            json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string", "description": "User. Default: the current user"},
                    "topic": {"type": "string", "description": "Topic name"},
                    "strength": {"type": "number", "description": "Interest strength 0.0-1.0. Default: 1.0", "default": 1.0}
                },
                "required": ["topic"]
            }),
        ),

        // Conversation
        declaration(
            tools::GET_CONVERSATION_HISTORY,
            "Returns recent messages from a channel in chronological order.",
            json!({
                "type": "object",
                "properties": {
                    "channel_id": {"type": "string", "description": "Channel. Default: the current channel"},
                    "limit": {"type": "integer", "description": "Max messages. Default: 20", "default": 20}
                }
            }),
        ),
        declaration(
            tools::SEND_MESSAGE,
            "Sends a message to the user. Use for a reply you want delivered exactly as written.",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Message text"}
                },
                "required": ["message"]
            }),
        ),

        // Personality
        declaration(
            tools::MIMIC_PERSONALITY,
            "Starts writing in the style of another user, based on their message history. Only call when explicitly asked to mimic someone.",
            json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string", "description": "User to mimic"},
                    "username": {"type": "string", "description": "Display name of that user"},
                    "channel_id": {"type": "string", "description": "Optional channel hint"},
                    "message_count": {"type": "integer", "description": "Messages to analyze (minimum 300)", "default": 300},
                    "update": {"type": "boolean", "description": "Re-analyze even if a profile is cached", "default": false}
                },
                "required": ["user_id"]
            }),
        ),
        declaration(
            tools::REVERT_PERSONALITY,
            "Stops mimicking and returns to your own personality.",
            json!({"type": "object", "properties": {}}),
        ),
        declaration(
            tools::ANALYZE_USER_STYLE,
            "Analyzes how a user writes: capitalization, punctuation, tone, vocabulary and emoji.",
            json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string", "description": "User to analyze"},
                    "channel_id": {"type": "string", "description": "Optional channel hint"}
                },
                "required": ["user_id"]
            }),
        ),

        // Web
        declaration(
            tools::WEB_SEARCH,
            "Searches the web and returns up to 5 results with titles, URLs and snippets. To read a result, call fetch_webpage with its URL.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"},
                    "original_question": {"type": "string", "description": "The user's question, verbatim"}
                },
                "required": ["query"]
            }),
        ),
        declaration(
            tools::FETCH_WEBPAGE,
            "Fetches a web page and returns its readable text with headings. Never fetch the same URL twice in one reply.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Page URL. https:// is assumed when missing"}
                },
                "required": ["url"]
            }),
        ),
        declaration(
            tools::SUMMARIZE_WEBSITE,
            "Fetches a web page and returns a short extractive summary.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Page URL"}
                },
                "required": ["url"]
            }),
        ),

        // GitHub
        declaration(
            tools::GITHUB_REPO_INFO,
            "Returns information about a GitHub repository: description, stars, forks, language and last update.",
            json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string", "description": "Repository owner"},
                    "repo": {"type": "string", "description": "Repository name"}
                },
                "required": ["owner", "repo"]
            }),
        ),
        declaration(
            tools::GITHUB_SEARCH,
            "Searches GitHub.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"},
                    "type": {"type": "string", "description": "'repositories' | 'code' | 'issues' | 'users' | 'commits' | 'topics'", "default": "repositories"},
                    "limit": {"type": "integer", "description": "Max results. Default: 5", "default": 5}
                },
                "required": ["query"]
            }),
        ),
        declaration(
            tools::GITHUB_LIST_ORG_REPOS,
            "Lists an organization's repositories, most recently updated first.",
            json!({
                "type": "object",
                "properties": {
                    "org": {"type": "string", "description": "Organization login"},
                    "limit": {"type": "integer", "description": "Max repositories. Default: 5", "default": 5}
                },
                "required": ["org"]
            }),
        ),
        declaration(
            tools::GITHUB_READ_FILE,
            "Reads a file from a GitHub repository.",
            json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string", "description": "Repository owner"},
                    "repo": {"type": "string", "description": "Repository name"},
                    "path": {"type": "string", "description": "File path inside the repository"},
                    "branch": {"type": "string", "description": "Branch. Default: main, falling back to master"}
                },
                "required": ["owner", "repo", "path"]
            }),
        ),

        // Media
        declaration(
            tools::GENERATE_IMAGE,
            "Generates an image from a text prompt. The image is attached to your reply.",
            json!({
                "type": "object",
                "properties": {
                    "prompt": {"type": "string", "description": "What to draw"},
                    "negative_prompt": {"type": "string", "description": "What to avoid"},
                    "width": {"type": "integer", "description": "Width in pixels"},
                    "height": {"type": "integer", "description": "Height in pixels"},
                    "seed": {"type": "integer", "description": "Seed for reproducible output"},
                    "workflow": {"type": "string", "description": "Named generation workflow"}
                },
                "required": ["prompt"]
            }),
        ),

        // Sentinel
        declaration(
            tools::IGNORE,
            "Do not reply to this message. Use when the message is not meant for you or needs no answer.",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

pub(super) fn declaration_index() -> HashMap<String, ToolDefinition> {
    build_function_declarations()
        .into_iter()
        .map(|declaration| (declaration.function.name.clone(), declaration))
        .collect()
}

pub(super) fn platform_declaration(tool: &dyn PlatformTool) -> ToolDefinition {
    declaration(tool.name(), tool.description(), tool.parameters())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declaration_is_well_formed() {
        let declarations = build_function_declarations();
        for declaration in &declarations {
            assert_eq!(declaration.validate(), Ok(()), "{}", declaration.function.name);
        }
        assert_eq!(declaration_index().len(), declarations.len());
    }
}
