use crate::config::constants::tools;

use super::ToolRegistry;
use super::registration::ToolRegistration;

pub(super) fn register_builtin_tools(registry: &mut ToolRegistry) {
    for registration in builtin_tool_registrations() {
        if registration.name() == tools::GENERATE_IMAGE && registry.image_generator.is_none() {
            continue;
        }

        let tool_name = registration.name();
        if let Err(err) = registry.register_tool(registration) {
            tracing::warn!(tool = tool_name, error = %err, "failed to register tool");
        }
    }
}

pub(super) fn builtin_tool_registrations() -> Vec<ToolRegistration> {
    vec![
        ToolRegistration::new(tools::CORE_MEMORY_INSERT, ToolRegistry::memory_executor),
        ToolRegistration::new(tools::CORE_MEMORY_REPLACE, ToolRegistry::memory_executor),
        ToolRegistration::new(tools::UPDATE_CORE_MEMORY, ToolRegistry::memory_executor)
            .with_llm_visibility(false),
        ToolRegistration::new(tools::ARCHIVAL_MEMORY_INSERT, ToolRegistry::memory_executor),
        ToolRegistration::new(tools::ARCHIVAL_MEMORY_SEARCH, ToolRegistry::memory_executor),
        ToolRegistration::new(tools::MEMORY_SEARCH, ToolRegistry::memory_executor),
        ToolRegistration::new(tools::CREATE_FACT, ToolRegistry::knowledge_executor),
        ToolRegistration::new(tools::SEARCH_FACTS, ToolRegistry::knowledge_executor),
        ToolRegistration::new(tools::GET_USER_CONTEXT, ToolRegistry::knowledge_executor),
        ToolRegistration::new(tools::CREATE_TOPIC, ToolRegistry::topic_executor),
        ToolRegistration::new(tools::LINK_TOPICS, ToolRegistry::topic_executor),
        ToolRegistration::new(tools::FIND_RELATED_TOPICS, ToolRegistry::topic_executor),
        ToolRegistration::new(tools::LINK_USER_TO_TOPIC, ToolRegistry::topic_executor),
        ToolRegistration::new(tools::GET_CONVERSATION_HISTORY, ToolRegistry::conversation_executor),
        ToolRegistration::new(tools::SEND_MESSAGE, ToolRegistry::conversation_executor),
        ToolRegistration::new(tools::MIMIC_PERSONALITY, ToolRegistry::personality_executor),
        ToolRegistration::new(tools::REVERT_PERSONALITY, ToolRegistry::personality_executor),
        ToolRegistration::new(tools::ANALYZE_USER_STYLE, ToolRegistry::personality_executor),
        ToolRegistration::new(tools::WEB_SEARCH, ToolRegistry::web_executor),
        ToolRegistration::new(tools::FETCH_WEBPAGE, ToolRegistry::web_executor),
        ToolRegistration::new(tools::SUMMARIZE_WEBSITE, ToolRegistry::web_executor),
        ToolRegistration::new(tools::GITHUB_REPO_INFO, ToolRegistry::github_executor),
        ToolRegistration::new(tools::GITHUB_SEARCH, ToolRegistry::github_executor),
        ToolRegistration::new(tools::GITHUB_LIST_ORG_REPOS, ToolRegistry::github_executor),
        ToolRegistration::new(tools::GITHUB_READ_FILE, ToolRegistry::github_executor),
        ToolRegistration::new(tools::GENERATE_IMAGE, ToolRegistry::image_executor),
        ToolRegistration::new(tools::IGNORE, ToolRegistry::ignore_executor),
    ]
}
