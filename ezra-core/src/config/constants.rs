/// Agent identity and turn limits
pub mod agent {
    pub const DEFAULT_AGENT_ID: &str = "Ezra";
    pub const DEFAULT_PERSONALITY: &str =
        "Curious, warm and direct. Remembers people and follows up on what they care about.";
    /// Hard cap on think-act recursion within one turn
    pub const MAX_RECURSION_DEPTH: usize = 5;
    /// Number of recent channel messages placed in the context window
    pub const HISTORY_WINDOW: usize = 15;
}

/// Model endpoint defaults
pub mod model {
    pub const DEFAULT_ENDPOINT: &str = "http://localhost:4000";
    pub const DEFAULT_MODEL_ID: &str = "openrouter/anthropic/claude-3.5-sonnet";
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY_SECS: u64 = 1;
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
    /// Sent when no API key is configured; local proxies accept any value
    pub const DUMMY_API_KEY: &str = "dummy-key";
}

/// Knowledge store defaults
pub mod store {
    pub const DEFAULT_DB_FILE: &str = "ezra.db";
    pub const DEFAULT_MESSAGE_LIST_LIMIT: usize = 100;
    pub const DEFAULT_CONVERSATION_LIST_LIMIT: usize = 50;
    pub const DEFAULT_SEARCH_LIMIT: usize = 10;
    pub const TOPIC_FACT_LIMIT: usize = 20;
    pub const RELATED_TOPIC_LIMIT: usize = 20;
    pub const MIN_TOPIC_DEPTH: usize = 1;
    pub const MAX_TOPIC_DEPTH: usize = 5;
    /// Static relevance per search hit type
    pub const FACT_SCORE: f64 = 1.0;
    pub const MEMORY_SCORE: f64 = 1.0;
    pub const TOPIC_SCORE: f64 = 0.8;
    pub const ARCHIVAL_SCORE: f64 = 1.0;
    pub const CONTEXT_WINDOW_SMALL: usize = 16_384;
    pub const CONTEXT_WINDOW_LARGE: usize = 32_768;
    pub const CONTEXT_WINDOW_THRESHOLD: usize = 8_192;
}

/// Memory evaluator tuning
pub mod memory {
    pub const EVALUATION_TIMEOUT_SECS: u64 = 30;
    pub const MIN_IMPORTANCE: u8 = 3;
    pub const MIN_MESSAGE_CHARS: usize = 10;
    pub const DEFAULT_WORKERS: usize = 4;
    pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
    /// Minimum judge confidence for duplicate/conflict/update matches
    pub const MATCH_CONFIDENCE: f64 = 0.7;
    /// Minimum judge confidence for plain "similar" matches
    pub const SIMILAR_CONFIDENCE: f64 = 0.85;
}

/// Platform adapter limits
pub mod platform {
    pub const DEFAULT_PLATFORM: &str = "web";
    pub const DISCORD: &str = "discord";
    pub const MAX_MESSAGE_LENGTH: usize = 2000;
    pub const EMBED_COLOR: u32 = 0x5865F2;
}

/// HTTP tool limits
pub mod web {
    pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    pub const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
    pub const MAX_SEARCH_RESULTS: usize = 5;
    pub const SNIPPET_LIMIT: usize = 200;
    pub const MAX_REDIRECTS: usize = 5;
    pub const MAX_BODY_BYTES: usize = 500 * 1024;
    pub const MAX_PAGE_CHARS: usize = 50_000;
    pub const PAGE_SENTENCE_FLOOR: usize = 45_000;
    pub const LONG_ARTICLE_CHARS: usize = 8_000;
    pub const FETCH_TIMEOUT_SECS: u64 = 20;
    pub const SEARCH_TIMEOUT_SECS: u64 = 10;
}

/// GitHub API access
pub mod github {
    pub const API_BASE: &str = "https://api.github.com";
    pub const USER_AGENT: &str = "EzraBot/1.0";
    pub const ACCEPT: &str = "application/vnd.github.v3+json";
    pub const DEFAULT_LIMIT: usize = 5;
    pub const MAX_FILE_BYTES: usize = 100 * 1024;
    pub const MAX_FILE_CHARS: usize = 10_000;
    pub const TIMEOUT_SECS: u64 = 15;
}

/// Tool names exposed to the model
pub mod tools {
    pub const CORE_MEMORY_INSERT: &str = "core_memory_insert";
    pub const CORE_MEMORY_REPLACE: &str = "core_memory_replace";
    pub const UPDATE_CORE_MEMORY: &str = "update_core_memory";
    pub const ARCHIVAL_MEMORY_INSERT: &str = "archival_memory_insert";
    pub const ARCHIVAL_MEMORY_SEARCH: &str = "archival_memory_search";
    pub const MEMORY_SEARCH: &str = "memory_search";

    pub const CREATE_FACT: &str = "create_fact";
    pub const SEARCH_FACTS: &str = "search_facts";
    pub const GET_USER_CONTEXT: &str = "get_user_context";

    pub const CREATE_TOPIC: &str = "create_topic";
    pub const LINK_TOPICS: &str = "link_topics";
    pub const FIND_RELATED_TOPICS: &str = "find_related_topics";
    pub const LINK_USER_TO_TOPIC: &str = "link_user_to_topic";

    pub const GET_CONVERSATION_HISTORY: &str = "get_conversation_history";
    pub const SEND_MESSAGE: &str = "send_message";

    pub const DISCORD_READ_HISTORY: &str = "discord_read_history";
    pub const DISCORD_GET_USER_INFO: &str = "discord_get_user_info";
    pub const DISCORD_GET_CHANNEL_INFO: &str = "discord_get_channel_info";

    pub const MIMIC_PERSONALITY: &str = "mimic_personality";
    pub const REVERT_PERSONALITY: &str = "revert_personality";
    pub const ANALYZE_USER_STYLE: &str = "analyze_user_style";

    pub const WEB_SEARCH: &str = "web_search";
    pub const FETCH_WEBPAGE: &str = "fetch_webpage";
    pub const SUMMARIZE_WEBSITE: &str = "summarize_website";
    pub const GITHUB_REPO_INFO: &str = "github_repo_info";
    pub const GITHUB_SEARCH: &str = "github_search";
    pub const GITHUB_LIST_ORG_REPOS: &str = "github_list_org_repos";
    pub const GITHUB_READ_FILE: &str = "github_read_file";
    pub const GENERATE_IMAGE: &str = "generate_image";

    pub const IGNORE: &str = "ignore";

    /// Tools whose structured data is rendered for the user when the model
    /// gives no text of its own
    pub const INFORMATIONAL: &[&str] = &[
        GITHUB_REPO_INFO,
        GITHUB_SEARCH,
        GITHUB_LIST_ORG_REPOS,
        GITHUB_READ_FILE,
        WEB_SEARCH,
        FETCH_WEBPAGE,
        SEARCH_FACTS,
        GET_USER_CONTEXT,
        FIND_RELATED_TOPICS,
        ARCHIVAL_MEMORY_SEARCH,
        MEMORY_SEARCH,
        GET_CONVERSATION_HISTORY,
        DISCORD_READ_HISTORY,
        ANALYZE_USER_STYLE,
    ];
}

/// Environment variable names
pub mod env {
    pub const PORT: &str = "PORT";
    pub const ENVIRONMENT: &str = "ENV";
    pub const STORE_URI: &str = "NEO4J_URI";
    pub const DB_PATH: &str = "EZRA_DB_PATH";
    pub const STORE_USER: &str = "NEO4J_USER";
    pub const STORE_PASSWORD: &str = "NEO4J_PASSWORD";
    pub const MODEL_ENDPOINT: &str = "LITELLM_URL";
    pub const MODEL_ID: &str = "MODEL_ID";
    pub const MODEL_API_KEY: &str = "OPENROUTER_API_KEY";
    pub const BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
    pub const LOG_LEVEL: &str = "EZRA_LOG";
}

/// Server defaults for the administration surface
pub mod server {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_ENVIRONMENT: &str = "development";
}

/// Configuration file discovery
pub mod paths {
    pub const CONFIG_FILE_NAME: &str = "ezra.toml";
    pub const HOME_CONFIG_DIR: &str = ".ezra";
}
