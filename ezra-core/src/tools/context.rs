use crate::config::constants::platform;

/// Who is asking and where, for the duration of one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub agent_id: String,
    pub user_id: String,
    pub channel_id: String,
    /// "discord", "web", ...
    pub platform: String,
}

impl ToolContext {
    pub fn new(
        agent_id: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        let platform = platform.into();
        Self {
            agent_id: agent_id.into(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            platform: if platform.trim().is_empty() {
                platform::DEFAULT_PLATFORM.to_string()
            } else {
                platform
            },
        }
    }

    pub fn has_channel(&self) -> bool {
        !self.channel_id.trim().is_empty()
    }

    /// `requested` when non-blank, otherwise the caller
    pub fn user_or_self<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.user_id.as_str())
    }

    /// `requested` when non-blank, otherwise the current channel
    pub fn channel_or_current<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.channel_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_platform_defaults_to_web() {
        let ctx = ToolContext::new("Ezra", "alice", "", " ");
        assert_eq!(ctx.platform, "web");
        assert!(!ctx.has_channel());
    }

    #[test]
    fn overrides_fall_back_to_turn_values() {
        let ctx = ToolContext::new("Ezra", "alice", "general", "discord");
        assert_eq!(ctx.user_or_self(Some("bob")), "bob");
        assert_eq!(ctx.user_or_self(Some("  ")), "alice");
        assert_eq!(ctx.channel_or_current(None), "general");
    }
}
