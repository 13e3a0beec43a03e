use anyhow::{Result, anyhow};
use futures::future::BoxFuture;

use crate::tools::args::ToolInvocation;
use crate::tools::context::ToolContext;
use crate::tools::result::ToolResult;
use crate::tools::{conversation, image, knowledge, memory, topics, web};

use super::ToolRegistry;

/// A registration routed a call to the wrong executor
fn misrouted(invocation: &ToolInvocation) -> anyhow::Error {
    anyhow!("{} is not handled by this executor", invocation.name())
}

impl ToolRegistry {
    pub(super) fn memory_executor<'a>(
        &'a self,
        ctx: &'a ToolContext,
        invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        let store = self.store.as_ref();
        Box::pin(async move {
            match invocation {
                ToolInvocation::CoreMemoryInsert(args)
                | ToolInvocation::CoreMemoryReplace(args) => {
                    memory::save_memory_block(store, ctx, args).await
                }
                ToolInvocation::ArchivalMemoryInsert(args) => {
                    memory::archival_insert(store, ctx, args).await
                }
                ToolInvocation::ArchivalMemorySearch(args) => {
                    memory::archival_search(store, ctx, args).await
                }
                ToolInvocation::MemorySearch(args) => memory::memory_search(store, ctx, args).await,
                other => Err(misrouted(&other)),
            }
        })
    }

    pub(super) fn knowledge_executor<'a>(
        &'a self,
        ctx: &'a ToolContext,
        invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        let store = self.store.as_ref();
        Box::pin(async move {
            match invocation {
                ToolInvocation::CreateFact(args) => knowledge::create_fact(store, ctx, args).await,
                ToolInvocation::SearchFacts(args) => knowledge::search_facts(store, args).await,
                ToolInvocation::GetUserContext(args) => {
                    knowledge::get_user_context(store, ctx, args).await
                }
                other => Err(misrouted(&other)),
            }
        })
    }

    pub(super) fn topic_executor<'a>(
        &'a self,
        ctx: &'a ToolContext,
        invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        let store = self.store.as_ref();
        Box::pin(async move {
            match invocation {
                ToolInvocation::CreateTopic(args) => topics::create_topic(store, args).await,
                ToolInvocation::LinkTopics(args) => topics::link_topics(store, args).await,
                ToolInvocation::FindRelatedTopics(args) => {
                    topics::find_related_topics(store, args).await
                }
                ToolInvocation::LinkUserToTopic(args) => {
                    topics::link_user_to_topic(store, ctx, args).await
                }
                other => Err(misrouted(&other)),
            }
        })
    }

    pub(super) fn conversation_executor<'a>(
        &'a self,
        ctx: &'a ToolContext,
        invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        let store = self.store.as_ref();
        Box::pin(async move {
            match invocation {
                ToolInvocation::GetConversationHistory(args) => {
                    conversation::get_conversation_history(store, ctx, args).await
                }
                ToolInvocation::SendMessage(args) => Ok(conversation::send_message(args)),
                other => Err(misrouted(&other)),
            }
        })
    }

    pub(super) fn personality_executor<'a>(
        &'a self,
        ctx: &'a ToolContext,
        invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        let personality = self.personality.as_ref();
        Box::pin(async move {
            match invocation {
                ToolInvocation::MimicPersonality(args) => personality.mimic(ctx, args).await,
                ToolInvocation::RevertPersonality => Ok(personality.revert(ctx)),
                ToolInvocation::AnalyzeUserStyle(args) => personality.analyze(ctx, args).await,
                other => Err(misrouted(&other)),
            }
        })
    }

    pub(super) fn web_executor<'a>(
        &'a self,
        _ctx: &'a ToolContext,
        invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        let client = self.web.as_ref();
        Box::pin(async move {
            match invocation {
                ToolInvocation::WebSearch(args) => web::web_search(client, args).await,
                ToolInvocation::FetchWebpage(args) => web::fetch_webpage(client, args).await,
                ToolInvocation::SummarizeWebsite(args) => {
                    web::summarize_website(client, args).await
                }
                other => Err(misrouted(&other)),
            }
        })
    }

    pub(super) fn github_executor<'a>(
        &'a self,
        _ctx: &'a ToolContext,
        invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        let github = &self.github;
        Box::pin(async move {
            match invocation {
                ToolInvocation::GitHubRepoInfo(args) => github.repo_info(args).await,
                ToolInvocation::GitHubSearch(args) => github.search(args).await,
                ToolInvocation::GitHubListOrgRepos(args) => github.list_org_repos(args).await,
                ToolInvocation::GitHubReadFile(args) => github.read_file(args).await,
                other => Err(misrouted(&other)),
            }
        })
    }

    pub(super) fn image_executor<'a>(
        &'a self,
        _ctx: &'a ToolContext,
        invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        Box::pin(async move {
            let ToolInvocation::GenerateImage(args) = invocation else {
                return Err(misrouted(&invocation));
            };
            match self.image_generator.as_deref() {
                Some(generator) => image::generate_image(generator, args).await,
                None => Err(anyhow!("image generation is not configured")),
            }
        })
    }

    /// The orchestrator ends the turn on `ignore`; the result is a marker only
    pub(super) fn ignore_executor<'a>(
        &'a self,
        ctx: &'a ToolContext,
        _invocation: ToolInvocation,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        Box::pin(async move {
            tracing::debug!(agent_id = %ctx.agent_id, user_id = %ctx.user_id, "model chose not to reply");
            Ok(ToolResult::ok("Message ignored."))
        })
    }
}
