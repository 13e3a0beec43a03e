use super::{decode_list, encode_list, new_id, now_micros, to_datetime};
use crate::config::constants::{agent as agent_defaults, store};
use crate::knowledge::types::{
    Agent, AgentConfig, AgentIdentity, ArchivalMemory, ArchivalRef, ContextStats, ContextWindow,
    MemoryBlock, NewAgent, NewArchivalMemory,
};
use crate::knowledge::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Map;

const ARCHIVAL_SUMMARY_CHARS: usize = 120;

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        model: row.get(2)?,
        system_instructions: row.get(3)?,
        created_at: to_datetime(row.get(4)?),
    })
}

fn archival_from_row(row: &Row<'_>) -> rusqlite::Result<ArchivalMemory> {
    Ok(ArchivalMemory {
        id: row.get(0)?,
        summary: row.get(1)?,
        content: row.get(2)?,
        tags: decode_list(&row.get::<_, String>(3)?),
        timestamp: to_datetime(row.get(4)?),
        relevance_score: row.get(5)?,
    })
}

/// Create a bare agent with a default identity when it does not exist yet.
pub(super) fn ensure_agent(conn: &Connection, agent_id: &str, now: i64) -> StoreResult<()> {
    if agent_id.trim().is_empty() {
        return Err(StoreError::Validation("agent id cannot be empty".into()));
    }
    conn.execute(
        "INSERT OR IGNORE INTO agents (id, name, created_at) VALUES (?1, ?1, ?2)",
        params![agent_id, now],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO agent_identities (agent_id, name, personality)
         VALUES (?1, ?1, ?2)",
        params![agent_id, agent_defaults::DEFAULT_PERSONALITY],
    )?;
    Ok(())
}

fn require_agent(conn: &Connection, agent_id: &str) -> StoreResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM agents WHERE id = ?1", [agent_id], |row| row.get(0))
        .optional()?;
    exists
        .map(|_| ())
        .ok_or_else(|| StoreError::not_found(format!("agent '{agent_id}'")))
}

pub(super) fn get_agent(conn: &Connection, agent_id: &str) -> StoreResult<Agent> {
    conn.query_row(
        "SELECT id, name, model, system_instructions, created_at FROM agents WHERE id = ?1",
        [agent_id],
        agent_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found(format!("agent '{agent_id}'")))
}

pub(super) fn create_agent(conn: &Connection, agent: NewAgent) -> StoreResult<Agent> {
    if agent.id.trim().is_empty() {
        return Err(StoreError::Validation("agent id cannot be empty".into()));
    }
    if agent.identity.name.trim().is_empty() {
        return Err(StoreError::Validation("identity name cannot be empty".into()));
    }

    let now = now_micros();
    let name = if agent.name.trim().is_empty() {
        agent.identity.name.clone()
    } else {
        agent.name.clone()
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO agents (id, name, model, system_instructions, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            model = excluded.model,
            system_instructions = excluded.system_instructions",
        params![agent.id, name, agent.model, agent.system_instructions, now],
    )?;
    upsert_identity(&tx, &agent.id, &agent.identity)?;
    tx.commit()?;

    get_agent(conn, &agent.id)
}

fn upsert_identity(conn: &Connection, agent_id: &str, identity: &AgentIdentity) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO agent_identities (agent_id, name, personality, capabilities)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (agent_id) DO UPDATE SET
            name = excluded.name,
            personality = excluded.personality,
            capabilities = excluded.capabilities",
        params![
            agent_id,
            identity.name,
            identity.personality,
            encode_list(&identity.capabilities)?
        ],
    )?;
    Ok(())
}

pub(super) fn list_agents(conn: &Connection) -> StoreResult<Vec<Agent>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, model, system_instructions, created_at FROM agents ORDER BY created_at",
    )?;
    let agents = stmt
        .query_map([], agent_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(agents)
}

pub(super) fn get_agent_config(conn: &Connection, agent_id: &str) -> StoreResult<AgentConfig> {
    let row: Option<(String, String, Option<String>)> = conn
        .query_row(
            "SELECT a.model, a.system_instructions, i.personality
             FROM agents a LEFT JOIN agent_identities i ON i.agent_id = a.id
             WHERE a.id = ?1",
            [agent_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let (model, instructions, personality) =
        row.ok_or_else(|| StoreError::not_found(format!("agent '{agent_id}'")))?;
    let system_instructions = if instructions.trim().is_empty() {
        personality.unwrap_or_default()
    } else {
        instructions
    };

    Ok(AgentConfig {
        model,
        system_instructions,
    })
}

pub(super) fn update_agent_config(
    conn: &Connection,
    agent_id: &str,
    model: Option<String>,
    system_instructions: Option<String>,
) -> StoreResult<()> {
    require_agent(conn, agent_id)?;
    conn.execute(
        "UPDATE agents SET
            model = COALESCE(?2, model),
            system_instructions = COALESCE(?3, system_instructions)
         WHERE id = ?1",
        params![agent_id, model, system_instructions],
    )?;
    Ok(())
}

pub(super) fn update_agent_identity(
    conn: &Connection,
    agent_id: &str,
    identity: &AgentIdentity,
) -> StoreResult<()> {
    if identity.name.trim().is_empty() {
        return Err(StoreError::Validation("identity name cannot be empty".into()));
    }
    require_agent(conn, agent_id)?;
    upsert_identity(conn, agent_id, identity)
}

pub(super) fn fetch_context_window(conn: &Connection, agent_id: &str) -> StoreResult<ContextWindow> {
    require_agent(conn, agent_id)?;

    let identity = conn
        .query_row(
            "SELECT name, personality, capabilities FROM agent_identities WHERE agent_id = ?1",
            [agent_id],
            |row| {
                Ok(AgentIdentity {
                    name: row.get(0)?,
                    personality: row.get(1)?,
                    capabilities: decode_list(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found(format!("identity for agent '{agent_id}'")))?;

    let core_memory = memory_blocks(conn, agent_id)?;

    let mut stmt = conn.prepare(
        "SELECT summary, timestamp, relevance_score FROM archival_memories
         WHERE agent_id = ?1 ORDER BY timestamp DESC, rowid DESC",
    )?;
    let archival_refs = stmt
        .query_map([agent_id], |row| {
            Ok(ArchivalRef {
                summary: row.get(0)?,
                timestamp: to_datetime(row.get(1)?),
                relevance_score: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let window = ContextWindow {
        identity,
        core_memory,
        archival_refs,
        user_context: Map::new(),
    };
    window.validate().map_err(StoreError::Validation)?;
    Ok(window)
}

pub(super) fn memory_blocks(conn: &Connection, agent_id: &str) -> StoreResult<Vec<MemoryBlock>> {
    let mut stmt = conn.prepare(
        "SELECT name, content, updated_at FROM memory_blocks WHERE agent_id = ?1 ORDER BY name",
    )?;
    let blocks = stmt
        .query_map([agent_id], |row| {
            Ok(MemoryBlock {
                name: row.get(0)?,
                content: row.get(1)?,
                updated_at: to_datetime(row.get(2)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(blocks)
}

pub(super) fn update_memory_block(
    conn: &Connection,
    agent_id: &str,
    name: &str,
    content: &str,
) -> StoreResult<MemoryBlock> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("memory block name cannot be empty".into()));
    }

    let now = now_micros();
    let tx = conn.unchecked_transaction()?;
    ensure_agent(&tx, agent_id, now)?;
    tx.execute(
        "INSERT INTO memory_blocks (agent_id, name, content, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (agent_id, name) DO UPDATE SET
            content = excluded.content,
            updated_at = excluded.updated_at",
        params![agent_id, name, content, now],
    )?;
    tx.commit()?;

    Ok(MemoryBlock {
        name: name.to_string(),
        content: content.to_string(),
        updated_at: to_datetime(now),
    })
}

pub(super) fn delete_memory_block(conn: &Connection, agent_id: &str, name: &str) -> StoreResult<()> {
    let removed = conn.execute(
        "DELETE FROM memory_blocks WHERE agent_id = ?1 AND name = ?2",
        params![agent_id, name],
    )?;
    if removed == 0 {
        return Err(StoreError::not_found(format!(
            "memory block '{name}' for agent '{agent_id}'"
        )));
    }
    Ok(())
}

pub(super) fn create_archival_memory(
    conn: &Connection,
    agent_id: &str,
    memory: NewArchivalMemory,
) -> StoreResult<ArchivalMemory> {
    if memory.content.trim().is_empty() {
        return Err(StoreError::Validation("archival content cannot be empty".into()));
    }

    let summary = if memory.summary.trim().is_empty() {
        summarize_for_archive(&memory.content)
    } else {
        memory.summary.trim().to_string()
    };
    let now = now_micros();
    let id = new_id();

    let tx = conn.unchecked_transaction()?;
    ensure_agent(&tx, agent_id, now)?;
    tx.execute(
        "INSERT INTO archival_memories (id, agent_id, summary, content, tags, timestamp, relevance_score)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            agent_id,
            summary,
            memory.content,
            encode_list(&memory.tags)?,
            now,
            store::ARCHIVAL_SCORE
        ],
    )?;
    tx.commit()?;

    Ok(ArchivalMemory {
        id,
        summary,
        content: memory.content,
        tags: memory.tags,
        timestamp: to_datetime(now),
        relevance_score: store::ARCHIVAL_SCORE,
    })
}

fn summarize_for_archive(content: &str) -> String {
    let first_line = content.trim().lines().next().unwrap_or_default();
    if first_line.chars().count() <= ARCHIVAL_SUMMARY_CHARS {
        return first_line.to_string();
    }
    let truncated: String = first_line.chars().take(ARCHIVAL_SUMMARY_CHARS - 3).collect();
    format!("{truncated}...")
}

pub(super) fn list_archival_memories(
    conn: &Connection,
    agent_id: &str,
) -> StoreResult<Vec<ArchivalMemory>> {
    let mut stmt = conn.prepare(
        "SELECT id, summary, content, tags, timestamp, relevance_score FROM archival_memories
         WHERE agent_id = ?1 ORDER BY timestamp DESC, rowid DESC",
    )?;
    let memories = stmt
        .query_map([agent_id], archival_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(memories)
}

pub(super) fn delete_archival_memory(
    conn: &Connection,
    agent_id: &str,
    memory_id: &str,
) -> StoreResult<()> {
    let removed = conn.execute(
        "DELETE FROM archival_memories WHERE agent_id = ?1 AND id = ?2",
        params![agent_id, memory_id],
    )?;
    if removed == 0 {
        return Err(StoreError::not_found(format!("archival memory '{memory_id}'")));
    }
    Ok(())
}

/// Case-insensitive substring match over summary, content and tags. Scores
/// are the stored static relevance, newest first.
pub(super) fn search_archival_memories(
    conn: &Connection,
    agent_id: &str,
    query: &str,
    limit: usize,
) -> StoreResult<Vec<ArchivalMemory>> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT id, summary, content, tags, timestamp, relevance_score FROM archival_memories
         WHERE agent_id = ?1
           AND (instr(lower(summary), ?2) > 0
                OR instr(lower(content), ?2) > 0
                OR instr(lower(tags), ?2) > 0)
         ORDER BY timestamp DESC, rowid DESC
         LIMIT ?3",
    )?;
    let memories = stmt
        .query_map(params![agent_id, query, limit as i64], archival_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(memories)
}

pub(super) fn context_stats(conn: &Connection, agent_id: &str) -> StoreResult<ContextStats> {
    require_agent(conn, agent_id)?;

    let (memory_blocks, core_memory_chars): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(length(name) + length(content)), 0)
         FROM memory_blocks WHERE agent_id = ?1",
        [agent_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let (archival_memories, archival_chars): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(length(summary)), 0)
         FROM archival_memories WHERE agent_id = ?1",
        [agent_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let core_memory_chars = core_memory_chars.max(0) as usize;
    let archival_chars = archival_chars.max(0) as usize;
    let estimated_tokens = (core_memory_chars + archival_chars) / 4;
    let context_window_size = if estimated_tokens > store::CONTEXT_WINDOW_THRESHOLD {
        store::CONTEXT_WINDOW_LARGE
    } else {
        store::CONTEXT_WINDOW_SMALL
    };

    Ok(ContextStats {
        memory_blocks: memory_blocks.max(0) as usize,
        archival_memories: archival_memories.max(0) as usize,
        core_memory_chars,
        archival_chars,
        estimated_tokens,
        context_window_size,
    })
}
