// Schema for the SQLite-backed knowledge graph.
// Nodes get their own tables; cross-entity relationships share one `edges`
// table keyed by (src_kind, src_id, rel, dst_kind, dst_id), so re-linking an
// existing pair updates the edge instead of duplicating it.
// Adding a table or column: append an idempotent statement at the end.

use rusqlite::Connection;
use tracing::debug;

pub(crate) fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            model TEXT NOT NULL DEFAULT '',
            system_instructions TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS agent_identities (
            agent_id TEXT PRIMARY KEY REFERENCES agents(id) ON DELETE CASCADE,
            name TEXT NOT NULL CHECK (length(trim(name)) > 0),
            personality TEXT NOT NULL DEFAULT '',
            capabilities TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS memory_blocks (
            agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
            name TEXT NOT NULL CHECK (length(name) > 0),
            content TEXT NOT NULL DEFAULT '',
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (agent_id, name)
        );

        CREATE TABLE IF NOT EXISTS archival_memories (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
            summary TEXT NOT NULL,
            content TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            timestamp INTEGER NOT NULL,
            relevance_score REAL NOT NULL DEFAULT 1.0
        );
        CREATE INDEX IF NOT EXISTS idx_archival_agent
            ON archival_memories(agent_id, timestamp);

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL,
            platform TEXT NOT NULL,
            display_name TEXT NOT NULL DEFAULT '',
            preferred_language TEXT NOT NULL DEFAULT '',
            first_seen INTEGER NOT NULL,
            last_seen INTEGER NOT NULL,
            UNIQUE (platform, external_id)
        );
        CREATE INDEX IF NOT EXISTS idx_users_display_name
            ON users(lower(display_name));

        CREATE TABLE IF NOT EXISTS topics (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK (length(trim(name)) > 0),
            name_key TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS facts (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL CHECK (length(trim(content)) > 0),
            source TEXT NOT NULL DEFAULT '',
            confidence REAL NOT NULL DEFAULT 1.0
                CHECK (confidence >= 0.0 AND confidence <= 1.0),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL UNIQUE,
            platform TEXT NOT NULL,
            started_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            author_id TEXT NOT NULL,
            content TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('user', 'agent')),
            platform TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, seq);

        CREATE TABLE IF NOT EXISTS interactions (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            message TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS edges (
            src_kind TEXT NOT NULL,
            src_id TEXT NOT NULL,
            rel TEXT NOT NULL,
            dst_kind TEXT NOT NULL,
            dst_id TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 1.0,
            count INTEGER NOT NULL DEFAULT 1,
            props TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (src_kind, src_id, rel, dst_kind, dst_id)
        );
        CREATE INDEX IF NOT EXISTS idx_edges_dst
            ON edges(dst_kind, dst_id, rel);

        CREATE TABLE IF NOT EXISTS personality_memories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            consented INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS personality_profiles (
            user_id TEXT NOT NULL,
            scope TEXT NOT NULL,
            profile TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, scope)
        );
        ",
    )?;

    debug!("knowledge store schema ready");
    Ok(())
}
