use super::agents::ensure_agent;
use super::edges::{self, Edge, kind, rel};
use super::users::{ensure_user, touch_last_seen};
use super::{new_id, now_micros, to_datetime};
use crate::knowledge::types::{ChatMessage, Conversation, NewMessage, Role};
use crate::knowledge::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Columns: id, content, role, platform, timestamp, author_id
pub(super) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role: String = row.get(2)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        content: row.get(1)?,
        role: Role::parse(&role).unwrap_or(Role::User),
        platform: row.get(3)?,
        timestamp: to_datetime(row.get(4)?),
        author_id: row.get(5)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        platform: row.get(2)?,
        started_at: to_datetime(row.get(3)?),
    })
}

pub(super) fn log_interaction(
    conn: &Connection,
    agent_id: &str,
    user_id: &str,
    message: &str,
    timestamp: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO interactions (agent_id, user_id, message, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![agent_id, user_id, message, timestamp.timestamp_micros()],
    )?;
    Ok(())
}

/// Conversation for a channel, created on first touch.
fn upsert_conversation(
    conn: &Connection,
    channel_id: &str,
    platform: &str,
    now: i64,
) -> StoreResult<String> {
    conn.execute(
        "INSERT OR IGNORE INTO conversations (id, channel_id, platform, started_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![new_id(), channel_id, platform, now],
    )?;
    let id = conn.query_row(
        "SELECT id FROM conversations WHERE channel_id = ?1",
        [channel_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub(super) fn log_message(conn: &Connection, message: NewMessage) -> StoreResult<ChatMessage> {
    if message.channel_id.trim().is_empty() {
        return Err(StoreError::Validation("channel id cannot be empty".into()));
    }
    let now = now_micros();
    let id = new_id();

    let tx = conn.unchecked_transaction()?;
    let conversation_id = upsert_conversation(&tx, &message.channel_id, &message.platform, now)?;
    ensure_user(&tx, &message.user_id, &message.platform, now)?;

    let author_id = match message.role {
        Role::User => message.user_id.as_str(),
        Role::Agent => {
            ensure_agent(&tx, &message.agent_id, now)?;
            message.agent_id.as_str()
        }
    };
    let author_kind = match message.role {
        Role::User => kind::USER,
        Role::Agent => kind::AGENT,
    };

    tx.execute(
        "INSERT INTO messages (id, conversation_id, author_id, content, role, platform, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            conversation_id,
            author_id,
            message.content,
            message.role.as_str(),
            message.platform,
            now
        ],
    )?;

    edges::merge(
        &tx,
        Edge::new((author_kind, author_id), rel::SENT, (kind::MESSAGE, id.as_str())),
        now,
    )?;
    edges::merge(
        &tx,
        Edge::new(
            (kind::USER, message.user_id.as_str()),
            rel::PARTICIPATED_IN,
            (kind::CONVERSATION, conversation_id.as_str()),
        ),
        now,
    )?;

    if let Some(reply_to) = message.reply_to.as_deref() {
        let parent: Option<String> = tx
            .query_row("SELECT id FROM messages WHERE id = ?1", [reply_to], |row| row.get(0))
            .optional()?;
        if let Some(parent) = parent {
            edges::merge(
                &tx,
                Edge::new(
                    (kind::MESSAGE, id.as_str()),
                    rel::REPLIES_TO,
                    (kind::MESSAGE, parent.as_str()),
                ),
                now,
            )?;
        }
    }

    for mentioned in message.mentions.iter().filter(|m| !m.trim().is_empty()) {
        edges::merge(
            &tx,
            Edge::new(
                (kind::MESSAGE, id.as_str()),
                rel::MENTIONS,
                (kind::USER, mentioned.as_str()),
            ),
            now,
        )?;
        if message.role == Role::User && *mentioned != message.user_id {
            edges::merge_counted(
                &tx,
                Edge::new(
                    (kind::USER, message.user_id.as_str()),
                    rel::MENTIONED,
                    (kind::USER, mentioned.as_str()),
                ),
                now,
            )?;
        }
    }

    if message.role == Role::User {
        touch_last_seen(&tx, &message.user_id, now)?;
    }
    tx.commit()?;

    Ok(ChatMessage {
        id,
        content: message.content,
        role: message.role,
        platform: message.platform,
        timestamp: to_datetime(now),
        author_id: author_id.to_string(),
    })
}

pub(super) fn conversation_history(
    conn: &Connection,
    channel_id: &str,
    limit: usize,
) -> StoreResult<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.content, m.role, m.platform, m.timestamp, m.author_id
         FROM messages m JOIN conversations c ON c.id = m.conversation_id
         WHERE c.channel_id = ?1
         ORDER BY m.seq DESC
         LIMIT ?2",
    )?;
    let mut messages = stmt
        .query_map(params![channel_id, limit as i64], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    messages.reverse();
    Ok(messages)
}

pub(super) fn get_conversation(conn: &Connection, channel_id: &str) -> StoreResult<Conversation> {
    conn.query_row(
        "SELECT id, channel_id, platform, started_at FROM conversations WHERE channel_id = ?1",
        [channel_id],
        conversation_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found(format!("conversation for channel '{channel_id}'")))
}

pub(super) fn list_messages(conn: &Connection, limit: usize) -> StoreResult<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, role, platform, timestamp, author_id FROM messages
         ORDER BY seq DESC LIMIT ?1",
    )?;
    let messages = stmt
        .query_map([limit as i64], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

pub(super) fn list_conversations(conn: &Connection, limit: usize) -> StoreResult<Vec<Conversation>> {
    let mut stmt = conn.prepare(
        "SELECT id, channel_id, platform, started_at FROM conversations
         ORDER BY started_at DESC, rowid DESC LIMIT ?1",
    )?;
    let conversations = stmt
        .query_map([limit as i64], conversation_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(conversations)
}
