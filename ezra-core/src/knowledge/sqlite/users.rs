use super::edges::{self, Edge, kind, rel};
use super::facts::{FACT_COLUMNS, fact_from_row};
use super::topics::topic_from_row;
use super::conversations::message_from_row;
use super::{now_micros, to_datetime};
use crate::config::constants::platform;
use crate::knowledge::dedup::deduplicate_facts;
use crate::knowledge::types::{ChatMessage, Fact, User, UserContext};
use crate::knowledge::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension, Row, params};

const USER_COLUMNS: &str =
    "id, external_id, platform, display_name, preferred_language, first_seen, last_seen";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        external_id: row.get(1)?,
        platform: row.get(2)?,
        display_name: row.get(3)?,
        preferred_language: row.get(4)?,
        first_seen: to_datetime(row.get(5)?),
        last_seen: to_datetime(row.get(6)?),
    })
}

fn find_user(conn: &Connection, user_id: &str) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub(super) fn get_user(conn: &Connection, user_id: &str) -> StoreResult<User> {
    find_user(conn, user_id)?.ok_or_else(|| StoreError::not_found(format!("user '{user_id}'")))
}

/// Make sure a user row exists without touching an existing one.
///
/// New rows use the id as their external id; a different user already
/// holding that (platform, external id) pair is reported, not overwritten.
pub(super) fn ensure_user(
    conn: &Connection,
    user_id: &str,
    user_platform: &str,
    now: i64,
) -> StoreResult<()> {
    if user_id.trim().is_empty() {
        return Err(StoreError::Validation("user id cannot be empty".into()));
    }
    if find_user(conn, user_id)?.is_some() {
        return Ok(());
    }

    let user_platform = normalized_platform(user_platform);
    let holder: Option<String> = conn
        .query_row(
            "SELECT id FROM users WHERE platform = ?1 AND external_id = ?2",
            params![user_platform, user_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(holder) = holder {
        return Err(StoreError::Validation(format!(
            "external id '{user_id}' on {user_platform} already belongs to user '{holder}'"
        )));
    }

    conn.execute(
        "INSERT INTO users (id, external_id, platform, first_seen, last_seen)
         VALUES (?1, ?1, ?2, ?3, ?3)",
        params![user_id, user_platform, now],
    )?;
    Ok(())
}

pub(super) fn touch_last_seen(conn: &Connection, user_id: &str, now: i64) -> StoreResult<()> {
    conn.execute(
        "UPDATE users SET last_seen = MAX(last_seen, ?2) WHERE id = ?1",
        params![user_id, now],
    )?;
    Ok(())
}

fn normalized_platform(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        platform::DEFAULT_PLATFORM
    } else {
        value
    }
}

pub(super) fn get_or_create_user(
    conn: &Connection,
    user_id: &str,
    external_id: &str,
    display_name: &str,
    user_platform: &str,
) -> StoreResult<User> {
    if user_id.trim().is_empty() {
        return Err(StoreError::Validation("user id cannot be empty".into()));
    }
    let external_id = if external_id.trim().is_empty() {
        user_id
    } else {
        external_id.trim()
    };
    let user_platform = normalized_platform(user_platform);
    let display_name = display_name.trim();
    let now = now_micros();

    let tx = conn.unchecked_transaction()?;

    // external ids are unique per platform; an existing mapping wins
    let existing_id: Option<String> = tx
        .query_row(
            "SELECT id FROM users WHERE id = ?1
             UNION ALL
             SELECT id FROM users WHERE platform = ?2 AND external_id = ?3
             LIMIT 1",
            params![user_id, user_platform, external_id],
            |row| row.get(0),
        )
        .optional()?;

    let id = match existing_id {
        Some(id) => {
            tx.execute(
                "UPDATE users SET
                    last_seen = MAX(last_seen, ?2),
                    display_name = CASE WHEN ?3 <> '' THEN ?3 ELSE display_name END
                 WHERE id = ?1",
                params![id, now, display_name],
            )?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO users (id, external_id, platform, display_name, first_seen, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![user_id, external_id, user_platform, display_name, now],
            )?;
            user_id.to_string()
        }
    };
    tx.commit()?;

    get_user(conn, &id)
}

pub(super) fn list_users(conn: &Connection) -> StoreResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY last_seen DESC"
    ))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub(super) fn set_language_preference(
    conn: &Connection,
    user_id: &str,
    lang_code: &str,
) -> StoreResult<()> {
    let updated = conn.execute(
        "UPDATE users SET preferred_language = ?2 WHERE id = ?1",
        params![user_id, lang_code.trim()],
    )?;
    if updated == 0 {
        return Err(StoreError::not_found(format!("user '{user_id}'")));
    }
    Ok(())
}

pub(super) fn get_language_preference(conn: &Connection, user_id: &str) -> StoreResult<String> {
    Ok(get_user(conn, user_id)?.preferred_language)
}

pub(super) fn find_by_display_name(conn: &Connection, name: &str) -> StoreResult<User> {
    let name = name.trim().trim_start_matches('@');
    conn.query_row(
        &format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE lower(display_name) = lower(?1)
             ORDER BY last_seen DESC LIMIT 1"
        ),
        [name],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found(format!("user named '{name}'")))
}

/// Facts told by the user, newest first
pub(super) fn user_facts(conn: &Connection, user_id: &str) -> StoreResult<Vec<Fact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FACT_COLUMNS} FROM facts f
         JOIN edges e ON e.dst_kind = 'fact' AND e.dst_id = f.id
         WHERE e.src_kind = 'user' AND e.src_id = ?1 AND e.rel = 'TOLD_ME'
         ORDER BY f.updated_at DESC, f.rowid DESC"
    ))?;
    let facts = stmt
        .query_map([user_id], fact_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(facts)
}

pub(super) fn get_user_context(conn: &Connection, user_id: &str) -> StoreResult<UserContext> {
    let user = get_user(conn, user_id)?;

    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.description FROM topics t
         JOIN edges e ON e.dst_kind = 'topic' AND e.dst_id = t.id
         WHERE e.src_kind = 'user' AND e.src_id = ?1 AND e.rel = 'INTERESTED_IN'
         ORDER BY e.weight DESC, e.count DESC, t.name",
    )?;
    let topics = stmt
        .query_map([user_id], topic_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let facts = deduplicate_facts(user_facts(conn, user_id)?);

    let message_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE author_id = ?1 AND role = 'user'",
        [user_id],
        |row| row.get(0),
    )?;
    let last_message: Option<String> = conn
        .query_row(
            "SELECT content FROM messages WHERE author_id = ?1 AND role = 'user'
             ORDER BY seq DESC LIMIT 1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;
    let conversations: i64 = conn.query_row(
        "SELECT COUNT(*) FROM edges
         WHERE src_kind = 'user' AND src_id = ?1 AND rel = 'PARTICIPATED_IN'",
        [user_id],
        |row| row.get(0),
    )?;

    Ok(UserContext {
        user,
        topics,
        facts,
        message_count: message_count.max(0) as u64,
        last_message,
        conversations: conversations.max(0) as u64,
    })
}

pub(super) fn user_messages(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> StoreResult<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, role, platform, timestamp, author_id FROM messages
         WHERE author_id = ?1 AND role = 'user'
         ORDER BY seq DESC LIMIT ?2",
    )?;
    let messages = stmt
        .query_map(params![user_id, limit as i64], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

pub(super) fn record_mention(conn: &Connection, from_user: &str, to_user: &str) -> StoreResult<()> {
    if from_user == to_user {
        return Ok(());
    }
    let now = now_micros();
    edges::merge_counted(
        conn,
        Edge::new((kind::USER, from_user), rel::MENTIONED, (kind::USER, to_user)),
        now,
    )?;
    Ok(())
}
