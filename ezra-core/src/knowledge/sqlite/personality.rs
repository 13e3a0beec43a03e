use super::{decode_list, encode_list, new_id, now_micros, to_datetime};
use crate::knowledge::StoreResult;
use crate::knowledge::types::PersonalityMemory;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<PersonalityMemory> {
    Ok(PersonalityMemory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        tags: decode_list(&row.get::<_, String>(3)?),
        consented: row.get(4)?,
        created_at: to_datetime(row.get(5)?),
    })
}

pub(super) fn store_memory(
    conn: &Connection,
    user_id: &str,
    content: &str,
    tags: Vec<String>,
    consented: bool,
) -> StoreResult<PersonalityMemory> {
    let id = new_id();
    let now = now_micros();
    conn.execute(
        "INSERT INTO personality_memories (id, user_id, content, tags, consented, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, user_id, content, encode_list(&tags)?, consented, now],
    )?;
    Ok(PersonalityMemory {
        id,
        user_id: user_id.to_string(),
        content: content.to_string(),
        tags,
        consented,
        created_at: to_datetime(now),
    })
}

pub(super) fn retrieve_memories(
    conn: &Connection,
    user_id: &str,
    query: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<PersonalityMemory>> {
    let needle = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content, tags, consented, created_at FROM personality_memories
         WHERE user_id = ?1
           AND (?2 = '' OR instr(lower(content), ?2) > 0 OR instr(lower(tags), ?2) > 0)
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?3",
    )?;
    let memories = stmt
        .query_map(params![user_id, needle, limit as i64], memory_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(memories)
}

pub(super) fn delete_memories(conn: &Connection, user_id: &str) -> StoreResult<usize> {
    Ok(conn.execute(
        "DELETE FROM personality_memories WHERE user_id = ?1",
        [user_id],
    )?)
}

pub(super) fn store_profile(
    conn: &Connection,
    user_id: &str,
    scope: &str,
    profile: &Value,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO personality_profiles (user_id, scope, profile, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id, scope) DO UPDATE SET
            profile = excluded.profile,
            updated_at = excluded.updated_at",
        params![user_id, scope, serde_json::to_string(profile)?, now_micros()],
    )?;
    Ok(())
}

pub(super) fn get_profile(conn: &Connection, user_id: &str, scope: &str) -> StoreResult<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT profile FROM personality_profiles WHERE user_id = ?1 AND scope = ?2",
            params![user_id, scope],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(Into::into)
}

pub(super) fn delete_profile(conn: &Connection, user_id: &str, scope: &str) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM personality_profiles WHERE user_id = ?1 AND scope = ?2",
        params![user_id, scope],
    )?;
    Ok(())
}
