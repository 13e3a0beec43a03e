use super::edges::{self, Edge, kind, rel};
use super::users::ensure_user;
use super::{new_id, now_micros};
use crate::config::constants::{platform, store};
use crate::knowledge::types::{Topic, TopicRelation};
use crate::knowledge::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension, Row, params};

pub(super) fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn topic_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub(super) fn get_topic(conn: &Connection, name: &str) -> StoreResult<Topic> {
    conn.query_row(
        "SELECT id, name, description FROM topics WHERE name_key = ?1",
        [topic_key(name)],
        topic_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found(format!("topic '{}'", name.trim())))
}

/// Insert or refresh a topic. The first spelling of the name is kept; the
/// description only changes when the new one is non-empty.
pub(super) fn upsert_topic(conn: &Connection, name: &str, description: &str) -> StoreResult<Topic> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("topic name cannot be empty".into()));
    }
    conn.execute(
        "INSERT INTO topics (id, name, name_key, description) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (name_key) DO UPDATE SET
            description = CASE WHEN excluded.description <> '' THEN excluded.description
                               ELSE topics.description END",
        params![new_id(), name, topic_key(name), description.trim()],
    )?;
    get_topic(conn, name)
}

pub(super) fn list_topics(conn: &Connection) -> StoreResult<Vec<Topic>> {
    let mut stmt = conn.prepare("SELECT id, name, description FROM topics ORDER BY name_key")?;
    let topics = stmt
        .query_map([], topic_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(topics)
}

pub(super) fn link_topics(
    conn: &Connection,
    from: &str,
    to: &str,
    relation: TopicRelation,
) -> StoreResult<()> {
    let tx = conn.unchecked_transaction()?;
    let source = upsert_topic(&tx, from, "")?;
    let target = upsert_topic(&tx, to, "")?;
    if source.id == target.id {
        return Err(StoreError::Validation("cannot link a topic to itself".into()));
    }
    edges::merge(
        &tx,
        Edge::new(
            (kind::TOPIC, source.id.as_str()),
            relation.as_str(),
            (kind::TOPIC, target.id.as_str()),
        ),
        now_micros(),
    )?;
    tx.commit()?;
    Ok(())
}

/// Breadth-first walk over topic links in either direction, nearest first.
pub(super) fn related_topics(conn: &Connection, name: &str, depth: usize) -> StoreResult<Vec<Topic>> {
    let start = get_topic(conn, name)?;
    let depth = depth.clamp(store::MIN_TOPIC_DEPTH, store::MAX_TOPIC_DEPTH);

    let mut stmt = conn.prepare(
        "WITH RECURSIVE walk(id, depth) AS (
            SELECT ?1, 0
            UNION
            SELECT CASE WHEN e.src_id = walk.id THEN e.dst_id ELSE e.src_id END,
                   walk.depth + 1
            FROM edges e
            JOIN walk ON e.src_id = walk.id OR e.dst_id = walk.id
            WHERE e.src_kind = 'topic' AND e.dst_kind = 'topic'
              AND e.rel IN ('RELATED_TO', 'SUBTOPIC_OF')
              AND walk.depth < ?2
         )
         SELECT t.id, t.name, t.description, MIN(walk.depth) AS distance
         FROM walk JOIN topics t ON t.id = walk.id
         WHERE walk.id <> ?1
         GROUP BY t.id, t.name, t.description
         ORDER BY distance, t.name_key
         LIMIT ?3",
    )?;
    let topics = stmt
        .query_map(
            params![start.id, depth as i64, store::RELATED_TOPIC_LIMIT as i64],
            topic_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(topics)
}

/// Strength is clamped to [0, 1] and averaged with any existing interest.
pub(super) fn link_user_to_topic(
    conn: &Connection,
    user_id: &str,
    topic: &str,
    strength: f64,
) -> StoreResult<f64> {
    let strength = if strength.is_nan() {
        1.0
    } else {
        strength.clamp(0.0, 1.0)
    };
    let now = now_micros();

    let tx = conn.unchecked_transaction()?;
    ensure_user(&tx, user_id, platform::DEFAULT_PLATFORM, now)?;
    let topic = upsert_topic(&tx, topic, "")?;
    let weight = edges::merge_weighted(
        &tx,
        Edge::new(
            (kind::USER, user_id),
            rel::INTERESTED_IN,
            (kind::TOPIC, topic.id.as_str()),
        ),
        strength,
        now,
    )?;
    tx.commit()?;
    Ok(weight)
}
