use super::agents::ensure_agent;
use super::edges::{self, Edge, kind, rel};
use super::topics::{topic_from_row, upsert_topic};
use super::users::ensure_user;
use super::{new_id, now_micros, to_datetime};
use crate::config::constants::platform;
use crate::knowledge::types::{Fact, FactRelation, NewFact, Topic};
use crate::knowledge::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;

/// Columns of the `facts` table aliased as `f`
pub(super) const FACT_COLUMNS: &str =
    "f.id, f.content, f.source, f.confidence, f.created_at, f.updated_at";

const VERIFY_BOOST: f64 = 0.1;
const DISPUTE_PENALTY: f64 = 0.2;

pub(super) fn fact_from_row(row: &Row<'_>) -> rusqlite::Result<Fact> {
    Ok(Fact {
        id: row.get(0)?,
        content: row.get(1)?,
        source: row.get(2)?,
        confidence: row.get(3)?,
        created_at: to_datetime(row.get(4)?),
        updated_at: to_datetime(row.get(5)?),
    })
}

pub(super) fn get_fact(conn: &Connection, fact_id: &str) -> StoreResult<Fact> {
    conn.query_row(
        &format!("SELECT {FACT_COLUMNS} FROM facts f WHERE f.id = ?1"),
        [fact_id],
        fact_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found(format!("fact '{fact_id}'")))
}

pub(super) fn create_fact(conn: &Connection, fact: NewFact) -> StoreResult<Fact> {
    let content = fact.content.trim();
    if content.is_empty() {
        return Err(StoreError::Validation("fact content cannot be empty".into()));
    }
    let confidence = if fact.confidence.is_nan() {
        1.0
    } else {
        fact.confidence.clamp(0.0, 1.0)
    };
    let id = new_id();
    let now = now_micros();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO facts (id, content, source, confidence, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, content, fact.source, confidence, now],
    )?;

    ensure_agent(&tx, &fact.agent_id, now)?;
    edges::merge(
        &tx,
        Edge::new((kind::AGENT, fact.agent_id.as_str()), rel::KNOWS_FACT, (kind::FACT, id.as_str())),
        now,
    )?;

    if let Some(user_id) = fact.user_id.as_deref().filter(|u| !u.trim().is_empty()) {
        ensure_user(&tx, user_id, platform::DEFAULT_PLATFORM, now)?;
        edges::merge(
            &tx,
            Edge::new((kind::USER, user_id), rel::TOLD_ME, (kind::FACT, id.as_str())),
            now,
        )?;
    }

    for topic_name in fact.topics.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        let topic = upsert_topic(&tx, topic_name, "")?;
        edges::merge(
            &tx,
            Edge::new((kind::FACT, id.as_str()), rel::ABOUT, (kind::TOPIC, topic.id.as_str())),
            now,
        )?;
    }
    tx.commit()?;

    get_fact(conn, &id)
}

pub(super) fn update_fact(conn: &Connection, fact_id: &str, content: &str) -> StoreResult<Fact> {
    let content = content.trim();
    if content.is_empty() {
        return Err(StoreError::Validation("fact content cannot be empty".into()));
    }
    let updated = conn.execute(
        "UPDATE facts SET content = ?2, updated_at = MAX(updated_at, ?3) WHERE id = ?1",
        params![fact_id, content, now_micros()],
    )?;
    if updated == 0 {
        return Err(StoreError::not_found(format!("fact '{fact_id}'")));
    }
    get_fact(conn, fact_id)
}

pub(super) fn delete_fact(conn: &Connection, fact_id: &str) -> StoreResult<()> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM facts WHERE id = ?1", [fact_id])?;
    if removed == 0 {
        return Err(StoreError::not_found(format!("fact '{fact_id}'")));
    }
    edges::detach(&tx, kind::FACT, fact_id)?;
    tx.commit()?;
    Ok(())
}

pub(super) fn fact_topics(conn: &Connection, fact_id: &str) -> StoreResult<Vec<Topic>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.description FROM topics t
         JOIN edges e ON e.dst_kind = 'topic' AND e.dst_id = t.id
         WHERE e.src_kind = 'fact' AND e.src_id = ?1 AND e.rel = 'ABOUT'
         ORDER BY t.name",
    )?;
    let topics = stmt
        .query_map([fact_id], topic_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(topics)
}

/// Facts linked to any topic whose name contains `topic` (case-insensitive)
pub(super) fn facts_about_topic(
    conn: &Connection,
    topic: &str,
    limit: usize,
) -> StoreResult<Vec<Fact>> {
    let needle = topic.trim().to_lowercase();
    if needle.is_empty() {
        return Err(StoreError::Validation("topic cannot be empty".into()));
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT {FACT_COLUMNS} FROM facts f
         JOIN edges e ON e.src_kind = 'fact' AND e.src_id = f.id AND e.rel = 'ABOUT'
         JOIN topics t ON e.dst_kind = 'topic' AND e.dst_id = t.id
         WHERE instr(t.name_key, ?1) > 0
         ORDER BY f.updated_at DESC
         LIMIT ?2"
    ))?;
    let facts = stmt
        .query_map(params![needle, limit as i64], fact_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(facts)
}

pub(super) fn list_facts(conn: &Connection, limit: usize) -> StoreResult<Vec<Fact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FACT_COLUMNS} FROM facts f ORDER BY f.updated_at DESC, f.rowid DESC LIMIT ?1"
    ))?;
    let facts = stmt
        .query_map([limit as i64], fact_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(facts)
}

pub(super) fn link_facts(
    conn: &Connection,
    from: &str,
    to: &str,
    relation: FactRelation,
) -> StoreResult<()> {
    get_fact(conn, from)?;
    get_fact(conn, to)?;
    edges::merge(
        conn,
        Edge::new((kind::FACT, from), relation.as_str(), (kind::FACT, to)),
        now_micros(),
    )?;
    Ok(())
}

/// Record a user's verdict on a fact and nudge its confidence.
pub(super) fn record_verification(
    conn: &Connection,
    fact_id: &str,
    user_id: &str,
    verified: bool,
) -> StoreResult<()> {
    let fact = get_fact(conn, fact_id)?;
    let now = now_micros();
    let confidence = if verified {
        (fact.confidence + VERIFY_BOOST).min(1.0)
    } else {
        (fact.confidence - DISPUTE_PENALTY).max(0.0)
    };

    let tx = conn.unchecked_transaction()?;
    ensure_user(&tx, user_id, platform::DEFAULT_PLATFORM, now)?;
    edges::set_props(
        &tx,
        Edge::new((kind::USER, user_id), rel::VERIFIED, (kind::FACT, fact_id)),
        &json!({ "verified": verified }).to_string(),
        now,
    )?;
    tx.execute(
        "UPDATE facts SET confidence = ?2 WHERE id = ?1",
        params![fact_id, confidence],
    )?;
    tx.commit()?;
    Ok(())
}
