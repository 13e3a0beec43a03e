use crate::config::constants::store;
use crate::knowledge::StoreResult;
use crate::knowledge::types::{SearchHit, SearchHitKind};
use rusqlite::{Connection, params};
use serde_json::json;

/// Substring search over the agent's facts, its memory blocks and all
/// topics. Facts come first, then memory blocks, then topics.
pub(super) fn search_memory(
    conn: &Connection,
    agent_id: &str,
    query: &str,
    limit: usize,
) -> StoreResult<Vec<SearchHit>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    let mut hits = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT f.id, f.content, f.source FROM facts f
         JOIN edges e ON e.dst_kind = 'fact' AND e.dst_id = f.id
         WHERE e.src_kind = 'agent' AND e.src_id = ?1 AND e.rel = 'KNOWS_FACT'
           AND instr(lower(f.content), ?2) > 0
         ORDER BY f.updated_at DESC
         LIMIT ?3",
    )?;
    let facts = stmt.query_map(params![agent_id, needle, limit as i64], |row| {
        let source: String = row.get(2)?;
        Ok(SearchHit {
            kind: SearchHitKind::Fact,
            id: row.get(0)?,
            content: row.get(1)?,
            score: store::FACT_SCORE,
            metadata: (!source.is_empty()).then(|| json!({ "source": source })),
        })
    })?;
    for hit in facts {
        hits.push(hit?);
    }

    let mut stmt = conn.prepare(
        "SELECT name, content FROM memory_blocks
         WHERE agent_id = ?1
           AND (instr(lower(name), ?2) > 0 OR instr(lower(content), ?2) > 0)
         ORDER BY name
         LIMIT ?3",
    )?;
    let blocks = stmt.query_map(params![agent_id, needle, limit as i64], |row| {
        Ok(SearchHit {
            kind: SearchHitKind::Memory,
            id: row.get(0)?,
            content: row.get(1)?,
            score: store::MEMORY_SCORE,
            metadata: None,
        })
    })?;
    for hit in blocks {
        hits.push(hit?);
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, description FROM topics
         WHERE instr(name_key, ?1) > 0 OR instr(lower(description), ?1) > 0
         ORDER BY name_key
         LIMIT ?2",
    )?;
    let topics = stmt.query_map(params![needle, limit as i64], |row| {
        let name: String = row.get(1)?;
        let description: String = row.get(2)?;
        let content = if description.is_empty() {
            name
        } else {
            format!("{name}: {description}")
        };
        Ok(SearchHit {
            kind: SearchHitKind::Topic,
            id: row.get(0)?,
            content,
            score: store::TOPIC_SCORE,
            metadata: None,
        })
    })?;
    for hit in topics {
        hits.push(hit?);
    }

    hits.truncate(limit);
    Ok(hits)
}
