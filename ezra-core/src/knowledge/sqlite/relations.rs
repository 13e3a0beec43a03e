use super::users::get_user;
use crate::knowledge::StoreResult;
use crate::knowledge::types::UserSimilarity;
use rusqlite::{Connection, params};

const TOPIC_WEIGHT: f64 = 0.4;
const FACT_WEIGHT: f64 = 0.3;
const CONVERSATION_WEIGHT: f64 = 0.3;

fn shared_targets(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
    rel: &str,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT a.dst_id FROM edges a
         JOIN edges b ON b.dst_kind = a.dst_kind AND b.dst_id = a.dst_id AND b.rel = a.rel
         WHERE a.src_kind = 'user' AND a.src_id = ?1
           AND b.src_kind = 'user' AND b.src_id = ?2
           AND a.rel = ?3
         ORDER BY a.dst_id",
    )?;
    let targets = stmt
        .query_map(params![user_a, user_b, rel], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(targets)
}

fn topic_names(conn: &Connection, ids: &[String]) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM topics WHERE id = ?1")?;
    let mut names = Vec::with_capacity(ids.len());
    for id in ids {
        let name: String = stmt.query_row([id], |row| row.get(0))?;
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Shared topics weigh 0.4 each, shared facts and conversations 0.3 each.
pub(super) fn calculate_similarity(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> StoreResult<UserSimilarity> {
    get_user(conn, user_a)?;
    get_user(conn, user_b)?;

    let topic_ids = shared_targets(conn, user_a, user_b, "INTERESTED_IN")?;
    let shared_facts = shared_targets(conn, user_a, user_b, "TOLD_ME")?.len();
    let shared_conversations = shared_targets(conn, user_a, user_b, "PARTICIPATED_IN")?.len();
    let shared_topics = topic_names(conn, &topic_ids)?;

    let similarity_score = shared_topics.len() as f64 * TOPIC_WEIGHT
        + shared_facts as f64 * FACT_WEIGHT
        + shared_conversations as f64 * CONVERSATION_WEIGHT;
    let based_on = if shared_topics.is_empty() {
        "behavior"
    } else {
        "topics"
    };

    Ok(UserSimilarity {
        user1_id: user_a.to_string(),
        user2_id: user_b.to_string(),
        similarity_score,
        based_on: based_on.to_string(),
        shared_items: shared_topics,
    })
}

/// Users sharing at least one topic, fact or conversation, best first.
pub(super) fn find_similar_users(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> StoreResult<Vec<UserSimilarity>> {
    get_user(conn, user_id)?;
    let mut stmt = conn.prepare(
        "SELECT DISTINCT b.src_id FROM edges a
         JOIN edges b ON b.dst_kind = a.dst_kind AND b.dst_id = a.dst_id AND b.rel = a.rel
         WHERE a.src_kind = 'user' AND a.src_id = ?1
           AND b.src_kind = 'user' AND b.src_id <> ?1
           AND a.rel IN ('INTERESTED_IN', 'TOLD_ME', 'PARTICIPATED_IN')",
    )?;
    let candidates = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let similarity = calculate_similarity(conn, user_id, &candidate)?;
        if similarity.similarity_score > 0.0 {
            scored.push(similarity);
        }
    }
    scored.sort_by(|a, b| {
        b.similarity_score
            .total_cmp(&a.similarity_score)
            .then_with(|| a.user2_id.cmp(&b.user2_id))
    });
    scored.truncate(limit);
    Ok(scored)
}
