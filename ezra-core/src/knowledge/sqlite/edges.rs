//! Relationship helpers over the shared `edges` table.

use rusqlite::{Connection, OptionalExtension, params};

pub(super) mod kind {
    pub const AGENT: &str = "agent";
    pub const USER: &str = "user";
    pub const FACT: &str = "fact";
    pub const TOPIC: &str = "topic";
    pub const MESSAGE: &str = "message";
    pub const CONVERSATION: &str = "conversation";
}

pub(super) mod rel {
    pub const KNOWS_FACT: &str = "KNOWS_FACT";
    pub const TOLD_ME: &str = "TOLD_ME";
    pub const ABOUT: &str = "ABOUT";
    pub const INTERESTED_IN: &str = "INTERESTED_IN";
    pub const SENT: &str = "SENT";
    pub const PARTICIPATED_IN: &str = "PARTICIPATED_IN";
    pub const MENTIONED: &str = "MENTIONED";
    pub const MENTIONS: &str = "MENTIONS";
    pub const REPLIES_TO: &str = "REPLIES_TO";
    pub const VERIFIED: &str = "VERIFIED";
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Edge<'a> {
    pub src_kind: &'a str,
    pub src_id: &'a str,
    pub rel: &'a str,
    pub dst_kind: &'a str,
    pub dst_id: &'a str,
}

impl<'a> Edge<'a> {
    pub fn new(
        (src_kind, src_id): (&'a str, &'a str),
        rel: &'a str,
        (dst_kind, dst_id): (&'a str, &'a str),
    ) -> Self {
        Self {
            src_kind,
            src_id,
            rel,
            dst_kind,
            dst_id,
        }
    }
}

/// Create the edge if absent; otherwise only touch `updated_at`.
pub(super) fn merge(conn: &Connection, edge: Edge<'_>, now: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO edges (src_kind, src_id, rel, dst_kind, dst_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT (src_kind, src_id, rel, dst_kind, dst_id)
         DO UPDATE SET updated_at = excluded.updated_at",
        params![
            edge.src_kind,
            edge.src_id,
            edge.rel,
            edge.dst_kind,
            edge.dst_id,
            now
        ],
    )?;
    Ok(())
}

/// Create the edge with count 1, or increment its count.
pub(super) fn merge_counted(conn: &Connection, edge: Edge<'_>, now: i64) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO edges (src_kind, src_id, rel, dst_kind, dst_id, count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
         ON CONFLICT (src_kind, src_id, rel, dst_kind, dst_id)
         DO UPDATE SET count = edges.count + 1, updated_at = excluded.updated_at",
        params![
            edge.src_kind,
            edge.src_id,
            edge.rel,
            edge.dst_kind,
            edge.dst_id,
            now
        ],
    )?;
    count(conn, edge).map(|count| count.unwrap_or(1))
}

/// Create the edge with `weight`, or replace its weight with the mean of the
/// old and new value. Returns the stored weight.
pub(super) fn merge_weighted(
    conn: &Connection,
    edge: Edge<'_>,
    weight: f64,
    now: i64,
) -> rusqlite::Result<f64> {
    conn.execute(
        "INSERT INTO edges (src_kind, src_id, rel, dst_kind, dst_id, weight, count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
         ON CONFLICT (src_kind, src_id, rel, dst_kind, dst_id)
         DO UPDATE SET weight = (edges.weight + excluded.weight) / 2.0,
                       count = edges.count + 1,
                       updated_at = excluded.updated_at",
        params![
            edge.src_kind,
            edge.src_id,
            edge.rel,
            edge.dst_kind,
            edge.dst_id,
            weight,
            now
        ],
    )?;
    conn.query_row(
        "SELECT weight FROM edges
         WHERE src_kind = ?1 AND src_id = ?2 AND rel = ?3 AND dst_kind = ?4 AND dst_id = ?5",
        params![edge.src_kind, edge.src_id, edge.rel, edge.dst_kind, edge.dst_id],
        |row| row.get(0),
    )
}

pub(super) fn set_props(
    conn: &Connection,
    edge: Edge<'_>,
    props: &str,
    now: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO edges (src_kind, src_id, rel, dst_kind, dst_id, props, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT (src_kind, src_id, rel, dst_kind, dst_id)
         DO UPDATE SET props = excluded.props, updated_at = excluded.updated_at",
        params![
            edge.src_kind,
            edge.src_id,
            edge.rel,
            edge.dst_kind,
            edge.dst_id,
            props,
            now
        ],
    )?;
    Ok(())
}

pub(super) fn count(conn: &Connection, edge: Edge<'_>) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT count FROM edges
         WHERE src_kind = ?1 AND src_id = ?2 AND rel = ?3 AND dst_kind = ?4 AND dst_id = ?5",
        params![edge.src_kind, edge.src_id, edge.rel, edge.dst_kind, edge.dst_id],
        |row| row.get(0),
    )
    .optional()
}

/// Remove every edge touching a node.
pub(super) fn detach(conn: &Connection, node_kind: &str, node_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM edges
         WHERE (src_kind = ?1 AND src_id = ?2) OR (dst_kind = ?1 AND dst_id = ?2)",
        params![node_kind, node_id],
    )
}
