use crate::{StoreError, StoreResult};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use strata_model::Entity;
use strata_types::EntityId;
use tracing::debug;

/// One mutation in a save batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Insert or replace the full entity document.
    Upsert(Entity),
    /// Remove the entity.
    Delete(EntityId),
}

impl Change {
    /// The id the change applies to.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            Change::Upsert(entity) => entity.id,
            Change::Delete(id) => *id,
        }
    }
}

/// The physical store backing a stack's root context.
///
/// A single `entities` table keyed by id; payloads are JSON text. The
/// connection is serialized behind a mutex so ancestor-chain reads from
/// descendant lanes stay safe, but writes only ever arrive from the root
/// context's lane.
pub struct EntityStore {
    conn: Mutex<Connection>,
}

impl EntityStore {
    /// Opens (or creates) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened entity store");
        Self::with_connection(conn)
    }

    /// Opens a store that lives only in memory.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entities (
                 id          TEXT PRIMARY KEY,
                 entity_type TEXT NOT NULL,
                 data        TEXT NOT NULL,
                 created_at  INTEGER NOT NULL,
                 modified_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fetches one entity by id.
    pub fn get(&self, id: &EntityId) -> StoreResult<Option<Entity>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, entity_type, data, created_at, modified_at
                 FROM entities WHERE id = ?1",
                params![id.to_string()],
                row_to_entity,
            )
            .optional()?;
        row.transpose()
    }

    /// Fetches all entities of one type, ordered by id (creation order for
    /// v7 ids).
    pub fn fetch_by_type(&self, entity_type: &str) -> StoreResult<Vec<Entity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, entity_type, data, created_at, modified_at
             FROM entities WHERE entity_type = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![entity_type], row_to_entity)?;
        let mut entities = Vec::new();
        for row in rows {
            entities.push(row??);
        }
        Ok(entities)
    }

    /// Counts entities of one type.
    pub fn count_by_type(&self, entity_type: &str) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE entity_type = ?1",
            params![entity_type],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Applies a batch of changes in one SQLite transaction.
    ///
    /// All-or-nothing: a failed statement rolls the whole batch back and the
    /// caller's pending state stays intact for an explicit retry.
    pub fn apply(&self, changes: &[Change]) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for change in changes {
            match change {
                Change::Upsert(entity) => {
                    tx.execute(
                        "INSERT INTO entities (id, entity_type, data, created_at, modified_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT(id) DO UPDATE SET
                             entity_type = excluded.entity_type,
                             data        = excluded.data,
                             modified_at = excluded.modified_at",
                        params![
                            entity.id.to_string(),
                            entity.entity_type,
                            serde_json::to_string(&entity.data)?,
                            entity.created_at,
                            entity.modified_at,
                        ],
                    )?;
                }
                Change::Delete(id) => {
                    tx.execute(
                        "DELETE FROM entities WHERE id = ?1",
                        params![id.to_string()],
                    )?;
                }
            }
        }
        tx.commit()?;
        debug!(changes = changes.len(), "applied change batch");
        Ok(())
    }
}

fn row_to_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoreResult<Entity>> {
    let id: String = row.get(0)?;
    let entity_type: String = row.get(1)?;
    let data: String = row.get(2)?;
    let created_at: i64 = row.get(3)?;
    let modified_at: i64 = row.get(4)?;

    Ok(decode_entity(id, entity_type, data, created_at, modified_at))
}

fn decode_entity(
    id: String,
    entity_type: String,
    data: String,
    created_at: i64,
    modified_at: i64,
) -> StoreResult<Entity> {
    let id = EntityId::parse(&id).map_err(|e| StoreError::InvalidData(e.to_string()))?;
    Ok(Entity {
        id,
        entity_type,
        data: serde_json::from_str(&data)?,
        created_at,
        modified_at,
    })
}
