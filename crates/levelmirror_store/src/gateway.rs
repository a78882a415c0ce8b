//! SQLite gateway and its transaction handle.

use crate::error::{StoreError, StoreResult};
use crate::relation::Relation;
use crate::schema;
use chrono::NaiveDate;
use levelmirror_model::{CatalogRecord, ExternalId, ScreenImage, ZipFileInfo};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use tracing::{debug, warn};

/// Row ID of a level in the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(pub i64);

const SELECT_RECORD: &str = "
SELECT l.LevelID, l.externalId, l.title, d.value, du.value, c.value, t.value, l.release
FROM Level l
LEFT JOIN Difficulty d ON d.DifficultyID = l.difficulty
LEFT JOIN Duration du ON du.DurationID = l.duration
LEFT JOIN Class c ON c.ClassID = l.class
JOIN Type t ON t.TypeID = l.type";

/// Gateway over one mirror database file.
#[derive(Debug)]
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Opens (creating if needed) the mirror at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening mirror");
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory mirror.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        schema::bootstrap(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns the number of levels in the mirror.
    pub fn record_count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM Level", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Returns page `index` (0-based) of `size` levels, newest first.
    pub fn record_page(&self, index: u32, size: usize) -> StoreResult<Vec<CatalogRecord>> {
        let offset = i64::from(index) * to_i64(size as u64)?;
        let conn = self.conn.lock();
        let keys = {
            let mut stmt = conn.prepare(
                "SELECT LevelID FROM Level
                 ORDER BY release DESC, externalId DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(params![to_i64(size as u64)?, offset], |row| {
                row.get::<_, i64>(0)
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        keys.into_iter()
            .filter_map(|key| load_record(&conn, RecordKey(key)).transpose())
            .collect()
    }

    /// Returns every level, newest first.
    pub fn list_records(&self) -> StoreResult<Vec<CatalogRecord>> {
        let total = self.record_count()?;
        let size = usize::try_from(total).unwrap_or(usize::MAX).max(1);
        self.record_page(0, size)
    }

    /// Loads the level stored under `key`.
    pub fn get_record(&self, key: RecordKey) -> StoreResult<Option<CatalogRecord>> {
        load_record(&self.conn.lock(), key)
    }

    /// Finds a level by external ID.
    pub fn find_record(
        &self,
        external_id: ExternalId,
    ) -> StoreResult<Option<(RecordKey, CatalogRecord)>> {
        find_record(&self.conn.lock(), external_id)
    }

    /// Returns the keys (values or MD5s) related to a level.
    pub fn related_values(&self, key: RecordKey, relation: Relation) -> StoreResult<Vec<String>> {
        related_values(&self.conn.lock(), key, relation)
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&GatewayTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = GatewayTx {
            tx: conn.transaction().map_err(StoreError::from)?,
        };
        match f(&tx) {
            Ok(value) => {
                tx.tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.tx.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// Write access inside one transaction.
pub struct GatewayTx<'conn> {
    tx: Transaction<'conn>,
}

impl GatewayTx<'_> {
    /// Finds a level by external ID.
    pub fn find_record(
        &self,
        external_id: ExternalId,
    ) -> StoreResult<Option<(RecordKey, CatalogRecord)>> {
        find_record(&self.tx, external_id)
    }

    /// Inserts a level with its authors, genres and tags.
    pub fn insert_record(&self, record: &CatalogRecord) -> StoreResult<RecordKey> {
        let (difficulty, duration, class, kind) = self.attribute_ids(record)?;
        self.tx.execute(
            "INSERT INTO Level (externalId, title, difficulty, duration, class, type, release)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                to_i64(record.external_id.get())?,
                record.title,
                difficulty,
                duration,
                class,
                kind,
                record.release,
            ],
        )?;
        let key = RecordKey(self.tx.last_insert_rowid());

        for author in &record.authors {
            self.add_relation(key, Relation::Author, author)?;
        }
        for genre in &record.genres {
            self.add_relation(key, Relation::Genre, genre)?;
        }
        for tag in &record.tags {
            self.add_relation(key, Relation::Tag, tag)?;
        }
        debug!(external_id = %record.external_id, key = key.0, "inserted level");
        Ok(key)
    }

    /// Overwrites the single-valued attributes of a level.
    ///
    /// Related collections are left alone; diff them with
    /// [`GatewayTx::add_relation`] and [`GatewayTx::remove_relation`].
    pub fn update_record_attributes(
        &self,
        key: RecordKey,
        record: &CatalogRecord,
    ) -> StoreResult<()> {
        let (difficulty, duration, class, kind) = self.attribute_ids(record)?;
        let changed = self.tx.execute(
            "UPDATE Level
             SET title = ?2, difficulty = ?3, duration = ?4, class = ?5, type = ?6, release = ?7
             WHERE LevelID = ?1",
            params![
                key.0,
                record.title,
                difficulty,
                duration,
                class,
                kind,
                record.release
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound {
                external_id: record.external_id.get(),
            });
        }
        Ok(())
    }

    /// Deletes a level, its relation rows and any lookup rows left orphaned.
    ///
    /// Returns false if no level has this external ID.
    pub fn delete_record(&self, external_id: ExternalId) -> StoreResult<bool> {
        let Some((key, _)) = self.find_record(external_id)? else {
            return Ok(false);
        };
        for relation in Relation::ALL {
            for value in self.related_values(key, relation)? {
                self.remove_relation(key, relation, &value)?;
                self.delete_lookup_if_orphaned(relation, &value)?;
            }
        }
        self.tx
            .execute("DELETE FROM Level WHERE LevelID = ?1", [key.0])?;
        debug!(%external_id, key = key.0, "deleted level");
        Ok(true)
    }

    /// Returns the keys (values or MD5s) related to a level.
    pub fn related_values(&self, key: RecordKey, relation: Relation) -> StoreResult<Vec<String>> {
        related_values(&self.tx, key, relation)
    }

    /// Links a level to a related row, creating author/genre/tag rows on demand.
    ///
    /// Zip and screen rows must exist already (see [`GatewayTx::upsert_zip`]).
    pub fn add_relation(&self, key: RecordKey, relation: Relation, value: &str) -> StoreResult<()> {
        let id = if relation.creates_lookup() {
            self.tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} ({}) VALUES (?1)",
                    relation.table(),
                    relation.key_column()
                ),
                [value],
            )?;
            lookup_id(&self.tx, relation, value)?
        } else {
            lookup_id(&self.tx, relation, value)?
        };
        let id = id.ok_or_else(|| StoreError::MissingLookup {
            relation: relation.table(),
            value: value.to_string(),
        })?;
        self.tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {} ({}, levelID) VALUES (?1, ?2)",
                relation.link_table(),
                relation.link_column()
            ),
            params![id, key.0],
        )?;
        Ok(())
    }

    /// Unlinks a level from a related row. The row itself is kept.
    pub fn remove_relation(
        &self,
        key: RecordKey,
        relation: Relation,
        value: &str,
    ) -> StoreResult<()> {
        if let Some(id) = lookup_id(&self.tx, relation, value)? {
            self.tx.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1 AND levelID = ?2",
                    relation.link_table(),
                    relation.link_column()
                ),
                params![id, key.0],
            )?;
        }
        Ok(())
    }

    /// Deletes a lookup row once no level references it.
    ///
    /// Returns true if the row was deleted.
    pub fn delete_lookup_if_orphaned(&self, relation: Relation, value: &str) -> StoreResult<bool> {
        let Some(id) = lookup_id(&self.tx, relation, value)? else {
            return Ok(false);
        };
        let references: i64 = self.tx.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                relation.link_table(),
                relation.link_column()
            ),
            [id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Ok(false);
        }
        self.tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                relation.table(),
                relation.id_column()
            ),
            [id],
        )?;
        debug!(%relation, value, "deleted orphaned lookup row");
        Ok(true)
    }

    /// Inserts or refreshes an archive row, keyed by MD5.
    pub fn upsert_zip(&self, zip: &ZipFileInfo) -> StoreResult<()> {
        self.tx.execute(
            "INSERT INTO Zip (name, size, md5, url, release, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (md5) DO UPDATE SET
                name = excluded.name, size = excluded.size, url = excluded.url,
                release = excluded.release, version = excluded.version",
            params![
                zip.name,
                zip.size_mib,
                zip.md5,
                zip.url,
                zip.release,
                zip.version
            ],
        )?;
        Ok(())
    }

    /// Inserts a screenshot row unless one with the same MD5 exists.
    pub fn upsert_screen(&self, screen: &ScreenImage) -> StoreResult<()> {
        self.tx.execute(
            "INSERT OR IGNORE INTO Picture (md5, data) VALUES (?1, ?2)",
            params![screen.md5, screen.data],
        )?;
        Ok(())
    }

    fn attribute_ids(
        &self,
        record: &CatalogRecord,
    ) -> StoreResult<(Option<i64>, Option<i64>, Option<i64>, i64)> {
        let difficulty = self.ensure_attribute("Difficulty", record.difficulty.as_deref())?;
        let duration = self.ensure_attribute("Duration", record.duration.as_deref())?;
        let class = self.ensure_attribute("Class", record.class.as_deref())?;
        let kind = self
            .ensure_attribute("Type", Some(&record.kind))?
            .ok_or_else(|| StoreError::InvalidValue {
                message: format!("level {} has no type", record.external_id),
            })?;
        Ok((difficulty, duration, class, kind))
    }

    /// Returns the row ID of a single-valued attribute, creating it on demand.
    fn ensure_attribute(&self, table: &'static str, value: Option<&str>) -> StoreResult<Option<i64>> {
        let Some(value) = value else {
            return Ok(None);
        };
        self.tx.execute(
            &format!("INSERT OR IGNORE INTO {table} (value) VALUES (?1)"),
            [value],
        )?;
        let id = self.tx.query_row(
            &format!("SELECT {table}ID FROM {table} WHERE value = ?1"),
            [value],
            |row| row.get(0),
        )?;
        Ok(Some(id))
    }
}

fn to_i64(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidValue {
        message: format!("{value} does not fit in an SQLite integer"),
    })
}

fn lookup_id(conn: &Connection, relation: Relation, value: &str) -> StoreResult<Option<i64>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE {} = ?1",
                relation.id_column(),
                relation.table(),
                relation.key_column()
            ),
            [value],
            |row| row.get(0),
        )
        .optional()?)
}

fn related_values(conn: &Connection, key: RecordKey, relation: Relation) -> StoreResult<Vec<String>> {
    let sql = format!(
        "SELECT t.{key_col} FROM {link} j JOIN {table} t ON t.{id} = j.{link_col}
         WHERE j.levelID = ?1 ORDER BY j.rowid",
        key_col = relation.key_column(),
        link = relation.link_table(),
        table = relation.table(),
        id = relation.id_column(),
        link_col = relation.link_column(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([key.0], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

struct AttributeRow {
    key: RecordKey,
    external_id: i64,
    title: String,
    difficulty: Option<String>,
    duration: Option<String>,
    class: Option<String>,
    kind: String,
    release: NaiveDate,
}

impl AttributeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: RecordKey(row.get(0)?),
            external_id: row.get(1)?,
            title: row.get(2)?,
            difficulty: row.get(3)?,
            duration: row.get(4)?,
            class: row.get(5)?,
            kind: row.get(6)?,
            release: row.get(7)?,
        })
    }
}

fn complete(conn: &Connection, row: AttributeRow) -> StoreResult<(RecordKey, CatalogRecord)> {
    let external_id = u64::try_from(row.external_id).map_err(|_| StoreError::InvalidValue {
        message: format!("negative external id {}", row.external_id),
    })?;
    let mut genres = related_values(conn, row.key, Relation::Genre)?;
    let mut tags = related_values(conn, row.key, Relation::Tag)?;
    genres.sort();
    tags.sort();
    let record = CatalogRecord {
        external_id: ExternalId(external_id),
        title: row.title,
        authors: related_values(conn, row.key, Relation::Author)?,
        difficulty: row.difficulty,
        duration: row.duration,
        class: row.class,
        kind: row.kind,
        release: row.release,
        genres,
        tags,
    };
    Ok((row.key, record))
}

fn load_record(conn: &Connection, key: RecordKey) -> StoreResult<Option<CatalogRecord>> {
    let row = conn
        .query_row(
            &format!("{SELECT_RECORD} WHERE l.LevelID = ?1"),
            [key.0],
            AttributeRow::from_row,
        )
        .optional()?;
    row.map(|row| complete(conn, row).map(|(_, record)| record))
        .transpose()
}

fn find_record(
    conn: &Connection,
    external_id: ExternalId,
) -> StoreResult<Option<(RecordKey, CatalogRecord)>> {
    let row = conn
        .query_row(
            &format!("{SELECT_RECORD} WHERE l.externalId = ?1"),
            [to_i64(external_id.get())?],
            AttributeRow::from_row,
        )
        .optional()?;
    row.map(|row| complete(conn, row)).transpose()
}
