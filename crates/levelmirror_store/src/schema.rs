//! Schema bootstrap.

use crate::error::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

/// Schema version written to the `Version` row.
pub const SCHEMA_VERSION: &str = "0.3.0";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS Difficulty (
    DifficultyID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    value TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS Duration (
    DurationID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    value TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS Class (
    ClassID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    value TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS Type (
    TypeID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    value TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS Level (
    LevelID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    externalId INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL,
    difficulty INTEGER REFERENCES Difficulty(DifficultyID),
    duration INTEGER REFERENCES Duration(DurationID),
    class INTEGER REFERENCES Class(ClassID),
    type INTEGER NOT NULL REFERENCES Type(TypeID),
    release DATE NOT NULL
);
CREATE INDEX IF NOT EXISTS LevelByRelease ON Level (release DESC, externalId DESC);

CREATE TABLE IF NOT EXISTS Author (
    AuthorID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    value TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS AuthorList (
    authorID INTEGER NOT NULL REFERENCES Author(AuthorID),
    levelID INTEGER NOT NULL REFERENCES Level(LevelID),
    PRIMARY KEY (authorID, levelID)
);

CREATE TABLE IF NOT EXISTS Genre (
    GenreID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    value TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS GenreList (
    genreID INTEGER NOT NULL REFERENCES Genre(GenreID),
    levelID INTEGER NOT NULL REFERENCES Level(LevelID),
    PRIMARY KEY (genreID, levelID)
);

CREATE TABLE IF NOT EXISTS Tag (
    TagID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    value TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS TagList (
    tagID INTEGER NOT NULL REFERENCES Tag(TagID),
    levelID INTEGER NOT NULL REFERENCES Level(LevelID),
    PRIMARY KEY (tagID, levelID)
);

CREATE TABLE IF NOT EXISTS Zip (
    ZipID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL,
    size REAL NOT NULL,
    md5 TEXT NOT NULL UNIQUE,
    url TEXT,
    release DATE,
    version TEXT
);
CREATE TABLE IF NOT EXISTS ZipList (
    zipID INTEGER NOT NULL REFERENCES Zip(ZipID),
    levelID INTEGER NOT NULL REFERENCES Level(LevelID),
    PRIMARY KEY (zipID, levelID)
);

CREATE TABLE IF NOT EXISTS Picture (
    PictureID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    md5 TEXT NOT NULL UNIQUE,
    data BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS Screens (
    pictureID INTEGER NOT NULL REFERENCES Picture(PictureID),
    levelID INTEGER NOT NULL REFERENCES Level(LevelID),
    PRIMARY KEY (pictureID, levelID)
);
";

/// Creates missing tables and checks the version row.
pub(crate) fn bootstrap(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;

    let found: Option<String> = conn
        .query_row("SELECT value FROM Version WHERE id = 1", [], |row| row.get(0))
        .optional()?;
    match found {
        None => {
            conn.execute(
                "INSERT INTO Version (id, value) VALUES (1, ?1)",
                [SCHEMA_VERSION],
            )?;
            info!(version = SCHEMA_VERSION, "created mirror schema");
            Ok(())
        }
        Some(found) if found == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(StoreError::SchemaVersion {
            expected: SCHEMA_VERSION,
            found,
        }),
    }
}
