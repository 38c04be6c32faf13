//! SQLite access for song catalogs and labeled pairs.
//!
//! Expected schemas:
//!
//! ```sql
//! CREATE TABLE songs (id INTEGER PRIMARY KEY, artist TEXT, title TEXT, isrc TEXT);
//! CREATE TABLE labeled_pairs (
//!     artist_a TEXT, title_a TEXT, artist_b TEXT, title_b TEXT,
//!     is_duplicate INTEGER NOT NULL
//! );
//! ```
//!
//! NULL artist/title columns load as empty strings.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

use crate::models::{LabeledPair, SongIdentity, SongRecord};

/// Open a source database read-only.
pub fn open_source(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch(
        "PRAGMA cache_size = -64000;
         PRAGMA temp_store = MEMORY;",
    )?;
    Ok(conn)
}

pub fn count_songs(conn: &Connection) -> Result<usize> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))
        .context("Failed to count songs")?;
    Ok(count.max(0) as usize)
}

/// Load every song, ordered by id so catalog order is stable.
pub fn load_songs(conn: &Connection) -> Result<Vec<SongRecord>> {
    let mut stmt = conn
        .prepare("SELECT id, artist, title, isrc FROM songs ORDER BY id")
        .context("Failed to query songs table")?;

    let mut songs = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let artist: Option<String> = row.get(1)?;
        let title: Option<String> = row.get(2)?;
        let isrc: Option<String> = row.get(3)?;
        songs.push(SongRecord {
            id: row.get(0)?,
            song: SongIdentity::from_optional(artist.as_deref(), title.as_deref(), isrc.as_deref()),
        });
    }
    Ok(songs)
}

pub fn load_labeled_pairs(conn: &Connection) -> Result<Vec<LabeledPair>> {
    let mut stmt = conn
        .prepare(
            "SELECT artist_a, title_a, artist_b, title_b, is_duplicate
             FROM labeled_pairs",
        )
        .context("Failed to query labeled_pairs table")?;

    let pairs = stmt
        .query_map([], |row| {
            let artist_a: Option<String> = row.get(0)?;
            let title_a: Option<String> = row.get(1)?;
            let artist_b: Option<String> = row.get(2)?;
            let title_b: Option<String> = row.get(3)?;
            let is_duplicate: i64 = row.get(4)?;
            Ok(LabeledPair {
                a: SongIdentity::from_optional(artist_a.as_deref(), title_a.as_deref(), None),
                b: SongIdentity::from_optional(artist_b.as_deref(), title_b.as_deref(), None),
                is_duplicate: is_duplicate != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn catalog_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE songs (id INTEGER PRIMARY KEY, artist TEXT, title TEXT, isrc TEXT);",
        )
        .unwrap();
        let rows: [(i64, Option<&str>, Option<&str>, Option<&str>); 3] = [
            (2, Some("Daft Punk"), Some("One More Time"), Some("GBDUW0000059")),
            (1, Some("Justice"), None, None),
            (3, None, Some("Untitled"), None),
        ];
        for (id, artist, title, isrc) in rows {
            conn.execute(
                "INSERT INTO songs (id, artist, title, isrc) VALUES (?1, ?2, ?3, ?4)",
                params![id, artist, title, isrc],
            )
            .unwrap();
        }
        conn
    }

    #[test]
    fn test_load_songs_orders_and_coerces_nulls() {
        let conn = catalog_db();
        let songs = load_songs(&conn).unwrap();

        assert_eq!(count_songs(&conn).unwrap(), 3);
        assert_eq!(songs.iter().map(|s| s.id).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(songs[0].song.title, "");
        assert_eq!(songs[1].song.external_id.as_deref(), Some("GBDUW0000059"));
        assert_eq!(songs[2].song.artist, "");
    }

    #[test]
    fn test_load_labeled_pairs() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE labeled_pairs (
                artist_a TEXT, title_a TEXT, artist_b TEXT, title_b TEXT,
                is_duplicate INTEGER NOT NULL
             );
             INSERT INTO labeled_pairs VALUES ('Beatles', 'Let It Be', 'The Beatles', 'Let It Be', 1);
             INSERT INTO labeled_pairs VALUES ('Queen', NULL, 'Queen', 'Innuendo', 0);",
        )
        .unwrap();

        let pairs = load_labeled_pairs(&conn).unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].is_duplicate);
        assert!(!pairs[1].is_duplicate);
        assert_eq!(pairs[1].a.title, "");
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = load_songs(&conn).unwrap_err();
        assert!(err.to_string().contains("songs"));
    }
}
