// SQLite persistence for normalized records and lookup tables.
//
// The schema mirrors the record model: one wide table per category group
// keyed by player id (profile holds one row per fanned-out position), plus
// one (id, name) table per lookup dimension. Stat and attribute columns are
// generated from the record types' canonical name lists, so schema, insert
// and query can never disagree about column order.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use rusqlite::{params, params_from_iter, Connection};

use crate::ingest::interner::{Dimension, Interner, LookupOffsets};
use crate::ingest::record::{AttributeSet, PlayerRecord, StatLine};

/// SQLite-backed store for players, their category groups, and the lookup
/// dimensions.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the schema
    /// exists. Pass `":memory:"` for an ephemeral database in tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(&schema_sql())
            .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert one normalized record and its incremental lookup rows in a
    /// single transaction.
    pub fn insert_record(&self, record: &PlayerRecord) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction().context("failed to begin transaction")?;

        for entry in &record.new_lookups {
            tx.execute(
                &format!(
                    "INSERT INTO {} (id, name) VALUES (?1, ?2)",
                    entry.dimension.as_str()
                ),
                params![entry.id, entry.value],
            )
            .with_context(|| format!("failed to insert {} lookup row", entry.dimension))?;
        }

        tx.execute(
            "INSERT INTO player (id, name, uid, season) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.identity.name,
                record.identity.uid,
                record.identity.season
            ],
        )
        .with_context(|| format!("failed to insert player {}", record.identity.name))?;

        for profile in &record.profiles {
            tx.execute(
                "INSERT INTO profile (player_id, position, position_id, age, division_id,
                                      club_id, nat_id, eligible, right_foot, left_foot, mins)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id,
                    profile.position,
                    profile.position_id,
                    profile.age,
                    profile.division,
                    profile.club,
                    profile.nat,
                    profile.eligible,
                    profile.right_foot,
                    profile.left_foot,
                    profile.mins
                ],
            )
            .context("failed to insert profile row")?;
        }

        tx.execute(
            &wide_insert_sql("stats", StatLine::NAMES),
            params_from_iter(
                std::iter::once(rusqlite::types::Value::from(record.id)).chain(
                    record
                        .stats
                        .values()
                        .into_iter()
                        .map(rusqlite::types::Value::from),
                ),
            ),
        )
        .context("failed to insert stats row")?;

        tx.execute(
            &wide_insert_sql("attributes", AttributeSet::NAMES),
            params_from_iter(
                std::iter::once(rusqlite::types::Value::from(record.id)).chain(
                    record
                        .attributes
                        .values()
                        .into_iter()
                        .map(rusqlite::types::Value::from),
                ),
            ),
        )
        .context("failed to insert attributes row")?;

        tx.execute(
            "INSERT INTO contract (player_id, begin_date, expiry_date, extension,
                                   wage, value, release_clause)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.contract.begin_date,
                record.contract.expiry_date,
                record.contract.extension,
                record.contract.wage,
                record.contract.value,
                record.contract.release_clause
            ],
        )
        .context("failed to insert contract row")?;

        tx.execute(
            "INSERT INTO rating (player_id, ca) VALUES (?1, ?2)",
            params![record.id, record.rating.ca],
        )
        .context("failed to insert rating row")?;

        tx.commit().context("failed to commit record")
    }

    /// Highest stored player id plus one, so a merge run can continue the
    /// sequence.
    pub fn next_player_id(&self) -> Result<i64> {
        let conn = self.lock();
        conn.query_row(
            "SELECT COALESCE(MAX(id) + 1, 0) FROM player",
            [],
            |row| row.get(0),
        )
        .context("failed to read next player id")
    }

    /// One-past-the-highest stored id per lookup dimension. Seeding a new
    /// run's interner from these lets independently ingested batches merge
    /// without renumbering anything already persisted.
    pub fn next_lookup_offsets(&self) -> Result<LookupOffsets> {
        let conn = self.lock();
        let next = |dimension: Dimension| -> Result<i64> {
            conn.query_row(
                &format!(
                    "SELECT COALESCE(MAX(id) + 1, 0) FROM {}",
                    dimension.as_str()
                ),
                [],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to read next {dimension} id"))
        };
        Ok(LookupOffsets {
            division: next(Dimension::Division)?,
            club: next(Dimension::Club)?,
            nat: next(Dimension::Nat)?,
        })
    }

    /// Preload every persisted lookup row into an interner, so repeated
    /// values across runs keep their ids. Returns the number of rows
    /// loaded; a conflicting row surfaces the interner's inconsistency
    /// error.
    pub fn load_lookups(&self, interner: &mut Interner) -> Result<usize> {
        let conn = self.lock();
        let mut loaded = 0;
        for dimension in Dimension::ALL {
            let mut stmt = conn
                .prepare(&format!("SELECT id, name FROM {}", dimension.as_str()))
                .with_context(|| format!("failed to query {dimension} lookups"))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
                .with_context(|| format!("failed to read {dimension} lookups"))?;
            for row in rows {
                let (id, name) = row.context("failed to decode lookup row")?;
                interner
                    .preload(dimension, &name, id)
                    .with_context(|| format!("stored {dimension} table is inconsistent"))?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Fetch a comparison population: every player with a profile row at
    /// `position` and at least `min_mins` minutes, with the requested
    /// statistics in the requested order.
    pub fn select_population(
        &self,
        position: &str,
        min_mins: i64,
        stat_names: &[String],
    ) -> Result<Vec<(String, Vec<f64>)>> {
        if stat_names.is_empty() {
            bail!("no statistics requested");
        }
        for name in stat_names {
            // The column list is interpolated into SQL, so it is restricted
            // to the closed set of known stat columns.
            if !StatLine::NAMES.contains(&name.as_str()) {
                bail!("unknown statistic `{name}`");
            }
        }
        let columns: Vec<String> = stat_names.iter().map(|n| format!("s.{n}")).collect();
        let sql = format!(
            "SELECT player.name, {} FROM player
             JOIN stats s ON s.player_id = player.id
             WHERE EXISTS (
                 SELECT 1 FROM profile p
                 WHERE p.player_id = player.id
                   AND p.position = ?1
                   AND p.mins >= ?2
             )
             ORDER BY player.id",
            columns.join(", ")
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql).context("failed to prepare population query")?;
        let rows = stmt
            .query_map(params![position, min_mins], |row| {
                let name: String = row.get(0)?;
                let mut values = Vec::with_capacity(stat_names.len());
                for i in 0..stat_names.len() {
                    values.push(row.get::<_, f64>(i + 1)?);
                }
                Ok((name, values))
            })
            .context("failed to run population query")?;

        let mut population = Vec::new();
        for row in rows {
            population.push(row.context("failed to decode population row")?);
        }
        Ok(population)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

fn wide_columns(names: &[&str], sql_type: &str) -> String {
    names
        .iter()
        .map(|n| format!("{n} {sql_type} NOT NULL"))
        .collect::<Vec<_>>()
        .join(",\n    ")
}

fn wide_insert_sql(table: &str, names: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=names.len() + 1).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {table} (player_id, {}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    )
}

fn schema_sql() -> String {
    format!(
        "
        CREATE TABLE IF NOT EXISTS player (
            id     INTEGER PRIMARY KEY,
            name   TEXT NOT NULL,
            uid    TEXT NOT NULL,
            season INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS division (
            id   INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS club (
            id   INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS nat (
            id   INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS profile (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id   INTEGER NOT NULL REFERENCES player(id),
            position    TEXT NOT NULL,
            position_id INTEGER NOT NULL,
            age         INTEGER NOT NULL,
            division_id INTEGER NOT NULL REFERENCES division(id),
            club_id     INTEGER NOT NULL REFERENCES club(id),
            nat_id      INTEGER NOT NULL REFERENCES nat(id),
            eligible    INTEGER NOT NULL,
            right_foot  INTEGER NOT NULL,
            left_foot   INTEGER NOT NULL,
            mins        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_profile_position ON profile(position, mins);

        CREATE TABLE IF NOT EXISTS stats (
            player_id INTEGER PRIMARY KEY REFERENCES player(id),
            {stats}
        );

        CREATE TABLE IF NOT EXISTS attributes (
            player_id INTEGER PRIMARY KEY REFERENCES player(id),
            {attributes}
        );

        CREATE TABLE IF NOT EXISTS contract (
            player_id      INTEGER PRIMARY KEY REFERENCES player(id),
            begin_date     INTEGER NOT NULL,
            expiry_date    INTEGER NOT NULL,
            extension      INTEGER NOT NULL,
            wage           INTEGER NOT NULL,
            value          INTEGER NOT NULL,
            release_clause INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rating (
            player_id INTEGER PRIMARY KEY REFERENCES player(id),
            ca        INTEGER NOT NULL
        );
        ",
        stats = wide_columns(StatLine::NAMES, "REAL"),
        attributes = wide_columns(AttributeSet::NAMES, "TEXT"),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
