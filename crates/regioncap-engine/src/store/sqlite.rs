//! `SQLite`-backed aggregation store.
//!
//! Every write appends one row to `placement_events` and adjusts the derived
//! counter tables inside the same transaction, so the log and the counters
//! commit together or not at all. Counters never go below zero.

// SQLite hands back i64 for ids, counts and timestamps; all of ours are
// non-negative, so conversions saturate instead of failing.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use regioncap_core::event::now_ms;
use regioncap_core::{EventAction, ObjectKind, PlacementEvent, RegionKey};

use super::error::StoreError;
use super::records::{zeroed, ActorCounters, GlobalStatistics, KindTotals, RegionCount};
use crate::config::StorageSection;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Upper bound on hotspot rows returned by one query.
pub const MAX_TOP_REGIONS: usize = 50;

/// Upper bound on history rows returned by one query.
pub const MAX_HISTORY: usize = 500;

/// Upper bound on actors returned by one listing.
pub const MAX_ACTORS: usize = 500;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Writer connection plus, for file-backed stores, a read-only connection.
///
/// Statistics reads go through the reader, so a slow admin query never holds
/// the connection that admissions are recorded on. In-memory stores cannot
/// share the database across connections and read through the writer.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
    path: Option<PathBuf>,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Opens or creates a store at `path` in WAL mode.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let writer = Connection::open(path)?;
        Self::initialize_connection(&writer, busy_timeout)?;

        let reader = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        reader.busy_timeout(busy_timeout)?;

        tracing::info!(path = %path.display(), "aggregation store opened");
        Ok(Self {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
            path: Some(path.to_path_buf()),
            busy_timeout,
        })
    }

    pub fn from_config(cfg: &StorageSection) -> Result<Self, StoreError> {
        Self::open(&cfg.path, Duration::from_millis(cfg.busy_timeout_ms))
    }

    /// In-memory store for tests and dry runs.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn, DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self {
            writer: Mutex::new(conn),
            reader: None,
            path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    fn initialize_connection(conn: &Connection, busy_timeout: Duration) -> Result<(), StoreError> {
        conn.busy_timeout(busy_timeout)?;
        // in-memory databases answer "memory"; either is fine
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether reads use their own connection.
    pub fn has_reader(&self) -> bool {
        self.reader.is_some()
    }

    /// Run `f` with the writer, waiting at most `busy_timeout` for it.
    ///
    /// Blocks the calling thread; async callers go through `spawn_blocking`.
    fn with_conn<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        lock_bounded(&self.writer, op, self.busy_timeout, f)
    }

    /// Run a read-only query on the reader, or on the writer when there is none.
    fn with_reader<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.reader.as_ref().unwrap_or(&self.writer);
        lock_bounded(conn, op, self.busy_timeout, f)
    }

    /// Append an `Admitted` event and bump the actor, region, and kind counters.
    pub fn record_admission(
        &self,
        actor: &str,
        kind: ObjectKind,
        region: &RegionKey,
    ) -> Result<u64, StoreError> {
        self.record(actor, kind, region, EventAction::Admitted, now_ms())
    }

    /// Append a `Removed` event and decrement the counters, floored at zero.
    pub fn record_removal(
        &self,
        actor: &str,
        kind: ObjectKind,
        region: &RegionKey,
    ) -> Result<u64, StoreError> {
        self.record(actor, kind, region, EventAction::Removed, now_ms())
    }

    /// Append one event with an explicit timestamp. Returns its sequence id.
    pub fn record(
        &self,
        actor: &str,
        kind: ObjectKind,
        region: &RegionKey,
        action: EventAction,
        timestamp_ms: u64,
    ) -> Result<u64, StoreError> {
        let ts = to_sql_i64(timestamp_ms);
        let delta = action.delta();
        let (admitted, removed) = match action {
            EventAction::Admitted => (1i64, 0i64),
            EventAction::Removed => (0, 1),
        };

        self.with_conn("record", |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO placement_events (timestamp_ms, actor_id, kind, realm, region_x, region_z, action)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ts,
                    actor,
                    kind.as_str(),
                    region.realm,
                    region.x,
                    region.z,
                    action.as_str(),
                ],
            )?;
            let seq = from_sql_i64(tx.last_insert_rowid());

            tx.execute(
                "INSERT INTO actors (actor_id, first_event_ms, last_event_ms) VALUES (?1, ?2, ?2)
                 ON CONFLICT (actor_id) DO UPDATE SET last_event_ms = MAX(last_event_ms, excluded.last_event_ms)",
                params![actor, ts],
            )?;

            tx.execute(
                "INSERT INTO actor_counters (actor_id, kind, count) VALUES (?1, ?2, MAX(?3, 0))
                 ON CONFLICT (actor_id, kind) DO UPDATE SET count = MAX(count + ?3, 0)",
                params![actor, kind.as_str(), delta],
            )?;

            tx.execute(
                "INSERT INTO region_counters (realm, region_x, region_z, kind, count) VALUES (?1, ?2, ?3, ?4, MAX(?5, 0))
                 ON CONFLICT (realm, region_x, region_z, kind) DO UPDATE SET count = MAX(count + ?5, 0)",
                params![region.realm, region.x, region.z, kind.as_str(), delta],
            )?;

            tx.execute(
                "INSERT INTO kind_totals (kind, admitted, removed) VALUES (?1, ?2, ?3)
                 ON CONFLICT (kind) DO UPDATE SET admitted = admitted + ?2, removed = removed + ?3",
                params![kind.as_str(), admitted, removed],
            )?;

            tx.commit()?;
            Ok(seq)
        })
    }

    /// Counters for one actor; `None` when the actor has no recorded events.
    pub fn actor_statistics(&self, actor: &str) -> Result<Option<ActorCounters>, StoreError> {
        self.with_reader("actor_statistics", |conn| {
            let times = conn
                .query_row(
                    "SELECT first_event_ms, last_event_ms FROM actors WHERE actor_id = ?1",
                    params![actor],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            let Some((first, last)) = times else {
                return Ok(None);
            };

            let mut counts = zeroed::<u64>();
            let mut stmt =
                conn.prepare("SELECT kind, count FROM actor_counters WHERE actor_id = ?1")?;
            let rows = stmt.query_map(params![actor], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (kind, count) = row?;
                counts.insert(parse_kind(&kind)?, from_sql_i64(count));
            }

            Ok(Some(ActorCounters {
                actor: actor.to_string(),
                counts,
                first_event_ms: from_sql_i64(first),
                last_event_ms: from_sql_i64(last),
            }))
        })
    }

    /// Known actors, most recently active first, at most `limit` of them
    /// (clamped to [`MAX_ACTORS`]).
    pub fn all_actor_statistics(&self, limit: usize) -> Result<Vec<ActorCounters>, StoreError> {
        let limit = to_sql_i64(limit.min(MAX_ACTORS) as u64);
        self.with_reader("all_actor_statistics", |conn| {
            // one pass: rows arrive grouped by actor in page order
            let mut stmt = conn.prepare(
                "SELECT a.actor_id, a.first_event_ms, a.last_event_ms, c.kind, c.count
                 FROM (SELECT actor_id, first_event_ms, last_event_ms FROM actors
                       ORDER BY last_event_ms DESC, actor_id ASC LIMIT ?1) AS a
                 LEFT JOIN actor_counters AS c ON c.actor_id = a.actor_id
                 ORDER BY a.last_event_ms DESC, a.actor_id ASC",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                ))
            })?;

            let mut out: Vec<ActorCounters> = Vec::new();
            for row in rows {
                let (actor, first, last, kind, count) = row?;
                if out.last().map_or(true, |a| a.actor != actor) {
                    out.push(ActorCounters {
                        actor,
                        counts: zeroed(),
                        first_event_ms: from_sql_i64(first),
                        last_event_ms: from_sql_i64(last),
                    });
                }
                if let (Some(kind), Some(count), Some(entry)) = (kind, count, out.last_mut()) {
                    entry.counts.insert(parse_kind(&kind)?, from_sql_i64(count));
                }
            }
            Ok(out)
        })
    }

    pub fn global_statistics(&self) -> Result<GlobalStatistics, StoreError> {
        self.with_reader("global_statistics", |conn| {
            let total_events: i64 =
                conn.query_row("SELECT COUNT(*) FROM placement_events", [], |row| row.get(0))?;
            let total_actors: i64 =
                conn.query_row("SELECT COUNT(*) FROM actors", [], |row| row.get(0))?;

            let mut per_kind = zeroed::<KindTotals>();
            let mut stmt = conn.prepare("SELECT kind, admitted, removed FROM kind_totals")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;
            for row in rows {
                let (kind, admitted, removed) = row?;
                per_kind.insert(
                    parse_kind(&kind)?,
                    KindTotals {
                        admitted: from_sql_i64(admitted),
                        removed: from_sql_i64(removed),
                    },
                );
            }

            Ok(GlobalStatistics {
                total_events: from_sql_i64(total_events),
                total_distinct_actors: from_sql_i64(total_actors),
                per_kind,
            })
        })
    }

    /// Regions of `realm` ranked by tracked occupancy, descending; ties go to
    /// the lower (x, z). `kind = None` sums every kind. Zero rows are skipped
    /// and `limit` is clamped to [`MAX_TOP_REGIONS`].
    pub fn top_regions(
        &self,
        realm: &str,
        kind: Option<ObjectKind>,
        limit: usize,
    ) -> Result<Vec<RegionCount>, StoreError> {
        let limit = limit.min(MAX_TOP_REGIONS);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let kind = kind.map(ObjectKind::as_str);

        self.with_reader("top_regions", |conn| {
            let mut stmt = conn.prepare(
                "SELECT region_x, region_z, SUM(count) AS total FROM region_counters
                 WHERE realm = ?1 AND (?2 IS NULL OR kind = ?2)
                 GROUP BY region_x, region_z
                 HAVING total > 0
                 ORDER BY total DESC, region_x ASC, region_z ASC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![realm, kind, to_sql_i64(limit as u64)], |row| {
                Ok(RegionCount {
                    region: RegionKey::new(realm, row.get(0)?, row.get(1)?),
                    count: from_sql_i64(row.get(2)?),
                })
            })?;
            let ranked = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(ranked)
        })
    }

    /// Tracked occupancy of one region (`kind = None` sums every kind).
    pub fn region_occupancy(
        &self,
        region: &RegionKey,
        kind: Option<ObjectKind>,
    ) -> Result<u64, StoreError> {
        let kind = kind.map(ObjectKind::as_str);
        self.with_reader("region_occupancy", |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(count), 0) FROM region_counters
                 WHERE realm = ?1 AND region_x = ?2 AND region_z = ?3 AND (?4 IS NULL OR kind = ?4)",
                params![region.realm, region.x, region.z, kind],
                |row| row.get(0),
            )?;
            Ok(from_sql_i64(total))
        })
    }

    /// Non-empty region counts inside an inclusive coordinate window.
    pub fn region_counts_within(
        &self,
        realm: &str,
        (min_x, max_x): (i32, i32),
        (min_z, max_z): (i32, i32),
        kind: Option<ObjectKind>,
    ) -> Result<Vec<RegionCount>, StoreError> {
        let kind = kind.map(ObjectKind::as_str);
        self.with_reader("region_counts_within", |conn| {
            let mut stmt = conn.prepare(
                "SELECT region_x, region_z, SUM(count) AS total FROM region_counters
                 WHERE realm = ?1 AND region_x BETWEEN ?2 AND ?3 AND region_z BETWEEN ?4 AND ?5
                   AND (?6 IS NULL OR kind = ?6)
                 GROUP BY region_x, region_z
                 HAVING total > 0",
            )?;
            let rows = stmt.query_map(params![realm, min_x, max_x, min_z, max_z, kind], |row| {
                Ok(RegionCount {
                    region: RegionKey::new(realm, row.get(0)?, row.get(1)?),
                    count: from_sql_i64(row.get(2)?),
                })
            })?;
            let counts = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(counts)
        })
    }

    /// Events recorded by `actor`, newest first.
    pub fn events_by_actor(&self, actor: &str, limit: usize) -> Result<Vec<PlacementEvent>, StoreError> {
        let limit = to_sql_i64(limit.min(MAX_HISTORY) as u64);
        self.with_reader("events_by_actor", |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, timestamp_ms, actor_id, kind, realm, region_x, region_z, action
                 FROM placement_events WHERE actor_id = ?1 ORDER BY seq DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![actor, limit], raw_event)?;
            let events = rows
                .map(|r| r.map_err(StoreError::from).and_then(RawEvent::into_event))
                .collect::<Result<Vec<_>, _>>();
            events
        })
    }

    /// Events recorded in `region`, newest first.
    pub fn events_in_region(
        &self,
        region: &RegionKey,
        limit: usize,
    ) -> Result<Vec<PlacementEvent>, StoreError> {
        let limit = to_sql_i64(limit.min(MAX_HISTORY) as u64);
        self.with_reader("events_in_region", |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, timestamp_ms, actor_id, kind, realm, region_x, region_z, action
                 FROM placement_events WHERE realm = ?1 AND region_x = ?2 AND region_z = ?3
                 ORDER BY seq DESC LIMIT ?4",
            )?;
            let rows = stmt.query_map(params![region.realm, region.x, region.z, limit], raw_event)?;
            let events = rows
                .map(|r| r.map_err(StoreError::from).and_then(RawEvent::into_event))
                .collect::<Result<Vec<_>, _>>();
            events
        })
    }

    /// Admissions of `kind` by `actor` at or after `since_ms`.
    pub fn count_actor_admissions_since(
        &self,
        actor: &str,
        kind: ObjectKind,
        since_ms: u64,
    ) -> Result<u32, StoreError> {
        self.with_reader("count_actor_admissions_since", |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM placement_events
                 WHERE actor_id = ?1 AND kind = ?2 AND action = 'admitted' AND timestamp_ms >= ?3",
                params![actor, kind.as_str(), to_sql_i64(since_ms)],
                |row| row.get(0),
            )?;
            Ok(u32::try_from(n).unwrap_or(u32::MAX))
        })
    }

    /// Clear the log and every derived counter in one transaction.
    pub fn reset_all(&self) -> Result<(), StoreError> {
        self.with_conn("reset_all", |conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM placement_events;
                 DELETE FROM actors;
                 DELETE FROM actor_counters;
                 DELETE FROM region_counters;
                 DELETE FROM kind_totals;",
            )?;
            tx.commit()?;
            Ok(())
        })?;
        tracing::warn!("aggregation store reset: log and counters cleared");
        Ok(())
    }

    /// Housekeeping: refresh planner statistics and checkpoint the WAL.
    pub fn maintain(&self) -> Result<(), StoreError> {
        self.with_conn("maintain", |conn| {
            conn.execute_batch("PRAGMA optimize;")?;
            conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))?;
            Ok(())
        })
    }
}

struct RawEvent {
    seq: i64,
    timestamp_ms: i64,
    actor: String,
    kind: String,
    realm: String,
    x: i32,
    z: i32,
    action: String,
}

impl RawEvent {
    fn into_event(self) -> Result<PlacementEvent, StoreError> {
        let action = self
            .action
            .parse::<EventAction>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(PlacementEvent {
            seq: from_sql_i64(self.seq),
            timestamp_ms: from_sql_i64(self.timestamp_ms),
            actor: self.actor,
            kind: parse_kind(&self.kind)?,
            region: RegionKey::new(self.realm, self.x, self.z),
            action,
        })
    }
}

fn raw_event(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        seq: row.get(0)?,
        timestamp_ms: row.get(1)?,
        actor: row.get(2)?,
        kind: row.get(3)?,
        realm: row.get(4)?,
        x: row.get(5)?,
        z: row.get(6)?,
        action: row.get(7)?,
    })
}

fn lock_bounded<T>(
    conn: &Mutex<Connection>,
    op: &'static str,
    timeout: Duration,
    f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let started = Instant::now();
    loop {
        match conn.try_lock() {
            Ok(mut guard) => return f(&mut guard),
            Err(TryLockError::Poisoned(_)) => return Err(StoreError::Poisoned),
            Err(TryLockError::WouldBlock) => {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(StoreError::Timeout {
                        op,
                        waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    });
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

fn parse_kind(s: &str) -> Result<ObjectKind, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown kind in store: {s}")))
}

fn to_sql_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn from_sql_i64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}
