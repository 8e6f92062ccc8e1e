use crate::app_dirs::AppDirs;
use crate::error::StoreError;
use crate::report::{KeyDelta, KeyPerformanceSink, SessionSink, SessionSummary};
use crate::util::mean;
use chrono::{DateTime, Datelike, Days, Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_GOAL_MINUTES: u32 = 30;

/// A persisted session row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub id: i64,
    pub date: NaiveDate,
    pub summary: SessionSummary,
}

/// Rounded averages over the most recent sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AverageMetrics {
    pub avg_wpm: u32,
    pub avg_accuracy: u32,
    pub avg_score: u32,
    pub total_sessions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyProgress {
    pub date: NaiveDate,
    pub avg_wpm: u32,
    pub avg_accuracy: u32,
    pub sessions: u32,
}

/// Running per-key record, merged after every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPerformance {
    pub key: char,
    pub accuracy: u32,
    pub speed: u32,
    pub error_count: u32,
    pub last_practiced: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyGoal {
    pub date: NaiveDate,
    pub target_minutes: u32,
    pub completed_seconds: u32,
    pub achieved: bool,
}

impl DailyGoal {
    pub fn completed_minutes(&self) -> u32 {
        self.completed_seconds / 60
    }

    /// Progress in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.target_minutes == 0 {
            return 1.0;
        }
        (self.completed_seconds as f64 / (self.target_minutes as f64 * 60.0)).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Experience {
    pub daily: u32,
    pub weekly: u32,
    pub total: u32,
}

/// Which counters a reset pass zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetOutcome {
    pub daily: bool,
    pub weekly: bool,
}

/// Local record store for sessions, key performance, daily goals and
/// experience.
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
    goal_minutes: u32,
}

impl StatsDb {
    /// Open (creating if needed) the database at the default location.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("tapwise_stats.db"));
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening stats database");
        let conn = Connection::open(path)?;
        // the report worker and the UI hold separate connections
        conn.busy_timeout(Duration::from_secs(2))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS typing_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                score INTEGER NOT NULL,
                keystrokes INTEGER NOT NULL,
                errors INTEGER NOT NULL,
                selected_keys TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_typing_sessions_date ON typing_sessions(date);

            CREATE TABLE IF NOT EXISTS key_performance (
                key TEXT PRIMARY KEY,
                accuracy INTEGER NOT NULL,
                speed INTEGER NOT NULL,
                error_count INTEGER NOT NULL,
                last_practiced TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_goals (
                date TEXT PRIMARY KEY,
                target_minutes INTEGER NOT NULL,
                completed_seconds INTEGER NOT NULL DEFAULT 0,
                achieved BOOLEAN NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS experience (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                daily INTEGER NOT NULL DEFAULT 0,
                weekly INTEGER NOT NULL DEFAULT 0,
                total INTEGER NOT NULL DEFAULT 0,
                last_daily_reset TEXT,
                last_weekly_reset TEXT
            );
            INSERT OR IGNORE INTO experience (id) VALUES (1);
            "#,
        )?;

        Ok(StatsDb {
            conn,
            goal_minutes: DEFAULT_GOAL_MINUTES,
        })
    }

    /// Target used when a day has no goal row yet.
    pub fn with_goal_minutes(mut self, minutes: u32) -> Self {
        self.goal_minutes = minutes;
        self
    }

    pub fn insert_session(
        &self,
        summary: &SessionSummary,
        date: NaiveDate,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO typing_sessions
            (date, duration_secs, wpm, accuracy, score, keystrokes, errors, selected_keys)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                format_date(date),
                summary.duration_secs,
                summary.wpm,
                summary.accuracy,
                summary.score,
                summary.keystrokes,
                summary.errors,
                summary.selected_keys,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<StoredSession>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, date, duration_secs, wpm, accuracy, score, keystrokes, errors, selected_keys
            FROM typing_sessions
            ORDER BY date DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                SessionSummary {
                    duration_secs: row.get(2)?,
                    wpm: row.get(3)?,
                    accuracy: row.get(4)?,
                    score: row.get(5)?,
                    keystrokes: row.get(6)?,
                    errors: row.get(7)?,
                    selected_keys: row.get(8)?,
                },
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, date, summary) = row?;
            sessions.push(StoredSession {
                id,
                date: parse_date(&date)?,
                summary,
            });
        }
        Ok(sessions)
    }

    pub fn top_speed(&self) -> Result<u32, StoreError> {
        let top: Option<u32> =
            self.conn
                .query_row("SELECT MAX(wpm) FROM typing_sessions", [], |row| row.get(0))?;
        Ok(top.unwrap_or(0))
    }

    pub fn last_speed(&self) -> Result<u32, StoreError> {
        Ok(self
            .recent_sessions(1)?
            .first()
            .map_or(0, |s| s.summary.wpm))
    }

    pub fn session_count(&self) -> Result<u32, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM typing_sessions", [], |row| row.get(0))?)
    }

    /// Averages over the last `limit` sessions.
    pub fn average_metrics(&self, limit: u32) -> Result<AverageMetrics, StoreError> {
        let recent = self.recent_sessions(limit)?;
        let avg = |f: fn(&SessionSummary) -> u32| {
            let values: Vec<f64> = recent.iter().map(|s| f(&s.summary) as f64).collect();
            mean(&values).map_or(0, |m| m.round() as u32)
        };

        Ok(AverageMetrics {
            avg_wpm: avg(|s| s.wpm),
            avg_accuracy: avg(|s| s.accuracy),
            avg_score: avg(|s| s.score),
            total_sessions: self.session_count()?,
        })
    }

    /// Per-day averages for the `days` days up to and including `today`.
    pub fn progress(&self, days: u32, today: NaiveDate) -> Result<Vec<DailyProgress>, StoreError> {
        let start = today
            .checked_sub_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MIN);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, ROUND(AVG(wpm)), ROUND(AVG(accuracy)), COUNT(*)
            FROM typing_sessions
            WHERE date >= ?1 AND date <= ?2
            GROUP BY date
            ORDER BY date
            "#,
        )?;

        let rows = stmt.query_map([format_date(start), format_date(today)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?;

        let mut progress = Vec::new();
        for row in rows {
            let (date, wpm, accuracy, sessions) = row?;
            progress.push(DailyProgress {
                date: parse_date(&date)?,
                avg_wpm: wpm as u32,
                avg_accuracy: accuracy as u32,
                sessions,
            });
        }
        Ok(progress)
    }

    /// Merge one session's result for a key into its running record.
    pub fn update_key_performance(
        &self,
        delta: &KeyDelta,
        wpm: u32,
        today: NaiveDate,
    ) -> Result<KeyPerformance, StoreError> {
        let accuracy = delta.accuracy();
        let merged = match self.key_record(delta.character)? {
            Some(existing) => KeyPerformance {
                key: delta.character,
                accuracy: rounded_mean(existing.accuracy, accuracy),
                speed: rounded_mean(existing.speed, wpm),
                error_count: existing.error_count + delta.incorrect,
                last_practiced: today,
            },
            None => KeyPerformance {
                key: delta.character,
                accuracy,
                speed: wpm,
                error_count: delta.incorrect,
                last_practiced: today,
            },
        };

        self.conn.execute(
            r#"
            INSERT INTO key_performance (key, accuracy, speed, error_count, last_practiced)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(key) DO UPDATE SET
                accuracy = excluded.accuracy,
                speed = excluded.speed,
                error_count = excluded.error_count,
                last_practiced = excluded.last_practiced
            "#,
            params![
                merged.key.to_string(),
                merged.accuracy,
                merged.speed,
                merged.error_count,
                format_date(merged.last_practiced),
            ],
        )?;
        Ok(merged)
    }

    fn key_record(&self, key: char) -> Result<Option<KeyPerformance>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT key, accuracy, speed, error_count, last_practiced FROM key_performance WHERE key = ?1",
                [key.to_string()],
                key_row,
            )
            .optional()?;
        row.map(into_key_performance).transpose()
    }

    /// All keys, sorted by key.
    pub fn key_performance(&self) -> Result<Vec<KeyPerformance>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT key, accuracy, speed, error_count, last_practiced FROM key_performance ORDER BY key",
        )?;
        let rows = stmt.query_map([], key_row)?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(into_key_performance(row?)?);
        }
        Ok(keys)
    }

    /// The `limit` keys with the lowest accuracy, worst first.
    pub fn problem_keys(&self, limit: u32) -> Result<Vec<KeyPerformance>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT key, accuracy, speed, error_count, last_practiced
            FROM key_performance
            ORDER BY accuracy ASC, key ASC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map([limit], key_row)?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(into_key_performance(row?)?);
        }
        Ok(keys)
    }

    /// Records for the given keys only, sorted by key.
    pub fn keys_performance(&self, keys: &[char]) -> Result<Vec<KeyPerformance>, StoreError> {
        Ok(self
            .key_performance()?
            .into_iter()
            .filter(|k| keys.contains(&k.key))
            .collect())
    }

    pub fn goal_for(&self, date: NaiveDate) -> Result<DailyGoal, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT target_minutes, completed_seconds, achieved FROM daily_goals WHERE date = ?1",
                [format_date(date)],
                |row| {
                    Ok(DailyGoal {
                        date,
                        target_minutes: row.get(0)?,
                        completed_seconds: row.get(1)?,
                        achieved: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(row.unwrap_or(DailyGoal {
            date,
            target_minutes: self.goal_minutes,
            completed_seconds: 0,
            achieved: false,
        }))
    }

    fn save_goal(&self, goal: &DailyGoal) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO daily_goals (date, target_minutes, completed_seconds, achieved)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(date) DO UPDATE SET
                target_minutes = excluded.target_minutes,
                completed_seconds = excluded.completed_seconds,
                achieved = excluded.achieved
            "#,
            params![
                format_date(goal.date),
                goal.target_minutes,
                goal.completed_seconds,
                goal.achieved,
            ],
        )?;
        Ok(())
    }

    pub fn set_goal_target(&self, date: NaiveDate, minutes: u32) -> Result<DailyGoal, StoreError> {
        let mut goal = self.goal_for(date)?;
        goal.target_minutes = minutes;
        goal.achieved = goal.completed_minutes() >= goal.target_minutes;
        self.save_goal(&goal)?;
        Ok(goal)
    }

    /// Credit practice time, capped at the day's target.
    pub fn add_practice_seconds(
        &self,
        date: NaiveDate,
        seconds: u32,
    ) -> Result<DailyGoal, StoreError> {
        let mut goal = self.goal_for(date)?;
        let cap = goal.target_minutes.saturating_mul(60);
        goal.completed_seconds = goal.completed_seconds.saturating_add(seconds).min(cap);
        goal.achieved = goal.completed_minutes() >= goal.target_minutes;
        self.save_goal(&goal)?;
        Ok(goal)
    }

    pub fn add_practice_minutes(
        &self,
        date: NaiveDate,
        minutes: u32,
    ) -> Result<DailyGoal, StoreError> {
        self.add_practice_seconds(date, minutes.saturating_mul(60))
    }

    /// Consecutive days with an achieved goal. The run must end today or
    /// yesterday, otherwise the streak is 0.
    pub fn goal_streak(&self, today: NaiveDate) -> Result<u32, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT date FROM daily_goals WHERE achieved = 1 AND date <= ?1 ORDER BY date DESC",
        )?;
        let dates = stmt.query_map([format_date(today)], |row| row.get::<_, String>(0))?;

        let mut streak = 0;
        let mut expected = None;
        for date in dates {
            let date = parse_date(&date?)?;
            match expected {
                None if today.signed_duration_since(date).num_days() > 1 => return Ok(0),
                Some(day) if day != date => break,
                _ => {}
            }
            streak += 1;
            expected = date.pred_opt();
        }
        Ok(streak)
    }

    pub fn experience(&self) -> Result<Experience, StoreError> {
        Ok(self.conn.query_row(
            "SELECT daily, weekly, total FROM experience WHERE id = 1",
            [],
            |row| {
                Ok(Experience {
                    daily: row.get(0)?,
                    weekly: row.get(1)?,
                    total: row.get(2)?,
                })
            },
        )?)
    }

    pub fn add_experience(&self, points: u32) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE experience SET daily = daily + ?1, weekly = weekly + ?1, total = total + ?1 WHERE id = 1",
            [points],
        )?;
        Ok(())
    }

    /// Zero daily experience once per day and weekly experience once per week
    /// (weeks start on Sunday). Safe to call at every startup.
    pub fn apply_due_resets(&self, now: DateTime<Local>) -> Result<ResetOutcome, StoreError> {
        let today = now.date_naive();
        let week_start = today
            .checked_sub_days(Days::new(today.weekday().num_days_from_sunday() as u64))
            .unwrap_or(today);

        let (last_daily, last_weekly): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT last_daily_reset, last_weekly_reset FROM experience WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let last_daily = last_daily.as_deref().map(parse_date).transpose()?;
        let last_weekly = last_weekly.as_deref().map(parse_date).transpose()?;

        let outcome = ResetOutcome {
            daily: last_daily.map_or(true, |d| d < today),
            weekly: last_weekly.map_or(true, |d| d < week_start),
        };

        if outcome.daily {
            self.conn.execute(
                "UPDATE experience SET daily = 0, last_daily_reset = ?1 WHERE id = 1",
                [format_date(today)],
            )?;
        }
        if outcome.weekly {
            self.conn.execute(
                "UPDATE experience SET weekly = 0, last_weekly_reset = ?1 WHERE id = 1",
                [format_date(today)],
            )?;
        }
        if outcome.daily || outcome.weekly {
            info!(daily = outcome.daily, weekly = outcome.weekly, "experience reset");
        }
        Ok(outcome)
    }
}

impl SessionSink for StatsDb {
    fn record_session(&mut self, summary: &SessionSummary) -> Result<(), StoreError> {
        let now = Local::now();
        let today = now.date_naive();
        // all or nothing: a session row always carries its experience and goal credit
        let tx = self.conn.unchecked_transaction()?;
        self.apply_due_resets(now)?;
        self.insert_session(summary, today)?;
        self.add_experience(summary.score)?;
        self.add_practice_seconds(today, summary.duration_secs)?;
        tx.commit()?;
        Ok(())
    }
}

impl KeyPerformanceSink for StatsDb {
    fn record_key_delta(&mut self, delta: &KeyDelta, wpm: u32) -> Result<(), StoreError> {
        self.update_key_performance(delta, wpm, Local::now().date_naive())?;
        Ok(())
    }
}

type KeyRow = (String, u32, u32, u32, String);

fn key_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KeyRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_key_performance(row: KeyRow) -> Result<KeyPerformance, StoreError> {
    let (key, accuracy, speed, error_count, last_practiced) = row;
    Ok(KeyPerformance {
        key: key.chars().next().unwrap_or('\0'),
        accuracy,
        speed,
        error_count,
        last_practiced: parse_date(&last_practiced)?,
    })
}

fn rounded_mean(a: u32, b: u32) -> u32 {
    ((a as f64 + b as f64) / 2.0).round() as u32
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| StoreError::BadDate(s.to_string()))
}
