//! SQLite challenge/trade store adapter.
//!
//! Holds the `challenge_plans`, `challenges` and `trades` tables. The trade
//! log is append-only; the insert feed is a rowid cursor, so a subscriber
//! only ever sees trades inserted after it subscribed.

use crate::domain::challenge::{Challenge, ChallengePlan, ChallengeStatus};
use crate::domain::error::PropdeskError;
use crate::domain::trade::{Side, TradeRecord};
use crate::ports::challenge_port::ChallengeStorePort;
use crate::ports::trade_store_port::{NewTrade, TradeFeed, TradeStorePort};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};

fn pool_err(e: r2d2::Error) -> PropdeskError {
    PropdeskError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PropdeskError {
    PropdeskError::DatabaseQuery {
        reason: e.to_string(),
    }
}

pub struct SqliteStoreAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStoreAdapter {
    pub fn from_path(path: &str) -> Result<Self, PropdeskError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(4).build(manager).map_err(pool_err)?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory store, for tests and dry runs.
    pub fn in_memory() -> Result<Self, PropdeskError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS challenge_plans (
                name TEXT PRIMARY KEY,
                account_size REAL NOT NULL,
                daily_loss_limit REAL NOT NULL,
                max_loss_limit REAL NOT NULL,
                profit_target_phase1 REAL NOT NULL,
                profit_target_phase2 REAL NOT NULL,
                profit_split REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS challenges (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                phase INTEGER NOT NULL,
                starting_balance REAL NOT NULL,
                current_balance REAL NOT NULL,
                highest_balance REAL NOT NULL,
                total_profit REAL NOT NULL,
                total_loss REAL NOT NULL,
                daily_loss REAL NOT NULL,
                trading_days INTEGER NOT NULL,
                plan_name TEXT NOT NULL REFERENCES challenge_plans(name)
            );
            CREATE INDEX IF NOT EXISTS idx_challenges_user ON challenges(user_id, status);
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                challenge_id TEXT NOT NULL REFERENCES challenges(id),
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity REAL NOT NULL,
                entry_price REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_challenge ON trades(challenge_id, id);",
        )
        .map_err(query_err)?;
        Ok(())
    }

    /// Seed the standard plan tiers. Existing rows are left untouched.
    pub fn seed_default_plans(&self) -> Result<(), PropdeskError> {
        let plans = [
            ("Starter", 10_000.0, 5.0, 10.0, 8.0, 5.0, 80.0),
            ("Advanced", 50_000.0, 5.0, 10.0, 8.0, 5.0, 85.0),
            ("Professional", 100_000.0, 5.0, 12.0, 10.0, 5.0, 90.0),
        ];
        let conn = self.pool.get().map_err(pool_err)?;
        for (name, size, daily, max, p1, p2, split) in plans {
            conn.execute(
                "INSERT OR IGNORE INTO challenge_plans
                 (name, account_size, daily_loss_limit, max_loss_limit,
                  profit_target_phase1, profit_target_phase2, profit_split)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![name, size, daily, max, p1, p2, split],
            )
            .map_err(query_err)?;
        }
        Ok(())
    }

    /// Open a fresh challenge on a plan, funded at the plan's account size.
    pub fn create_challenge(
        &self,
        user_id: &str,
        plan_name: &str,
    ) -> Result<Challenge, PropdeskError> {
        let plan = self
            .find_plan(plan_name)?
            .ok_or_else(|| PropdeskError::Database {
                reason: format!("no such plan: {plan_name}"),
            })?;
        let id = format!("ch-{}-{}", user_id, Utc::now().timestamp_millis());
        let challenge = Challenge {
            id: id.clone(),
            user_id: user_id.to_string(),
            status: ChallengeStatus::Active,
            phase: 1,
            starting_balance: plan.account_size,
            current_balance: plan.account_size,
            highest_balance: plan.account_size,
            total_profit: 0.0,
            total_loss: 0.0,
            daily_loss: 0.0,
            trading_days: 0,
            plan,
        };

        let conn = self.pool.get().map_err(pool_err)?;
        conn.execute(
            "INSERT INTO challenges
             (id, user_id, status, phase, starting_balance, current_balance,
              highest_balance, total_profit, total_loss, daily_loss,
              trading_days, plan_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                challenge.id,
                challenge.user_id,
                challenge.status.as_str(),
                challenge.phase,
                challenge.starting_balance,
                challenge.current_balance,
                challenge.highest_balance,
                challenge.total_profit,
                challenge.total_loss,
                challenge.daily_loss,
                challenge.trading_days,
                challenge.plan.name,
            ],
        )
        .map_err(query_err)?;
        Ok(challenge)
    }

    fn find_plan(&self, name: &str) -> Result<Option<ChallengePlan>, PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT name, account_size, daily_loss_limit, max_loss_limit,
                        profit_target_phase1, profit_target_phase2, profit_split
                 FROM challenge_plans WHERE name = ?1",
            )
            .map_err(query_err)?;
        let mut rows = stmt
            .query_map(params![name], plan_from_row)
            .map_err(query_err)?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(query_err)?)),
            None => Ok(None),
        }
    }
}

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<ChallengePlan> {
    Ok(ChallengePlan {
        name: row.get(0)?,
        account_size: row.get(1)?,
        daily_loss_limit: row.get(2)?,
        max_loss_limit: row.get(3)?,
        profit_target_phase1: row.get(4)?,
        profit_target_phase2: row.get(5)?,
        profit_split: row.get(6)?,
    })
}

fn timestamp_from_text(text: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                text.len(),
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<TradeRecord> {
    let side_text: String = row.get(3)?;
    let side = Side::parse(&side_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            side_text.len(),
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::other(e.to_string())),
        )
    })?;
    let created_text: String = row.get(6)?;
    Ok(TradeRecord {
        id: row.get(0)?,
        challenge_id: row.get(1)?,
        symbol: row.get(2)?,
        side,
        quantity: row.get(4)?,
        entry_price: row.get(5)?,
        created_at: timestamp_from_text(created_text)?,
    })
}

impl TradeStorePort for SqliteStoreAdapter {
    fn insert_trade(&self, trade: &NewTrade) -> Result<TradeRecord, PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        conn.execute(
            "INSERT INTO trades
             (challenge_id, symbol, side, quantity, entry_price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trade.challenge_id,
                trade.symbol,
                trade.side.as_str(),
                trade.quantity,
                trade.entry_price,
                trade.created_at.to_rfc3339(),
            ],
        )
        .map_err(query_err)?;
        let id = conn.last_insert_rowid();
        Ok(TradeRecord {
            id,
            challenge_id: trade.challenge_id.clone(),
            symbol: trade.symbol.clone(),
            side: trade.side,
            quantity: trade.quantity,
            entry_price: trade.entry_price,
            created_at: trade.created_at,
        })
    }

    fn list_trades(&self, challenge_id: &str) -> Result<Vec<TradeRecord>, PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, challenge_id, symbol, side, quantity, entry_price, created_at
                 FROM trades WHERE challenge_id = ?1 ORDER BY id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![challenge_id], trade_from_row)
            .map_err(query_err)?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row.map_err(query_err)?);
        }
        Ok(trades)
    }

    fn count_trades(&self, challenge_id: &str) -> Result<u64, PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        conn.query_row(
            "SELECT COUNT(*) FROM trades WHERE challenge_id = ?1",
            params![challenge_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u64)
        .map_err(query_err)
    }

    fn subscribe(&self, challenge_id: &str) -> Result<Box<dyn TradeFeed>, PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let cursor: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(id), 0) FROM trades WHERE challenge_id = ?1",
                params![challenge_id],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        Ok(Box::new(SqliteTradeFeed {
            pool: self.pool.clone(),
            challenge_id: challenge_id.to_string(),
            cursor,
        }))
    }
}

/// Rowid-cursor feed over the `trades` table.
struct SqliteTradeFeed {
    pool: Pool<SqliteConnectionManager>,
    challenge_id: String,
    cursor: i64,
}

impl TradeFeed for SqliteTradeFeed {
    fn poll(&mut self) -> Result<Vec<TradeRecord>, PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, challenge_id, symbol, side, quantity, entry_price, created_at
                 FROM trades WHERE challenge_id = ?1 AND id > ?2 ORDER BY id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![self.challenge_id, self.cursor], trade_from_row)
            .map_err(query_err)?;

        let mut trades = Vec::new();
        for row in rows {
            let trade = row.map_err(query_err)?;
            self.cursor = trade.id;
            trades.push(trade);
        }
        Ok(trades)
    }
}

impl ChallengeStorePort for SqliteStoreAdapter {
    fn active_challenge(&self, user_id: &str) -> Result<Option<Challenge>, PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.user_id, c.status, c.phase, c.starting_balance,
                        c.current_balance, c.highest_balance, c.total_profit,
                        c.total_loss, c.daily_loss, c.trading_days,
                        p.name, p.account_size, p.daily_loss_limit, p.max_loss_limit,
                        p.profit_target_phase1, p.profit_target_phase2, p.profit_split
                 FROM challenges c JOIN challenge_plans p ON p.name = c.plan_name
                 WHERE c.user_id = ?1 AND c.status = 'active'
                 ORDER BY c.rowid DESC LIMIT 1",
            )
            .map_err(query_err)?;

        let mut rows = stmt
            .query_map(params![user_id], |row| {
                let status_text: String = row.get(2)?;
                let status = ChallengeStatus::parse(&status_text).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        status_text.len(),
                        rusqlite::types::Type::Text,
                        Box::new(std::io::Error::other(e.to_string())),
                    )
                })?;
                Ok(Challenge {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    status,
                    phase: row.get::<_, i64>(3)? as u8,
                    starting_balance: row.get(4)?,
                    current_balance: row.get(5)?,
                    highest_balance: row.get(6)?,
                    total_profit: row.get(7)?,
                    total_loss: row.get(8)?,
                    daily_loss: row.get(9)?,
                    trading_days: row.get::<_, i64>(10)? as u32,
                    plan: ChallengePlan {
                        name: row.get(11)?,
                        account_size: row.get(12)?,
                        daily_loss_limit: row.get(13)?,
                        max_loss_limit: row.get(14)?,
                        profit_target_phase1: row.get(15)?,
                        profit_target_phase2: row.get(16)?,
                        profit_split: row.get(17)?,
                    },
                })
            })
            .map_err(query_err)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(query_err)?)),
            None => Ok(None),
        }
    }

    fn update_challenge(&self, challenge: &Challenge) -> Result<(), PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let updated = conn
            .execute(
                "UPDATE challenges SET
                    status = ?2, phase = ?3, current_balance = ?4,
                    highest_balance = ?5, total_profit = ?6, total_loss = ?7,
                    daily_loss = ?8, trading_days = ?9
                 WHERE id = ?1",
                params![
                    challenge.id,
                    challenge.status.as_str(),
                    challenge.phase,
                    challenge.current_balance,
                    challenge.highest_balance,
                    challenge.total_profit,
                    challenge.total_loss,
                    challenge.daily_loss,
                    challenge.trading_days,
                ],
            )
            .map_err(query_err)?;
        if updated == 0 {
            return Err(PropdeskError::DatabaseQuery {
                reason: format!("no challenge with id {}", challenge.id),
            });
        }
        Ok(())
    }

    fn list_plans(&self) -> Result<Vec<ChallengePlan>, PropdeskError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT name, account_size, daily_loss_limit, max_loss_limit,
                        profit_target_phase1, profit_target_phase2, profit_split
                 FROM challenge_plans ORDER BY account_size ASC",
            )
            .map_err(query_err)?;
        let rows = stmt.query_map([], plan_from_row).map_err(query_err)?;

        let mut plans = Vec::new();
        for row in rows {
            plans.push(row.map_err(query_err)?);
        }
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStoreAdapter {
        let store = SqliteStoreAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store.seed_default_plans().unwrap();
        store
    }

    fn new_trade(challenge_id: &str, symbol: &str, side: Side, quantity: f64) -> NewTrade {
        NewTrade {
            challenge_id: challenge_id.into(),
            symbol: symbol.into(),
            side,
            quantity,
            entry_price: 100.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn schema_init_is_idempotent() {
        let store = store();
        store.initialize_schema().unwrap();
        store.seed_default_plans().unwrap();
        assert_eq!(store.list_plans().unwrap().len(), 3);
    }

    #[test]
    fn plans_ordered_by_account_size() {
        let names: Vec<String> = store()
            .list_plans()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Starter", "Advanced", "Professional"]);
    }

    #[test]
    fn create_and_fetch_active_challenge() {
        let store = store();
        let created = store.create_challenge("user-1", "Starter").unwrap();
        assert_eq!(created.status, ChallengeStatus::Active);
        assert_eq!(created.starting_balance, 10_000.0);

        let active = store.active_challenge("user-1").unwrap().unwrap();
        assert_eq!(active, created);
        assert!(store.active_challenge("someone-else").unwrap().is_none());
    }

    #[test]
    fn create_challenge_unknown_plan_fails() {
        let err = store().create_challenge("user-1", "Whale").unwrap_err();
        assert!(err.to_string().contains("no such plan"));
    }

    #[test]
    fn update_challenge_persists_balances() {
        let store = store();
        let mut challenge = store.create_challenge("user-1", "Starter").unwrap();
        challenge.current_balance = 9_500.0;
        challenge.total_loss = 500.0;
        challenge.daily_loss = 5.0;
        challenge.trading_days = 3;
        store.update_challenge(&challenge).unwrap();

        let reloaded = store.active_challenge("user-1").unwrap().unwrap();
        assert_eq!(reloaded.current_balance, 9_500.0);
        assert_eq!(reloaded.trading_days, 3);
    }

    #[test]
    fn update_unknown_challenge_fails() {
        let store = store();
        let mut challenge = store.create_challenge("user-1", "Starter").unwrap();
        challenge.id = "ch-ghost".into();
        assert!(store.update_challenge(&challenge).is_err());
    }

    #[test]
    fn trades_round_trip_oldest_first() {
        let store = store();
        let challenge = store.create_challenge("user-1", "Starter").unwrap();
        store
            .insert_trade(&new_trade(&challenge.id, "AAPL", Side::Buy, 10.0))
            .unwrap();
        store
            .insert_trade(&new_trade(&challenge.id, "AAPL", Side::Sell, 4.0))
            .unwrap();

        let trades = store.list_trades(&challenge.id).unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades[0].id < trades[1].id);
        assert_eq!(trades[0].side, Side::Buy);
        assert_eq!(trades[1].side, Side::Sell);
        assert_eq!(store.count_trades(&challenge.id).unwrap(), 2);
    }

    #[test]
    fn feed_sees_only_inserts_after_subscribe() {
        let store = store();
        let challenge = store.create_challenge("user-1", "Starter").unwrap();
        store
            .insert_trade(&new_trade(&challenge.id, "AAPL", Side::Buy, 10.0))
            .unwrap();

        let mut feed = store.subscribe(&challenge.id).unwrap();
        assert!(feed.poll().unwrap().is_empty());

        store
            .insert_trade(&new_trade(&challenge.id, "TSLA", Side::Buy, 2.0))
            .unwrap();
        let batch = feed.poll().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].symbol, "TSLA");

        // Cursor advances; nothing is delivered twice.
        assert!(feed.poll().unwrap().is_empty());
    }

    #[test]
    fn feed_is_scoped_to_its_challenge() {
        let store = store();
        let mine = store.create_challenge("user-1", "Starter").unwrap();
        let other = store.create_challenge("user-2", "Advanced").unwrap();

        let mut feed = store.subscribe(&mine.id).unwrap();
        store
            .insert_trade(&new_trade(&other.id, "TSLA", Side::Buy, 2.0))
            .unwrap();
        assert!(feed.poll().unwrap().is_empty());
    }
}
