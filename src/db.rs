//! Query-execution layer shared by the stores.
//!
//! Everything above this module talks to an [`Executor`], which is implemented both by a
//! [`Database`] (each write commits on its own) and by the unit of work returned from
//! [`Database::begin`]. Stores therefore run unchanged inside or outside an atomic scope.
//!
//! [`MemoryDatabase`] is the bundled backend:
//! - committed rows live behind a single reader/writer lock and are only touched briefly,
//! - a [`UnitOfWork`] stages its writes privately and publishes them on [`AtomicScope::commit`],
//! - rows read with [`Executor::fetch_for_update`] or written with [`Executor::update`] are
//!   locked exclusively until the unit of work ends, with waits bounded by the lock timeout.
//!
//! Dropping a unit of work without committing discards its staged writes and releases its
//! row locks. Sequence values handed out to discarded inserts are not reused.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use thiserror::Error;

use crate::config::StoreConfig;
use crate::stores::{Account, TransactionRecord};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("timed out waiting for lock on {table} row {id}")]
    LockTimeout { table: &'static str, id: u64 },
    #[error("no row {id} in {table}")]
    RowNotFound { table: &'static str, id: u64 },
    #[error("backend failure: {0}")]
    Backend(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// A record type with a sequence-assigned primary key.
pub trait Row: Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> u64;

    fn table(tables: &Tables) -> &Table<Self>;

    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
}

#[derive(Debug)]
pub struct Table<R> {
    rows: BTreeMap<u64, R>,
    next_id: u64,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<R> Table<R> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn publish(&mut self, staged: Table<R>) {
        self.rows.extend(staged.rows);
    }
}

/// The schema: one table per row type.
#[derive(Debug, Default)]
pub struct Tables {
    pub(crate) accounts: Table<Account>,
    pub(crate) transactions: Table<TransactionRecord>,
}

impl Tables {
    fn publish(&mut self, staged: Tables) {
        self.accounts.publish(staged.accounts);
        self.transactions.publish(staged.transactions);
    }
}

/// Read and write access to rows, whether or not an atomic scope is open.
pub trait Executor {
    /// Returns the lowest-keyed row matching `filter`.
    fn fetch_one<R: Row>(&self, filter: impl Fn(&R) -> bool) -> DbResult<Option<R>>;

    /// Point read by primary key. Inside a unit of work the row stays locked until the unit
    /// of work ends; outside one this is a plain read.
    fn fetch_for_update<R: Row>(&self, id: u64) -> DbResult<Option<R>>;

    /// Returns every row matching `filter`, ordered by primary key.
    fn fetch_all<R: Row>(&self, filter: impl Fn(&R) -> bool) -> DbResult<Vec<R>>;

    /// Inserts the row built from a freshly generated primary key.
    fn insert<R: Row>(&self, build: impl FnOnce(u64) -> R) -> DbResult<R>;

    fn update<R: Row>(&self, id: u64, mutate: impl FnOnce(&mut R)) -> DbResult<()>;
}

/// An open atomic scope. Dropping it without calling [`AtomicScope::commit`] rolls it back.
pub trait AtomicScope: Executor {
    fn commit(self) -> DbResult<()>;
}

pub trait Database: Executor {
    type Scope<'a>: AtomicScope
    where
        Self: 'a;

    fn begin(&self) -> DbResult<Self::Scope<'_>>;
}

type LockKey = (&'static str, u64);

#[derive(Debug, Default)]
struct LockTable {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl LockTable {
    fn acquire(&self, key: LockKey, timeout: Duration) -> DbResult<()> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        while held.contains(&key) {
            if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(&key) {
                tracing::warn!(table = key.0, id = key.1, ?timeout, "row lock wait timed out");
                return Err(DbError::LockTimeout {
                    table: key.0,
                    id: key.1,
                });
            }
        }
        held.insert(key);
        Ok(())
    }

    fn release(&self, keys: &[LockKey]) {
        if keys.is_empty() {
            return;
        }
        let mut held = self.held.lock();
        for key in keys {
            held.remove(key);
        }
        self.released.notify_all();
    }
}

#[derive(Debug)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
    locks: LockTable,
    lock_timeout: Duration,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

impl MemoryDatabase {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            locks: LockTable::default(),
            lock_timeout,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.lock_timeout())
    }
}

impl Executor for MemoryDatabase {
    fn fetch_one<R: Row>(&self, filter: impl Fn(&R) -> bool) -> DbResult<Option<R>> {
        let tables = self.tables.read();
        Ok(R::table(&tables).rows.values().find(|row| filter(row)).cloned())
    }

    fn fetch_for_update<R: Row>(&self, id: u64) -> DbResult<Option<R>> {
        let tables = self.tables.read();
        Ok(R::table(&tables).rows.get(&id).cloned())
    }

    fn fetch_all<R: Row>(&self, filter: impl Fn(&R) -> bool) -> DbResult<Vec<R>> {
        let tables = self.tables.read();
        Ok(R::table(&tables)
            .rows
            .values()
            .filter(|row| filter(row))
            .cloned()
            .collect())
    }

    fn insert<R: Row>(&self, build: impl FnOnce(u64) -> R) -> DbResult<R> {
        let work = self.begin()?;
        let row = work.insert(build)?;
        work.commit()?;
        Ok(row)
    }

    fn update<R: Row>(&self, id: u64, mutate: impl FnOnce(&mut R)) -> DbResult<()> {
        let work = self.begin()?;
        work.update(id, mutate)?;
        work.commit()
    }
}

impl Database for MemoryDatabase {
    type Scope<'a> = UnitOfWork<'a>;

    fn begin(&self) -> DbResult<UnitOfWork<'_>> {
        Ok(UnitOfWork {
            db: self,
            staged: RefCell::new(Tables::default()),
            locks: RefCell::new(Vec::new()),
            committed: false,
        })
    }
}

/// Atomic scope over a [`MemoryDatabase`].
#[derive(Debug)]
pub struct UnitOfWork<'db> {
    db: &'db MemoryDatabase,
    staged: RefCell<Tables>,
    locks: RefCell<Vec<LockKey>>,
    committed: bool,
}

impl UnitOfWork<'_> {
    fn lock_row<R: Row>(&self, id: u64) -> DbResult<()> {
        let key = (R::TABLE, id);
        if self.locks.borrow().contains(&key) {
            return Ok(());
        }
        self.db.locks.acquire(key, self.db.lock_timeout)?;
        self.locks.borrow_mut().push(key);
        Ok(())
    }

    fn current<R: Row>(&self, id: u64) -> Option<R> {
        if let Some(row) = R::table(&self.staged.borrow()).rows.get(&id) {
            return Some(row.clone());
        }
        R::table(&self.db.tables.read()).rows.get(&id).cloned()
    }

    /// Committed rows overlaid with this unit of work's staged rows.
    fn visible<R: Row>(&self, filter: impl Fn(&R) -> bool) -> Vec<R> {
        let committed = self.db.tables.read();
        let staged = self.staged.borrow();
        let staged_rows = &R::table(&staged).rows;

        let mut rows: BTreeMap<u64, R> = R::table(&committed)
            .rows
            .iter()
            .filter(|(id, row)| !staged_rows.contains_key(id) && filter(row))
            .map(|(id, row)| (*id, row.clone()))
            .collect();
        rows.extend(
            staged_rows
                .iter()
                .filter(|(_, row)| filter(row))
                .map(|(id, row)| (*id, row.clone())),
        );
        rows.into_values().collect()
    }
}

impl Executor for UnitOfWork<'_> {
    fn fetch_one<R: Row>(&self, filter: impl Fn(&R) -> bool) -> DbResult<Option<R>> {
        Ok(self.visible(filter).into_iter().next())
    }

    fn fetch_for_update<R: Row>(&self, id: u64) -> DbResult<Option<R>> {
        // Never wait on a row lock while holding the table lock.
        self.lock_row::<R>(id)?;
        Ok(self.current(id))
    }

    fn fetch_all<R: Row>(&self, filter: impl Fn(&R) -> bool) -> DbResult<Vec<R>> {
        Ok(self.visible(filter))
    }

    fn insert<R: Row>(&self, build: impl FnOnce(u64) -> R) -> DbResult<R> {
        let id = R::table_mut(&mut self.db.tables.write()).allocate_id();
        let row = build(id);
        debug_assert_eq!(row.id(), id, "row must keep its generated id");
        R::table_mut(&mut self.staged.borrow_mut())
            .rows
            .insert(row.id(), row.clone());
        Ok(row)
    }

    fn update<R: Row>(&self, id: u64, mutate: impl FnOnce(&mut R)) -> DbResult<()> {
        self.lock_row::<R>(id)?;
        let mut row = self.current::<R>(id).ok_or(DbError::RowNotFound {
            table: R::TABLE,
            id,
        })?;
        mutate(&mut row);
        R::table_mut(&mut self.staged.borrow_mut())
            .rows
            .insert(id, row);
        Ok(())
    }
}

impl AtomicScope for UnitOfWork<'_> {
    fn commit(mut self) -> DbResult<()> {
        let staged = std::mem::take(self.staged.get_mut());
        // Publish before the row locks are released by drop.
        self.db.tables.write().publish(staged);
        self.committed = true;
        Ok(())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!("unit of work rolled back");
        }
        self.db.locks.release(self.locks.get_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::AccountId;
    use rust_decimal_macros::dec;

    fn account(id: u64, name: &str) -> Account {
        Account {
            id: AccountId(id),
            name: name.to_string(),
            balance: dec!(10),
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let db = MemoryDatabase::default();
        let first = db.insert(|id| account(id, "a")).unwrap();
        let second = db.insert(|id| account(id, "b")).unwrap();
        assert_eq!(first.id, AccountId(1));
        assert_eq!(second.id, AccountId(2));
    }

    #[test]
    fn test_fetch_one_and_all_use_filter() {
        let db = MemoryDatabase::default();
        db.insert(|id| account(id, "a")).unwrap();
        db.insert(|id| account(id, "b")).unwrap();
        db.insert(|id| account(id, "b")).unwrap();

        let found: Option<Account> = db.fetch_one(|a: &Account| a.name == "b").unwrap();
        assert_eq!(found.unwrap().id, AccountId(2));

        let all: Vec<Account> = db.fetch_all(|a: &Account| a.name == "b").unwrap();
        assert_eq!(
            all.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![AccountId(2), AccountId(3)]
        );

        let none: Option<Account> = db.fetch_one(|a: &Account| a.name == "z").unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_update_missing_row_fails() {
        let db = MemoryDatabase::default();
        let result = db.update(7, |a: &mut Account| a.balance = dec!(1));
        assert!(matches!(
            result,
            Err(DbError::RowNotFound {
                table: "accounts",
                id: 7
            })
        ));
    }

    #[test]
    fn test_unit_of_work_reads_its_own_writes() {
        let db = MemoryDatabase::default();
        db.insert(|id| account(id, "a")).unwrap();

        let work = db.begin().unwrap();
        work.update(1, |a: &mut Account| a.balance = dec!(99)).unwrap();
        work.insert(|id| account(id, "b")).unwrap();

        let seen: Account = work.fetch_for_update(1).unwrap().unwrap();
        assert_eq!(seen.balance, dec!(99));
        let all: Vec<Account> = work.fetch_all(|_: &Account| true).unwrap();
        assert_eq!(all.len(), 2);

        // Nothing is visible outside until commit.
        let outside: Account = db.fetch_for_update(1).unwrap().unwrap();
        assert_eq!(outside.balance, dec!(10));
        assert_eq!(db.fetch_all(|_: &Account| true).unwrap().len(), 1);

        work.commit().unwrap();
        let after: Account = db.fetch_for_update(1).unwrap().unwrap();
        assert_eq!(after.balance, dec!(99));
        assert_eq!(db.fetch_all(|_: &Account| true).unwrap().len(), 2);
    }

    #[test]
    fn test_drop_rolls_back_and_leaves_sequence_gap() {
        let db = MemoryDatabase::default();
        db.insert(|id| account(id, "a")).unwrap();
        {
            let work = db.begin().unwrap();
            work.update(1, |a: &mut Account| a.balance = dec!(0)).unwrap();
            work.insert(|id| account(id, "b")).unwrap();
        }
        let a: Account = db.fetch_for_update(1).unwrap().unwrap();
        assert_eq!(a.balance, dec!(10));
        assert_eq!(db.fetch_all(|_: &Account| true).unwrap().len(), 1);

        let next = db.insert(|id| account(id, "c")).unwrap();
        assert_eq!(next.id, AccountId(3));
    }

    #[test]
    fn test_row_lock_is_reentrant_within_unit_of_work() {
        let db = MemoryDatabase::new(Duration::from_millis(20));
        db.insert(|id| account(id, "a")).unwrap();
        let work = db.begin().unwrap();
        let _: Option<Account> = work.fetch_for_update(1).unwrap();
        let _: Option<Account> = work.fetch_for_update(1).unwrap();
        work.update(1, |a: &mut Account| a.balance = dec!(1)).unwrap();
        work.commit().unwrap();
    }

    #[test]
    fn test_row_lock_times_out_while_held_elsewhere() {
        let db = MemoryDatabase::new(Duration::from_millis(20));
        db.insert(|id| account(id, "a")).unwrap();
        db.insert(|id| account(id, "b")).unwrap();

        let holder = db.begin().unwrap();
        let _: Option<Account> = holder.fetch_for_update(1).unwrap();

        let waiter = db.begin().unwrap();
        let blocked: DbResult<Option<Account>> = waiter.fetch_for_update(1);
        assert!(matches!(
            blocked,
            Err(DbError::LockTimeout {
                table: "accounts",
                id: 1
            })
        ));
        // Other rows are unaffected.
        let other: Option<Account> = waiter.fetch_for_update(2).unwrap();
        assert!(other.is_some());

        drop(holder);
        let freed: Option<Account> = waiter.fetch_for_update(1).unwrap();
        assert!(freed.is_some());
    }

    #[test]
    fn test_waiter_proceeds_after_holder_commits() {
        let db = MemoryDatabase::new(Duration::from_secs(5));
        db.insert(|id| account(id, "a")).unwrap();

        let holder = db.begin().unwrap();
        let _: Option<Account> = holder.fetch_for_update(1).unwrap();

        std::thread::scope(|s| {
            let waiter = s.spawn(|| {
                let work = db.begin().unwrap();
                let row: Account = work.fetch_for_update(1).unwrap().unwrap();
                row.balance
            });
            holder
                .update(1, |a: &mut Account| a.balance = dec!(42))
                .unwrap();
            holder.commit().unwrap();
            assert_eq!(waiter.join().unwrap(), dec!(42));
        });
    }
}
