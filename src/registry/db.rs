// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry database operations.
//!
//! Every mutation runs inside one redb write transaction, so status
//! transitions are genuinely conditional (`WHERE status = expected`
//! semantics) and the deposit counter cannot skip or repeat: a swap
//! insert, its recovery record, and the counter increment commit
//! together or not at all.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};

use super::records::*;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: transaction_id → serialized SwapRecord (JSON bytes).
const SWAPS: TableDefinition<&str, &[u8]> = TableDefinition::new("swaps");

/// Mixing windows: window_id → serialized MixingWindowRecord.
const WINDOWS: TableDefinition<&str, &[u8]> = TableDefinition::new("windows");

/// Recovery records: transaction_id → serialized RecoveryRecord.
const RECOVERY: TableDefinition<&str, &[u8]> = TableDefinition::new("recovery");

/// Encrypted memos: transaction_id → serialized MemoRecord.
const MEMOS: TableDefinition<&str, &[u8]> = TableDefinition::new("memos");

/// Deposit counter singleton: "main" → serialized DepositCounter.
const COUNTER: TableDefinition<&str, &[u8]> = TableDefinition::new("counter");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("swap {transaction_id}: expected status {expected}, found {actual}")]
    StatusConflict {
        transaction_id: String,
        expected: SwapStatus,
        actual: SwapStatus,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// Registry
// =============================================================================

/// Embedded ACID swap registry.
pub struct Registry {
    db: Database,
}

impl Registry {
    /// Open (or create) the registry at the given path.
    pub fn open(path: &Path) -> RegistryResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SWAPS)?;
            let _ = write_txn.open_table(WINDOWS)?;
            let _ = write_txn.open_table(RECOVERY)?;
            let _ = write_txn.open_table(MEMOS)?;
            let _ = write_txn.open_table(COUNTER)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Swaps
    // =========================================================================

    /// Insert a new swap and increment the deposit counter atomically.
    ///
    /// When `recovery_key_hash` is provided, the recovery record is
    /// created in the same transaction with the post-increment counter
    /// value snapshotted. Returns the new deposit count. A failed insert
    /// consumes no counter value.
    pub fn create_swap(
        &self,
        swap: &SwapRecord,
        recovery_key_hash: Option<&str>,
    ) -> RegistryResult<u64> {
        let swap_json = serde_json::to_vec(swap)?;
        let write_txn = self.db.begin_write()?;
        let new_count;
        {
            let mut swaps = write_txn.open_table(SWAPS)?;
            if swaps.get(swap.transaction_id.as_str())?.is_some() {
                return Err(RegistryError::AlreadyExists(swap.transaction_id.clone()));
            }
            swaps.insert(swap.transaction_id.as_str(), swap_json.as_slice())?;

            let mut counter = write_txn.open_table(COUNTER)?;
            let current = match counter.get("main")? {
                Some(raw) => serde_json::from_slice::<DepositCounter>(raw.value())?.total_deposits,
                None => 0,
            };
            new_count = current + 1;
            let updated = DepositCounter {
                total_deposits: new_count,
                last_updated: Utc::now(),
            };
            counter.insert("main", serde_json::to_vec(&updated)?.as_slice())?;

            if let Some(hash) = recovery_key_hash {
                let mut recovery = write_txn.open_table(RECOVERY)?;
                // Idempotent on conflict: an existing record wins.
                if recovery.get(swap.transaction_id.as_str())?.is_none() {
                    let record = RecoveryRecord {
                        transaction_id: swap.transaction_id.clone(),
                        deposit_count_at_creation: new_count,
                        recovery_key_hash: hash.to_string(),
                        recovery_available: false,
                        available_reason: RecoveryReason::None,
                        created_at: swap.created_at,
                    };
                    recovery.insert(
                        swap.transaction_id.as_str(),
                        serde_json::to_vec(&record)?.as_slice(),
                    )?;
                }
            }
        }
        write_txn.commit()?;
        Ok(new_count)
    }

    /// Look up a swap by id.
    pub fn get_swap(&self, transaction_id: &str) -> RegistryResult<SwapRecord> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SWAPS)?;
        match table.get(transaction_id)? {
            Some(raw) => Ok(serde_json::from_slice(raw.value())?),
            None => Err(RegistryError::NotFound(format!("swap {transaction_id}"))),
        }
    }

    /// Oldest-first swaps in a given status, capped at `limit`.
    pub fn list_by_status(
        &self,
        status: SwapStatus,
        limit: usize,
    ) -> RegistryResult<Vec<SwapRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SWAPS)?;

        let mut matching = Vec::new();
        for entry in table.iter()? {
            let (_, raw) = entry?;
            let swap: SwapRecord = serde_json::from_slice(raw.value())?;
            if swap.status == status {
                matching.push(swap);
            }
        }
        matching.sort_by_key(|s| s.created_at);
        matching.truncate(limit);
        Ok(matching)
    }

    /// Read-modify-write a swap inside one write transaction.
    fn update_swap<F>(&self, transaction_id: &str, mutate: F) -> RegistryResult<SwapRecord>
    where
        F: FnOnce(&mut SwapRecord) -> RegistryResult<()>,
    {
        let write_txn = self.db.begin_write()?;
        let updated;
        {
            let mut table = write_txn.open_table(SWAPS)?;
            let mut swap: SwapRecord = match table.get(transaction_id)? {
                Some(raw) => serde_json::from_slice(raw.value())?,
                None => {
                    return Err(RegistryError::NotFound(format!("swap {transaction_id}")))
                }
            };
            mutate(&mut swap)?;
            table.insert(transaction_id, serde_json::to_vec(&swap)?.as_slice())?;
            updated = swap;
        }
        write_txn.commit()?;
        Ok(updated)
    }

    /// Atomic conditional status transition.
    ///
    /// Fails with [`RegistryError::StatusConflict`] when the stored
    /// status differs from `from`: the caller lost a race, and that is
    /// surfaced, never silently ignored. Terminal transitions stamp
    /// `completed_at`.
    pub fn transition_status(
        &self,
        transaction_id: &str,
        from: SwapStatus,
        to: SwapStatus,
    ) -> RegistryResult<SwapRecord> {
        self.update_swap(transaction_id, |swap| {
            if swap.status != from {
                return Err(RegistryError::StatusConflict {
                    transaction_id: transaction_id.to_string(),
                    expected: from,
                    actual: swap.status,
                });
            }
            swap.status = to;
            if to.is_terminal() {
                swap.completed_at = Some(Utc::now());
            }
            Ok(())
        })
    }

    /// Append a confirmed transfer to a swap's step list.
    ///
    /// The step index is assigned here, monotonically, under the write
    /// transaction.
    pub fn append_step(
        &self,
        transaction_id: &str,
        from_addr: &str,
        to_addr: &str,
        tx_sig: &str,
        amount: Option<u64>,
    ) -> RegistryResult<SwapRecord> {
        self.update_swap(transaction_id, |swap| {
            let step = SwapStep {
                step_index: swap.steps.len() as u32,
                from_addr: from_addr.to_string(),
                to_addr: to_addr.to_string(),
                tx_sig: tx_sig.to_string(),
                timestamp: Utc::now(),
                amount,
            };
            swap.steps.push(step);
            Ok(())
        })
    }

    /// Record a failure diagnostic and move the swap to `failed`.
    pub fn set_error(&self, transaction_id: &str, message: &str) -> RegistryResult<SwapRecord> {
        self.update_swap(transaction_id, |swap| {
            swap.error = Some(message.to_string());
            swap.status = SwapStatus::Failed;
            swap.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Record the finalizing transfer signature.
    pub fn set_final_sig(&self, transaction_id: &str, sig: &str) -> RegistryResult<SwapRecord> {
        self.update_swap(transaction_id, |swap| {
            swap.final_sig = Some(sig.to_string());
            Ok(())
        })
    }

    /// Record the mixing window a swap's deposits were assigned to.
    pub fn assign_window(
        &self,
        transaction_id: &str,
        window_id: &str,
    ) -> RegistryResult<SwapRecord> {
        self.update_swap(transaction_id, |swap| {
            swap.window_id = Some(window_id.to_string());
            Ok(())
        })
    }

    // =========================================================================
    // Mixing Windows
    // =========================================================================

    /// Create-or-update a mixing window, accumulating one note deposit.
    pub fn upsert_window(
        &self,
        window_id: &str,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
        amount: u64,
    ) -> RegistryResult<MixingWindowRecord> {
        let write_txn = self.db.begin_write()?;
        let updated;
        {
            let mut table = write_txn.open_table(WINDOWS)?;
            let mut window = match table.get(window_id)? {
                Some(raw) => serde_json::from_slice::<MixingWindowRecord>(raw.value())?,
                None => MixingWindowRecord {
                    window_id: window_id.to_string(),
                    start,
                    end,
                    total_amount: 0,
                    tx_count: 0,
                },
            };
            window.total_amount += amount;
            window.tx_count += 1;
            table.insert(window_id, serde_json::to_vec(&window)?.as_slice())?;
            updated = window;
        }
        write_txn.commit()?;
        Ok(updated)
    }

    /// Look up a mixing window.
    pub fn get_window(&self, window_id: &str) -> RegistryResult<Option<MixingWindowRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WINDOWS)?;
        match table.get(window_id)? {
            Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Look up a swap's recovery record.
    pub fn get_recovery(&self, transaction_id: &str) -> RegistryResult<RecoveryRecord> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECOVERY)?;
        match table.get(transaction_id)? {
            Some(raw) => Ok(serde_json::from_slice(raw.value())?),
            None => Err(RegistryError::NotFound(format!(
                "recovery record {transaction_id}"
            ))),
        }
    }

    /// Latch a recovery record available. Monotonic: once set, the flag
    /// and reason never revert.
    pub fn set_recovery_available(
        &self,
        transaction_id: &str,
        reason: RecoveryReason,
    ) -> RegistryResult<RecoveryRecord> {
        let write_txn = self.db.begin_write()?;
        let updated;
        {
            let mut table = write_txn.open_table(RECOVERY)?;
            let mut record: RecoveryRecord = match table.get(transaction_id)? {
                Some(raw) => serde_json::from_slice(raw.value())?,
                None => {
                    return Err(RegistryError::NotFound(format!(
                        "recovery record {transaction_id}"
                    )))
                }
            };
            if !record.recovery_available {
                record.recovery_available = true;
                record.available_reason = reason;
            }
            table.insert(transaction_id, serde_json::to_vec(&record)?.as_slice())?;
            updated = record;
        }
        write_txn.commit()?;
        Ok(updated)
    }

    /// Current global deposit count.
    pub fn deposit_count(&self) -> RegistryResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COUNTER)?;
        match table.get("main")? {
            Some(raw) => Ok(serde_json::from_slice::<DepositCounter>(raw.value())?.total_deposits),
            None => Ok(0),
        }
    }

    // =========================================================================
    // Memos
    // =========================================================================

    /// Store an opaque encrypted memo.
    pub fn store_memo(&self, memo: &MemoRecord) -> RegistryResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(MEMOS)?;
            table.insert(
                memo.transaction_id.as_str(),
                serde_json::to_vec(memo)?.as_slice(),
            )?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Fetch a memo by swap id.
    pub fn get_memo(&self, transaction_id: &str) -> RegistryResult<MemoRecord> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MEMOS)?;
        match table.get(transaction_id)? {
            Some(raw) => Ok(serde_json::from_slice(raw.value())?),
            None => Err(RegistryError::NotFound(format!("memo {transaction_id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> (Registry, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("test-registry-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("registry.redb");
        (Registry::open(&path).unwrap(), dir)
    }

    fn test_swap(id: &str) -> SwapRecord {
        SwapRecord {
            transaction_id: id.to_string(),
            source_addr: "src".to_string(),
            dest_addr: "dst".to_string(),
            amount: 50_000_000,
            relayer_fee: 25_000,
            intermediate_wallet_id: "w1".to_string(),
            source_sig: "sig".to_string(),
            status: SwapStatus::Pending,
            steps: Vec::new(),
            window_id: None,
            final_sig: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn create_and_get_swap() {
        let (reg, dir) = test_registry();
        let count = reg.create_swap(&test_swap("t1"), None).unwrap();
        assert_eq!(count, 1);

        let loaded = reg.get_swap("t1").unwrap();
        assert_eq!(loaded.status, SwapStatus::Pending);
        assert_eq!(loaded.amount, 50_000_000);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn duplicate_insert_does_not_consume_counter() {
        let (reg, dir) = test_registry();
        reg.create_swap(&test_swap("t1"), None).unwrap();
        assert!(matches!(
            reg.create_swap(&test_swap("t1"), None),
            Err(RegistryError::AlreadyExists(_))
        ));
        assert_eq!(reg.deposit_count().unwrap(), 1);

        let count = reg.create_swap(&test_swap("t2"), None).unwrap();
        assert_eq!(count, 2);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn transition_enforces_precondition() {
        let (reg, dir) = test_registry();
        reg.create_swap(&test_swap("t1"), None).unwrap();

        reg.transition_status("t1", SwapStatus::Pending, SwapStatus::Processing)
            .unwrap();

        // Losing the race surfaces as a conflict.
        let err = reg
            .transition_status("t1", SwapStatus::Pending, SwapStatus::Recovered)
            .unwrap_err();
        assert!(matches!(err, RegistryError::StatusConflict { .. }));

        let done = reg
            .transition_status("t1", SwapStatus::Processing, SwapStatus::Completed)
            .unwrap();
        assert_eq!(done.status, SwapStatus::Completed);
        assert!(done.completed_at.is_some());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn steps_get_monotonic_indices() {
        let (reg, dir) = test_registry();
        reg.create_swap(&test_swap("t1"), None).unwrap();

        reg.append_step("t1", "a", "b", "sig1", Some(10)).unwrap();
        reg.append_step("t1", "b", "c", "sig2", None).unwrap();
        let swap = reg.append_step("t1", "c", "d", "sig3", Some(5)).unwrap();

        let indices: Vec<u32> = swap.steps.iter().map(|s| s.step_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(swap.steps[0].amount, Some(10));
        assert_eq!(swap.steps[1].amount, None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn set_error_fails_the_swap() {
        let (reg, dir) = test_registry();
        reg.create_swap(&test_swap("t1"), None).unwrap();

        let swap = reg.set_error("t1", "rpc went away").unwrap();
        assert_eq!(swap.status, SwapStatus::Failed);
        assert_eq!(swap.error.as_deref(), Some("rpc went away"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn window_upsert_accumulates() {
        let (reg, dir) = test_registry();
        let start = Utc::now();
        let end = start + chrono::Duration::seconds(60);

        reg.upsert_window("1700000000", start, end, 100).unwrap();
        let window = reg.upsert_window("1700000000", start, end, 250).unwrap();
        assert_eq!(window.tx_count, 2);
        assert_eq!(window.total_amount, 350);

        assert!(reg.get_window("other").unwrap().is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn recovery_record_snapshots_counter_and_latches() {
        let (reg, dir) = test_registry();
        reg.create_swap(&test_swap("t0"), None).unwrap();
        reg.create_swap(&test_swap("t1"), Some("deadbeef")).unwrap();

        let record = reg.get_recovery("t1").unwrap();
        assert_eq!(record.deposit_count_at_creation, 2);
        assert!(!record.recovery_available);
        assert_eq!(record.available_reason, RecoveryReason::None);

        let latched = reg
            .set_recovery_available("t1", RecoveryReason::Threshold)
            .unwrap();
        assert!(latched.recovery_available);

        // Monotonic: a later latch with a different reason does not revert.
        let again = reg
            .set_recovery_available("t1", RecoveryReason::Timeout)
            .unwrap();
        assert_eq!(again.available_reason, RecoveryReason::Threshold);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn memo_round_trips_verbatim() {
        let (reg, dir) = test_registry();
        let memo = MemoRecord {
            transaction_id: "t1".to_string(),
            ciphertext: "b64-opaque-bytes".to_string(),
            metadata: serde_json::json!({"iv": "0011", "scheme": "aes-gcm"}),
        };
        reg.store_memo(&memo).unwrap();

        let loaded = reg.get_memo("t1").unwrap();
        assert_eq!(loaded.ciphertext, memo.ciphertext);
        assert_eq!(loaded.metadata, memo.metadata);

        assert!(matches!(
            reg.get_memo("missing"),
            Err(RegistryError::NotFound(_))
        ));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn list_by_status_is_oldest_first_and_capped() {
        let (reg, dir) = test_registry();
        for i in 0..5 {
            let mut swap = test_swap(&format!("t{i}"));
            swap.created_at = Utc::now() + chrono::Duration::seconds(i);
            reg.create_swap(&swap, None).unwrap();
        }
        reg.transition_status("t0", SwapStatus::Pending, SwapStatus::Processing)
            .unwrap();

        let pending = reg.list_by_status(SwapStatus::Pending, 3).unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].transaction_id, "t1");
        assert_eq!(pending[2].transaction_id, "t3");

        let _ = std::fs::remove_dir_all(dir);
    }
}
