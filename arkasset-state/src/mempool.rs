//! Speculative (mempool) state: a confirmed state plus every `Mempool`-status
//! transaction applied on top of it, recomputed on demand rather than kept
//! continuously up to date.

use chrono::Utc;

use crate::error::IndexerError;
use crate::indexer::apply_tx;
use crate::state::{State, TxRecord, TxStatus};
use crate::store::SnapshotStore;
use crate::tx::Tx;

/// Deep-clones `confirmed` and applies every transaction with
/// `status == Mempool`, ordered by `processed_at` (ties broken by txid).
/// A transaction that no longer applies cleanly (e.g. a sibling mempool tx
/// already spent its input) is silently skipped; it remains in storage
/// un-mutated.
pub fn get_speculative_state(confirmed: &State) -> State {
    let mut speculative = confirmed.clone();

    let mut pending: Vec<&TxRecord> = confirmed
        .transactions
        .values()
        .filter(|record| record.status == TxStatus::Mempool)
        .collect();
    pending.sort_by(|a, b| {
        a.processed_at
            .cmp(&b.processed_at)
            .then_with(|| a.tx.txid.cmp(&b.tx.txid))
    });

    for record in pending {
        let _ = apply_tx(&record.tx, &mut speculative, None);
    }
    speculative
}

/// Validates `tx` against the current speculative state and, on success,
/// records it in `store`'s confirmed state with `status = Mempool`. The
/// confirmed state's balances are untouched; only `get_speculative_state`
/// ever applies a mempool transaction's effects.
pub fn apply_to_mempool<S: SnapshotStore>(store: &mut S, tx: &Tx) -> Result<(), IndexerError>
where
    IndexerError: From<S::Error>,
{
    if store.state().transactions.contains_key(&tx.txid) {
        return Ok(());
    }

    let mut speculative = get_speculative_state(store.state());
    apply_tx(tx, &mut speculative, None)?;

    store.state_mut().transactions.insert(
        tx.txid,
        TxRecord {
            tx: tx.clone(),
            status: TxStatus::Mempool,
            processed_at: Utc::now(),
        },
    );
    Ok(())
}
