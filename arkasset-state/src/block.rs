//! Block application and rollback.
//!
//! `apply_block` orders a block's transactions topologically (Kahn's
//! algorithm over the intra-block input/output dependency graph) and applies
//! them against a deep clone of the current state, committing only if every
//! transaction succeeds — the copy-then-commit pattern SPEC_FULL.md's
//! concurrency section calls for.

use std::collections::{HashMap, VecDeque};

use crate::error::IndexerError;
use crate::indexer::apply_tx;
use crate::state::{State, TxStatus};
use crate::store::SnapshotStore;
use crate::tx::{Block, Tx};

/// Returns `txs` reordered so that any transaction spending another
/// transaction's output in the same block comes after it. Ties (no
/// dependency between two txs) preserve their original relative order.
/// Returns `None` if the dependency graph contains a cycle.
fn topological_order(txs: &[Tx]) -> Option<Vec<usize>> {
    let index_by_txid: HashMap<_, _> = txs
        .iter()
        .enumerate()
        .map(|(i, tx)| (tx.txid, i))
        .collect();

    let mut in_degree = vec![0usize; txs.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); txs.len()];
    for (b, tx) in txs.iter().enumerate() {
        for vin in &tx.vin {
            if let Some(&a) = index_by_txid.get(&vin.txid) {
                dependents[a].push(b);
                in_degree[b] += 1;
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..txs.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(txs.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.push_back(d);
            }
        }
    }

    if order.len() == txs.len() {
        Some(order)
    } else {
        None
    }
}

/// Applies `block` to the store's current state. Requires
/// `block.height == state.block_height + 1`. On success, commits the
/// mutated state and saves it at `block.height`; on any failure, the
/// store's state is left untouched.
pub fn apply_block<S: SnapshotStore>(store: &mut S, block: &Block) -> Result<(), IndexerError>
where
    IndexerError: From<S::Error>,
{
    let expected = store.state().block_height + 1;
    if block.height as i64 != expected {
        return Err(IndexerError::HeightGap {
            expected,
            given: block.height as i64,
        });
    }

    let order = topological_order(&block.transactions).ok_or(IndexerError::DependencyCycle)?;

    let mut scratch = store.state().clone();
    for &i in &order {
        let tx = &block.transactions[i];
        if let Some(record) = scratch.transactions.get_mut(&tx.txid) {
            if record.status == TxStatus::Mempool {
                record.status = TxStatus::Confirmed;
            }
        }
        apply_tx(tx, &mut scratch, Some(block.height as i64))?;
    }

    *store.state_mut() = scratch;
    store.save(block.height as i64)?;
    Ok(())
}

/// Rolls back the most recently applied block. A no-op at genesis
/// (`block_height == -1`).
pub fn rollback_last_block<S: SnapshotStore>(store: &mut S) -> Result<(), IndexerError>
where
    IndexerError: From<S::Error>,
{
    let height = store.state().block_height;
    if height == -1 {
        return Ok(());
    }

    let confirmed_before = store.state().clone();
    let preserved_mempool: Vec<Tx> = confirmed_before
        .transactions
        .values()
        .filter(|r| r.status == TxStatus::Mempool)
        .map(|r| r.tx.clone())
        .collect();

    store.load(Some(height - 1))?;

    for record in confirmed_before.transactions.values() {
        if record.status == TxStatus::Confirmed && !store.state().transactions.contains_key(&record.tx.txid) {
            let mut reverted = record.clone();
            reverted.status = TxStatus::Mempool;
            store.state_mut().transactions.insert(record.tx.txid, reverted);
        }
    }
    for tx in preserved_mempool {
        store
            .state_mut()
            .transactions
            .entry(tx.txid)
            .or_insert_with(|| crate::state::TxRecord {
                tx,
                status: TxStatus::Mempool,
                processed_at: chrono::Utc::now(),
            });
    }

    let new_height = store.state().block_height;
    store.save(new_height)?;
    store.delete(height)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySnapshotStore;
    use crate::tx::{TxIn, TxOut};
    use arkasset_chain::{AssetOutput, Group, Issuance, Packet};

    fn txid(byte: u8) -> arkasset_chain::Txid {
        [byte; 32]
    }

    fn genesis_tx(txid_byte: u8, amt: u64) -> Tx {
        let packet = Packet::new(vec![Group {
            asset_id: None,
            issuance: Some(Issuance::default()),
            metadata: None,
            inputs: vec![],
            outputs: vec![AssetOutput::Local { o: 0, amt }],
        }]);
        let script = arkasset_chain::build_marker_output_script(&packet).unwrap();
        Tx {
            txid: txid(txid_byte),
            vin: vec![],
            vout: vec![TxOut {
                n: 0,
                script_pubkey: script,
            }],
        }
    }

    #[test]
    fn apply_block_requires_the_next_height() {
        let mut store = MemorySnapshotStore::new();
        let block = Block {
            height: 5,
            transactions: vec![],
        };
        let err = apply_block(&mut store, &block).unwrap_err();
        assert_eq!(
            err,
            IndexerError::HeightGap {
                expected: 0,
                given: 5
            }
        );
    }

    #[test]
    fn apply_block_commits_and_advances_height() {
        let mut store = MemorySnapshotStore::new();
        let block = Block {
            height: 0,
            transactions: vec![genesis_tx(1, 10)],
        };
        apply_block(&mut store, &block).unwrap();
        assert_eq!(store.state().block_height, 0);
        assert_eq!(store.state().assets.len(), 1);
    }

    #[test]
    fn apply_block_then_rollback_restores_prior_state() {
        let mut store = MemorySnapshotStore::new();
        let before = store.state().clone();

        let block = Block {
            height: 0,
            transactions: vec![genesis_tx(1, 10)],
        };
        apply_block(&mut store, &block).unwrap();
        rollback_last_block(&mut store).unwrap();

        assert_eq!(store.state().block_height, before.block_height);
        assert!(store.state().assets.is_empty());
        assert!(store.state().utxos.is_empty());
        assert_eq!(
            store.state().transactions[&txid(1)].status,
            TxStatus::Mempool
        );
    }

    #[test]
    fn rollback_at_genesis_is_a_no_op() {
        let mut store = MemorySnapshotStore::new();
        rollback_last_block(&mut store).unwrap();
        assert_eq!(store.state().block_height, -1);
    }

    #[test]
    fn applying_a_block_preserves_state_invariants() {
        let mut store = MemorySnapshotStore::new();
        let block = Block {
            height: 0,
            transactions: vec![genesis_tx(1, 10), genesis_tx(2, 20)],
        };
        apply_block(&mut store, &block).unwrap();
        store.state().check_invariants().unwrap();

        // Total supply credited equals exactly the sum of each tx's group
        // delta (invariant 6): two independent fresh issuances, no burns.
        let total: u64 = store
            .state()
            .utxos
            .values()
            .flat_map(|balance| balance.iter())
            .map(|(_, amt)| *amt)
            .sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn apply_block_is_commutative_for_independent_transactions() {
        let tx_a = genesis_tx(1, 10);
        let tx_b = genesis_tx(2, 20);

        let mut forward = MemorySnapshotStore::new();
        apply_block(
            &mut forward,
            &Block {
                height: 0,
                transactions: vec![tx_a.clone(), tx_b.clone()],
            },
        )
        .unwrap();

        let mut reversed = MemorySnapshotStore::new();
        apply_block(
            &mut reversed,
            &Block {
                height: 0,
                transactions: vec![tx_b, tx_a],
            },
        )
        .unwrap();

        assert_eq!(forward.state().utxos, reversed.state().utxos);
        assert_eq!(forward.state().assets, reversed.state().assets);
    }

    #[test]
    fn a_dependency_cycle_within_a_block_is_rejected() {
        // Two txs that each spend an output the other produces can't arise
        // from a real chain (no host-chain cycle exists), but the packet
        // layer has no way to prevent a caller from constructing one, so
        // the topological sort must reject it rather than loop or panic.
        let tx_a = Tx {
            txid: txid(1),
            vin: vec![TxIn {
                txid: txid(2),
                vout: 0,
            }],
            vout: vec![TxOut {
                n: 0,
                script_pubkey: vec![],
            }],
        };
        let tx_b = Tx {
            txid: txid(2),
            vin: vec![TxIn {
                txid: txid(1),
                vout: 0,
            }],
            vout: vec![TxOut {
                n: 0,
                script_pubkey: vec![],
            }],
        };
        assert_eq!(topological_order(&[tx_a, tx_b]), None);
    }
}
