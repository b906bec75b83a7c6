//! Per-transaction validation and application: `apply_tx`.
//!
//! All checks run against the current `state` before any mutation is made,
//! so a rejected transaction leaves `state` exactly as it found it — the
//! mutation pass at the end of this function is the only place `state` is
//! written, and it only runs once every earlier check has passed.

use std::collections::{HashMap, HashSet};

use arkasset_chain::{codec, script, AssetId, AssetInput, AssetOutput, AssetRef, Packet};
use chrono::Utc;

use crate::error::IndexerError;
use crate::state::{AssetRecord, Outpoint, State, TxRecord, TxStatus};
use crate::tx::Tx;

#[derive(Default, Clone, Copy)]
struct GroupSums {
    sum_in: u128,
    sum_out: u128,
}

impl GroupSums {
    fn delta(&self) -> i128 {
        self.sum_out as i128 - self.sum_in as i128
    }
}

/// Locates the first output whose push-data begins with the `ARK` magic and
/// decodes its packet. Returns `None` if no such output exists (implicit
/// burn); propagates a decode error if the marker's body is malformed.
fn locate_marker(tx: &Tx) -> Result<Option<Packet>, IndexerError> {
    for out in &tx.vout {
        if let Some(push_data) = script::parse_marker_script(&out.script_pubkey) {
            if let Some(packet) = codec::decode_packet(push_data)? {
                return Ok(Some(packet));
            }
        }
    }
    Ok(None)
}

/// Applies `tx` against `state`. `block_height` is `Some` when called as
/// part of confirmed block application (records the tx as `Confirmed` on
/// first sight); `None` for mempool acceptance (`Mempool`).
pub fn apply_tx(
    tx: &Tx,
    state: &mut State,
    block_height: Option<i64>,
) -> Result<(), IndexerError> {
    let packet = match locate_marker(tx)? {
        Some(packet) => packet,
        None => {
            for vin in &tx.vin {
                state.utxos.remove(&Outpoint::new(vin.txid, vin.vout));
            }
            record_tx(tx, state, block_height);
            return Ok(());
        }
    };

    // Resolve each group's effective AssetId (step 3).
    let mut effective_by_gidx: HashMap<u16, AssetId> = HashMap::new();
    for (k, group) in packet.groups.iter().enumerate() {
        let k = k as u16;
        let id = group.asset_id.unwrap_or_else(|| AssetId::new(tx.txid, k));
        effective_by_gidx.insert(k, id);
    }
    let gidx_by_asset: HashMap<AssetId, u16> = effective_by_gidx
        .iter()
        .map(|(k, id)| (*id, *k))
        .collect();

    // Structural validation (step 4).
    let mut seen_assets = HashSet::new();
    for (k, group) in packet.groups.iter().enumerate() {
        let k = k as u16;
        for output in &group.outputs {
            let AssetOutput::Local { o, amt } = output;
            if *o as usize >= tx.vout.len() {
                return Err(IndexerError::OutputIndexOutOfBounds);
            }
            if *amt == 0 {
                return Err(IndexerError::ZeroAmount);
            }
        }
        for input in &group.inputs {
            let AssetInput::Local { i, amt } = input;
            if *i as usize >= tx.vin.len() {
                return Err(IndexerError::OutputIndexOutOfBounds);
            }
            if *amt == 0 {
                return Err(IndexerError::ZeroAmount);
            }
        }
        if let Some(issuance) = &group.issuance {
            if let Some(AssetRef::ByGroup(j)) = issuance.control_asset {
                if j == k {
                    return Err(IndexerError::SelfReferentialControl);
                }
                if !effective_by_gidx.contains_key(&j) {
                    return Err(IndexerError::MissingGroupRef);
                }
            }
        }
        let asset_id = effective_by_gidx[&k];
        if !seen_assets.insert(asset_id) {
            return Err(IndexerError::DuplicateAssetInTx(asset_id));
        }
    }

    // Sum/delta computation and per-outpoint consumption tracking (step 6).
    let mut sums: HashMap<u16, GroupSums> = HashMap::new();
    let mut consumption: HashMap<(Outpoint, AssetId), u64> = HashMap::new();
    let mut spent_outpoints: Vec<Outpoint> = Vec::new();

    for (k, group) in packet.groups.iter().enumerate() {
        let k = k as u16;
        let asset_id = effective_by_gidx[&k];
        let entry = sums.entry(k).or_default();
        for input in &group.inputs {
            let AssetInput::Local { i, amt } = input;
            let vin = &tx.vin[*i as usize];
            let outpoint = Outpoint::new(vin.txid, vin.vout);
            entry.sum_in += *amt as u128;
            let claimed = consumption.entry((outpoint, asset_id)).or_insert(0);
            *claimed = claimed.saturating_add(*amt);
            if !spent_outpoints.contains(&outpoint) {
                spent_outpoints.push(outpoint);
            }
        }
        for output in &group.outputs {
            let AssetOutput::Local { amt, .. } = output;
            entry.sum_out += *amt as u128;
        }
    }
    // Every outpoint tx.vin spends, even one untouched by any group, still
    // participates in the conservation check below.
    for vin in &tx.vin {
        let outpoint = Outpoint::new(vin.txid, vin.vout);
        if !spent_outpoints.contains(&outpoint) {
            spent_outpoints.push(outpoint);
        }
    }

    // Conservation & consumption check (step 7): every asset balance on a
    // spent outpoint must be claimed exactly, not partially and not in
    // excess.
    let mut check_keys: HashSet<(Outpoint, AssetId)> = consumption.keys().copied().collect();
    for outpoint in &spent_outpoints {
        if let Some(balance) = state.utxos.get(outpoint) {
            for (asset, _) in balance.iter() {
                check_keys.insert((*outpoint, *asset));
            }
        }
    }
    for (outpoint, asset) in check_keys {
        let claimed = consumption.get(&(outpoint, asset)).copied().unwrap_or(0);
        let stored = state
            .utxos
            .get(&outpoint)
            .and_then(|b| b.get(&asset))
            .unwrap_or(0);
        if claimed > stored {
            return Err(IndexerError::InputExceedsStored(asset));
        }
        if claimed < stored {
            return Err(IndexerError::PartialInputConsumption(asset));
        }
    }

    // Issuance/reissuance/metadata authorization (step 8).
    let resolve_ref = |aref: AssetRef| -> AssetId {
        match aref {
            AssetRef::ById(id) => id,
            AssetRef::ByGroup(j) => effective_by_gidx[&j],
        }
    };

    for (k, group) in packet.groups.iter().enumerate() {
        let k = k as u16;
        let asset_id = effective_by_gidx[&k];
        let group_sums = sums[&k];
        let delta = group_sums.delta();
        let existing_record = state.assets.get(&asset_id).cloned();
        let is_fresh = existing_record.is_none() && asset_id.txid == tx.txid;

        if !is_fresh && delta > 0 {
            let control = existing_record
                .as_ref()
                .and_then(|r| r.control_asset)
                .ok_or(IndexerError::MintWithoutControl(asset_id))?;
            let control_gidx = gidx_by_asset
                .get(&control)
                .ok_or(IndexerError::MintWithoutControl(asset_id))?;
            if sums[control_gidx].delta() != 0 {
                return Err(IndexerError::ControlNotRetained(asset_id));
            }
        }

        if let Some(_metadata) = &group.metadata {
            let control_asset = existing_record
                .as_ref()
                .and_then(|r| r.control_asset)
                .ok_or(IndexerError::MetadataUpdateUnauthorized(asset_id))?;
            if existing_record.as_ref().is_some_and(|r| r.immutable) {
                return Err(IndexerError::MetadataUpdateOnImmutable(asset_id));
            }
            let control_spent = tx.vin.iter().any(|vin| {
                let outpoint = Outpoint::new(vin.txid, vin.vout);
                state
                    .utxos
                    .get(&outpoint)
                    .is_some_and(|b| b.get(&control_asset).is_some())
            });
            if !control_spent {
                return Err(IndexerError::MetadataUpdateUnauthorized(asset_id));
            }
        }

        let _ = group.issuance.as_ref().map(|issuance| {
            issuance
                .control_asset
                .map(resolve_ref)
        });
    }

    // Every check has passed: apply mutations (step 9) and record the tx.
    for outpoint_asset in consumption.keys() {
        let (outpoint, asset) = *outpoint_asset;
        if let Some(balance) = state.utxos.get_mut(&outpoint) {
            balance.take(&asset);
            if balance.is_empty() {
                state.utxos.remove(&outpoint);
            }
        }
    }
    for (k, group) in packet.groups.iter().enumerate() {
        let k = k as u16;
        let asset_id = effective_by_gidx[&k];
        for output in &group.outputs {
            let AssetOutput::Local { o, amt } = output;
            let outpoint = Outpoint::new(tx.txid, *o as u32);
            state
                .utxos
                .entry(outpoint)
                .or_default()
                .credit(asset_id, *amt);
        }

        let existing_record = state.assets.get(&asset_id).cloned();
        let is_fresh = existing_record.is_none() && asset_id.txid == tx.txid;
        if is_fresh {
            let control_asset = group
                .issuance
                .as_ref()
                .and_then(|i| i.control_asset)
                .map(resolve_ref);
            let metadata = group
                .issuance
                .as_ref()
                .and_then(|i| i.metadata.clone())
                .unwrap_or_default();
            let immutable = group
                .issuance
                .as_ref()
                .map(|i| i.immutable)
                .unwrap_or(false);
            state.assets.insert(
                asset_id,
                AssetRecord {
                    control_asset,
                    metadata,
                    immutable,
                },
            );
        } else if let Some(metadata) = &group.metadata {
            if let Some(record) = state.assets.get_mut(&asset_id) {
                record.metadata = metadata.clone();
            }
        }
    }

    record_tx(tx, state, block_height);
    Ok(())
}

fn record_tx(tx: &Tx, state: &mut State, block_height: Option<i64>) {
    state.transactions.entry(tx.txid).or_insert_with(|| TxRecord {
        tx: tx.clone(),
        status: if block_height.is_some() {
            TxStatus::Confirmed
        } else {
            TxStatus::Mempool
        },
        processed_at: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkasset_chain::{script, AssetInput, AssetOutput, Group, Issuance, MetadataMap};

    fn txid(byte: u8) -> arkasset_chain::Txid {
        [byte; 32]
    }

    fn tx_with_packet(txid_byte: u8, vin: Vec<crate::tx::TxIn>, packet: &Packet, n_out: usize) -> Tx {
        let marker_script = arkasset_chain::build_marker_output_script(packet).unwrap();
        let mut vout = vec![crate::tx::TxOut {
            n: 0,
            script_pubkey: marker_script,
        }];
        for i in 1..n_out {
            vout.push(crate::tx::TxOut {
                n: i as u32,
                script_pubkey: vec![0x76, 0xa9],
            });
        }
        Tx {
            txid: txid(txid_byte),
            vin,
            vout,
        }
    }

    #[test]
    fn fresh_issuance_creates_asset_and_credits_output() {
        let packet = Packet::new(vec![Group {
            asset_id: None,
            issuance: Some(Issuance {
                control_asset: None,
                metadata: None,
                immutable: false,
            }),
            metadata: None,
            inputs: vec![],
            outputs: vec![AssetOutput::Local { o: 1, amt: 100 }],
        }]);
        let tx = tx_with_packet(1, vec![], &packet, 2);
        let mut state = State::genesis();

        apply_tx(&tx, &mut state, None).unwrap();

        let asset_id = AssetId::new(txid(1), 0);
        assert!(state.assets.contains_key(&asset_id));
        let outpoint = Outpoint::new(txid(1), 1);
        assert_eq!(state.utxos[&outpoint].get(&asset_id), Some(100));
    }

    #[test]
    fn simple_transfer_moves_balance_between_outpoints() {
        let genesis_packet = Packet::new(vec![Group {
            asset_id: None,
            issuance: Some(Issuance::default()),
            metadata: None,
            inputs: vec![],
            outputs: vec![AssetOutput::Local { o: 0, amt: 50 }],
        }]);
        let genesis_tx = tx_with_packet(1, vec![], &genesis_packet, 1);
        let asset_id = AssetId::new(txid(1), 0);

        let mut state = State::genesis();
        apply_tx(&genesis_tx, &mut state, Some(0)).unwrap();

        let transfer_packet = Packet::new(vec![Group {
            asset_id: Some(asset_id),
            issuance: None,
            metadata: None,
            inputs: vec![AssetInput::Local { i: 0, amt: 50 }],
            outputs: vec![AssetOutput::Local { o: 0, amt: 50 }],
        }]);
        let transfer_tx = tx_with_packet(
            2,
            vec![crate::tx::TxIn {
                txid: txid(1),
                vout: 0,
            }],
            &transfer_packet,
            1,
        );
        apply_tx(&transfer_tx, &mut state, Some(1)).unwrap();

        assert!(!state.utxos.contains_key(&Outpoint::new(txid(1), 0)));
        assert_eq!(
            state.utxos[&Outpoint::new(txid(2), 0)].get(&asset_id),
            Some(50)
        );
    }

    #[test]
    fn mint_without_control_is_rejected() {
        let genesis_packet = Packet::new(vec![Group {
            asset_id: None,
            issuance: Some(Issuance::default()),
            metadata: None,
            inputs: vec![],
            outputs: vec![AssetOutput::Local { o: 0, amt: 10 }],
        }]);
        let genesis_tx = tx_with_packet(1, vec![], &genesis_packet, 1);
        let asset_id = AssetId::new(txid(1), 0);
        let mut state = State::genesis();
        apply_tx(&genesis_tx, &mut state, Some(0)).unwrap();

        let mint_packet = Packet::new(vec![Group {
            asset_id: Some(asset_id),
            issuance: None,
            metadata: None,
            inputs: vec![AssetInput::Local { i: 0, amt: 10 }],
            outputs: vec![AssetOutput::Local { o: 0, amt: 20 }],
        }]);
        let mint_tx = tx_with_packet(
            2,
            vec![crate::tx::TxIn {
                txid: txid(1),
                vout: 0,
            }],
            &mint_packet,
            1,
        );

        let err = apply_tx(&mint_tx, &mut state, Some(1)).unwrap_err();
        assert_eq!(err, IndexerError::MintWithoutControl(asset_id));
    }

    #[test]
    fn reissue_with_control_retained_succeeds() {
        // Group 0: genesis control asset. Group 1: genesis token naming group 0 as control.
        let packet = Packet::new(vec![
            Group {
                asset_id: None,
                issuance: Some(Issuance::default()),
                metadata: None,
                inputs: vec![],
                outputs: vec![AssetOutput::Local { o: 0, amt: 1 }],
            },
            Group {
                asset_id: None,
                issuance: Some(Issuance {
                    control_asset: Some(AssetRef::ByGroup(0)),
                    metadata: None,
                    immutable: false,
                }),
                metadata: None,
                inputs: vec![],
                outputs: vec![AssetOutput::Local { o: 1, amt: 100 }],
            },
        ]);
        let genesis_tx = tx_with_packet(1, vec![], &packet, 2);
        let control_id = AssetId::new(txid(1), 0);
        let token_id = AssetId::new(txid(1), 1);
        let mut state = State::genesis();
        apply_tx(&genesis_tx, &mut state, Some(0)).unwrap();
        assert_eq!(
            state.assets[&token_id].control_asset,
            Some(control_id)
        );

        let reissue_packet = Packet::new(vec![
            Group {
                asset_id: Some(control_id),
                issuance: None,
                metadata: None,
                inputs: vec![AssetInput::Local { i: 0, amt: 1 }],
                outputs: vec![AssetOutput::Local { o: 0, amt: 1 }],
            },
            Group {
                asset_id: Some(token_id),
                issuance: None,
                metadata: None,
                inputs: vec![AssetInput::Local { i: 1, amt: 100 }],
                outputs: vec![AssetOutput::Local { o: 1, amt: 150 }],
            },
        ]);
        let reissue_tx = tx_with_packet(
            2,
            vec![
                crate::tx::TxIn {
                    txid: txid(1),
                    vout: 0,
                },
                crate::tx::TxIn {
                    txid: txid(1),
                    vout: 1,
                },
            ],
            &reissue_packet,
            2,
        );
        apply_tx(&reissue_tx, &mut state, Some(1)).unwrap();

        assert_eq!(
            state.utxos[&Outpoint::new(txid(2), 1)].get(&token_id),
            Some(150)
        );
    }

    #[test]
    fn immutable_metadata_update_is_rejected() {
        let mut metadata = MetadataMap::new();
        metadata.insert("name", "X");
        let packet = Packet::new(vec![Group {
            asset_id: None,
            issuance: Some(Issuance {
                control_asset: None,
                metadata: Some(metadata),
                immutable: true,
            }),
            metadata: None,
            inputs: vec![],
            outputs: vec![AssetOutput::Local { o: 0, amt: 1 }],
        }]);
        let genesis_tx = tx_with_packet(1, vec![], &packet, 1);
        let asset_id = AssetId::new(txid(1), 0);
        let mut state = State::genesis();
        apply_tx(&genesis_tx, &mut state, Some(0)).unwrap();

        let mut new_metadata = MetadataMap::new();
        new_metadata.insert("name", "Y");
        let update_packet = Packet::new(vec![Group {
            asset_id: Some(asset_id),
            issuance: None,
            metadata: Some(new_metadata),
            inputs: vec![AssetInput::Local { i: 0, amt: 1 }],
            outputs: vec![AssetOutput::Local { o: 0, amt: 1 }],
        }]);
        let update_tx = tx_with_packet(
            2,
            vec![crate::tx::TxIn {
                txid: txid(1),
                vout: 0,
            }],
            &update_packet,
            1,
        );

        let err = apply_tx(&update_tx, &mut state, Some(1)).unwrap_err();
        assert_eq!(err, IndexerError::MetadataUpdateOnImmutable(asset_id));
    }

    #[test]
    fn missing_marker_implicitly_burns_asset_balances() {
        let packet = Packet::new(vec![Group {
            asset_id: None,
            issuance: Some(Issuance::default()),
            metadata: None,
            inputs: vec![],
            outputs: vec![AssetOutput::Local { o: 0, amt: 10 }],
        }]);
        let genesis_tx = tx_with_packet(1, vec![], &packet, 1);
        let asset_id = AssetId::new(txid(1), 0);
        let mut state = State::genesis();
        apply_tx(&genesis_tx, &mut state, Some(0)).unwrap();
        assert!(state.utxos.contains_key(&Outpoint::new(txid(1), 0)));

        let burn_tx = Tx {
            txid: txid(2),
            vin: vec![crate::tx::TxIn {
                txid: txid(1),
                vout: 0,
            }],
            vout: vec![crate::tx::TxOut {
                n: 0,
                script_pubkey: vec![0x76, 0xa9],
            }],
        };
        apply_tx(&burn_tx, &mut state, Some(1)).unwrap();

        assert!(!state.utxos.contains_key(&Outpoint::new(txid(1), 0)));
        let _ = asset_id;
        let _ = script::OP_RETURN;
    }

    #[test]
    fn partial_consumption_of_an_input_is_rejected() {
        let packet = Packet::new(vec![Group {
            asset_id: None,
            issuance: Some(Issuance::default()),
            metadata: None,
            inputs: vec![],
            outputs: vec![AssetOutput::Local { o: 0, amt: 10 }],
        }]);
        let genesis_tx = tx_with_packet(1, vec![], &packet, 1);
        let asset_id = AssetId::new(txid(1), 0);
        let mut state = State::genesis();
        apply_tx(&genesis_tx, &mut state, Some(0)).unwrap();

        let partial_packet = Packet::new(vec![Group {
            asset_id: Some(asset_id),
            issuance: None,
            metadata: None,
            inputs: vec![AssetInput::Local { i: 0, amt: 4 }],
            outputs: vec![AssetOutput::Local { o: 0, amt: 4 }],
        }]);
        let partial_tx = tx_with_packet(
            2,
            vec![crate::tx::TxIn {
                txid: txid(1),
                vout: 0,
            }],
            &partial_packet,
            1,
        );

        let err = apply_tx(&partial_tx, &mut state, Some(1)).unwrap_err();
        assert_eq!(err, IndexerError::PartialInputConsumption(asset_id));
    }
}
