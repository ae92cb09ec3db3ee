//! Durable-form round-trips: every chain's fee bases, states, attributes
//! and full transfer records survive encode → decode unchanged.

use common::address::Address;
use common::amount::{Amount, U256};
use common::attribute::TransferAttribute;
use common::chain::ChainKind;
use common::hash::TxHash;
use common::test_utils::roundtrip::json_roundtrip_ok;
use common::unit::token_unit;
use proptest::prelude::*;
use wallet_core::chains::{btc, eth, hbar, xrp, xtz, TransferPayload};
use wallet_core::fee::{FeeBasis, XtzFee};
use wallet_core::transfer::{
    SubmitError, TransferDirection, TransferRecord, TransferState,
};

fn fee_basis_for(chain: ChainKind) -> FeeBasis {
    let unit = chain.base_unit();
    match chain {
        ChainKind::Btc | ChainKind::Bch | ChainKind::Bsv => FeeBasis::Bitcoin {
            chain,
            unit,
            sats_per_kb: 1731,
            size_bytes: 402,
        },
        ChainKind::Eth => FeeBasis::Ethereum {
            unit,
            gas_price_wei: 31_000_000_007,
            gas_limit: 21_000,
        },
        ChainKind::Hbar => FeeBasis::Hedera {
            unit,
            fee_tinybar: 500_001,
        },
        ChainKind::Xrp => FeeBasis::Ripple {
            unit,
            fee_drops: 12,
        },
        ChainKind::Xtz => FeeBasis::Tezos {
            unit,
            fee: XtzFee::Estimate {
                mutez_per_kb: 1420,
                size_bytes: 260,
                gas_limit: 10_600,
                storage_limit: 257,
            },
        },
    }
}

fn payload_for(chain: ChainKind, hash: TxHash) -> TransferPayload {
    match chain {
        ChainKind::Btc | ChainKind::Bch | ChainKind::Bsv =>
            TransferPayload::Bitcoin(btc::BtcPayload {
                chain,
                txid: Some(hash),
                raw: Some(vec![0xde, 0xad, 0xbe, 0xef]),
                block_height: 700_123,
                timestamp: 1_700_000_321,
                is_deleted: false,
                fee_sat: 250,
                send_sat: 20_000,
                recv_sat: 9_750,
            }),
        ChainKind::Eth => TransferPayload::Ethereum(eth::EthPayload {
            basis: eth::EthBasis::Log {
                log_index: 7,
                token_contract:
                    "0xdac17f958d2ee523a2206206994597c13d831ec7".to_owned(),
            },
            hash: Some(hash),
            raw: None,
        }),
        ChainKind::Hbar => TransferPayload::Hedera(hbar::HbarPayload {
            hash: Some(hash),
            transaction_id: Some("0.0.98@1700000000.000000001".to_owned()),
            raw: None,
        }),
        ChainKind::Xrp => TransferPayload::Ripple(xrp::XrpPayload {
            hash: Some(hash),
            raw: None,
        }),
        ChainKind::Xtz => TransferPayload::Tezos(xtz::XtzPayload {
            operation_hash: Some(hash),
            raw: None,
        }),
    }
}

fn address_for(chain: ChainKind) -> Address {
    let s = match chain {
        ChainKind::Btc | ChainKind::Bch | ChainKind::Bsv =>
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
        ChainKind::Eth => "0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae",
        ChainKind::Hbar => "0.0.98",
        ChainKind::Xrp => "rDarPNJEpCnpBZSfmcquydockkePkjPGA2",
        ChainKind::Xtz => "tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx",
    };
    Address::parse(chain, s).unwrap()
}

fn record_for(chain: ChainKind, state: TransferState) -> TransferRecord {
    let hash =
        TxHash::from_hex(chain, &"5c".repeat(TxHash::len_for(chain))).unwrap();
    let unit = if chain == ChainKind::Eth {
        token_unit("USDT", "0xdac17f958d2ee523a2206206994597c13d831ec7", 6)
    } else {
        chain.default_unit()
    };

    TransferRecord {
        chain,
        source: address_for(chain),
        target: address_for(chain),
        state,
        unit: unit.clone(),
        unit_for_fee: chain.default_unit(),
        fee_basis_estimated: fee_basis_for(chain),
        direction: TransferDirection::Sent,
        amount: Amount::new(unit, false, U256::from(123_456_789u64)),
        attributes: vec![
            TransferAttribute::new("DestinationTag", Some("77".into()), true),
            TransferAttribute::new("Memo", None, false),
        ],
        uids: Some("indexer:abc:1".to_owned()),
        payload: payload_for(chain, hash),
    }
}

#[test]
fn fee_bases_roundtrip_per_chain() {
    for chain in ChainKind::ALL {
        json_roundtrip_ok(&fee_basis_for(chain));
    }
    // The XTZ actual variant too.
    json_roundtrip_ok(&FeeBasis::Tezos {
        unit: ChainKind::Xtz.base_unit(),
        fee: XtzFee::Actual { fee_mutez: 423 },
    });
}

#[test]
fn states_roundtrip() {
    let states = [
        TransferState::Created,
        TransferState::Signed,
        TransferState::Submitted,
        TransferState::included(
            700_000,
            3,
            1_700_000_000,
            Some(fee_basis_for(ChainKind::Btc)),
            true,
            None,
        ),
        TransferState::included(700_000, 3, 1_700_000_000, None, false, Some("reverted")),
        TransferState::errored(SubmitError::Unknown),
        TransferState::errored(SubmitError::Posix { errnum: 32 }),
        TransferState::Deleted,
    ];
    for state in states {
        json_roundtrip_ok(&state);
    }
}

#[test]
fn transfer_records_roundtrip_per_chain() {
    for chain in ChainKind::ALL {
        json_roundtrip_ok(&record_for(chain, TransferState::Submitted));
        json_roundtrip_ok(&record_for(
            chain,
            TransferState::included(
                1_234_567,
                4,
                1_650_000_000,
                Some(fee_basis_for(chain)),
                true,
                None,
            ),
        ));
    }
}

proptest! {
    #[test]
    fn included_states_roundtrip(
        block in 0u64..u64::MAX,
        index in 0u64..10_000,
        timestamp in 0u64..u64::MAX,
        success in any::<bool>(),
        error in proptest::option::of("[ -~]{0,80}"),
    ) {
        let state = TransferState::included(
            block,
            index,
            timestamp,
            Some(fee_basis_for(ChainKind::Xrp)),
            success,
            error.as_deref(),
        );
        let json = serde_json::to_value(&state).unwrap();
        let back: TransferState = serde_json::from_value(json).unwrap();
        prop_assert_eq!(back, state);
    }

    #[test]
    fn attributes_roundtrip(
        key in "[A-Za-z]{1,16}",
        value in proptest::option::of("[ -~]{0,40}"),
        required in any::<bool>(),
    ) {
        let attr = TransferAttribute::new(key, value, required);
        let json = serde_json::to_value(&attr).unwrap();
        let back: TransferAttribute = serde_json::from_value(json).unwrap();
        prop_assert_eq!(back, attr);
    }
}
