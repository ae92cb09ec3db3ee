//! End-to-end scenarios over the full manager stack, with a scripted
//! indexer client and a deterministic signer.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::address::Address;
use common::amount::Amount;
use common::attribute::{AttributeValidationError, TransferAttribute};
use common::chain::ChainKind;
use common::unit::token_unit;
use secrecy::SecretString;
use wallet_core::bundle::{TransactionBundle, TransferBundle};
use wallet_core::chains::btc::{BtcWireTransaction, TxIo};
use wallet_core::chains::CreateTransferError;
use wallet_core::client::BLOCK_HEIGHT_UNBOUNDED;
use wallet_core::event::EventReceiver;
use wallet_core::fee::FeeBasis;
use wallet_core::manager::{
    AddressScheme, SyncMode, WalletManager, WalletManagerConfig,
};
use wallet_core::transfer::{
    SubmitError, TransferDirection, TransferState, TransferStateKind,
};

use support::{
    account_on, network, MockClient, MockSigner, BTC_ADDR_0, BTC_ADDR_1,
    BTC_TARGET, ETH_ADDR_0, XRP_ADDR_0,
};

fn manager_for(
    chain: ChainKind,
    address: &str,
    height: u64,
    client: &Arc<MockClient>,
    storage: &std::path::Path,
) -> (Arc<WalletManager>, EventReceiver) {
    logger::init_for_testing();
    let config = WalletManagerConfig {
        account: account_on(chain, address),
        network: network(chain, height),
        mode: SyncMode::ApiOnly,
        scheme: AddressScheme::Native,
        storage_path: storage.to_path_buf(),
        granularity: None,
    };
    WalletManager::create(config, client.clone(), MockSigner::new(), None)
        .unwrap()
}

fn xrp_bundle(hash_byte: u8, from: &str, to: &str, drops: u64) -> TransferBundle {
    TransferBundle {
        status: TransferStateKind::Included,
        hash: format!("{hash_byte:02x}").repeat(32),
        uids: format!("xrp:{hash_byte}"),
        from: from.to_owned(),
        to: to.to_owned(),
        amount: drops.to_string(),
        currency: "xrp".to_owned(),
        fee: Some("10".to_owned()),
        block_timestamp: 1_650_000_000,
        block_number: 70_000_000,
        block_confirmations: 12,
        block_transaction_index: 1,
        block_hash: "00".repeat(32),
        attributes: Vec::new(),
    }
}

/// S1: a sent Bitcoin transaction walks the whole state machine and the
/// fee/amount arithmetic holds at every step.
#[tokio::test]
async fn s1_sent_btc_transaction() {
    let client = MockClient::new(700_000);
    let tmp = tempfile::tempdir().unwrap();
    let (manager, _events) =
        manager_for(ChainKind::Btc, BTC_ADDR_0, 700_000, &client, tmp.path());
    let wallet = manager.primary_wallet();

    let fee_basis = FeeBasis::Bitcoin {
        chain: ChainKind::Btc,
        unit: wallet.unit_for_fee().clone(),
        sats_per_kb: 1000,
        size_bytes: 250,
    };
    let target = Address::parse(ChainKind::Btc, BTC_TARGET).unwrap();
    let amount = Amount::from_base(wallet.unit().clone(), 10_000);

    let transfer = wallet
        .create_transfer(target, amount, fee_basis, Vec::new())
        .unwrap();

    assert_eq!(transfer.direction(), TransferDirection::Sent);
    assert_eq!(transfer.amount().to_base_u64(), Some(10_000));
    assert_eq!(transfer.fee().unwrap().to_base_u64(), Some(250));

    let directed = transfer.amount_directed();
    assert!(directed.is_negative());
    assert_eq!(directed.to_base_u64(), Some(10_000));

    let net = transfer.amount_directed_net();
    assert!(net.is_negative());
    assert_eq!(net.to_base_u64(), Some(10_250));

    assert_eq!(transfer.state(), TransferState::Created);

    // Sign + submit.
    let paper_key = SecretString::new("ozone drill grab fiber".to_owned());
    manager
        .submit(&wallet, &transfer, &paper_key)
        .await
        .unwrap();
    assert_eq!(transfer.state(), TransferState::Submitted);
    assert_eq!(client.submissions.lock().unwrap().len(), 1);
    assert!(wallet.has_transfer(&transfer));

    // The indexer later reports the inclusion.
    let hash_hex = transfer.hash().unwrap().to_hex();
    let wire = BtcWireTransaction {
        txid: hash_hex,
        inputs: vec![TxIo {
            address: BTC_ADDR_0.to_owned(),
            value_sat: 20_000,
        }],
        outputs: vec![
            TxIo {
                address: BTC_TARGET.to_owned(),
                value_sat: 10_000,
            },
            // Change back to us.
            TxIo {
                address: BTC_ADDR_0.to_owned(),
                value_sat: 9_750,
            },
        ],
        fee_sat: 250,
    };
    let bundle = TransactionBundle {
        status: TransferStateKind::Included,
        serialization: serde_json::to_vec(&wire).unwrap(),
        timestamp: 1_700_000_000,
        block_height: 700_000,
    };
    manager.recover_from_transaction_bundle(&bundle).unwrap();

    match transfer.state() {
        TransferState::Included {
            block_number,
            timestamp,
            success,
            ..
        } => {
            assert_eq!(block_number, 700_000);
            assert_eq!(timestamp, 1_700_000_000);
            assert!(success);
        }
        other => panic!("expected inclusion, got {other:?}"),
    }

    let confirmed = transfer.confirmed_fee_basis().unwrap();
    assert_eq!(confirmed.fee().to_base_u64(), Some(250));

    // Balance reflects the directed-net amount of the included transfer.
    let balance = wallet.balance();
    assert!(balance.is_negative());
    assert_eq!(balance.to_base_u64(), Some(10_250));
}

/// A submission rejected by the indexer leaves the transfer ERRORED, and
/// a stale acknowledgement can never regress an INCLUDED transfer.
#[tokio::test]
async fn submit_failure_and_inclusion_race() {
    let client = MockClient::new(700_000);
    let tmp = tempfile::tempdir().unwrap();
    let (manager, _events) =
        manager_for(ChainKind::Btc, BTC_ADDR_0, 700_000, &client, tmp.path());
    let wallet = manager.primary_wallet();

    let fee_basis = FeeBasis::Bitcoin {
        chain: ChainKind::Btc,
        unit: wallet.unit_for_fee().clone(),
        sats_per_kb: 1000,
        size_bytes: 250,
    };
    let target = Address::parse(ChainKind::Btc, BTC_TARGET).unwrap();
    let paper_key = SecretString::new("ozone drill grab fiber".to_owned());

    // Failure path.
    client.fail_submit.store(true, Ordering::Relaxed);
    let failed = wallet
        .create_transfer(
            target.clone(),
            Amount::from_base(wallet.unit().clone(), 1_000),
            fee_basis.clone(),
            Vec::new(),
        )
        .unwrap();
    manager.submit(&wallet, &failed, &paper_key).await.unwrap();
    assert_eq!(
        failed.state(),
        TransferState::Errored {
            error: SubmitError::Unknown
        },
    );

    // Race path: the indexer includes the transfer before the submit
    // acknowledgement lands; the late ack must not regress the state.
    client.fail_submit.store(false, Ordering::Relaxed);
    let raced = wallet
        .create_transfer(
            target,
            Amount::from_base(wallet.unit().clone(), 2_000),
            fee_basis,
            Vec::new(),
        )
        .unwrap();
    manager.submit(&wallet, &raced, &paper_key).await.unwrap();
    wallet.apply_transfer_state(
        &raced,
        TransferState::included(700_001, 0, 1_700_000_600, None, true, None),
    );
    manager.announce_submit(&wallet, &raced, true);
    assert!(raced.state().is_included());
}

/// S2: an ERC-20 transfer pays its fee in ether; with incompatible units
/// the fee is absent and net equals directed.
#[tokio::test]
async fn s2_erc20_fee_unit_mismatch() {
    let client = MockClient::new(18_000_000);
    let tmp = tempfile::tempdir().unwrap();
    let (manager, _events) = manager_for(
        ChainKind::Eth,
        ETH_ADDR_0,
        18_000_000,
        &client,
        tmp.path(),
    );

    let usdt = token_unit("USDT", "0xdac17f958d2ee523a2206206994597c13d831ec7", 6);
    let token_wallet =
        manager.register_wallet(usdt.clone(), ChainKind::Eth.default_unit());

    let fee_basis = FeeBasis::Ethereum {
        unit: token_wallet.unit_for_fee().clone(),
        gas_price_wei: 20_000_000_000,
        gas_limit: 92_000,
    };
    let target = Address::parse(
        ChainKind::Eth,
        "0x52908400098527886e0f7030069857d2e4169ee7",
    )
    .unwrap();
    let amount = Amount::from_base(usdt, 25_000_000);

    let transfer = token_wallet
        .create_transfer(target, amount, fee_basis, Vec::new())
        .unwrap();

    assert_eq!(transfer.fee(), None);
    assert_eq!(transfer.amount_directed_net(), transfer.amount_directed());
}

/// S3: a sync round whose results reveal new owned addresses re-queries
/// exactly the delta under the same request id before completing.
#[tokio::test]
async fn s3_qry_address_growth() {
    let client = MockClient::new(1_000);
    let tmp = tempfile::tempdir().unwrap();
    let (manager, _events) =
        manager_for(ChainKind::Btc, BTC_ADDR_0, 1_000, &client, tmp.path());

    // The first query returns a transaction spending inputs at both our
    // seed address and a sibling we didn't know we owned.
    let wire = BtcWireTransaction {
        txid: "7a".repeat(32),
        inputs: vec![
            TxIo {
                address: BTC_ADDR_0.to_owned(),
                value_sat: 5_000,
            },
            TxIo {
                address: BTC_ADDR_1.to_owned(),
                value_sat: 3_000,
            },
        ],
        outputs: vec![TxIo {
            address: BTC_TARGET.to_owned(),
            value_sat: 7_750,
        }],
        fee_sat: 250,
    };
    client.push_transactions(vec![TransactionBundle {
        status: TransferStateKind::Included,
        serialization: serde_json::to_vec(&wire).unwrap(),
        timestamp: 1_600_000_000,
        block_height: 500,
    }]);

    manager.connect(None);
    manager.sync_tick().await;

    let queries = client.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 2);

    // First request: the seed address, with an unbounded end.
    assert_eq!(queries[0].addresses, vec![BTC_ADDR_0.to_owned()]);
    assert_eq!(queries[0].beg, 0);
    assert_eq!(queries[0].end, BLOCK_HEIGHT_UNBOUNDED);

    // Delta request: exactly the newly discovered address.
    assert_eq!(queries[1].addresses, vec![BTC_ADDR_1.to_owned()]);

    let wallet = manager.primary_wallet();
    let addresses: Vec<String> = wallet
        .addresses_for_recovery()
        .iter()
        .map(|a| a.to_string())
        .collect();
    assert!(addresses.contains(&BTC_ADDR_0.to_owned()));
    assert!(addresses.contains(&BTC_ADDR_1.to_owned()));

    let window = manager.sync_window();
    assert!(window.completed);
    assert!(window.success);
}

/// A failed round completes unsuccessfully and does not advance the
/// window's begin block.
#[tokio::test]
async fn failed_round_does_not_advance() {
    let client = MockClient::new(1_000);
    let tmp = tempfile::tempdir().unwrap();
    let (manager, _events) =
        manager_for(ChainKind::Xrp, XRP_ADDR_0, 1_000, &client, tmp.path());

    manager.connect(None);
    client.fail_queries.store(true, Ordering::Relaxed);
    manager.sync_tick().await;

    let window = manager.sync_window();
    assert!(window.completed);
    assert!(!window.success);
    assert_eq!(window.beg_block, 0);

    // The next tick retries the same range.
    client.fail_queries.store(false, Ordering::Relaxed);
    manager.sync_tick().await;
    let window = manager.sync_window();
    assert!(window.completed);
    assert!(window.success);
}

/// S4: the canonical transfer order is INCLUDED (by timestamp, block,
/// index) before everything else, and stable creation order after that.
#[tokio::test]
async fn s4_compare_ordering() {
    let client = MockClient::new(1_000);
    let tmp = tempfile::tempdir().unwrap();
    let (manager, _events) =
        manager_for(ChainKind::Xrp, XRP_ADDR_0, 1_000, &client, tmp.path());
    let wallet = manager.primary_wallet();

    let fee_basis = FeeBasis::Ripple {
        unit: wallet.unit_for_fee().clone(),
        fee_drops: 10,
    };
    let target = Address::parse(
        ChainKind::Xrp,
        "rLW9gnQo7BQhU6igk5keqYnH3TVrCxGRzm",
    )
    .unwrap();
    let mut mk = |tag: &str| {
        wallet
            .create_transfer(
                target.clone(),
                Amount::from_base(wallet.unit().clone(), 1_000_000),
                fee_basis.clone(),
                vec![TransferAttribute::new(
                    "DestinationTag",
                    Some(tag.to_owned()),
                    true,
                )],
            )
            .unwrap()
    };

    let a = mk("1");
    let b = mk("2");
    let c = mk("3");
    let d = mk("4");
    let e = mk("5");
    let f = mk("6");

    // (timestamp, block, index) per S4: A(0,0,0) B(0,0,1) C(0,1,0)
    // D(1,0,0); E and F stay CREATED.
    wallet.apply_transfer_state(
        &a,
        TransferState::included(0, 0, 0, None, true, None),
    );
    wallet.apply_transfer_state(
        &b,
        TransferState::included(0, 1, 0, None, true, None),
    );
    wallet.apply_transfer_state(
        &c,
        TransferState::included(1, 0, 0, None, true, None),
    );
    wallet.apply_transfer_state(
        &d,
        TransferState::included(0, 0, 1, None, true, None),
    );

    let mut sorted = vec![
        f.clone(),
        e.clone(),
        d.clone(),
        c.clone(),
        b.clone(),
        a.clone(),
    ];
    sorted.sort_by(|x, y| x.total_cmp(y));

    let ordinals: Vec<u64> = sorted.iter().map(|t| t.ordinal()).collect();
    let expected: Vec<u64> = [&a, &b, &c, &d, &e, &f]
        .iter()
        .map(|t| t.ordinal())
        .collect();
    assert_eq!(ordinals, expected);

    // Two CREATED transfers compare by stable identity.
    assert_eq!(e.total_cmp(&f), std::cmp::Ordering::Less);
    assert_eq!(f.total_cmp(&e), std::cmp::Ordering::Greater);
}

/// S5: XRP destination-tag validation.
#[tokio::test]
async fn s5_xrp_attribute_validation() {
    let client = MockClient::new(1_000);
    let tmp = tempfile::tempdir().unwrap();
    let (manager, _events) =
        manager_for(ChainKind::Xrp, XRP_ADDR_0, 1_000, &client, tmp.path());
    let wallet = manager.primary_wallet();

    // A target on the exchange list: the tag is required.
    let exchange = Address::parse(
        ChainKind::Xrp,
        "rLW9gnQo7BQhU6igk5keqYnH3TVrCxGRzm",
    )
    .unwrap();
    let fee_basis = FeeBasis::Ripple {
        unit: wallet.unit_for_fee().clone(),
        fee_drops: 10,
    };
    let amount = Amount::from_base(wallet.unit().clone(), 5_000_000);

    let attempt = |attrs: Vec<TransferAttribute>| {
        wallet.create_transfer(
            exchange.clone(),
            amount.clone(),
            fee_basis.clone(),
            attrs,
        )
    };

    match attempt(Vec::new()) {
        Err(CreateTransferError::Attribute(
            AttributeValidationError::RequiredButNotProvided,
        )) => {}
        other => panic!("expected missing-tag error, got {other:?}"),
    }

    let tag = |v: &str| {
        vec![TransferAttribute::new(
            "DestinationTag",
            Some(v.to_owned()),
            true,
        )]
    };
    match attempt(tag("abc")) {
        Err(CreateTransferError::Attribute(
            AttributeValidationError::MismatchedType,
        )) => {}
        other => panic!("expected type error, got {other:?}"),
    }

    assert!(attempt(tag("12345")).is_ok());
}

/// S6: a corrupt record on disk is skipped on load, syncing continues,
/// and re-recovering the transfer re-writes the record.
#[tokio::test]
async fn s6_file_service_resilience() {
    let tmp = tempfile::tempdir().unwrap();

    // First life: recover two transfers; both are persisted.
    {
        let client = MockClient::new(1_000);
        let (manager, _events) =
            manager_for(ChainKind::Xrp, XRP_ADDR_0, 1_000, &client, tmp.path());
        manager
            .recover_from_transfer_bundle(&xrp_bundle(
                0x11,
                XRP_ADDR_0,
                "rLW9gnQo7BQhU6igk5keqYnH3TVrCxGRzm",
                1_000_000,
            ))
            .unwrap();
        manager
            .recover_from_transfer_bundle(&xrp_bundle(
                0x22,
                "rLW9gnQo7BQhU6igk5keqYnH3TVrCxGRzm",
                XRP_ADDR_0,
                2_000_000,
            ))
            .unwrap();
        assert_eq!(manager.primary_wallet().transfers().len(), 2);
        manager.stop();
    }

    // Corrupt the record of the 0x11 transfer.
    let corrupt_id = format!("{:02x}", 0x11).repeat(32);
    let mut corrupted = false;
    for entry in walk(tmp.path()) {
        if entry.file_name().map(|n| n.to_string_lossy().into_owned())
            == Some(format!("{corrupt_id}.bin"))
        {
            std::fs::write(&entry, b"garbage").unwrap();
            corrupted = true;
        }
    }
    assert!(corrupted, "did not find the record to corrupt");

    // Second life: the corrupt record is skipped, the good one loads.
    let client = MockClient::new(1_000);
    let (manager, _events) =
        manager_for(ChainKind::Xrp, XRP_ADDR_0, 1_000, &client, tmp.path());
    let wallet = manager.primary_wallet();
    assert_eq!(wallet.transfers().len(), 1);

    // Syncing resumes.
    manager.connect(None);
    manager.sync_tick().await;
    assert!(manager.sync_window().success);

    // The corrupted transfer comes back on the next recovery, and its
    // record is rewritten.
    manager
        .recover_from_transfer_bundle(&xrp_bundle(
            0x11,
            XRP_ADDR_0,
            "rLW9gnQo7BQhU6igk5keqYnH3TVrCxGRzm",
            1_000_000,
        ))
        .unwrap();
    assert_eq!(wallet.transfers().len(), 2);
    manager.stop();

    let client = MockClient::new(1_000);
    let (manager, _events) =
        manager_for(ChainKind::Xrp, XRP_ADDR_0, 1_000, &client, tmp.path());
    assert_eq!(manager.primary_wallet().transfers().len(), 2);
}

/// The wallet balance invariant: balance equals the sum of directed-net
/// amounts over INCLUDED transfers only.
#[tokio::test]
async fn balance_tracks_included_transfers() {
    let client = MockClient::new(1_000);
    let tmp = tempfile::tempdir().unwrap();
    let (manager, _events) =
        manager_for(ChainKind::Xrp, XRP_ADDR_0, 1_000, &client, tmp.path());
    let wallet = manager.primary_wallet();

    // Received 2_000_000 drops (no fee for the receiver side of the
    // balance: received nets ignore the sender's fee).
    manager
        .recover_from_transfer_bundle(&xrp_bundle(
            0x31,
            "rLW9gnQo7BQhU6igk5keqYnH3TVrCxGRzm",
            XRP_ADDR_0,
            2_000_000,
        ))
        .unwrap();
    assert_eq!(wallet.balance().to_base_u64(), Some(2_000_000));

    // Sent 500_000 with a 10 drop fee.
    manager
        .recover_from_transfer_bundle(&xrp_bundle(
            0x32,
            XRP_ADDR_0,
            "rLW9gnQo7BQhU6igk5keqYnH3TVrCxGRzm",
            500_000,
        ))
        .unwrap();
    let expected: u64 = 2_000_000 - 500_000 - 10;
    assert_eq!(wallet.balance().to_base_u64(), Some(expected));

    // A submitted-but-not-included transfer does not move the balance.
    let fee_basis = FeeBasis::Ripple {
        unit: wallet.unit_for_fee().clone(),
        fee_drops: 10,
    };
    let pending = wallet
        .create_transfer(
            Address::parse(ChainKind::Xrp, "rDarPNJEpCnpBZSfmcquydockkePkjPGA2")
                .unwrap(),
            Amount::from_base(wallet.unit().clone(), 100_000),
            fee_basis,
            Vec::new(),
        )
        .unwrap();
    let paper_key = SecretString::new("ozone drill grab fiber".to_owned());
    manager.submit(&wallet, &pending, &paper_key).await.unwrap();
    assert_eq!(wallet.balance().to_base_u64(), Some(expected));
}

fn walk(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                out.extend(walk(&path));
            } else {
                out.push(path);
            }
        }
    }
    out
}
