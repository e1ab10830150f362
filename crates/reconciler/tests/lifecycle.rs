//! Integration test: asset / NFT / fractional-token cascades, admin sync and staking.

mod common;

use alloy::primitives::{Address, U256};
use common::{asset, buyer, event, fnft, nft, offering, tx, Harness, Recorder, FNFT_TOKEN, TOKEN_OWNER};
use reconciler::model::*;
use reconciler::store::Collection;
use reconciler::{DispatchReport, Ledgers};
use rust_decimal::Decimal;
use serde_json::json;

/// Asset "a1" with draft NFT "1"; draft fractional token "f1" over it.
fn draft_ledgers() -> Ledgers {
    Ledgers {
        assets: Collection::from_docs([asset("a1", AssetStatus::IaoApproved, CustodyStatus::InReview)]),
        nfts: Collection::from_docs([nft("1", "a1", NftStatus::Draft)]),
        fnfts: Collection::from_docs([fnft("f1", &["1"], FnftStatus::Draft, 0)]),
        ..Ledgers::default()
    }
}

fn mint_fnft() -> reconciler::InboundEvent {
    event(
        "MintFNFT",
        Some(&tx(2)),
        json!({"fnftId": "f1", "tokenAddress": FNFT_TOKEN}),
    )
}

#[tokio::test]
async fn mint_nft_checks_chain_and_cascades() {
    let h = Harness::new(draft_ledgers());
    let ev = event("MintNFT", Some(&tx(1)), json!({"tokenId": "1"}));
    assert!(h.dispatcher.dispatch(ev.clone()).await.is_applied());

    let l = h.ledgers().await;
    let n = l.nfts.get("1").unwrap();
    assert_eq!(n.status, NftStatus::Minted);
    assert_eq!(n.owner, Some(TOKEN_OWNER.parse::<Address>().unwrap()));
    assert_eq!(l.assets.get("a1").unwrap().status, AssetStatus::ConvertedToNft);

    let calls = h.chain.calls("eth_call");
    assert!(matches!(h.dispatcher.dispatch(ev).await, DispatchReport::Skipped(_)));
    assert_eq!(h.chain.calls("eth_call"), calls, "duplicate should not reach the chain");
}

#[tokio::test]
async fn mint_nft_for_missing_token_is_skipped_without_retry() {
    let h = Harness::new(draft_ledgers());
    h.chain.unminted.lock().unwrap().insert(U256::from(1u64));
    let report = h
        .dispatcher
        .dispatch(event("MintNFT", Some(&tx(1)), json!({"tokenId": "1"})))
        .await;
    assert!(matches!(report, DispatchReport::Skipped(ref r) if r.contains("not on chain")), "{report:?}");
    assert_eq!(h.chain.calls("eth_call"), 1);
    assert_eq!(h.ledgers().await.nfts.get("1").unwrap().status, NftStatus::Draft);
}

#[tokio::test]
async fn mint_fnft_reads_supply_and_lists_coin() {
    let mut l = draft_ledgers();
    l.nfts.update("1", |n| n.status = NftStatus::Minted).unwrap();
    let h = Harness::new(l);
    assert!(h.dispatcher.dispatch(mint_fnft()).await.is_applied());

    let l = h.ledgers().await;
    let f = l.fnfts.get("f1").unwrap();
    assert_eq!(f.status, FnftStatus::Active);
    assert_eq!(f.total_supply, Decimal::from(1_000));
    assert_eq!(f.available_supply, Decimal::from(1_000));
    assert_eq!(l.nfts.get("1").unwrap().status, NftStatus::Fractionalized);
    assert_eq!(l.nfts.get("1").unwrap().fnft_id.as_deref(), Some("f1"));
    let a = l.assets.get("a1").unwrap();
    assert_eq!(a.status, AssetStatus::Fractionalized);
    assert_eq!(a.custody, CustodyStatus::Frac);
    assert_eq!(h.recorder.entries(), vec!["coin:f1".to_string(), "emit:fnft:minted".to_string()]);

    assert!(matches!(h.dispatcher.dispatch(mint_fnft()).await, DispatchReport::Skipped(_)));
}

#[tokio::test]
async fn partner_failure_does_not_roll_back() {
    let recorder = Recorder {
        fail_partner: true,
        ..Recorder::default()
    };
    let h = Harness::with(draft_ledgers(), recorder);
    let report = h.dispatcher.dispatch(mint_fnft()).await;
    assert_eq!(
        report,
        DispatchReport::Applied {
            effects: 2,
            failed_effects: 1
        }
    );
    assert_eq!(h.ledgers().await.fnfts.get("f1").unwrap().status, FnftStatus::Active);
}

#[tokio::test]
async fn deactivate_fnft_moves_cascade_backward() {
    let h = Harness::new(draft_ledgers());
    h.dispatcher.dispatch(mint_fnft()).await;
    let deactivate = event("DeactivateFNFT", Some(&tx(3)), json!({"fnftId": "f1"}));
    assert!(h.dispatcher.dispatch(deactivate.clone()).await.is_applied());

    let l = h.ledgers().await;
    assert_eq!(l.fnfts.get("f1").unwrap().status, FnftStatus::Inactive);
    assert_eq!(l.nfts.get("1").unwrap().status, NftStatus::Minted);
    assert_eq!(l.nfts.get("1").unwrap().fnft_id, None);
    assert_eq!(l.assets.get("a1").unwrap().status, AssetStatus::ConvertedToNft);

    assert!(matches!(h.dispatcher.dispatch(deactivate).await, DispatchReport::Skipped(_)));
}

#[tokio::test]
async fn custody_deposit_merge_and_redeem() {
    let h = Harness::new(draft_ledgers());
    let deposit_nft = event("DepositNFT", Some(&tx(1)), json!({"assetId": "a1"}));
    assert!(h.dispatcher.dispatch(deposit_nft.clone()).await.is_applied());
    assert!(matches!(h.dispatcher.dispatch(deposit_nft).await, DispatchReport::Skipped(_)));
    assert_eq!(h.ledgers().await.assets.get("a1").unwrap().custody, CustodyStatus::Frac);

    h.dispatcher.dispatch(mint_fnft()).await;
    let merge = event("MergeFNFT", Some(&tx(4)), json!({"fnftId": "f1"}));
    assert!(h.dispatcher.dispatch(merge.clone()).await.is_applied());
    assert!(matches!(h.dispatcher.dispatch(merge).await, DispatchReport::Skipped(_)));
    let l = h.ledgers().await;
    assert_eq!(l.fnfts.get("f1").unwrap().status, FnftStatus::Merged);
    assert_eq!(l.assets.get("a1").unwrap().custody, CustodyStatus::AvailableForRedeem);

    let redeem = event("RedeemNFT", Some(&tx(5)), json!({"tokenId": "1"}));
    assert!(h.dispatcher.dispatch(redeem.clone()).await.is_applied());
    assert!(matches!(h.dispatcher.dispatch(redeem).await, DispatchReport::Skipped(_)));
    let l = h.ledgers().await;
    assert_eq!(l.nfts.get("1").unwrap().status, NftStatus::Redeemed);
    let a = l.assets.get("a1").unwrap();
    assert_eq!(a.status, AssetStatus::Redeemed);
    assert_eq!(a.custody, CustodyStatus::Redeemed);
}

#[tokio::test]
async fn draft_nft_cannot_be_redeemed() {
    let h = Harness::new(draft_ledgers());
    let report = h
        .dispatcher
        .dispatch(event("RedeemNFT", Some(&tx(5)), json!({"tokenId": "1"})))
        .await;
    assert!(matches!(report, DispatchReport::Skipped(ref r) if r.contains("not redeemable")), "{report:?}");

    let l = h.ledgers().await;
    assert_eq!(l.nfts.get("1").unwrap().status, NftStatus::Draft);
    let a = l.assets.get("a1").unwrap();
    assert_eq!(a.status, AssetStatus::IaoApproved);
    assert_eq!(a.custody, CustodyStatus::InReview);
}

#[tokio::test]
async fn create_iao_event_puts_offering_on_chain() {
    let mut l = draft_ledgers();
    let mut o = offering("iao-1", "f1", 1_000);
    o.on_chain_status = OnChainStatus::Draft;
    l.offerings = Collection::from_docs([o]);
    let h = Harness::new(l);
    h.dispatcher.dispatch(mint_fnft()).await;

    let create = event("CreateIAOEvent", Some(&tx(6)), json!({"iaoEventId": "iao-1"}));
    assert!(h.dispatcher.dispatch(create.clone()).await.is_applied());
    assert!(matches!(h.dispatcher.dispatch(create).await, DispatchReport::Skipped(_)));
    let l = h.ledgers().await;
    assert_eq!(l.offerings.get("iao-1").unwrap().on_chain_status, OnChainStatus::OnChain);
    assert_eq!(l.assets.get("a1").unwrap().status, AssetStatus::IaoEvent);
    assert_eq!(h.recorder.count("emit:iao-event:created"), 1);
}

#[tokio::test]
async fn set_admin_syncs_role_once() {
    let wallet = Address::repeat_byte(0x0a);
    let l = Ledgers {
        admins: Collection::from_docs([Admin {
            wallet,
            role: AdminRole::OperationAdmin,
            status: RecordStatus::Active,
            on_chain_status: OnChainStatus::Draft,
            updated_at: chrono::Utc::now(),
        }]),
        ..Ledgers::default()
    };
    let h = Harness::new(l);
    let ev = event(
        "SetAdmin",
        Some(&tx(1)),
        json!({"wallet": wallet.to_string(), "role": "MasterBd", "isActive": true}),
    );
    assert!(h.dispatcher.dispatch(ev.clone()).await.is_applied());
    assert!(matches!(h.dispatcher.dispatch(ev).await, DispatchReport::Skipped(_)));
    let admin = h.ledgers().await.admins.get(&wallet.to_string()).cloned().unwrap();
    assert_eq!(admin.role, AdminRole::MasterBd);
    assert_eq!(admin.on_chain_status, OnChainStatus::OnChain);
}

#[tokio::test]
async fn staking_is_idempotent_per_transaction() {
    let l = Ledgers {
        pools: Collection::from_docs([TieringPool {
            pool_id: "p1".into(),
            status: OnChainStatus::Draft,
            token: None,
            updated_at: chrono::Utc::now(),
        }]),
        ..Ledgers::default()
    };
    let h = Harness::new(l);
    let change = |amount: i64| json!({"poolId": "p1", "account": buyer(0x31).to_string(), "amount": amount.to_string()});

    // Pool still draft.
    assert!(matches!(
        h.dispatcher.dispatch(event("Stake", Some(&tx(1)), change(10))).await,
        DispatchReport::Skipped(_)
    ));
    let create = event("CreateTieringPool", Some(&tx(2)), json!({"poolId": "p1"}));
    assert!(h.dispatcher.dispatch(create.clone()).await.is_applied());
    assert!(matches!(h.dispatcher.dispatch(create).await, DispatchReport::Skipped(_)));

    let reports = h
        .dispatcher
        .dispatch_all([
            event("Stake", Some(&tx(3)), change(100)),
            event("Stake", Some(&tx(3)), change(100)),
            event("Unstake", Some(&tx(4)), change(40)),
            event("Unstake", Some(&tx(5)), change(61)),
        ])
        .await;
    assert!(reports[0].is_applied());
    assert!(matches!(reports[1], DispatchReport::Skipped(_)));
    assert!(reports[2].is_applied());
    assert!(matches!(reports[3], DispatchReport::Failed { fatal: true, .. }));

    let l = h.ledgers().await;
    let pos = l.stakes.get(&StakePosition::key_for("p1", &buyer(0x31))).unwrap();
    assert_eq!(pos.staked, Decimal::from(60));
    assert_eq!(l.stake_receipts.len(), 2);
}
