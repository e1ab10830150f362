//! NFT, fractional token and custody transitions.

use super::{missing, HandlerResult, Reconciler};
use crate::effects::{CoinListing, SideEffect};
use crate::error::ReconcileError;
use crate::event::{AssetRef, EventContext, FnftRef, MintFnft, TokenRef};
use crate::model::{advance, AssetStatus, CustodyStatus, FnftStatus, NftStatus};
use crate::store::Ledgers;
use alloy::primitives::U256;
use gateway::abi::{IFnft, IFractorNft};
use gateway::{ContractKind, GatewayError};
use rust_decimal::Decimal;
use serde_json::json;

/// Asset ids behind the NFTs of one fractional token.
fn assets_of(l: &Ledgers, nft_ids: &[String]) -> Vec<String> {
    nft_ids
        .iter()
        .filter_map(|id| l.nfts.get(id).map(|n| n.asset_id.clone()))
        .collect()
}

/// On-chain integer with `decimals` places as a Decimal.
fn to_decimal(raw: U256, decimals: u8) -> Result<Decimal, ReconcileError> {
    let n = u128::try_from(raw)
        .ok()
        .and_then(|n| i128::try_from(n).ok())
        .ok_or_else(|| ReconcileError::Malformed(format!("supply {raw} out of range")))?;
    Decimal::try_from_i128_with_scale(n, u32::from(decimals))
        .map(|d| d.normalize())
        .map_err(|e| ReconcileError::Malformed(format!("supply {raw} with {decimals} decimals: {e}")))
}

impl Reconciler {
    /// MintNFT: Draft → Minted once the token exists on chain; asset → ConvertedToNft.
    pub async fn mint_nft(&self, ctx: &EventContext, ev: &TokenRef) -> HandlerResult {
        let status = self.store.read(|l| l.nfts.get(&ev.token_id).map(|n| n.status)).await;
        match status {
            None => return Err(missing("nft", &ev.token_id)),
            Some(s) if s != NftStatus::Draft => {
                return Err(ReconcileError::precondition(format!("nft {} already {s:?}", ev.token_id)))
            }
            Some(_) => {}
        }
        let token_id = U256::from_str_radix(&ev.token_id, 10)
            .map_err(|e| ReconcileError::Malformed(format!("token id {}: {e}", ev.token_id)))?;
        let nft = self.chains.get_contract(ctx.chain_id, ContractKind::Nft).await?;
        let owner = match nft.call(&IFractorNft::ownerOfCall { tokenId: token_id }).await {
            Ok(r) => r._0,
            Err(GatewayError::TokenNotExist(reason)) => {
                return Err(ReconcileError::precondition(format!("token {} not on chain: {reason}", ev.token_id)))
            }
            Err(e) => return Err(e.into()),
        };

        self.store
            .transaction(|l| {
                let current = l.nfts.get(&ev.token_id).ok_or_else(|| missing("nft", &ev.token_id))?;
                if current.status != NftStatus::Draft {
                    return Err(ReconcileError::precondition(format!("nft {} already minted", ev.token_id)));
                }
                let asset_id = current.asset_id.clone();
                l.nfts.update(&ev.token_id, |n| {
                    n.status = NftStatus::Minted;
                    n.owner = Some(owner);
                })?;
                l.assets.update(&asset_id, |a| {
                    advance(&mut a.status, AssetStatus::ConvertedToNft);
                })?;
                tracing::info!(token_id = %ev.token_id, %owner, asset = %asset_id, "nft minted");
                Ok(Vec::new())
            })
            .await
    }

    /// MintFNFT: fractional token Draft → Active with its on-chain supply; NFTs, assets and
    /// custody cascade to fractionalized.
    pub async fn mint_fnft(&self, ctx: &EventContext, ev: &MintFnft) -> HandlerResult {
        let status = self.store.read(|l| l.fnfts.get(&ev.fnft_id).map(|f| f.status)).await;
        match status {
            None => return Err(missing("fnft", &ev.fnft_id)),
            Some(FnftStatus::Draft) => {}
            Some(s) => return Err(ReconcileError::precondition(format!("fnft {} already {s:?}", ev.fnft_id))),
        }
        let gw = self.chains.gateway(ctx.chain_id).await?;
        let token = gw.contract_at(ContractKind::Fnft, ev.token_address);
        let raw_supply = token.call(&IFnft::totalSupplyCall {}).await?._0;
        let decimals = token.call(&IFnft::decimalsCall {}).await?._0;
        let supply = to_decimal(raw_supply, decimals)?;

        self.store
            .transaction(|l| {
                let fnft = l.fnfts.get(&ev.fnft_id).ok_or_else(|| missing("fnft", &ev.fnft_id))?;
                if fnft.status != FnftStatus::Draft {
                    return Err(ReconcileError::precondition(format!("fnft {} already minted", ev.fnft_id)));
                }
                let nft_ids = fnft.nft_ids.clone();
                let asset_ids = assets_of(l, &nft_ids);
                l.fnfts.update(&ev.fnft_id, |f| {
                    f.status = FnftStatus::Active;
                    f.token_address = Some(ev.token_address);
                    f.total_supply = supply;
                    f.available_supply = supply;
                })?;
                l.nfts.update_many(
                    |n| nft_ids.contains(&n.token_id),
                    |n| {
                        advance(&mut n.status, NftStatus::Fractionalized);
                        n.fnft_id = Some(ev.fnft_id.clone());
                    },
                );
                l.assets.update_many(
                    |a| asset_ids.contains(&a.id),
                    |a| {
                        advance(&mut a.status, AssetStatus::Fractionalized);
                        advance(&mut a.custody, CustodyStatus::Frac);
                    },
                );
                tracing::info!(fnft = %ev.fnft_id, token = %ev.token_address, %supply, nfts = nft_ids.len(), "fnft minted");
                Ok(vec![
                    SideEffect::ListCoin(CoinListing {
                        fnft_id: ev.fnft_id.clone(),
                        token_address: ev.token_address,
                        chain_id: ctx.chain_id,
                        total_supply: supply,
                    }),
                    SideEffect::emit(
                        "fnft",
                        "minted",
                        json!({ "id": ev.fnft_id, "tokenAddress": ev.token_address, "totalSupply": supply }),
                    ),
                ])
            })
            .await
    }

    /// DeactivateFNFT: Active → Inactive, moving its NFTs and assets back one stage.
    pub async fn deactivate_fnft(&self, _ctx: &EventContext, ev: &FnftRef) -> HandlerResult {
        self.store
            .transaction(|l| {
                let fnft = l.fnfts.get(&ev.fnft_id).ok_or_else(|| missing("fnft", &ev.fnft_id))?;
                if fnft.status != FnftStatus::Active {
                    return Err(ReconcileError::precondition(format!(
                        "fnft {} is {:?}, not Active",
                        ev.fnft_id, fnft.status
                    )));
                }
                let nft_ids = fnft.nft_ids.clone();
                let asset_ids = assets_of(l, &nft_ids);
                l.fnfts.update(&ev.fnft_id, |f| f.status = FnftStatus::Inactive)?;
                l.nfts.update_many(
                    |n| nft_ids.contains(&n.token_id),
                    |n| {
                        n.status = NftStatus::Minted;
                        n.fnft_id = None;
                    },
                );
                l.assets.update_many(
                    |a| asset_ids.contains(&a.id),
                    |a| a.status = AssetStatus::ConvertedToNft,
                );
                tracing::info!(fnft = %ev.fnft_id, "fnft deactivated");
                Ok(Vec::new())
            })
            .await
    }

    /// DepositNFT: the physical asset entered custody.
    pub async fn deposit_nft(&self, _ctx: &EventContext, ev: &AssetRef) -> HandlerResult {
        self.store
            .transaction(|l| {
                let asset = l.assets.get(&ev.asset_id).ok_or_else(|| missing("asset", &ev.asset_id))?;
                if !matches!(asset.custody, CustodyStatus::Fractor | CustodyStatus::InReview) {
                    return Err(ReconcileError::precondition(format!(
                        "asset {} custody already {:?}",
                        ev.asset_id, asset.custody
                    )));
                }
                l.assets.update(&ev.asset_id, |a| a.custody = CustodyStatus::Frac)?;
                tracing::info!(asset = %ev.asset_id, "asset in custody");
                Ok(Vec::new())
            })
            .await
    }

    /// MergeFNFT: all fractions returned; the underlying assets become redeemable.
    pub async fn merge_fnft(&self, _ctx: &EventContext, ev: &FnftRef) -> HandlerResult {
        self.store
            .transaction(|l| {
                let fnft = l.fnfts.get(&ev.fnft_id).ok_or_else(|| missing("fnft", &ev.fnft_id))?;
                if fnft.status != FnftStatus::Active {
                    return Err(ReconcileError::precondition(format!(
                        "fnft {} is {:?}, cannot merge",
                        ev.fnft_id, fnft.status
                    )));
                }
                let asset_ids = assets_of(l, &fnft.nft_ids);
                l.fnfts.update(&ev.fnft_id, |f| f.status = FnftStatus::Merged)?;
                l.assets.update_many(
                    |a| asset_ids.contains(&a.id),
                    |a| {
                        advance(&mut a.custody, CustodyStatus::AvailableForRedeem);
                    },
                );
                tracing::info!(fnft = %ev.fnft_id, assets = asset_ids.len(), "fnft merged");
                Ok(Vec::new())
            })
            .await
    }

    /// RedeemNFT: NFT, asset and custody all terminate as Redeemed.
    pub async fn redeem_nft(&self, _ctx: &EventContext, ev: &TokenRef) -> HandlerResult {
        self.store
            .transaction(|l| {
                let nft = l.nfts.get(&ev.token_id).ok_or_else(|| missing("nft", &ev.token_id))?;
                match nft.status {
                    NftStatus::Minted | NftStatus::Fractionalized => {}
                    NftStatus::Redeemed => {
                        return Err(ReconcileError::precondition(format!("nft {} already redeemed", ev.token_id)))
                    }
                    other => {
                        return Err(ReconcileError::precondition(format!(
                            "nft {} is {other:?}, not redeemable",
                            ev.token_id
                        )))
                    }
                }
                let asset_id = nft.asset_id.clone();
                l.nfts.update(&ev.token_id, |n| n.status = NftStatus::Redeemed)?;
                l.assets.update(&asset_id, |a| {
                    advance(&mut a.status, AssetStatus::Redeemed);
                    advance(&mut a.custody, CustodyStatus::Redeemed);
                })?;
                tracing::info!(token_id = %ev.token_id, asset = %asset_id, "nft redeemed");
                Ok(Vec::new())
            })
            .await
    }
}
