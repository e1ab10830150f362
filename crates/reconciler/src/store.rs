//! In-memory transactional document store.
//!
//! Repository operations (`find_one`, `find_one_and_update`, `update_many`, `aggregate`,
//! watermark-conditional updates) over typed collections. A transaction runs against a
//! private copy of every collection and is swapped in only on success, so a failed or
//! panicking handler leaves no partial writes.

use crate::error::StoreError;
use crate::model::{
    Admin, Asset, Fnft, Nft, Offering, Purchase, RevenueEntry, StakePosition, StakeReceipt, TieringPool,
    WhitelistEntry, WithdrawalRequest,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// A storable record with a natural key and an `updated_at` watermark.
pub trait Document: Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    fn key(&self) -> String;
    fn updated_at(&self) -> DateTime<Utc>;
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

macro_rules! document {
    ($ty:ty, $name:literal, |$d:ident| $key:expr) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $name;
            fn key(&self) -> String {
                let $d = self;
                $key
            }
            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
            fn set_updated_at(&mut self, at: DateTime<Utc>) {
                self.updated_at = at;
            }
        }
    };
}

document!(Asset, "assets", |d| d.id.clone());
document!(Nft, "nfts", |d| d.token_id.clone());
document!(Fnft, "fnfts", |d| d.id.clone());
document!(Offering, "offerings", |d| d.id.clone());
document!(Purchase, "purchases", |d| d.tx_hash.clone());
document!(WhitelistEntry, "whitelist", |d| WhitelistEntry::key_for(&d.offering_id, &d.wallet));
document!(RevenueEntry, "revenue_entries", |d| d.id.clone());
document!(WithdrawalRequest, "withdrawal_requests", |d| d.id.clone());
document!(Admin, "admins", |d| d.wallet.to_string());
document!(TieringPool, "tiering_pools", |d| d.pool_id.clone());
document!(StakePosition, "stake_positions", |d| StakePosition::key_for(&d.pool_id, &d.account));
document!(StakeReceipt, "stake_receipts", |d| d.tx_hash.clone());

/// Bump the watermark strictly forward so a conditional update always observes a change.
fn touch<T: Document>(doc: &mut T) {
    let floor = doc.updated_at() + Duration::microseconds(1);
    doc.set_updated_at(Utc::now().max(floor));
}

#[derive(Debug, Clone)]
pub struct Collection<T: Document> {
    docs: BTreeMap<String, T>,
}

impl<T: Document> Default for Collection<T> {
    fn default() -> Self {
        Self { docs: BTreeMap::new() }
    }
}

impl<T: Document> Collection<T> {
    pub fn from_docs(docs: impl IntoIterator<Item = T>) -> Self {
        Self {
            docs: docs.into_iter().map(|d| (d.key(), d)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.docs.get(key)
    }

    pub fn find_one(&self, pred: impl Fn(&T) -> bool) -> Option<&T> {
        self.docs.values().find(|d| pred(d))
    }

    pub fn find<'a>(&'a self, pred: impl Fn(&T) -> bool + 'a) -> impl Iterator<Item = &'a T> + 'a {
        self.docs.values().filter(move |d| pred(d))
    }

    pub fn insert(&mut self, mut doc: T) -> Result<(), StoreError> {
        let key = doc.key();
        if self.docs.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                collection: T::COLLECTION,
                key,
            });
        }
        touch(&mut doc);
        self.docs.insert(key, doc);
        Ok(())
    }

    /// Apply `f` to the document under `key`; returns the updated document.
    pub fn update(&mut self, key: &str, f: impl FnOnce(&mut T)) -> Result<T, StoreError> {
        let doc = self.docs.get_mut(key).ok_or_else(|| StoreError::NotFound {
            collection: T::COLLECTION,
            key: key.to_string(),
        })?;
        f(doc);
        touch(doc);
        Ok(doc.clone())
    }

    /// Update the first document matching `pred`; None when nothing matches.
    pub fn find_one_and_update(&mut self, pred: impl Fn(&T) -> bool, f: impl FnOnce(&mut T)) -> Option<T> {
        let doc = self.docs.values_mut().find(|d| pred(d))?;
        f(doc);
        touch(doc);
        Some(doc.clone())
    }

    /// Apply `f` to every matching document; returns how many were touched.
    pub fn update_many(&mut self, pred: impl Fn(&T) -> bool, mut f: impl FnMut(&mut T)) -> usize {
        let mut n = 0;
        for doc in self.docs.values_mut().filter(|d| pred(d)) {
            f(doc);
            touch(doc);
            n += 1;
        }
        n
    }

    /// Compare-and-swap on the `updated_at` watermark read earlier by the caller.
    pub fn update_if_unchanged(
        &mut self,
        key: &str,
        watermark: DateTime<Utc>,
        f: impl FnOnce(&mut T),
    ) -> Result<T, StoreError> {
        let current = self.docs.get(key).ok_or_else(|| StoreError::NotFound {
            collection: T::COLLECTION,
            key: key.to_string(),
        })?;
        if current.updated_at() != watermark {
            return Err(StoreError::Conflict {
                collection: T::COLLECTION,
                key: key.to_string(),
            });
        }
        self.update(key, f)
    }

    pub fn aggregate<A>(&self, pred: impl Fn(&T) -> bool, init: A, fold: impl FnMut(A, &T) -> A) -> A {
        self.docs.values().filter(|d| pred(d)).fold(init, fold)
    }
}

/// Every collection the reconciler touches.
#[derive(Debug, Clone, Default)]
pub struct Ledgers {
    pub assets: Collection<Asset>,
    pub nfts: Collection<Nft>,
    pub fnfts: Collection<Fnft>,
    pub offerings: Collection<Offering>,
    pub purchases: Collection<Purchase>,
    pub whitelist: Collection<WhitelistEntry>,
    pub revenue: Collection<RevenueEntry>,
    pub withdrawals: Collection<WithdrawalRequest>,
    pub admins: Collection<Admin>,
    pub pools: Collection<TieringPool>,
    pub stakes: Collection<StakePosition>,
    pub stake_receipts: Collection<StakeReceipt>,
}

/// Records created by administrative actions outside the reconciler.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Seed {
    pub assets: Vec<Asset>,
    pub nfts: Vec<Nft>,
    pub fnfts: Vec<Fnft>,
    pub offerings: Vec<Offering>,
    pub whitelist: Vec<WhitelistEntry>,
    pub revenue: Vec<RevenueEntry>,
    pub withdrawals: Vec<WithdrawalRequest>,
    pub admins: Vec<Admin>,
    pub pools: Vec<TieringPool>,
}

impl From<Seed> for Ledgers {
    fn from(seed: Seed) -> Self {
        Ledgers {
            assets: Collection::from_docs(seed.assets),
            nfts: Collection::from_docs(seed.nfts),
            fnfts: Collection::from_docs(seed.fnfts),
            offerings: Collection::from_docs(seed.offerings),
            whitelist: Collection::from_docs(seed.whitelist),
            revenue: Collection::from_docs(seed.revenue),
            withdrawals: Collection::from_docs(seed.withdrawals),
            admins: Collection::from_docs(seed.admins),
            pools: Collection::from_docs(seed.pools),
            ..Ledgers::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    ledgers: Mutex<Ledgers>,
}

impl MemoryStore {
    pub fn new(ledgers: Ledgers) -> Self {
        Self {
            ledgers: Mutex::new(ledgers),
        }
    }

    /// Read outside any transaction (e.g. to capture a watermark).
    pub async fn read<R>(&self, f: impl FnOnce(&Ledgers) -> R) -> R {
        let guard = self.ledgers.lock().await;
        f(&guard)
    }

    pub async fn snapshot(&self) -> Ledgers {
        self.ledgers.lock().await.clone()
    }

    /// Run `f` atomically: all of its writes become visible together, or none do.
    ///
    /// Transactions are serialized; `f` must not await.
    pub async fn transaction<R, E>(&self, f: impl FnOnce(&mut Ledgers) -> Result<R, E>) -> Result<R, E> {
        let mut guard = self.ledgers.lock().await;
        let mut working = guard.clone();
        let out = f(&mut working)?;
        *guard = working;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetStatus, CustodyStatus};

    fn asset(id: &str) -> Asset {
        Asset {
            id: id.into(),
            owner_id: "owner".into(),
            status: AssetStatus::Open,
            custody: CustodyStatus::Fractor,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut c = Collection::default();
        c.insert(asset("a")).unwrap();
        assert!(matches!(c.insert(asset("a")), Err(StoreError::DuplicateKey { .. })));
    }

    #[test]
    fn watermark_mismatch_is_conflict() {
        let mut c = Collection::from_docs([asset("a")]);
        let seen = c.get("a").unwrap().updated_at;
        c.update("a", |d| d.status = AssetStatus::IaoApproved).unwrap();
        let err = c
            .update_if_unchanged("a", seen, |d| d.status = AssetStatus::Redeemed)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(c.get("a").unwrap().status, AssetStatus::IaoApproved);

        let fresh = c.get("a").unwrap().updated_at;
        let updated = c
            .update_if_unchanged("a", fresh, |d| d.status = AssetStatus::ConvertedToNft)
            .unwrap();
        assert!(updated.updated_at > fresh);
    }

    #[test]
    fn update_many_and_aggregate() {
        let mut c = Collection::from_docs([asset("a"), asset("b"), asset("c")]);
        let n = c.update_many(|d| d.id != "b", |d| d.custody = CustodyStatus::Frac);
        assert_eq!(n, 2);
        let in_custody = c.aggregate(|d| d.custody == CustodyStatus::Frac, 0, |acc, _| acc + 1);
        assert_eq!(in_custody, 2);
        assert!(c.find_one_and_update(|d| d.id == "zzz", |_| {}).is_none());
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_trace() {
        let store = MemoryStore::new(Ledgers {
            assets: Collection::from_docs([asset("a")]),
            ..Ledgers::default()
        });
        let res: Result<(), StoreError> = store
            .transaction(|l| {
                l.assets.update("a", |d| d.status = AssetStatus::Redeemed)?;
                l.assets.update("missing", |_| {})?;
                Ok(())
            })
            .await;
        assert!(res.is_err());
        let status = store.read(|l| l.assets.get("a").map(|a| a.status)).await;
        assert_eq!(status, Some(AssetStatus::Open));
    }
}
