//! sled-backed repositories
//!
//! Everything lives in the default tree under prefixed keys. Bid, proposal
//! and escrow writes go through a single `Batch` so the row and its indexes
//! land together. Listing items are claimed by hash with a compare-and-swap.
//!
//! | key | value |
//! |---|---|
//! | `item/{id}` | `ListingItem` |
//! | `item#{hash}` | id |
//! | `bid/{id}` | `Bid` |
//! | `bid#{hash}` | id |
//! | `bidx/{item id}{bid id}` | empty, lineage index |
//! | `prop/{id}` | `Proposal` |
//! | `prop#{hash}` | id |
//! | `propx/{len}{item hash}{id}` | empty |
//! | `esc/{id}` | `Escrow` |
//! | `esc#{hash}` | id |
//! | `escx/{item id}{escrow id}` | empty |
//!
//! Ids are big-endian so prefix scans come back in creation order.
use super::entity::{Bid, Escrow, ListingItem, NewBid, NewEscrow, NewProposal, Proposal};
use super::error::StorageError;
use super::repository::{
    BidRepository, EscrowRepository, ListingItemRepository, ProposalRepository,
};
use super::types::TimeStamp;
use async_trait::async_trait;
use sled::{Batch, Db};
use std::path::Path;
use std::sync::Arc;

const ITEM: &[u8] = b"item/";
const ITEM_HASH: &[u8] = b"item#";
const BID: &[u8] = b"bid/";
const BID_HASH: &[u8] = b"bid#";
const BID_LINEAGE: &[u8] = b"bidx/";
const PROPOSAL: &[u8] = b"prop/";
const PROPOSAL_HASH: &[u8] = b"prop#";
const PROPOSAL_ITEM: &[u8] = b"propx/";
const ESCROW: &[u8] = b"esc/";
const ESCROW_HASH: &[u8] = b"esc#";
const ESCROW_LINEAGE: &[u8] = b"escx/";

pub struct SledStore {
    instance: Arc<sled::Db>,
}

impl From<sled::Error> for StorageError {
    fn from(value: sled::Error) -> Self {
        StorageError::Backend(value.to_string())
    }
}

fn id_key(prefix: &[u8], id: u64) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn pair_key(prefix: &[u8], parent: u64, id: u64) -> Vec<u8> {
    let mut key = id_key(prefix, parent);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn hash_key(prefix: &[u8], hash: &str) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(hash.as_bytes());
    key
}

// length prefix keeps one item hash from being a prefix of another
fn item_prefix(prefix: &[u8], item_hash: &str) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(&(item_hash.len() as u32).to_be_bytes());
    key.extend_from_slice(item_hash.as_bytes());
    key
}

fn trailing_id(key: &[u8]) -> Result<u64, StorageError> {
    let start = key
        .len()
        .checked_sub(8)
        .ok_or_else(|| StorageError::Corrupt("index key shorter than an id".into()))?;
    let bytes: [u8; 8] = key[start..]
        .try_into()
        .map_err(|_| StorageError::Corrupt("index key shorter than an id".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn encode_row<T: minicbor::Encode<()>>(row: &T) -> Result<Vec<u8>, StorageError> {
    minicbor::to_vec(row).map_err(|err| StorageError::Corrupt(err.to_string()))
}

impl SledStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db: Db = sled::open(path)?;
        Ok(Self::new(Arc::new(db)))
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.instance.flush()?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64, StorageError> {
        Ok(self.instance.generate_id()?)
    }

    fn get_row<T>(&self, key: &[u8]) -> Result<Option<T>, StorageError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.instance.get(key)? {
            Some(bytes) => minicbor::decode(&bytes)
                .map(Some)
                .map_err(|err| StorageError::Corrupt(err.to_string())),
            None => Ok(None),
        }
    }

    fn row_by_hash<T>(
        &self,
        hash_prefix: &[u8],
        row_prefix: &[u8],
        hash: &str,
    ) -> Result<Option<T>, StorageError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.instance.get(hash_key(hash_prefix, hash))? {
            Some(id) => self.get_row(&id_key(row_prefix, trailing_id(&id)?)),
            None => Ok(None),
        }
    }

    /// Rows indexed under `index_prefix`, oldest first.
    fn scan_rows<T>(&self, index_prefix: &[u8], row_prefix: &[u8]) -> Result<Vec<T>, StorageError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let mut rows = Vec::new();
        for entry in self.instance.scan_prefix(index_prefix) {
            let (key, _) = entry?;
            let id = trailing_id(&key)?;
            match self.get_row(&id_key(row_prefix, id))? {
                Some(row) => rows.push(row),
                None => {
                    return Err(StorageError::Corrupt(format!(
                        "index points at missing row {id}"
                    )));
                }
            }
        }
        Ok(rows)
    }

    fn last_row<T>(&self, index_prefix: &[u8], row_prefix: &[u8]) -> Result<Option<T>, StorageError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.instance.scan_prefix(index_prefix).next_back() {
            Some(entry) => {
                let (key, _) = entry?;
                self.get_row(&id_key(row_prefix, trailing_id(&key)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ListingItemRepository for SledStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<ListingItem>, StorageError> {
        self.row_by_hash(ITEM_HASH, ITEM, hash)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<ListingItem>, StorageError> {
        self.get_row(&id_key(ITEM, id))
    }

    /// The row is written first and then claimed through the hash index with
    /// a compare-and-swap. A create that loses the race removes its row and
    /// returns the winner.
    async fn create(&self, hash: &str) -> Result<ListingItem, StorageError> {
        if let Some(existing) = self.row_by_hash(ITEM_HASH, ITEM, hash)? {
            return Ok(existing);
        }
        let item = ListingItem {
            id: self.next_id()?,
            hash: hash.to_string(),
            created_at: TimeStamp::now(),
        };
        let row_key = id_key(ITEM, item.id);
        self.instance.insert(&row_key, encode_row(&item)?)?;

        let claim = self.instance.compare_and_swap(
            hash_key(ITEM_HASH, hash),
            None as Option<&[u8]>,
            Some(item.id.to_be_bytes().to_vec()),
        )?;
        match claim {
            Ok(()) => Ok(item),
            Err(lost) => {
                self.instance.remove(&row_key)?;
                let winner = lost
                    .current
                    .ok_or_else(|| StorageError::Corrupt(format!("empty index for item {hash}")))?;
                self.get_row(&id_key(ITEM, trailing_id(&winner)?))?
                    .ok_or_else(|| StorageError::Corrupt(format!("index for item {hash} has no row")))
            }
        }
    }
}

#[async_trait]
impl BidRepository for SledStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Bid>, StorageError> {
        self.row_by_hash(BID_HASH, BID, hash)
    }

    async fn find_latest(&self, listing_item_id: u64) -> Result<Option<Bid>, StorageError> {
        self.last_row(&id_key(BID_LINEAGE, listing_item_id), BID)
    }

    async fn search(&self, listing_item_id: u64) -> Result<Vec<Bid>, StorageError> {
        self.scan_rows(&id_key(BID_LINEAGE, listing_item_id), BID)
    }

    async fn create(&self, bid: NewBid) -> Result<Bid, StorageError> {
        let bid = bid.into_bid(self.next_id()?);

        let mut batch = Batch::default();
        batch.insert(id_key(BID, bid.id), encode_row(&bid)?);
        batch.insert(hash_key(BID_HASH, &bid.hash), bid.id.to_be_bytes().to_vec());
        batch.insert(pair_key(BID_LINEAGE, bid.listing_item_id, bid.id), Vec::<u8>::new());
        self.instance.apply_batch(batch)?;

        Ok(bid)
    }
}

#[async_trait]
impl ProposalRepository for SledStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Proposal>, StorageError> {
        self.row_by_hash(PROPOSAL_HASH, PROPOSAL, hash)
    }

    async fn find_latest_by_item(
        &self,
        item_hash: &str,
    ) -> Result<Option<Proposal>, StorageError> {
        self.last_row(&item_prefix(PROPOSAL_ITEM, item_hash), PROPOSAL)
    }

    async fn create(&self, proposal: NewProposal) -> Result<Proposal, StorageError> {
        let proposal = proposal.into_proposal(self.next_id()?);

        let mut batch = Batch::default();
        batch.insert(id_key(PROPOSAL, proposal.id), encode_row(&proposal)?);
        batch.insert(
            hash_key(PROPOSAL_HASH, &proposal.hash),
            proposal.id.to_be_bytes().to_vec(),
        );
        if let Some(item) = &proposal.item {
            let mut key = item_prefix(PROPOSAL_ITEM, item);
            key.extend_from_slice(&proposal.id.to_be_bytes());
            batch.insert(key, Vec::<u8>::new());
        }
        self.instance.apply_batch(batch)?;

        Ok(proposal)
    }
}

#[async_trait]
impl EscrowRepository for SledStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Escrow>, StorageError> {
        self.row_by_hash(ESCROW_HASH, ESCROW, hash)
    }

    async fn find_latest(&self, listing_item_id: u64) -> Result<Option<Escrow>, StorageError> {
        self.last_row(&id_key(ESCROW_LINEAGE, listing_item_id), ESCROW)
    }

    async fn search(&self, listing_item_id: u64) -> Result<Vec<Escrow>, StorageError> {
        self.scan_rows(&id_key(ESCROW_LINEAGE, listing_item_id), ESCROW)
    }

    async fn create(&self, escrow: NewEscrow) -> Result<Escrow, StorageError> {
        let escrow = escrow.into_escrow(self.next_id()?);

        let mut batch = Batch::default();
        batch.insert(id_key(ESCROW, escrow.id), encode_row(&escrow)?);
        batch.insert(hash_key(ESCROW_HASH, &escrow.hash), escrow.id.to_be_bytes().to_vec());
        batch.insert(
            pair_key(ESCROW_LINEAGE, escrow.listing_item_id, escrow.id),
            Vec::<u8>::new(),
        );
        self.instance.apply_batch(batch)?;

        Ok(escrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::BidStatus;
    use tempfile::tempdir;

    #[test]
    fn trailing_id_reads_last_eight_bytes() {
        let key = pair_key(BID_LINEAGE, 7, 42);
        assert_eq!(trailing_id(&key).unwrap(), 42);
        assert!(trailing_id(b"short").is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_item_creates_agree_on_one_row() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = Arc::new(SledStore::open(temp_dir.path().join("items.db"))?);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                ListingItemRepository::create(store.as_ref(), "TEST-HASH").await
            }));
        }
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await??.id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let rows = store.instance.scan_prefix(ITEM).count();
        assert_eq!(rows, 1);
        let found = ListingItemRepository::find_by_hash(store.as_ref(), "TEST-HASH").await?;
        assert_eq!(found.map(|item| item.id), Some(ids[0]));
        Ok(())
    }

    #[tokio::test]
    async fn bid_lineage_survives_reopen() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("bid_lineage.db");

        let item_id = {
            let store = SledStore::open(&db_path)?;
            let item = ListingItemRepository::create(&store, "TEST-HASH").await?;
            for (hash, status) in [("h1", BidStatus::Active), ("h2", BidStatus::Accepted)] {
                BidRepository::create(
                    &store,
                    NewBid {
                        hash: hash.to_string(),
                        listing_item_id: item.id,
                        bidder: "pbidder".to_string(),
                        status,
                        data: vec![],
                    },
                )
                .await?;
            }
            store.flush()?;
            item.id
        };

        let store = SledStore::open(&db_path)?;
        let lineage = BidRepository::search(&store, item_id).await?;
        let statuses: Vec<_> = lineage.iter().map(|bid| bid.status).collect();
        assert_eq!(statuses, [BidStatus::Active, BidStatus::Accepted]);

        let by_hash = BidRepository::find_by_hash(&store, "h1").await?;
        assert_eq!(by_hash.map(|bid| bid.status), Some(BidStatus::Active));

        Ok(())
    }

    #[tokio::test]
    async fn proposals_are_indexed_by_item() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let store = SledStore::open(temp_dir.path().join("proposals.db"))?;

        let proposal = NewProposal {
            hash: "p1".to_string(),
            submitter: "psubmitter".to_string(),
            title: "flag".to_string(),
            description: "item breaks the rules".to_string(),
            category: crate::message::ProposalCategory::ItemVote,
            item: Some("item".to_string()),
            options: vec![],
        };
        ProposalRepository::create(&store, proposal).await?;

        assert!(store.find_latest_by_item("item").await?.is_some());
        assert!(store.find_latest_by_item("ite").await?.is_none());

        Ok(())
    }
}
