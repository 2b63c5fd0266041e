//! In-process store, used by tests and by peers that do not need persistence
use super::entity::{Bid, Escrow, ListingItem, NewBid, NewEscrow, NewProposal, Proposal};
use super::error::StorageError;
use super::repository::{
    BidRepository, EscrowRepository, ListingItemRepository, ProposalRepository,
};
use super::types::TimeStamp;
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    listing_items: Vec<ListingItem>,
    bids: Vec<Bid>, // insertion order is creation order
    proposals: Vec<Proposal>,
    escrows: Vec<Escrow>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingItemRepository for MemoryStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<ListingItem>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .listing_items
            .iter()
            .find(|item| item.hash == hash)
            .cloned())
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<ListingItem>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.listing_items.iter().find(|item| item.id == id).cloned())
    }

    async fn create(&self, hash: &str) -> Result<ListingItem, StorageError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.listing_items.iter().find(|item| item.hash == hash) {
            return Ok(existing.clone());
        }
        let item = ListingItem {
            id: tables.allocate_id(),
            hash: hash.to_string(),
            created_at: TimeStamp::now(),
        };
        tables.listing_items.push(item.clone());
        Ok(item)
    }
}

#[async_trait]
impl BidRepository for MemoryStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Bid>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.bids.iter().find(|bid| bid.hash == hash).cloned())
    }

    async fn find_latest(&self, listing_item_id: u64) -> Result<Option<Bid>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .bids
            .iter()
            .rev()
            .find(|bid| bid.listing_item_id == listing_item_id)
            .cloned())
    }

    async fn search(&self, listing_item_id: u64) -> Result<Vec<Bid>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .bids
            .iter()
            .filter(|bid| bid.listing_item_id == listing_item_id)
            .cloned()
            .collect())
    }

    async fn create(&self, bid: NewBid) -> Result<Bid, StorageError> {
        let mut tables = self.tables.write().await;
        let bid = bid.into_bid(tables.allocate_id());
        tables.bids.push(bid.clone());
        Ok(bid)
    }
}

#[async_trait]
impl ProposalRepository for MemoryStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Proposal>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.proposals.iter().find(|p| p.hash == hash).cloned())
    }

    async fn find_latest_by_item(
        &self,
        item_hash: &str,
    ) -> Result<Option<Proposal>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .proposals
            .iter()
            .rev()
            .find(|p| p.item.as_deref() == Some(item_hash))
            .cloned())
    }

    async fn create(&self, proposal: NewProposal) -> Result<Proposal, StorageError> {
        let mut tables = self.tables.write().await;
        let proposal = proposal.into_proposal(tables.allocate_id());
        tables.proposals.push(proposal.clone());
        Ok(proposal)
    }
}

#[async_trait]
impl EscrowRepository for MemoryStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Escrow>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.escrows.iter().find(|e| e.hash == hash).cloned())
    }

    async fn find_latest(&self, listing_item_id: u64) -> Result<Option<Escrow>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .escrows
            .iter()
            .rev()
            .find(|e| e.listing_item_id == listing_item_id)
            .cloned())
    }

    async fn search(&self, listing_item_id: u64) -> Result<Vec<Escrow>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .escrows
            .iter()
            .filter(|e| e.listing_item_id == listing_item_id)
            .cloned()
            .collect())
    }

    async fn create(&self, escrow: NewEscrow) -> Result<Escrow, StorageError> {
        let mut tables = self.tables.write().await;
        let escrow = escrow.into_escrow(tables.allocate_id());
        tables.escrows.push(escrow.clone());
        Ok(escrow)
    }
}
