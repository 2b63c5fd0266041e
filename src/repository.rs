//! Storage seams used by the message processors
//!
//! Lookups return `Ok(None)` when nothing matches. Only backend failures are errors.
use super::entity::{Bid, Escrow, ListingItem, NewBid, NewEscrow, NewProposal, Proposal};
use super::error::StorageError;
use async_trait::async_trait;

#[async_trait]
pub trait ListingItemRepository: Send + Sync {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<ListingItem>, StorageError>;

    async fn find_by_id(&self, id: u64) -> Result<Option<ListingItem>, StorageError>;

    /// Register a listing item. Listing items arrive through their own sync
    /// path; this core only needs to be able to reference them.
    async fn create(&self, hash: &str) -> Result<ListingItem, StorageError>;
}

#[async_trait]
pub trait BidRepository: Send + Sync {
    /// The row created by the message with this hash.
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Bid>, StorageError>;

    /// Most recent row in the listing item's bid lineage.
    async fn find_latest(&self, listing_item_id: u64) -> Result<Option<Bid>, StorageError>;

    /// The whole lineage, oldest first.
    async fn search(&self, listing_item_id: u64) -> Result<Vec<Bid>, StorageError>;

    async fn create(&self, bid: NewBid) -> Result<Bid, StorageError>;
}

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Proposal>, StorageError>;

    async fn find_latest_by_item(&self, item_hash: &str)
    -> Result<Option<Proposal>, StorageError>;

    async fn create(&self, proposal: NewProposal) -> Result<Proposal, StorageError>;
}

#[async_trait]
pub trait EscrowRepository: Send + Sync {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<Escrow>, StorageError>;

    async fn find_latest(&self, listing_item_id: u64) -> Result<Option<Escrow>, StorageError>;

    async fn search(&self, listing_item_id: u64) -> Result<Vec<Escrow>, StorageError>;

    async fn create(&self, escrow: NewEscrow) -> Result<Escrow, StorageError>;
}
