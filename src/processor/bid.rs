//! Bid lineage transitions: place, accept, reject, cancel
use super::{MessageProcessor, Processed, misrouted};
use crate::entity::{Bid, BidStatus, ListingItem, NewBid};
use crate::error::ProcessError;
use crate::lock::LineageLocks;
use crate::message::{ActionMessage, ActionType, BidMessage};
use crate::repository::{BidRepository, ListingItemRepository};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const BID_NOT_FOUND: &str = "Bid with the listing Item was not found!";

/// Shared state-machine logic for the four bid processors.
///
/// Each call takes the listing item's lineage lock before reading the current
/// bid and keeps it until the new row is committed.
#[derive(Clone)]
pub struct BidLineage {
    listing_items: Arc<dyn ListingItemRepository>,
    bids: Arc<dyn BidRepository>,
    locks: LineageLocks,
}

impl BidLineage {
    pub fn new(
        listing_items: Arc<dyn ListingItemRepository>,
        bids: Arc<dyn BidRepository>,
        locks: LineageLocks,
    ) -> Self {
        Self {
            listing_items,
            bids,
            locks,
        }
    }

    async fn resolve_item(&self, item_hash: &str) -> Result<ListingItem, ProcessError> {
        self.listing_items
            .find_by_hash(item_hash)
            .await?
            .ok_or_else(|| ProcessError::NotFound(item_hash.to_string()))
    }

    /// Open the bid for an item. Only allowed on an empty lineage; once any
    /// row exists, the lineage is either ACTIVE or terminal.
    pub async fn place(&self, message: &BidMessage) -> Result<Bid, ProcessError> {
        let item = self.resolve_item(&message.item).await?;
        let _guard = self.locks.acquire(&item.hash).await;

        if let Some(existing) = self.bids.find_by_hash(&message.hash).await? {
            debug!(hash = %message.hash, "bid already applied");
            return Ok(existing);
        }

        if let Some(current) = self.bids.find_latest(item.id).await? {
            return Err(ProcessError::InvalidTransition(format!(
                "Bid can not be placed because it was already been {}",
                current.status
            )));
        }

        let bid = self
            .bids
            .create(NewBid {
                hash: message.hash.clone(),
                listing_item_id: item.id,
                bidder: message.bidder.clone(),
                status: BidStatus::Active,
                data: message.objects.clone(),
            })
            .await?;

        info!(item = %item.hash, bid = bid.id, status = %bid.status, "bid committed");
        Ok(bid)
    }

    /// Move the current ACTIVE bid to `target`.
    ///
    /// `bid_hash`, when given, must name the current bid. A redelivered
    /// message (same `message_hash`) returns the row it created the first time.
    pub async fn transition(
        &self,
        item_hash: &str,
        bid_hash: Option<&str>,
        message_hash: &str,
        target: BidStatus,
    ) -> Result<Bid, ProcessError> {
        let item = self.resolve_item(item_hash).await?;
        let _guard = self.locks.acquire(&item.hash).await;

        if let Some(existing) = self.bids.find_by_hash(message_hash).await? {
            debug!(hash = %message_hash, status = %existing.status, "bid transition already applied");
            return Ok(existing);
        }

        let current = self
            .bids
            .find_latest(item.id)
            .await?
            .ok_or_else(|| ProcessError::InvalidState(BID_NOT_FOUND.to_string()))?;

        if current.status.is_terminal() {
            return Err(ProcessError::InvalidTransition(format!(
                "Bid can not be {} because it was already been {}",
                target, current.status
            )));
        }

        if let Some(expected) = bid_hash {
            if expected != current.hash {
                return Err(ProcessError::InvalidState(format!(
                    "Bid {expected} is not the active Bid for the listing Item"
                )));
            }
        }

        let bid = self
            .bids
            .create(NewBid {
                hash: message_hash.to_string(),
                listing_item_id: item.id,
                bidder: current.bidder,
                status: target,
                data: vec![],
            })
            .await?;

        info!(item = %item.hash, bid = bid.id, status = %bid.status, "bid committed");
        Ok(bid)
    }
}

pub struct BidMessageProcessor {
    lineage: BidLineage,
}

impl BidMessageProcessor {
    pub fn new(lineage: BidLineage) -> Self {
        Self { lineage }
    }
}

#[async_trait]
impl MessageProcessor for BidMessageProcessor {
    fn action(&self) -> ActionType {
        ActionType::Bid
    }

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        match message {
            ActionMessage::Bid(bid) => Ok(Processed::Bid(self.lineage.place(bid).await?)),
            other => Err(misrouted(self.action(), other)),
        }
    }
}

pub struct AcceptBidMessageProcessor {
    lineage: BidLineage,
}

impl AcceptBidMessageProcessor {
    pub fn new(lineage: BidLineage) -> Self {
        Self { lineage }
    }
}

#[async_trait]
impl MessageProcessor for AcceptBidMessageProcessor {
    fn action(&self) -> ActionType {
        ActionType::BidAccept
    }

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        match message {
            ActionMessage::BidAccept(accept) => {
                let bid = self
                    .lineage
                    .transition(
                        &accept.item,
                        accept.bid.as_deref(),
                        &accept.hash,
                        BidStatus::Accepted,
                    )
                    .await?;
                Ok(Processed::Bid(bid))
            }
            other => Err(misrouted(self.action(), other)),
        }
    }
}

pub struct RejectBidMessageProcessor {
    lineage: BidLineage,
}

impl RejectBidMessageProcessor {
    pub fn new(lineage: BidLineage) -> Self {
        Self { lineage }
    }
}

#[async_trait]
impl MessageProcessor for RejectBidMessageProcessor {
    fn action(&self) -> ActionType {
        ActionType::BidReject
    }

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        match message {
            ActionMessage::BidReject(reject) => {
                let bid = self
                    .lineage
                    .transition(
                        &reject.item,
                        reject.bid.as_deref(),
                        &reject.hash,
                        BidStatus::Rejected,
                    )
                    .await?;
                Ok(Processed::Bid(bid))
            }
            other => Err(misrouted(self.action(), other)),
        }
    }
}

pub struct CancelBidMessageProcessor {
    lineage: BidLineage,
}

impl CancelBidMessageProcessor {
    pub fn new(lineage: BidLineage) -> Self {
        Self { lineage }
    }
}

#[async_trait]
impl MessageProcessor for CancelBidMessageProcessor {
    fn action(&self) -> ActionType {
        ActionType::BidCancel
    }

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        match message {
            ActionMessage::BidCancel(cancel) => {
                let bid = self
                    .lineage
                    .transition(
                        &cancel.item,
                        cancel.bid.as_deref(),
                        &cancel.hash,
                        BidStatus::Cancelled,
                    )
                    .await?;
                Ok(Processed::Bid(bid))
            }
            other => Err(misrouted(self.action(), other)),
        }
    }
}
