//! Escrow lock, release and refund
use super::{MessageProcessor, Processed, misrouted};
use crate::entity::{BidStatus, Escrow, EscrowStatus, ListingItem, NewEscrow};
use crate::error::ProcessError;
use crate::factory::{EscrowMessageCreateParams, EscrowReleaseMessageFactory, MessageFactory};
use crate::lock::LineageLocks;
use crate::message::{ActionMessage, ActionType, Envelope, EscrowLockMessage};
use crate::repository::{BidRepository, EscrowRepository, ListingItemRepository};
use crate::request::EscrowReleaseRequest;
use crate::transport::Outbox;
use crate::types::TimeStamp;
use crate::utils::new_message_id;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const ESCROW_NOT_FOUND: &str = "Escrow with the listing Item was not found!";

/// Escrow rows for a listing item, guarded by the same lineage locks as bids.
#[derive(Clone)]
pub struct EscrowLedger {
    listing_items: Arc<dyn ListingItemRepository>,
    bids: Arc<dyn BidRepository>,
    escrows: Arc<dyn EscrowRepository>,
    locks: LineageLocks,
}

impl EscrowLedger {
    pub fn new(
        listing_items: Arc<dyn ListingItemRepository>,
        bids: Arc<dyn BidRepository>,
        escrows: Arc<dyn EscrowRepository>,
        locks: LineageLocks,
    ) -> Self {
        Self {
            listing_items,
            bids,
            escrows,
            locks,
        }
    }

    async fn resolve_item(&self, item_hash: &str) -> Result<ListingItem, ProcessError> {
        self.listing_items
            .find_by_hash(item_hash)
            .await?
            .ok_or_else(|| ProcessError::NotFound(item_hash.to_string()))
    }

    pub async fn lock(&self, message: &EscrowLockMessage) -> Result<Escrow, ProcessError> {
        let item = self.resolve_item(&message.item).await?;
        let _guard = self.locks.acquire(&item.hash).await;

        if let Some(existing) = self.escrows.find_by_hash(&message.hash).await? {
            debug!(hash = %message.hash, "escrow lock already applied");
            return Ok(existing);
        }

        let bid = self
            .bids
            .find_by_hash(&message.bid)
            .await?
            .ok_or_else(|| ProcessError::NotFound(message.bid.clone()))?;

        if bid.listing_item_id != item.id {
            return Err(ProcessError::InvalidState(format!(
                "Bid {} does not belong to the listing Item",
                message.bid
            )));
        }
        if bid.status != BidStatus::Accepted {
            return Err(ProcessError::InvalidState(format!(
                "Escrow can not be LOCKED because the Bid is {}",
                bid.status
            )));
        }
        if let Some(current) = self.escrows.find_latest(item.id).await? {
            return Err(ProcessError::InvalidTransition(format!(
                "Escrow can not be LOCKED because it was already been {}",
                current.status
            )));
        }

        let escrow = self
            .escrows
            .create(NewEscrow {
                hash: message.hash.clone(),
                listing_item_id: item.id,
                bid_id: bid.id,
                status: EscrowStatus::Locked,
                memo: message.memo.clone(),
            })
            .await?;

        info!(item = %item.hash, escrow = escrow.id, status = %escrow.status, "escrow committed");
        Ok(escrow)
    }

    /// Close a LOCKED escrow as RELEASED or REFUNDED.
    pub async fn settle(
        &self,
        item_hash: &str,
        bid_hash: &str,
        message_hash: &str,
        memo: Option<&str>,
        target: EscrowStatus,
    ) -> Result<Escrow, ProcessError> {
        let item = self.resolve_item(item_hash).await?;
        let _guard = self.locks.acquire(&item.hash).await;

        if let Some(existing) = self.escrows.find_by_hash(message_hash).await? {
            debug!(hash = %message_hash, status = %existing.status, "escrow settlement already applied");
            return Ok(existing);
        }

        let current = self
            .escrows
            .find_latest(item.id)
            .await?
            .ok_or_else(|| ProcessError::InvalidState(ESCROW_NOT_FOUND.to_string()))?;

        if current.status.is_terminal() {
            return Err(ProcessError::InvalidTransition(format!(
                "Escrow can not be {} because it was already been {}",
                target, current.status
            )));
        }

        let bid = self
            .bids
            .find_by_hash(bid_hash)
            .await?
            .ok_or_else(|| ProcessError::NotFound(bid_hash.to_string()))?;
        if bid.id != current.bid_id {
            return Err(ProcessError::InvalidState(format!(
                "Escrow was not locked for Bid {bid_hash}"
            )));
        }

        let escrow = self
            .escrows
            .create(NewEscrow {
                hash: message_hash.to_string(),
                listing_item_id: item.id,
                bid_id: current.bid_id,
                status: target,
                memo: memo.map(str::to_string),
            })
            .await?;

        info!(item = %item.hash, escrow = escrow.id, status = %escrow.status, "escrow committed");
        Ok(escrow)
    }
}

pub struct EscrowLockMessageProcessor {
    ledger: EscrowLedger,
}

impl EscrowLockMessageProcessor {
    pub fn new(ledger: EscrowLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl MessageProcessor for EscrowLockMessageProcessor {
    fn action(&self) -> ActionType {
        ActionType::EscrowLock
    }

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        match message {
            ActionMessage::EscrowLock(lock) => Ok(Processed::Escrow(self.ledger.lock(lock).await?)),
            other => Err(misrouted(self.action(), other)),
        }
    }
}

pub struct EscrowReleaseMessageProcessor {
    ledger: EscrowLedger,
    listing_items: Arc<dyn ListingItemRepository>,
    outbox: Outbox,
    factory: EscrowReleaseMessageFactory,
}

impl EscrowReleaseMessageProcessor {
    pub fn new(
        ledger: EscrowLedger,
        listing_items: Arc<dyn ListingItemRepository>,
        outbox: Outbox,
    ) -> Self {
        Self {
            ledger,
            listing_items,
            outbox,
            factory: EscrowReleaseMessageFactory,
        }
    }

    /// Release the escrow for an accepted bid on behalf of the local user.
    ///
    /// The release is committed locally first. The envelope is then handed to
    /// the outbox and the send result only shows up as a delivery report.
    pub async fn release(&self, request: EscrowReleaseRequest) -> Result<Escrow, ProcessError> {
        if request.bid.listing_item_id != request.bid_accept.listing_item_id {
            return Err(ProcessError::InvalidState(
                "Bid and accepted Bid reference different listing Items".to_string(),
            ));
        }
        if request.bid_accept.status != BidStatus::Accepted {
            return Err(ProcessError::InvalidState(format!(
                "Escrow can not be RELEASED because the Bid is {}",
                request.bid_accept.status
            )));
        }

        let item = self
            .listing_items
            .find_by_id(request.bid_accept.listing_item_id)
            .await?
            .ok_or_else(|| {
                ProcessError::NotFound(format!(
                    "listing item {}",
                    request.bid_accept.listing_item_id
                ))
            })?;

        let message = self.factory.get(EscrowMessageCreateParams {
            item_hash: item.hash,
            bid_hash: request.bid_accept.hash,
            memo: request.memo,
            generated_at: TimeStamp::now(),
        })?;

        let escrow = self
            .ledger
            .settle(
                &message.item,
                &message.bid,
                &message.hash,
                message.memo.as_deref(),
                EscrowStatus::Released,
            )
            .await?;

        let envelope = Envelope::seal(new_message_id(), &ActionMessage::EscrowRelease(message))?;
        self.outbox.post(envelope, request.send_params);

        Ok(escrow)
    }
}

#[async_trait]
impl MessageProcessor for EscrowReleaseMessageProcessor {
    fn action(&self) -> ActionType {
        ActionType::EscrowRelease
    }

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        match message {
            ActionMessage::EscrowRelease(release) => {
                let escrow = self
                    .ledger
                    .settle(
                        &release.item,
                        &release.bid,
                        &release.hash,
                        release.memo.as_deref(),
                        EscrowStatus::Released,
                    )
                    .await?;
                Ok(Processed::Escrow(escrow))
            }
            other => Err(misrouted(self.action(), other)),
        }
    }
}

pub struct EscrowRefundMessageProcessor {
    ledger: EscrowLedger,
}

impl EscrowRefundMessageProcessor {
    pub fn new(ledger: EscrowLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl MessageProcessor for EscrowRefundMessageProcessor {
    fn action(&self) -> ActionType {
        ActionType::EscrowRefund
    }

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        match message {
            ActionMessage::EscrowRefund(refund) => {
                let escrow = self
                    .ledger
                    .settle(
                        &refund.item,
                        &refund.bid,
                        &refund.hash,
                        refund.memo.as_deref(),
                        EscrowStatus::Refunded,
                    )
                    .await?;
                Ok(Processed::Escrow(escrow))
            }
            other => Err(misrouted(self.action(), other)),
        }
    }
}
