//! Proposal add: public and item votes
use super::{MessageProcessor, Processed, misrouted};
use crate::entity::{NewProposal, Proposal};
use crate::error::ProcessError;
use crate::lock::LineageLocks;
use crate::message::{ActionMessage, ActionType, ProposalAddMessage, ProposalCategory};
use crate::repository::{ListingItemRepository, ProposalRepository};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ProposalAddMessageProcessor {
    listing_items: Arc<dyn ListingItemRepository>,
    proposals: Arc<dyn ProposalRepository>,
    locks: LineageLocks,
}

impl ProposalAddMessageProcessor {
    pub fn new(
        listing_items: Arc<dyn ListingItemRepository>,
        proposals: Arc<dyn ProposalRepository>,
        locks: LineageLocks,
    ) -> Self {
        Self {
            listing_items,
            proposals,
            locks,
        }
    }

    /// Store a proposal. An item vote is only accepted for a known listing
    /// item, and each item carries at most one item vote.
    pub async fn add(&self, message: &ProposalAddMessage) -> Result<Proposal, ProcessError> {
        let expected = match message.item {
            Some(_) => ProposalCategory::ItemVote,
            None => ProposalCategory::PublicVote,
        };
        if message.category != expected {
            return Err(ProcessError::InvalidState(format!(
                "Proposal category {} does not match its item reference",
                message.category
            )));
        }

        let lock_key = match &message.item {
            Some(item_hash) => {
                self.listing_items
                    .find_by_hash(item_hash)
                    .await?
                    .ok_or_else(|| ProcessError::NotFound(item_hash.clone()))?;
                item_hash.as_str()
            }
            None => message.hash.as_str(),
        };
        let _guard = self.locks.acquire(lock_key).await;

        if let Some(existing) = self.proposals.find_by_hash(&message.hash).await? {
            debug!(hash = %message.hash, "proposal already stored");
            return Ok(existing);
        }

        if let Some(item_hash) = &message.item {
            if let Some(existing) = self.proposals.find_latest_by_item(item_hash).await? {
                return Err(ProcessError::InvalidState(format!(
                    "Proposal {} already exists for the listing Item",
                    existing.hash
                )));
            }
        }

        let proposal = self
            .proposals
            .create(NewProposal {
                hash: message.hash.clone(),
                submitter: message.submitter.clone(),
                title: message.title.clone(),
                description: message.description.clone(),
                category: message.category,
                item: message.item.clone(),
                options: message.options.clone(),
            })
            .await?;

        info!(
            hash = %proposal.hash,
            category = %proposal.category,
            options = proposal.options.len(),
            "proposal committed"
        );
        Ok(proposal)
    }
}

#[async_trait]
impl MessageProcessor for ProposalAddMessageProcessor {
    fn action(&self) -> ActionType {
        ActionType::ProposalAdd
    }

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        match message {
            ActionMessage::ProposalAdd(proposal) => {
                Ok(Processed::Proposal(self.add(proposal).await?))
            }
            other => Err(misrouted(self.action(), other)),
        }
    }
}
