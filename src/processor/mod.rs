//! Inbound message processors
//!
//! Every action kind has one processor. Locally created messages and messages
//! received from peers go through the same processor, so both paths end in
//! the same state.
use super::entity::{Bid, Escrow, Proposal};
use super::error::ProcessError;
use super::message::{ActionMessage, ActionType};
use async_trait::async_trait;

pub mod bid;
pub mod escrow;
pub mod proposal;

pub use bid::{
    AcceptBidMessageProcessor, BidLineage, BidMessageProcessor, CancelBidMessageProcessor,
    RejectBidMessageProcessor,
};
pub use escrow::{
    EscrowLedger, EscrowLockMessageProcessor, EscrowRefundMessageProcessor,
    EscrowReleaseMessageProcessor,
};
pub use proposal::ProposalAddMessageProcessor;

/// The row a processor committed, or found already committed for a redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    Bid(Bid),
    Proposal(Proposal),
    Escrow(Escrow),
}

impl Processed {
    pub fn into_bid(self) -> Option<Bid> {
        match self {
            Processed::Bid(bid) => Some(bid),
            _ => None,
        }
    }

    pub fn into_proposal(self) -> Option<Proposal> {
        match self {
            Processed::Proposal(proposal) => Some(proposal),
            _ => None,
        }
    }

    pub fn into_escrow(self) -> Option<Escrow> {
        match self {
            Processed::Escrow(escrow) => Some(escrow),
            _ => None,
        }
    }
}

#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// The action tag this processor is registered under.
    fn action(&self) -> ActionType;

    async fn process(&self, message: &ActionMessage) -> Result<Processed, ProcessError>;
}

pub(crate) fn misrouted(expected: ActionType, message: &ActionMessage) -> ProcessError {
    ProcessError::UnsupportedAction(format!(
        "{} handed to the {} processor",
        message.action(),
        expected
    ))
}
