//! Rows kept in local storage
use super::message::{ProposalCategory, ProposalOption};
use super::types::{BidDatum, TimeStamp};
use chrono::Utc;
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BidStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
    #[n(3)]
    Cancelled,
}

impl BidStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BidStatus::Active)
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidStatus::Active => f.write_str("ACTIVE"),
            BidStatus::Accepted => f.write_str("ACCEPTED"),
            BidStatus::Rejected => f.write_str("REJECTED"),
            BidStatus::Cancelled => f.write_str("CANCELLED"),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscrowStatus {
    #[n(0)]
    Locked,
    #[n(1)]
    Released,
    #[n(2)]
    Refunded,
}

impl EscrowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EscrowStatus::Locked)
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscrowStatus::Locked => f.write_str("LOCKED"),
            EscrowStatus::Released => f.write_str("RELEASED"),
            EscrowStatus::Refunded => f.write_str("REFUNDED"),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub hash: String,
    #[n(2)]
    pub created_at: TimeStamp<Utc>,
}

/// One step in the negotiation history of a listing item.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub hash: String, // hash of the message that produced this row
    #[n(2)]
    pub listing_item_id: u64,
    #[n(3)]
    pub bidder: String,
    #[n(4)]
    pub status: BidStatus,
    #[n(5)]
    pub data: Vec<BidDatum>,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub hash: String,
    #[n(2)]
    pub submitter: String,
    #[n(3)]
    pub title: String,
    #[n(4)]
    pub description: String,
    #[n(5)]
    pub category: ProposalCategory,
    #[n(6)]
    pub item: Option<String>,
    #[n(7)]
    pub options: Vec<ProposalOption>,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Escrow {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub hash: String,
    #[n(2)]
    pub listing_item_id: u64,
    #[n(3)]
    pub bid_id: u64,
    #[n(4)]
    pub status: EscrowStatus,
    #[n(5)]
    pub memo: Option<String>,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

// Creation inputs. Stores assign `id` and `created_at`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBid {
    pub hash: String,
    pub listing_item_id: u64,
    pub bidder: String,
    pub status: BidStatus,
    pub data: Vec<BidDatum>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProposal {
    pub hash: String,
    pub submitter: String,
    pub title: String,
    pub description: String,
    pub category: ProposalCategory,
    pub item: Option<String>,
    pub options: Vec<ProposalOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEscrow {
    pub hash: String,
    pub listing_item_id: u64,
    pub bid_id: u64,
    pub status: EscrowStatus,
    pub memo: Option<String>,
}

impl NewBid {
    pub fn into_bid(self, id: u64) -> Bid {
        Bid {
            id,
            hash: self.hash,
            listing_item_id: self.listing_item_id,
            bidder: self.bidder,
            status: self.status,
            data: self.data,
            created_at: TimeStamp::now(),
        }
    }
}

impl NewProposal {
    pub fn into_proposal(self, id: u64) -> Proposal {
        Proposal {
            id,
            hash: self.hash,
            submitter: self.submitter,
            title: self.title,
            description: self.description,
            category: self.category,
            item: self.item,
            options: self.options,
            created_at: TimeStamp::now(),
        }
    }
}

impl NewEscrow {
    pub fn into_escrow(self, id: u64) -> Escrow {
        Escrow {
            id,
            hash: self.hash,
            listing_item_id: self.listing_item_id,
            bid_id: self.bid_id,
            status: self.status,
            memo: self.memo,
            created_at: TimeStamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_is_open() {
        assert!(!BidStatus::Active.is_terminal());
        assert!(BidStatus::Accepted.is_terminal());
        assert!(BidStatus::Rejected.is_terminal());
        assert!(BidStatus::Cancelled.is_terminal());
        assert!(!EscrowStatus::Locked.is_terminal());
        assert!(EscrowStatus::Released.is_terminal());
    }

    #[test]
    fn status_names_match_the_protocol() {
        assert_eq!(BidStatus::Cancelled.to_string(), "CANCELLED");
        assert_eq!(EscrowStatus::Refunded.to_string(), "REFUNDED");
    }

    #[test]
    fn bid_row_encoding() {
        let bid = NewBid {
            hash: "hash".to_string(),
            listing_item_id: 3,
            bidder: "pbidder".to_string(),
            status: BidStatus::Accepted,
            data: vec![BidDatum::new("ship.country", "FI")],
        }
        .into_bid(9);

        let encoding = minicbor::to_vec(&bid).unwrap();
        let decoded: Bid = minicbor::decode(&encoding).unwrap();

        assert_eq!(bid, decoded);
    }
}
