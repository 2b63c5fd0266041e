//! Builders that turn creation parameters into hashed action messages
//!
//! Factories assume their parameters were already validated (see
//! [`crate::request`]) and never touch storage.
use super::error::CodecError;
use super::message::{
    BidAcceptMessage, BidCancelMessage, BidMessage, BidRejectMessage, EscrowLockMessage,
    EscrowRefundMessage, EscrowReleaseMessage, ProposalAddMessage, ProposalCategory,
    ProposalOption,
};
use super::types::{BidDatum, TimeStamp};
use chrono::Utc;
use tracing::debug;

pub trait MessageFactory {
    type Params;
    type Message;

    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalAddMessageCreateParams {
    pub title: String,
    pub description: String,
    pub options: Vec<String>, // order is significant, it becomes the option ids
    pub sender: String,
    pub item_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidMessageCreateParams {
    pub item_hash: String,
    pub bidder: String,
    pub objects: Vec<BidDatum>,
    pub generated_at: TimeStamp<Utc>,
}

/// Shared by accept, reject and cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidActionMessageCreateParams {
    pub item_hash: String,
    pub bid_hash: Option<String>,
    pub generated_at: TimeStamp<Utc>,
}

/// Shared by lock, release and refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowMessageCreateParams {
    pub item_hash: String,
    pub bid_hash: String,
    pub memo: Option<String>,
    pub generated_at: TimeStamp<Utc>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProposalAddMessageFactory;

impl MessageFactory for ProposalAddMessageFactory {
    type Params = ProposalAddMessageCreateParams;
    type Message = ProposalAddMessage;

    /// The proposal hash is taken over the assembled message first. Only then
    /// does each option learn its `proposal_hash` and get its own hash, since
    /// the option digest embeds the proposal hash.
    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError> {
        let category = match params.item_hash {
            Some(_) => ProposalCategory::ItemVote,
            None => ProposalCategory::PublicVote,
        };

        let mut message = ProposalAddMessage {
            submitter: params.sender,
            title: params.title,
            description: params.description,
            options: create_options_list(params.options),
            category,
            item: params.item_hash,
            hash: String::new(),
        };

        message.hash = message.content_hash()?;

        for option in message.options.iter_mut() {
            option.proposal_hash = message.hash.clone();
            option.hash = option.content_hash()?;
        }

        debug!(
            hash = %message.hash,
            category = %message.category,
            options = message.options.len(),
            "built proposal message"
        );
        Ok(message)
    }
}

fn create_options_list(options: Vec<String>) -> Vec<ProposalOption> {
    options
        .into_iter()
        .zip(0u32..)
        .map(|(description, option_id)| ProposalOption {
            option_id,
            description,
            proposal_hash: String::new(),
            hash: String::new(),
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BidMessageFactory;

impl MessageFactory for BidMessageFactory {
    type Params = BidMessageCreateParams;
    type Message = BidMessage;

    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError> {
        let mut message = BidMessage {
            item: params.item_hash,
            bidder: params.bidder,
            objects: params.objects,
            generated_at: params.generated_at,
            hash: String::new(),
        };
        message.hash = message.content_hash()?;

        debug!(hash = %message.hash, item = %message.item, "built bid message");
        Ok(message)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptBidMessageFactory;

impl MessageFactory for AcceptBidMessageFactory {
    type Params = BidActionMessageCreateParams;
    type Message = BidAcceptMessage;

    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError> {
        let mut message = BidAcceptMessage {
            item: params.item_hash,
            bid: params.bid_hash,
            generated_at: params.generated_at,
            hash: String::new(),
        };
        message.hash = message.content_hash()?;
        Ok(message)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RejectBidMessageFactory;

impl MessageFactory for RejectBidMessageFactory {
    type Params = BidActionMessageCreateParams;
    type Message = BidRejectMessage;

    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError> {
        let mut message = BidRejectMessage {
            item: params.item_hash,
            bid: params.bid_hash,
            generated_at: params.generated_at,
            hash: String::new(),
        };
        message.hash = message.content_hash()?;
        Ok(message)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CancelBidMessageFactory;

impl MessageFactory for CancelBidMessageFactory {
    type Params = BidActionMessageCreateParams;
    type Message = BidCancelMessage;

    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError> {
        let mut message = BidCancelMessage {
            item: params.item_hash,
            bid: params.bid_hash,
            generated_at: params.generated_at,
            hash: String::new(),
        };
        message.hash = message.content_hash()?;
        Ok(message)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EscrowLockMessageFactory;

impl MessageFactory for EscrowLockMessageFactory {
    type Params = EscrowMessageCreateParams;
    type Message = EscrowLockMessage;

    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError> {
        let mut message = EscrowLockMessage {
            item: params.item_hash,
            bid: params.bid_hash,
            memo: params.memo,
            generated_at: params.generated_at,
            hash: String::new(),
        };
        message.hash = message.content_hash()?;
        Ok(message)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EscrowReleaseMessageFactory;

impl MessageFactory for EscrowReleaseMessageFactory {
    type Params = EscrowMessageCreateParams;
    type Message = EscrowReleaseMessage;

    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError> {
        let mut message = EscrowReleaseMessage {
            item: params.item_hash,
            bid: params.bid_hash,
            memo: params.memo,
            generated_at: params.generated_at,
            hash: String::new(),
        };
        message.hash = message.content_hash()?;
        Ok(message)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EscrowRefundMessageFactory;

impl MessageFactory for EscrowRefundMessageFactory {
    type Params = EscrowMessageCreateParams;
    type Message = EscrowRefundMessage;

    fn get(&self, params: Self::Params) -> Result<Self::Message, CodecError> {
        let mut message = EscrowRefundMessage {
            item: params.item_hash,
            bid: params.bid_hash,
            memo: params.memo,
            generated_at: params.generated_at,
            hash: String::new(),
        };
        message.hash = message.content_hash()?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ActionMessage;

    fn proposal_params(options: &[&str], item_hash: Option<&str>) -> ProposalAddMessageCreateParams {
        ProposalAddMessageCreateParams {
            title: "Which courier".to_string(),
            description: "pick one".to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            sender: "psubmitter".to_string(),
            item_hash: item_hash.map(str::to_string),
        }
    }

    #[test]
    fn public_vote_with_two_options() {
        let message = ProposalAddMessageFactory
            .get(proposal_params(&["A", "B"], None))
            .unwrap();

        assert_eq!(message.category, ProposalCategory::PublicVote);
        assert_eq!(message.item, None);

        let ids: Vec<_> = message
            .options
            .iter()
            .map(|o| (o.option_id, o.description.as_str()))
            .collect();
        assert_eq!(ids, [(0, "A"), (1, "B")]);

        for option in &message.options {
            assert_eq!(option.proposal_hash, message.hash);
            assert_eq!(option.hash, option.content_hash().unwrap());
        }
        assert_ne!(message.options[0].hash, message.options[1].hash);
    }

    #[test]
    fn item_reference_makes_an_item_vote() {
        let message = ProposalAddMessageFactory
            .get(proposal_params(&["KEEP", "REMOVE"], Some("item")))
            .unwrap();

        assert_eq!(message.category, ProposalCategory::ItemVote);
        assert_eq!(message.item.as_deref(), Some("item"));
    }

    #[test]
    fn option_order_is_preserved() {
        let message = ProposalAddMessageFactory
            .get(proposal_params(&["zeta", "alpha", "mu"], None))
            .unwrap();

        let descriptions: Vec<_> = message
            .options
            .iter()
            .map(|o| o.description.as_str())
            .collect();
        assert_eq!(descriptions, ["zeta", "alpha", "mu"]);
    }

    #[test]
    fn built_messages_pass_verification() {
        let at = TimeStamp::from_millis(1_700_000_000_000).unwrap();
        let bid = BidMessageFactory
            .get(BidMessageCreateParams {
                item_hash: "item".to_string(),
                bidder: "pbidder".to_string(),
                objects: vec![BidDatum::new("ship.name", "Jo")],
                generated_at: at.clone(),
            })
            .unwrap();
        let lock = EscrowLockMessageFactory
            .get(EscrowMessageCreateParams {
                item_hash: "item".to_string(),
                bid_hash: bid.hash.clone(),
                memo: None,
                generated_at: at,
            })
            .unwrap();

        assert!(ActionMessage::from(bid).verify_hash().is_ok());
        assert!(ActionMessage::from(lock).verify_hash().is_ok());
    }
}
