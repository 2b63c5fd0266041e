//! Action message catalogue and the wire envelope that carries it
use super::error::{CodecError, ProcessError};
use super::hash::{self, HashableType};
use super::types::{BidDatum, TimeStamp};
use chrono::Utc;
use std::{fmt, str::FromStr};

/// Wire-visible action tags. These strings are shared with existing peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionType {
    ProposalAdd,
    Bid,
    BidAccept,
    BidReject,
    BidCancel,
    EscrowLock,
    EscrowRelease,
    EscrowRefund,
}

impl ActionType {
    pub const ALL: [ActionType; 8] = [
        ActionType::ProposalAdd,
        ActionType::Bid,
        ActionType::BidAccept,
        ActionType::BidReject,
        ActionType::BidCancel,
        ActionType::EscrowLock,
        ActionType::EscrowRelease,
        ActionType::EscrowRefund,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ProposalAdd => "MP_PROPOSAL_ADD",
            ActionType::Bid => "MPA_BID",
            ActionType::BidAccept => "MPA_ACCEPT",
            ActionType::BidReject => "MPA_REJECT",
            ActionType::BidCancel => "MPA_CANCEL",
            ActionType::EscrowLock => "MPA_LOCK",
            ActionType::EscrowRelease => "MPA_RELEASE",
            ActionType::EscrowRefund => "MPA_REFUND",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ProcessError::UnsupportedAction(s.to_string()))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalCategory {
    #[n(0)]
    PublicVote,
    #[n(1)]
    ItemVote,
}

impl fmt::Display for ProposalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalCategory::PublicVote => f.write_str("PUBLIC_VOTE"),
            ProposalCategory::ItemVote => f.write_str("ITEM_VOTE"),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ProposalOption {
    #[n(0)]
    pub option_id: u32, // position in the submitted list, starting at 0
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub proposal_hash: String,
    #[n(3)]
    pub hash: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ProposalAddMessage {
    #[n(0)]
    pub submitter: String,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub options: Vec<ProposalOption>,
    #[n(4)]
    pub category: ProposalCategory,
    #[n(5)]
    pub item: Option<String>,
    #[n(6)]
    pub hash: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BidMessage {
    #[n(0)]
    pub item: String,
    #[n(1)]
    pub bidder: String,
    #[n(2)]
    pub objects: Vec<BidDatum>,
    #[n(3)]
    pub generated_at: TimeStamp<Utc>,
    #[n(4)]
    pub hash: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BidAcceptMessage {
    #[n(0)]
    pub item: String,
    #[n(1)]
    pub bid: Option<String>, // hash of the bid being answered
    #[n(2)]
    pub generated_at: TimeStamp<Utc>,
    #[n(3)]
    pub hash: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BidRejectMessage {
    #[n(0)]
    pub item: String,
    #[n(1)]
    pub bid: Option<String>,
    #[n(2)]
    pub generated_at: TimeStamp<Utc>,
    #[n(3)]
    pub hash: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BidCancelMessage {
    #[n(0)]
    pub item: String,
    #[n(1)]
    pub bid: Option<String>,
    #[n(2)]
    pub generated_at: TimeStamp<Utc>,
    #[n(3)]
    pub hash: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct EscrowLockMessage {
    #[n(0)]
    pub item: String,
    #[n(1)]
    pub bid: String, // hash of the ACCEPTED bid row
    #[n(2)]
    pub memo: Option<String>,
    #[n(3)]
    pub generated_at: TimeStamp<Utc>,
    #[n(4)]
    pub hash: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct EscrowReleaseMessage {
    #[n(0)]
    pub item: String,
    #[n(1)]
    pub bid: String,
    #[n(2)]
    pub memo: Option<String>,
    #[n(3)]
    pub generated_at: TimeStamp<Utc>,
    #[n(4)]
    pub hash: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct EscrowRefundMessage {
    #[n(0)]
    pub item: String,
    #[n(1)]
    pub bid: String,
    #[n(2)]
    pub memo: Option<String>,
    #[n(3)]
    pub generated_at: TimeStamp<Utc>,
    #[n(4)]
    pub hash: String,
}

// Field views. Only what is listed here takes part in a digest.

#[derive(minicbor::Encode)]
struct ProposalView<'a> {
    #[n(0)]
    submitter: &'a str,
    #[n(1)]
    title: &'a str,
    #[n(2)]
    description: &'a str,
    #[n(3)]
    category: ProposalCategory,
    #[n(4)]
    item: Option<&'a str>,
    #[n(5)]
    options: Vec<OptionDraftView<'a>>,
}

#[derive(minicbor::Encode)]
struct OptionDraftView<'a> {
    #[n(0)]
    option_id: u32,
    #[n(1)]
    description: &'a str,
}

#[derive(minicbor::Encode)]
struct OptionView<'a> {
    #[n(0)]
    proposal_hash: &'a str,
    #[n(1)]
    option_id: u32,
    #[n(2)]
    description: &'a str,
}

#[derive(minicbor::Encode)]
struct BidView<'a> {
    #[n(0)]
    item: &'a str,
    #[n(1)]
    bidder: &'a str,
    #[n(2)]
    objects: &'a [BidDatum],
    #[n(3)]
    generated_at: &'a TimeStamp<Utc>,
}

#[derive(minicbor::Encode)]
struct BidActionView<'a> {
    #[n(0)]
    item: &'a str,
    #[n(1)]
    bid: Option<&'a str>,
    #[n(2)]
    generated_at: &'a TimeStamp<Utc>,
}

#[derive(minicbor::Encode)]
struct EscrowView<'a> {
    #[n(0)]
    item: &'a str,
    #[n(1)]
    bid: &'a str,
    #[n(2)]
    memo: Option<&'a str>,
    #[n(3)]
    generated_at: &'a TimeStamp<Utc>,
}

impl ProposalAddMessage {
    /// Digest over the proposal fields and each option's id and description.
    /// Option hashes and back-references are not part of it.
    pub fn content_hash(&self) -> Result<String, CodecError> {
        let view = ProposalView {
            submitter: &self.submitter,
            title: &self.title,
            description: &self.description,
            category: self.category,
            item: self.item.as_deref(),
            options: self
                .options
                .iter()
                .map(|option| OptionDraftView {
                    option_id: option.option_id,
                    description: &option.description,
                })
                .collect(),
        };
        hash::hash(&view, HashableType::ProposalMessage)
    }
}

impl ProposalOption {
    pub fn content_hash(&self) -> Result<String, CodecError> {
        let view = OptionView {
            proposal_hash: &self.proposal_hash,
            option_id: self.option_id,
            description: &self.description,
        };
        hash::hash(&view, HashableType::ProposalOption)
    }
}

impl BidMessage {
    pub fn content_hash(&self) -> Result<String, CodecError> {
        let view = BidView {
            item: &self.item,
            bidder: &self.bidder,
            objects: &self.objects,
            generated_at: &self.generated_at,
        };
        hash::hash(&view, HashableType::BidMessage)
    }
}

fn bid_action_hash(
    item: &str,
    bid: Option<&str>,
    generated_at: &TimeStamp<Utc>,
    hashable_type: HashableType,
) -> Result<String, CodecError> {
    let view = BidActionView {
        item,
        bid,
        generated_at,
    };
    hash::hash(&view, hashable_type)
}

fn escrow_hash(
    item: &str,
    bid: &str,
    memo: Option<&str>,
    generated_at: &TimeStamp<Utc>,
    hashable_type: HashableType,
) -> Result<String, CodecError> {
    let view = EscrowView {
        item,
        bid,
        memo,
        generated_at,
    };
    hash::hash(&view, hashable_type)
}

impl BidAcceptMessage {
    pub fn content_hash(&self) -> Result<String, CodecError> {
        bid_action_hash(
            &self.item,
            self.bid.as_deref(),
            &self.generated_at,
            HashableType::BidAcceptMessage,
        )
    }
}

impl BidRejectMessage {
    pub fn content_hash(&self) -> Result<String, CodecError> {
        bid_action_hash(
            &self.item,
            self.bid.as_deref(),
            &self.generated_at,
            HashableType::BidRejectMessage,
        )
    }
}

impl BidCancelMessage {
    pub fn content_hash(&self) -> Result<String, CodecError> {
        bid_action_hash(
            &self.item,
            self.bid.as_deref(),
            &self.generated_at,
            HashableType::BidCancelMessage,
        )
    }
}

impl EscrowLockMessage {
    pub fn content_hash(&self) -> Result<String, CodecError> {
        escrow_hash(
            &self.item,
            &self.bid,
            self.memo.as_deref(),
            &self.generated_at,
            HashableType::EscrowLockMessage,
        )
    }
}

impl EscrowReleaseMessage {
    pub fn content_hash(&self) -> Result<String, CodecError> {
        escrow_hash(
            &self.item,
            &self.bid,
            self.memo.as_deref(),
            &self.generated_at,
            HashableType::EscrowReleaseMessage,
        )
    }
}

impl EscrowRefundMessage {
    pub fn content_hash(&self) -> Result<String, CodecError> {
        escrow_hash(
            &self.item,
            &self.bid,
            self.memo.as_deref(),
            &self.generated_at,
            HashableType::EscrowRefundMessage,
        )
    }
}

/// Every action message a peer can send or receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionMessage {
    ProposalAdd(ProposalAddMessage),
    Bid(BidMessage),
    BidAccept(BidAcceptMessage),
    BidReject(BidRejectMessage),
    BidCancel(BidCancelMessage),
    EscrowLock(EscrowLockMessage),
    EscrowRelease(EscrowReleaseMessage),
    EscrowRefund(EscrowRefundMessage),
}

impl ActionMessage {
    pub fn action(&self) -> ActionType {
        match self {
            ActionMessage::ProposalAdd(_) => ActionType::ProposalAdd,
            ActionMessage::Bid(_) => ActionType::Bid,
            ActionMessage::BidAccept(_) => ActionType::BidAccept,
            ActionMessage::BidReject(_) => ActionType::BidReject,
            ActionMessage::BidCancel(_) => ActionType::BidCancel,
            ActionMessage::EscrowLock(_) => ActionType::EscrowLock,
            ActionMessage::EscrowRelease(_) => ActionType::EscrowRelease,
            ActionMessage::EscrowRefund(_) => ActionType::EscrowRefund,
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            ActionMessage::ProposalAdd(m) => &m.hash,
            ActionMessage::Bid(m) => &m.hash,
            ActionMessage::BidAccept(m) => &m.hash,
            ActionMessage::BidReject(m) => &m.hash,
            ActionMessage::BidCancel(m) => &m.hash,
            ActionMessage::EscrowLock(m) => &m.hash,
            ActionMessage::EscrowRelease(m) => &m.hash,
            ActionMessage::EscrowRefund(m) => &m.hash,
        }
    }

    /// The listing item this message is about, if any.
    pub fn item(&self) -> Option<&str> {
        match self {
            ActionMessage::ProposalAdd(m) => m.item.as_deref(),
            ActionMessage::Bid(m) => Some(&m.item),
            ActionMessage::BidAccept(m) => Some(&m.item),
            ActionMessage::BidReject(m) => Some(&m.item),
            ActionMessage::BidCancel(m) => Some(&m.item),
            ActionMessage::EscrowLock(m) => Some(&m.item),
            ActionMessage::EscrowRelease(m) => Some(&m.item),
            ActionMessage::EscrowRefund(m) => Some(&m.item),
        }
    }

    pub fn content_hash(&self) -> Result<String, CodecError> {
        match self {
            ActionMessage::ProposalAdd(m) => m.content_hash(),
            ActionMessage::Bid(m) => m.content_hash(),
            ActionMessage::BidAccept(m) => m.content_hash(),
            ActionMessage::BidReject(m) => m.content_hash(),
            ActionMessage::BidCancel(m) => m.content_hash(),
            ActionMessage::EscrowLock(m) => m.content_hash(),
            ActionMessage::EscrowRelease(m) => m.content_hash(),
            ActionMessage::EscrowRefund(m) => m.content_hash(),
        }
    }

    /// Recompute the declared hashes and fail on the first mismatch.
    ///
    /// Proposal options are checked too: each must point back at the
    /// proposal hash and carry its own matching digest.
    pub fn verify_hash(&self) -> Result<(), ProcessError> {
        let computed = self.content_hash()?;
        if computed != self.hash() {
            return Err(ProcessError::Integrity {
                declared: self.hash().to_string(),
                computed,
            });
        }

        if let ActionMessage::ProposalAdd(proposal) = self {
            for option in &proposal.options {
                if option.proposal_hash != proposal.hash {
                    return Err(ProcessError::Integrity {
                        declared: option.proposal_hash.clone(),
                        computed: proposal.hash.clone(),
                    });
                }
                let computed = option.content_hash()?;
                if computed != option.hash {
                    return Err(ProcessError::Integrity {
                        declared: option.hash.clone(),
                        computed,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>, CodecError> {
        let encoded = match self {
            ActionMessage::ProposalAdd(m) => minicbor::to_vec(m),
            ActionMessage::Bid(m) => minicbor::to_vec(m),
            ActionMessage::BidAccept(m) => minicbor::to_vec(m),
            ActionMessage::BidReject(m) => minicbor::to_vec(m),
            ActionMessage::BidCancel(m) => minicbor::to_vec(m),
            ActionMessage::EscrowLock(m) => minicbor::to_vec(m),
            ActionMessage::EscrowRelease(m) => minicbor::to_vec(m),
            ActionMessage::EscrowRefund(m) => minicbor::to_vec(m),
        };
        encoded.map_err(|err| CodecError::Encode(err.to_string()))
    }

    pub fn decode_payload(action: ActionType, payload: &[u8]) -> Result<Self, CodecError> {
        let decoded = match action {
            ActionType::ProposalAdd => minicbor::decode(payload).map(ActionMessage::ProposalAdd),
            ActionType::Bid => minicbor::decode(payload).map(ActionMessage::Bid),
            ActionType::BidAccept => minicbor::decode(payload).map(ActionMessage::BidAccept),
            ActionType::BidReject => minicbor::decode(payload).map(ActionMessage::BidReject),
            ActionType::BidCancel => minicbor::decode(payload).map(ActionMessage::BidCancel),
            ActionType::EscrowLock => minicbor::decode(payload).map(ActionMessage::EscrowLock),
            ActionType::EscrowRelease => {
                minicbor::decode(payload).map(ActionMessage::EscrowRelease)
            }
            ActionType::EscrowRefund => minicbor::decode(payload).map(ActionMessage::EscrowRefund),
        };
        decoded.map_err(|err| CodecError::Decode(err.to_string()))
    }
}

impl From<ProposalAddMessage> for ActionMessage {
    fn from(value: ProposalAddMessage) -> Self {
        ActionMessage::ProposalAdd(value)
    }
}
impl From<BidMessage> for ActionMessage {
    fn from(value: BidMessage) -> Self {
        ActionMessage::Bid(value)
    }
}
impl From<BidAcceptMessage> for ActionMessage {
    fn from(value: BidAcceptMessage) -> Self {
        ActionMessage::BidAccept(value)
    }
}
impl From<BidRejectMessage> for ActionMessage {
    fn from(value: BidRejectMessage) -> Self {
        ActionMessage::BidReject(value)
    }
}
impl From<BidCancelMessage> for ActionMessage {
    fn from(value: BidCancelMessage) -> Self {
        ActionMessage::BidCancel(value)
    }
}
impl From<EscrowLockMessage> for ActionMessage {
    fn from(value: EscrowLockMessage) -> Self {
        ActionMessage::EscrowLock(value)
    }
}
impl From<EscrowReleaseMessage> for ActionMessage {
    fn from(value: EscrowReleaseMessage) -> Self {
        ActionMessage::EscrowRelease(value)
    }
}
impl From<EscrowRefundMessage> for ActionMessage {
    fn from(value: EscrowRefundMessage) -> Self {
        ActionMessage::EscrowRefund(value)
    }
}

/// What actually travels over the transport.
///
/// `id` identifies the delivery, not the content; the content identity is the
/// message hash inside `payload`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub action: String,
    #[n(2)]
    #[cbor(with = "minicbor::bytes")]
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn seal(id: String, message: &ActionMessage) -> Result<Self, CodecError> {
        Ok(Self {
            id,
            action: message.action().as_str().to_string(),
            payload: message.encode_payload()?,
        })
    }

    /// Decode the payload into the variant named by `action`.
    pub fn open(&self) -> Result<ActionMessage, ProcessError> {
        let action: ActionType = self.action.parse()?;
        Ok(ActionMessage::decode_payload(action, &self.payload)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        minicbor::to_vec(self).map_err(|err| CodecError::Encode(err.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        minicbor::decode(bytes).map_err(|err| CodecError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(item: &str) -> BidAcceptMessage {
        let mut message = BidAcceptMessage {
            item: item.to_string(),
            bid: None,
            generated_at: TimeStamp::from_millis(1_700_000_000_000).unwrap(),
            hash: String::new(),
        };
        message.hash = message.content_hash().unwrap();
        message
    }

    #[test]
    fn action_tags_round_trip_through_strings() {
        for action in ActionType::ALL {
            assert_eq!(action.as_str().parse::<ActionType>().unwrap(), action);
        }
        assert!(matches!(
            "MPA_SHIP".parse::<ActionType>(),
            Err(ProcessError::UnsupportedAction(tag)) if tag == "MPA_SHIP"
        ));
    }

    #[test]
    fn bid_actions_with_same_fields_hash_differently() {
        let accept = accept("item");
        let reject = BidRejectMessage {
            item: accept.item.clone(),
            bid: None,
            generated_at: accept.generated_at.clone(),
            hash: String::new(),
        };

        assert_ne!(accept.hash, reject.content_hash().unwrap());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let mut message = accept("item");
        message.item = "other".to_string();

        let err = ActionMessage::from(message).verify_hash().unwrap_err();
        assert!(matches!(err, ProcessError::Integrity { .. }));
    }

    #[test]
    fn envelope_opens_to_the_sealed_message() {
        let message = ActionMessage::from(accept("item"));
        let envelope = Envelope::seal("msg1".to_string(), &message).unwrap();

        let bytes = envelope.to_bytes().unwrap();
        let opened = Envelope::from_bytes(&bytes).unwrap().open().unwrap();

        assert_eq!(opened, message);
        assert!(opened.verify_hash().is_ok());
    }

    #[test]
    fn envelope_with_unknown_action_is_unsupported() {
        let envelope = Envelope {
            id: "msg1".to_string(),
            action: "MPA_SHIP".to_string(),
            payload: vec![],
        };

        assert!(matches!(
            envelope.open(),
            Err(ProcessError::UnsupportedAction(_))
        ));
    }
}
