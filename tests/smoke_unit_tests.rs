//! Smoke screen unit tests for the marketplace components
//!
//! Happy-path checks that span the public API: identifiers, hashing tags,
//! action tags, timestamps and the envelope codec. Scenarios live in
//! `scenarios.rs`.

use market_actions::factory::{BidMessageCreateParams, BidMessageFactory, MessageFactory};
use market_actions::hash::{HashableType, hash};
use market_actions::message::{ActionMessage, ActionType, Envelope};
use market_actions::types::{BidDatum, TimeStamp};
use market_actions::utils::{is_content_hash, new_message_id};

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    /// Envelope ids decode back to a 16 byte uuid under the `msg` prefix
    #[test]
    fn envelope_id_carries_a_uuid() {
        let (hrp, data) = bech32::decode(&new_message_id()).unwrap();
        assert_eq!(hrp.as_str(), "msg");
        assert_eq!(data.len(), 16);
    }

    #[test]
    fn envelope_ids_are_distinct() {
        let a = new_message_id();
        let b = new_message_id();
        assert!(a.starts_with("msg1"));
        assert_ne!(a, b);
    }

    #[test]
    fn content_hash_format() {
        assert!(is_content_hash(&sha256::digest("x")));
        assert!(!is_content_hash("TEST-HASH"));
        assert!(!is_content_hash(&sha256::digest("x").to_uppercase()));
    }
}

// HASH MODULE TESTS
mod hash_tests {
    use super::*;

    #[test]
    fn tag_changes_the_digest() {
        let record = ("item", 1u32);
        let accept = hash(&record, HashableType::BidAcceptMessage).unwrap();
        let reject = hash(&record, HashableType::BidRejectMessage).unwrap();

        assert_ne!(accept, reject);
        assert_eq!(accept, hash(&record, HashableType::BidAcceptMessage).unwrap());
    }

    #[test]
    fn bid_tags_match_their_action_tags() {
        assert_eq!(HashableType::BidMessage.as_str(), ActionType::Bid.as_str());
        assert_eq!(HashableType::EscrowRefundMessage.as_str(), ActionType::EscrowRefund.as_str());
        assert_eq!(HashableType::ProposalOption.as_str(), "PROPOSALOPTION_CREATEREQUEST");
    }
}

// MESSAGE MODULE TESTS
mod message_tests {
    use super::*;

    #[test]
    fn every_action_tag_parses_back() {
        for action in ActionType::ALL {
            assert_eq!(action.as_str().parse::<ActionType>().unwrap(), action);
        }
        assert!("MPA_SHIP".parse::<ActionType>().is_err());
    }

    #[test]
    fn envelope_carries_the_message() {
        let message: ActionMessage = BidMessageFactory
            .get(BidMessageCreateParams {
                item_hash: "TEST-HASH".to_string(),
                bidder: "pbidder".to_string(),
                objects: vec![BidDatum::new("size", "L")],
                generated_at: TimeStamp::now(),
            })
            .unwrap()
            .into();

        let envelope = Envelope::seal(new_message_id(), &message).unwrap();
        assert_eq!(envelope.action, "MPA_BID");

        let received = Envelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        let opened = received.open().unwrap();
        assert_eq!(opened, message);
        assert!(opened.verify_hash().is_ok());
    }
}

// TYPES MODULE TESTS
mod types_tests {
    use super::*;

    #[test]
    fn timestamp_from_millis() {
        let ts = TimeStamp::from_millis(1_700_000_000_123).unwrap();
        assert_eq!(ts.to_datetime_utc().timestamp_millis(), 1_700_000_000_123);
    }
}
