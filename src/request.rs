//! Request validation in front of the message factories
//!
//! Each request collects every field error it finds instead of stopping at
//! the first one, then hands back the factory parameters and send options.
use super::entity::Bid;
use super::error::{ValidationError, ValidationErrors};
use super::factory::{
    BidActionMessageCreateParams, BidMessageCreateParams, EscrowMessageCreateParams,
    ProposalAddMessageCreateParams,
};
use super::transport::SendParams;
use super::types::{BidDatum, TimeStamp};
use super::utils::is_content_hash;
use std::collections::HashSet;

pub const MAX_DAYS_RETENTION: u32 = 31;

fn check_not_empty(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.trim().is_empty() {
        errors.push(ValidationError::Empty(field));
    }
}

fn check_hash(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if !is_content_hash(value) {
        errors.push(ValidationError::InvalidHash {
            field,
            value: value.to_string(),
        });
    }
}

fn check_send_params(params: &SendParams, errors: &mut Vec<ValidationError>) {
    check_not_empty("send_params.from_address", &params.from_address, errors);
    check_not_empty("send_params.to_address", &params.to_address, errors);
    if params.days_retention == 0 || params.days_retention > MAX_DAYS_RETENTION {
        errors.push(ValidationError::DaysRetention(params.days_retention));
    }
}

fn finish<T>(errors: Vec<ValidationError>, value: T) -> Result<T, ValidationErrors> {
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(ValidationErrors(errors))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalAddRequest {
    pub send_params: SendParams,
    pub submitter: String,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub item_hash: Option<String>,
}

impl ProposalAddRequest {
    pub fn validate(self) -> Result<(ProposalAddMessageCreateParams, SendParams), ValidationErrors> {
        let mut errors = Vec::new();
        check_send_params(&self.send_params, &mut errors);
        check_not_empty("submitter", &self.submitter, &mut errors);
        check_not_empty("title", &self.title, &mut errors);
        if let Some(item_hash) = &self.item_hash {
            check_hash("item_hash", item_hash, &mut errors);
        }

        if self.options.len() < 2 {
            errors.push(ValidationError::TooFewOptions(self.options.len()));
        }
        let mut seen = HashSet::new();
        for option in &self.options {
            if option.trim().is_empty() {
                errors.push(ValidationError::Empty("options"));
            } else if !seen.insert(option.as_str()) {
                errors.push(ValidationError::DuplicateOption(option.clone()));
            }
        }

        finish(
            errors,
            (
                ProposalAddMessageCreateParams {
                    title: self.title,
                    description: self.description,
                    options: self.options,
                    sender: self.submitter,
                    item_hash: self.item_hash,
                },
                self.send_params,
            ),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidRequest {
    pub send_params: SendParams,
    pub item_hash: String,
    pub bidder: String,
    pub objects: Vec<BidDatum>,
}

impl BidRequest {
    pub fn validate(self) -> Result<(BidMessageCreateParams, SendParams), ValidationErrors> {
        let mut errors = Vec::new();
        check_send_params(&self.send_params, &mut errors);
        check_hash("item_hash", &self.item_hash, &mut errors);
        check_not_empty("bidder", &self.bidder, &mut errors);
        for datum in &self.objects {
            check_not_empty("objects.key", &datum.key, &mut errors);
        }

        finish(
            errors,
            (
                BidMessageCreateParams {
                    item_hash: self.item_hash,
                    bidder: self.bidder,
                    objects: self.objects,
                    generated_at: TimeStamp::now(),
                },
                self.send_params,
            ),
        )
    }
}

/// Accept, reject or cancel the current bid on an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidActionRequest {
    pub send_params: SendParams,
    pub item_hash: String,
    pub bid_hash: Option<String>,
}

impl BidActionRequest {
    pub fn validate(self) -> Result<(BidActionMessageCreateParams, SendParams), ValidationErrors> {
        let mut errors = Vec::new();
        check_send_params(&self.send_params, &mut errors);
        check_hash("item_hash", &self.item_hash, &mut errors);
        if let Some(bid_hash) = &self.bid_hash {
            check_hash("bid_hash", bid_hash, &mut errors);
        }

        finish(
            errors,
            (
                BidActionMessageCreateParams {
                    item_hash: self.item_hash,
                    bid_hash: self.bid_hash,
                    generated_at: TimeStamp::now(),
                },
                self.send_params,
            ),
        )
    }
}

/// Lock or refund the escrow for an accepted bid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowRequest {
    pub send_params: SendParams,
    pub item_hash: String,
    pub bid_hash: String,
    pub memo: Option<String>,
}

impl EscrowRequest {
    pub fn validate(self) -> Result<(EscrowMessageCreateParams, SendParams), ValidationErrors> {
        let mut errors = Vec::new();
        check_send_params(&self.send_params, &mut errors);
        check_hash("item_hash", &self.item_hash, &mut errors);
        check_hash("bid_hash", &self.bid_hash, &mut errors);

        finish(
            errors,
            (
                EscrowMessageCreateParams {
                    item_hash: self.item_hash,
                    bid_hash: self.bid_hash,
                    memo: self.memo,
                    generated_at: TimeStamp::now(),
                },
                self.send_params,
            ),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowReleaseRequest {
    pub send_params: SendParams,
    pub bid: Bid,        // the original bid
    pub bid_accept: Bid, // the accepted bid
    pub memo: Option<String>,
}

impl EscrowReleaseRequest {
    /// Field checks only. The bid pairing rules are enforced by the release
    /// processor, which reports them as state errors.
    pub fn validate(self) -> Result<Self, ValidationErrors> {
        let mut errors = Vec::new();
        check_send_params(&self.send_params, &mut errors);
        check_hash("bid_accept.hash", &self.bid_accept.hash, &mut errors);
        finish(errors, self)
    }
}
