//! Canonical content hashing for action messages and their child records
use super::error::CodecError;
use std::convert::Infallible;

/// Bumped whenever the field selection of any [`HashableType`] changes.
pub const HASH_FORMAT_VERSION: u8 = 1;

/// Selects which fields of a record take part in its digest.
///
/// The tag string is mixed into the digest input, so two records with the
/// same fields but different tags never share a hash. The field set and order
/// behind each tag is part of the wire contract with other peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashableType {
    ProposalMessage,
    ProposalOption,
    BidMessage,
    BidAcceptMessage,
    BidRejectMessage,
    BidCancelMessage,
    EscrowLockMessage,
    EscrowReleaseMessage,
    EscrowRefundMessage,
}

impl HashableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashableType::ProposalMessage => "PROPOSAL_MESSAGE",
            HashableType::ProposalOption => "PROPOSALOPTION_CREATEREQUEST",
            HashableType::BidMessage => "MPA_BID",
            HashableType::BidAcceptMessage => "MPA_ACCEPT",
            HashableType::BidRejectMessage => "MPA_REJECT",
            HashableType::BidCancelMessage => "MPA_CANCEL",
            HashableType::EscrowLockMessage => "MPA_LOCK",
            HashableType::EscrowReleaseMessage => "MPA_RELEASE",
            HashableType::EscrowRefundMessage => "MPA_REFUND",
        }
    }
}

/// Hash `record` under `hashable_type`.
///
/// `record` is expected to be a field view that only carries the fields the
/// tag declares. The digest input is the CBOR array
/// `[HASH_FORMAT_VERSION, tag, record]` and the output is lowercase hex SHA-256.
pub fn hash<T: minicbor::Encode<()>>(
    record: &T,
    hashable_type: HashableType,
) -> Result<String, CodecError> {
    let bytes = canonical_bytes(record, hashable_type)
        .map_err(|err| CodecError::Encode(err.to_string()))?;

    Ok(sha256::digest(&bytes))
}

fn canonical_bytes<T: minicbor::Encode<()>>(
    record: &T,
    hashable_type: HashableType,
) -> Result<Vec<u8>, minicbor::encode::Error<Infallible>> {
    let mut e = minicbor::Encoder::new(Vec::new());
    e.array(3)?
        .u8(HASH_FORMAT_VERSION)?
        .str(hashable_type.as_str())?
        .encode(record)?;

    Ok(e.into_writer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_content_hash;

    #[derive(minicbor::Encode)]
    struct Sample<'a> {
        #[n(0)]
        item: &'a str,
        #[n(1)]
        amount: u64,
    }

    #[test]
    fn digest_is_stable_hex() {
        let record = Sample {
            item: "item",
            amount: 7,
        };

        let first = hash(&record, HashableType::BidMessage).unwrap();
        let second = hash(&record, HashableType::BidMessage).unwrap();

        assert_eq!(first, second);
        assert!(is_content_hash(&first));
    }

    #[test]
    fn tag_is_part_of_the_digest() {
        let record = Sample {
            item: "item",
            amount: 7,
        };

        let accept = hash(&record, HashableType::BidAcceptMessage).unwrap();
        let reject = hash(&record, HashableType::BidRejectMessage).unwrap();

        assert_ne!(accept, reject);
    }

    #[test]
    fn field_values_change_the_digest() {
        let a = Sample {
            item: "item",
            amount: 7,
        };
        let b = Sample {
            item: "item",
            amount: 8,
        };

        assert_ne!(
            hash(&a, HashableType::BidMessage).unwrap(),
            hash(&b, HashableType::BidMessage).unwrap()
        );
    }
}
