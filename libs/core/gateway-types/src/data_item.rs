//! ANS-104 data item model.

use crate::id::Digest32;

/// The seven signature schemes ANS-104 data items may be signed with,
/// keyed by their wire `sig_type` tag. `(sig_bytes, pub_bytes)` per variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureType {
    Arweave,
    Ed25519,
    Ethereum,
    Solana,
    InjectedAptos,
    MultiAptos,
    TypedEthereum,
}

impl SignatureType {
    pub fn from_tag(tag: u16) -> Option<Self> {
        Some(match tag {
                1 => SignatureType::Arweave,
                2 => SignatureType::Ed25519,
                3 => SignatureType::Ethereum,
                4 => SignatureType::Solana,
                5 => SignatureType::InjectedAptos,
                6 => SignatureType::MultiAptos,
                7 => SignatureType::TypedEthereum,
                _ => return None,
        })
    }

    pub fn tag(self) -> u16 {
        match self {
            SignatureType::Arweave => 1,
            SignatureType::Ed25519 => 2,
            SignatureType::Ethereum => 3,
            SignatureType::Solana => 4,
            SignatureType::InjectedAptos => 5,
            SignatureType::MultiAptos => 6,
            SignatureType::TypedEthereum => 7,
        }
    }

    /// `(signature_len, owner_len)` in bytes, per the ANS-104 signature
    /// scheme table in the GLOSSARY.
    pub fn lengths(self) -> (usize, usize) {
        match self {
            SignatureType::Arweave => (512, 512),
            SignatureType::Ed25519 => (64, 32),
            SignatureType::Ethereum => (65, 65),
            SignatureType::Solana => (64, 32),
            SignatureType::InjectedAptos => (64, 32),
            SignatureType::MultiAptos => (2052, 1025),
            SignatureType::TypedEthereum => (65, 42),
        }
    }
}

/// A fully parsed and verified ANS-104 data item.
#[derive(Clone, Debug)]
pub struct DataItem {
    pub id: Digest32,
    pub parent_id: Digest32,
    pub root_tx_id: Digest32,
    pub index: Option<u32>,
    pub signature: Vec<u8>,
    pub owner: Vec<u8>,
    pub owner_address: [u8; 32],
    pub target: Option<[u8; 32]>,
    pub anchor: Option<[u8; 32]>,
    pub tags: Vec<(String, String)>,
    pub data_offset: u64,
    pub data_size: u64,
    pub signature_type: SignatureType,
    pub signature_offset: u64,
    pub signature_size: u64,
    pub owner_offset: u64,
    pub owner_size: u64,
}

/// Events emitted by the unbundler pipeline.
#[derive(Clone, Debug)]
pub enum UnbundleEvent {
    DataItemMatched(Box<DataItem>),
    UnbundleComplete {
        bundle_id: Digest32,
        item_count: usize,
        matched_item_count: usize,
    },
    UnbundleError {
        bundle_id: Digest32,
        message: String,
    },
}
