use crate::Bytes32;
use serde::{Deserialize, Serialize};

/// Opaque transaction payload carried in a block body.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction(pub Vec<u8>);

/// The body of a block, containing payload data.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
}

impl BlockBody {
    /// Commitment to the body, stored in the header as `body_root`.
    ///
    /// Every transaction is length-prefixed so that re-splitting the same
    /// bytes into different transactions yields a different root.
    pub fn root(&self) -> Bytes32 {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.transactions.len() as u64).to_be_bytes());
        for tx in &self.transactions {
            buf.extend_from_slice(&(tx.0.len() as u64).to_be_bytes());
            buf.extend_from_slice(&tx.0);
        }
        Bytes32::digest(&buf)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: Bytes32,
    pub body_root: Bytes32,
    pub timestamp: u64,
    /// Required leading zero bits of the proof-of-work hash.
    pub difficulty: u32,
    pub nonce: u64,
}

impl BlockHeader {
    fn encode_unsealed(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(self.parent_hash.as_bytes());
        buf.extend_from_slice(self.body_root.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.difficulty.to_be_bytes());
    }

    /// Identity of the block: digest over every header field.
    pub fn hash(&self) -> Bytes32 {
        let mut buf = Vec::with_capacity(96);
        self.encode_unsealed(&mut buf);
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        Bytes32::digest(&buf)
    }

    /// Digest over every field except the nonce. This is what gets mined.
    pub fn seal_hash(&self) -> Bytes32 {
        let mut buf = Vec::with_capacity(88);
        self.encode_unsealed(&mut buf);
        Bytes32::digest(&buf)
    }

    /// Proof-of-work hash for the current nonce.
    pub fn pow_hash(&self) -> Bytes32 {
        let mut buf = Vec::with_capacity(40);
        buf.extend_from_slice(self.seal_hash().as_bytes());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        Bytes32::digest(&buf)
    }

    /// Whether the seal carries at least `required_bits` of work.
    pub fn has_seal_work(&self, required_bits: u32) -> bool {
        self.pow_hash().leading_zero_bits() >= required_bits
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    /// Build a block on top of `parent`, committing to `body`. The returned
    /// header is unsealed; pass it through [`mine`] when difficulty is non-zero.
    pub fn new_child(parent: &BlockHeader, body: BlockBody, timestamp: u64, difficulty: u32) -> Self {
        let header = BlockHeader {
            number: parent.number + 1,
            parent_hash: parent.hash(),
            body_root: body.root(),
            timestamp,
            difficulty,
            nonce: 0,
        };
        Self { header, body }
    }

    pub fn hash(&self) -> Bytes32 {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}

/// Search nonces until the header satisfies its own difficulty.
pub fn mine(mut header: BlockHeader) -> BlockHeader {
    while !header.has_seal_work(header.difficulty) {
        header.nonce = header.nonce.wrapping_add(1);
    }
    header
}
