//! C8: ANS-104 bundle unbundler — header parsing, signature
//! verification, and the two-stage download/parse worker pipeline.

mod deep_hash;
mod parse;
mod pipeline;
mod signature;

pub use deep_hash::{data_item_signature_payload, deep_hash, DeepHashChunk};
pub use parse::{b64url, parse_and_verify_item, read_bundle_header, BundleHeader};
pub use pipeline::{
    normalized_ids, AcceptAllFilter, BundleByteSource, BundleParser, ByteStream, DataImporter, ItemFilter,
    QueueItem,
};
pub use signature::verify_signature;
