//! # Listing Model
//!
//! The record type carried by the stream and the codec that turns one inbound
//! frame into a batch of records.

/// The immutable listing record.
pub mod listing;
/// JSON batch decoding for inbound frames.
pub mod codec;

pub use codec::{decode_batch, decode_binary_batch, DecodeError};
pub use listing::Listing;
