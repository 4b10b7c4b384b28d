//! Corpus loading and pairwise scoring.

pub mod corpus;
pub mod pairwise;

pub use corpus::{
    apply_address_list, load_address_list, load_corpus_dir, load_corpus_json, parse_address_list,
    parse_corpus_json,
};
pub use pairwise::{expected_pair_count, pair_indices, PairTable, PairwiseOrchestrator};
