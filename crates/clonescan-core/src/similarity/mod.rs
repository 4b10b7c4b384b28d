//! Similarity engine: sequence matching, function-interface extraction and
//! pair scoring.

pub mod engine;
pub mod functions;
pub mod matcher;

pub use engine::{content_digest, FullScore, PairScore, PreparedSource, SimilarityEngine};
pub use functions::{
    extract_function_names, FunctionExtractor, FunctionSignatureSet, RegexFunctionExtractor,
};
pub use matcher::{sequence_ratio, MatchBlock, SequenceMatcher};
