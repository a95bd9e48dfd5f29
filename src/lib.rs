#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

mod common;
mod error;
mod tree;

pub use crate::common::{
    Candidate, CandidateIter, CandidateSet, ClosestCandidates, ClosestNodes, ClosestNodesIter,
    Config, DistanceOrder, Id, Node, Ranked, TieBreaker, DEFAULT_K, ID_SIZE, MAX_DISTANCE,
};
pub use error::{Error, Result};
