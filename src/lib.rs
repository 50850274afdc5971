//! Semantic equivalence checks for model-translated APL queries.
//!
//! The pieces compose as a pipeline: [`normalize::extract_query`] recovers a
//! bare query from model output, [`time_filter`] strips or rewrites time
//! bounds, a [`backend::Backend`] executes the query, and
//! [`compare::compare`] grades two results against each other.
//! [`evaluate::Evaluator`] wires the whole thing together.

pub mod backend;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod format;
pub mod masking;
pub mod normalize;
pub mod output;
pub mod schema;
pub mod scorers;
pub mod time_filter;
pub mod verbose;
