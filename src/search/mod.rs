//! Candidate retrieval and ranking: lexical index, providers, merge and conflict penalties.

pub(crate) mod conflict;
pub(crate) mod lexical;
pub(crate) mod merge;
pub(crate) mod provider;
pub(crate) mod text;
