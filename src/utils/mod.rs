//! Internal serde helpers for loosely shaped LLM output.

pub(crate) mod serde;
