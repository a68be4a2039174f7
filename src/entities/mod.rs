//! Registry records and request-scoped values shared by every pipeline stage.

pub(crate) mod candidate;
pub(crate) mod conflict;
pub(crate) mod disease;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod variant;
