//! Retrieval: deciding which provider and account fetch a resolved file.
//!
//! Every provider with a [`Retriever`] bids on a [`File`] via
//! [`Retriever::can_retrieve`]. The [`RetrievalRouter`] picks the highest
//! bid (registration order breaks ties) and asks that retriever for a
//! [`FetchRequest`], which the transport then executes.

mod error;
mod fetch;
mod router;

pub use error::RetrieveError;
pub use fetch::{FetchRequest, Header};
pub use router::{Bid, RetrievalRouter, Retrieval};

use async_trait::async_trait;

use crate::resolver::File;

/// Retrieval capability of a provider.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Bid for retrieving `file`; 0 means ineligible. Must not perform I/O.
    fn can_retrieve(&self, file: &File) -> u32;

    /// Builds the request that fetches `file`'s bytes, selecting an account
    /// and logging in as needed.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieveError::NoUsableAccount`] when an account is required
    /// and none is usable, or another [`RetrieveError`] when the hoster
    /// refuses or the exchange fails.
    async fn retrieve(&self, file: &File) -> Result<FetchRequest, RetrieveError>;
}
