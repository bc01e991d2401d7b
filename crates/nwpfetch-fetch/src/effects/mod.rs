//! I/O side of fetching: the retriever seam and the fetcher driving it.

mod fetcher;
#[cfg(feature = "reqwest")]
mod http;
mod retriever;

pub use fetcher::Fetcher;
pub use retriever::{Blocking, BlockingRetriever, Retriever};

#[cfg(feature = "reqwest")]
pub use http::{HttpRetriever, WriteMode, download_to};
