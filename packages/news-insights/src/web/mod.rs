//! Web collaborators: HTTP fetching, quote-page parsing, article text
//! extraction and raw HTML archiving.

pub mod archive;
pub mod article;
pub mod http;
pub mod quote_page;

pub use archive::{FsArchive, MemoryArchive};
pub use article::MainTextExtractor;
pub use http::HttpFetcher;
pub use quote_page::QuotePageParser;
