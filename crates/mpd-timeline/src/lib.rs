//! Resolves a parsed DASH manifest into per-representation segment streams.
//!
//! ```text
//!   DocumentNode
//!        │
//!        ▼
//! ┌──────────────┐  pass 1   ┌────────────────┐
//! │    period    ├──────────►│ SegmentStream  │  Base / List / Template
//! │  normalizer  │◄──────────┤  construction  │
//! └──────┬───────┘  pass 2   └───────┬────────┘
//!        │                           │ IndexFetcher (sidx)
//!        ▼                           ▼
//!   ManifestParameters ──bind──► RepresentationStream queries
//! ```

pub mod config;
mod error;
pub mod fetch;
pub mod inherit;
mod manifest;
pub mod node;
pub mod params;
pub mod period;
pub mod search;
mod segment;
pub mod sidx;
pub mod stream;
pub mod template;
pub mod timeline;
pub mod util;

pub use error::*;
pub use manifest::*;
pub use segment::*;
pub use stream::RepresentationStream;
