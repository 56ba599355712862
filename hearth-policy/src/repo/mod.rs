//! Repository storage service
//!
//! The policy core only decides when to create or fork a repository and
//! which objects may be fetched. The storage service itself is external:
//! - `HttpRepoService` talks to it over HTTP
//! - `MemoryRepoService` records calls for tests

pub mod http;
pub mod memory;
pub mod path;
pub mod traits;

pub use http::HttpRepoService;
pub use memory::{MemoryRepoService, RepoCall};
pub use path::validate_path;
pub use traits::{RepoError, RepoService};
