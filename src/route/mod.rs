//! Route list processing: classification, resolution and output

pub mod entry;
pub mod resolver;
pub mod writer;

pub use entry::RouteEntry;
pub use resolver::{DnsError, DnsResolver, LazyResolver, Resolve};
pub use writer::{generate_routes_file, GenerateError, Header, RouteGenerator, Summary};
