//! VPN route generator - OpenVPN route directives from domain and CIDR lists
//!
//! Reads a newline-delimited list of domain names and IPv4/CIDR entries and
//! turns it into `push "route ..."` lines for an OpenVPN server config.
//! Literal networks pass through with their full netmask, domains are
//! resolved and widened to a subnet route, comments are copied verbatim.
//!
//! # Architecture
//!
//! - `config`: Configuration file handling (TOML)
//! - `route::entry`: Line classification and IPv4 network normalization
//! - `route::resolver`: A-record lookups
//! - `route::writer`: Output file generation
//!
//! # Usage
//!
//! ```bash
//! vpn-route-gen routes.txt server-routes.conf
//! ```

pub mod config;
pub mod route;

pub use config::Config;
pub use route::{generate_routes_file, DnsResolver, GenerateError, LazyResolver, RouteGenerator};
