//! Route file generation
//!
//! Produces a header comment followed by one block of output per input line:
//! a route directive for literal networks, one directive per resolved address
//! for domains, or the line itself for comments.

use crate::config::RouteConfig;
use crate::route::entry::{reduce_to_subnet, RouteEntry};
use crate::route::resolver::{DnsError, Resolve};
use chrono::NaiveDateTime;
use ipnetwork::Ipv4Network;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("The routes file is empty: {}", .0.display())]
    EmptyRoutesFile(PathBuf),
    #[error("{0}")]
    Dns(#[from] DnsError),
}

/// First line of every generated file
#[derive(Debug, Clone)]
pub struct Header<'a> {
    pub source: &'a str,
    pub generated_at: NaiveDateTime,
    pub program: &'a str,
}

impl fmt::Display for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "# This file is generated from {} at {} by {}",
            self.source,
            self.generated_at.format("%Y-%m-%d %H:%M:%S"),
            self.program
        )
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub routes: usize,
    pub passthrough: usize,
    pub resolve_errors: usize,
    pub invalid_answers: usize,
}

pub struct RouteGenerator<R> {
    resolver: R,
    gateway: String,
    resolved_prefix: u8,
}

impl<R: Resolve> RouteGenerator<R> {
    pub fn new(resolver: R, config: &RouteConfig) -> Self {
        Self {
            resolver,
            gateway: config.gateway.clone(),
            resolved_prefix: config.resolved_prefix,
        }
    }

    /// Write the header and every rendered line, `\n`-terminated
    ///
    /// Failed lookups become comment lines; only a resolver that cannot be
    /// set up stops the run.
    pub fn generate<'a, W, I>(
        &self,
        header: &Header<'_>,
        lines: I,
        out: &mut W,
    ) -> Result<Summary, GenerateError>
    where
        W: Write,
        I: IntoIterator<Item = &'a str>,
    {
        let mut summary = Summary::default();
        writeln!(out, "{}", header)?;

        for line in lines {
            for rendered in self.render_line(line, &mut summary)? {
                out.write_all(rendered.as_bytes())?;
                out.write_all(b"\n")?;
            }
        }

        Ok(summary)
    }

    fn render_line(&self, line: &str, summary: &mut Summary) -> Result<Vec<String>, DnsError> {
        match RouteEntry::classify(line) {
            RouteEntry::Network { network, source } => {
                debug!("Literal route {}", source);
                summary.routes += 1;
                Ok(vec![self.route_line(network, source)])
            }
            RouteEntry::Passthrough(text) => {
                summary.passthrough += 1;
                Ok(vec![text.to_string()])
            }
            RouteEntry::Domain(domain) => self.render_domain(domain, summary),
        }
    }

    fn render_domain(&self, domain: &str, summary: &mut Summary) -> Result<Vec<String>, DnsError> {
        let answers = match self.resolver.resolve(domain) {
            Ok(answers) => answers,
            Err(DnsError::Lookup { message, .. }) => {
                summary.resolve_errors += 1;
                let line = format!(
                    "# DNS resolve error for {}: {}",
                    domain,
                    single_line(&message)
                );
                warn!("{}", line);
                return Ok(vec![line]);
            }
            Err(e) => return Err(e),
        };

        debug!("Resolved {} -> {:?}", domain, answers);
        let rendered = answers
            .iter()
            .map(|answer| {
                let subnet = answer
                    .parse::<Ipv4Addr>()
                    .ok()
                    .and_then(|ip| reduce_to_subnet(ip, self.resolved_prefix));
                match subnet {
                    Some(subnet) => {
                        summary.routes += 1;
                        self.route_line(subnet, &format!("{} is resolved to {}", domain, answer))
                    }
                    None => {
                        summary.invalid_answers += 1;
                        warn!("{} resolved to non-IPv4 answer {:?}", domain, answer);
                        format!("# {} is resolved to non-valid IP", domain)
                    }
                }
            })
            .collect();
        Ok(rendered)
    }

    fn route_line(&self, network: Ipv4Network, comment: &str) -> String {
        format!(
            "push \"route {} {} {}\" # {}",
            network.network(),
            network.mask(),
            self.gateway,
            comment
        )
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on `\n`, `\r\n` and a lone `\r`
fn split_lines(content: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = content;
    while let Some(pos) = rest.find(['\r', '\n']) {
        lines.push(&rest[..pos]);
        let width = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + width..];
    }
    if !rest.is_empty() {
        lines.push(rest);
    }
    lines
}

/// Regenerate `output` from the routes list at `input`
///
/// The output file is truncated, so a run never appends to a previous one.
pub fn generate_routes_file<R: Resolve>(
    input: &Path,
    output: &Path,
    program: &str,
    generator: &RouteGenerator<R>,
) -> Result<Summary, GenerateError> {
    let content = fs::read_to_string(input)?;
    let lines = split_lines(&content);
    if lines.is_empty() {
        return Err(GenerateError::EmptyRoutesFile(input.to_path_buf()));
    }

    info!(
        "Generating {} from {} ({} lines)",
        output.display(),
        input.display(),
        lines.len()
    );

    let source = input.to_string_lossy();
    let header = Header {
        source: &source,
        generated_at: chrono::Local::now().naive_local(),
        program,
    };

    let mut writer = BufWriter::new(File::create(output)?);
    let summary = generator.generate(&header, lines, &mut writer)?;
    writer.flush()?;

    info!(
        "Wrote {} routes, {} comment lines, {} resolve errors, {} invalid answers",
        summary.routes, summary.passthrough, summary.resolve_errors, summary.invalid_answers
    );
    Ok(summary)
}
