use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vpn_route_gen::config::LOCAL_CONFIG_FILE;
use vpn_route_gen::{generate_routes_file, Config, GenerateError, LazyResolver, RouteGenerator};

#[derive(Parser)]
#[command(name = "vpn-route-gen")]
#[command(about = "Generate OpenVPN push-route directives from domain and CIDR lists")]
#[command(version)]
struct Cli {
    /// File with one domain name, IPv4 address or CIDR block per line
    routes_file: Option<PathBuf>,

    /// Generated route file
    #[arg(default_value = "DEFAULT")]
    output_file: PathBuf,

    /// Config file (default: ./vpn-route-gen.toml, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// DNS servers to query instead of the system resolver
    #[arg(long, value_delimiter = ',')]
    dns: Vec<IpAddr>,

    /// Gateway token written into each route
    #[arg(long)]
    gateway: Option<String>,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// How a run ended when no error was raised
#[derive(Debug, PartialEq, Eq)]
enum Status {
    Done,
    MissingRoutesFile,
    EmptyRoutesFile,
}

impl Status {
    fn exit_code(&self) -> i32 {
        match self {
            Status::Done => 0,
            Status::MissingRoutesFile | Status::EmptyRoutesFile => 1,
        }
    }

    fn message(&self) -> Option<&'static str> {
        match self {
            Status::Done => None,
            Status::MissingRoutesFile => {
                Some("Please provide a domain names file as a command-line argument.")
            }
            Status::EmptyRoutesFile => Some("The routes file is empty."),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let program = std::env::args_os()
        .next()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vpn-route-gen".to_string());

    let status = run(cli, &program)?;
    if let Some(message) = status.message() {
        println!("{}", message);
    }
    if status != Status::Done {
        std::process::exit(status.exit_code());
    }
    Ok(())
}

fn run(cli: Cli, program: &str) -> Result<Status, Box<dyn std::error::Error>> {
    if cli.init_config {
        info!("Generating default config...");
        let path = PathBuf::from(LOCAL_CONFIG_FILE);
        Config::default().save(&path)?;
        println!("Created default config: {}", LOCAL_CONFIG_FILE);
        return Ok(Status::Done);
    }

    let Some(routes_file) = cli.routes_file else {
        return Ok(Status::MissingRoutesFile);
    };

    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(gateway) = cli.gateway {
        config.route.gateway = gateway;
    }
    if !cli.dns.is_empty() {
        config.dns.servers = cli.dns;
    }
    config.validate()?;

    let resolver = LazyResolver::new(config.dns.clone());
    let generator = RouteGenerator::new(resolver, &config.route);

    match generate_routes_file(&routes_file, &cli.output_file, program, &generator) {
        Ok(_) => Ok(Status::Done),
        Err(GenerateError::EmptyRoutesFile(_)) => Ok(Status::EmptyRoutesFile),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    /// Parse a command line whose routes and config live in `dir`
    fn cli_in(dir: &TempDir, routes: &str, output: &str) -> Cli {
        let config = dir.path().join("config.toml");
        Config::default().save(&config).unwrap();
        Cli::try_parse_from([
            "vpn-route-gen".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            dir.path().join(routes).display().to_string(),
            dir.path().join(output).display().to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_defaults_to_literal_default() {
        let cli = Cli::try_parse_from(["vpn-route-gen", "routes.txt"]).unwrap();
        assert_eq!(cli.routes_file, Some(PathBuf::from("routes.txt")));
        assert_eq!(cli.output_file, PathBuf::from("DEFAULT"));
    }

    #[test]
    fn test_routes_file_is_optional() {
        let cli = Cli::try_parse_from(["vpn-route-gen"]).unwrap();
        assert!(cli.routes_file.is_none());
    }

    #[test]
    fn test_dns_list() {
        let cli = Cli::try_parse_from([
            "vpn-route-gen",
            "--dns",
            "1.1.1.1,8.8.8.8",
            "routes.txt",
            "out.conf",
        ])
        .unwrap();
        assert_eq!(cli.dns.len(), 2);
        assert_eq!(cli.output_file, PathBuf::from("out.conf"));
    }

    #[test]
    fn test_missing_routes_file_argument_exits_1() {
        let cli = Cli::try_parse_from(["vpn-route-gen"]).unwrap();
        let status = run(cli, "vpn-route-gen").unwrap();

        assert_eq!(status, Status::MissingRoutesFile);
        assert_eq!(status.exit_code(), 1);
        assert_eq!(
            status.message(),
            Some("Please provide a domain names file as a command-line argument.")
        );
    }

    #[test]
    fn test_empty_routes_file_exits_1() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("routes.txt"), "").unwrap();

        let status = run(cli_in(&temp_dir, "routes.txt", "out.conf"), "vpn-route-gen").unwrap();

        assert_eq!(status, Status::EmptyRoutesFile);
        assert_eq!(status.exit_code(), 1);
        assert_eq!(status.message(), Some("The routes file is empty."));
        assert!(!temp_dir.path().join("out.conf").exists());
    }

    #[test]
    fn test_literal_routes_need_no_dns() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("routes.txt"), "10.0.0.0/24\n").unwrap();

        let status = run(cli_in(&temp_dir, "routes.txt", "out.conf"), "vpn-route-gen").unwrap();

        assert_eq!(status, Status::Done);
        assert_eq!(status.exit_code(), 0);
        assert!(status.message().is_none());
        let content = std::fs::read_to_string(temp_dir.path().join("out.conf")).unwrap();
        assert!(content.ends_with(
            " by vpn-route-gen\npush \"route 10.0.0.0 255.255.255.0 vpn_gateway\" # 10.0.0.0/24\n"
        ));
    }
}
