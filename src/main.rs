//! ttlmap - A Concurrent Time-Expiring Key-Value Store
//!
//! Interactive shell over an `ExpiringCache<Bytes, Bytes>`. Reads one
//! command per line from stdin and logs every expiration as it happens.

use bytes::Bytes;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use ttlmap::commands::{ByteCache, CommandHandler};
use ttlmap::{CacheConfig, ExpiringCache, TimeUnit};

/// Shell configuration
struct Config {
    /// Cache settings
    cache: CacheConfig,
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut cache = CacheConfig::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--ttl" | "-t" => {
                    cache.default_duration = parse_value(&args, i, "--ttl");
                    i += 2;
                }
                "--unit" | "-u" => {
                    cache.default_unit = parse_value::<TimeUnit>(&args, i, "--unit");
                    i += 2;
                }
                "--interval-ms" => {
                    cache.sweep_interval =
                        Duration::from_millis(parse_value(&args, i, "--interval-ms"));
                    i += 2;
                }
                "--reap-ms" => {
                    cache.reap_after =
                        Some(Duration::from_millis(parse_value(&args, i, "--reap-ms")));
                    i += 2;
                }
                "--shards" => {
                    cache.shards = parse_value(&args, i, "--shards");
                    i += 2;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("ttlmap version {}", ttlmap::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self { cache }
    }
}

/// Parses the value following the flag at `i`, exiting on failure.
fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    };
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {}: {}", flag, raw);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
ttlmap - A Concurrent Time-Expiring Key-Value Store

USAGE:
    ttlmap [OPTIONS]

OPTIONS:
    -t, --ttl <N>             Default time-to-live amount (default: 30)
    -u, --unit <UNIT>         Unit of --ttl: ns, us, ms, s, m, h, d (default: m)
        --interval-ms <MS>    Sweep interval in milliseconds (default: 1000)
        --reap-ms <MS>        Remove entries expired for longer than this
        --shards <N>          Number of shards (default: 64)
    -v, --version             Print version information
    -h, --help                Print this help message

EXAMPLES:
    ttlmap --ttl 10 --unit s          # Entries live for 10 seconds
    ttlmap --ttl 500 --unit ms --interval-ms 100

SESSION:
    ttlmap> SET name "Ariz" EX 5
    OK
    ttlmap> TTL name
    (integer) 5
    ttlmap> GET name
    "Ariz"

Set RUST_LOG=debug for more detailed logs.
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
ttlmap v{} - Concurrent Time-Expiring Key-Value Store
──────────────────────────────────────────────────────────────
Default TTL: {}{}   Sweep interval: {:?}
Type QUIT or press Ctrl+D to exit.
"#,
        ttlmap::VERSION,
        config.cache.default_duration,
        config.cache.default_unit.suffix(),
        config.cache.sweep_interval,
    );
}

fn prompt() -> std::io::Result<()> {
    print!("ttlmap> ");
    std::io::stdout().flush()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging on stderr so it stays apart from replies
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    let cache: Arc<ByteCache> = Arc::new(ExpiringCache::new(config.cache.clone())?);
    cache.add_listener(|key: &Bytes| {
        info!(key = %String::from_utf8_lossy(key), "Key expired");
    })?;
    info!(
        shards = config.cache.shards,
        "Cache initialized, expiry sweeper started"
    );

    let handler = CommandHandler::new(Arc::clone(&cache));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt()?;

        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("QUIT") || line.eq_ignore_ascii_case("EXIT") {
                    break;
                }
                println!("{}", handler.execute(line));
            }
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                println!();
                info!("Shutdown signal received");
                break;
            }
        }
    }

    cache.shutdown()?;
    info!("Shutdown complete");
    Ok(())
}
