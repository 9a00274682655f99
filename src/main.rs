//! deribit-terminal: interactive client for the Deribit JSON-RPC WebSocket API.
//!
//! Reads one command per line from stdin. `help` lists the commands.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use deribit_terminal::endpoint::NORMAL_CLOSURE;
use deribit_terminal::protocol::{DEFAULT_SESSION_NAME, pretty};
use deribit_terminal::{
    Command, ConnectionId, Credential, Endpoint, KeyCancel, RpcResponse, StreamViewer,
    SubscriptionSet,
};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_URL: &str = "wss://test.deribit.com/ws/api/v2";

/// How long exit waits for close handshakes.
const EXIT_CLOSE_WAIT: Duration = Duration::from_secs(1);

const STREAM_CANCEL_KEY: char = 'q';

const HELP: &str = "\
Connections:
  connect [uri]                         open a connection (default --url)
  use <id>                              select the active connection
  list                                  list every connection
  show [id]                             connection details and message log
  close [id]                            close a connection

Exchange (sent on the active connection):
  auth [client_id secret] [-s]          authenticate, -s for session scope
  buy|sell <instrument> <label> [amount] [price]
  cancel <order_id>
  modify <order_id> <amount> <price>
  orders [instrument|currency]
  positions [currency]
  book <instrument> [depth]
  subscribe <index>                     e.g. btc_usd
  unsubscribe <index>

Streaming:
  subs                                  list subscriptions
  stream                                live prices, press q to stop

  help                                  this text
  quit                                  close everything and exit";

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "deribit-terminal")]
#[command(about = "Interactive client for the Deribit JSON-RPC WebSocket API")]
struct Cli {
    /// Default WebSocket endpoint for `connect`
    #[arg(long, env = "DERIBIT_URL", default_value = DEFAULT_URL)]
    url: String,

    /// API client id used by a bare `auth`
    #[arg(long, env = "DERIBIT_CLIENT_ID")]
    client_id: Option<String>,

    /// API client secret used by a bare `auth`
    #[arg(long, env = "DERIBIT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Handshake timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    connect_timeout_ms: u64,

    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = 5_000)]
    reply_timeout_ms: u64,

    /// Stream polling interval in milliseconds
    #[arg(long, default_value_t = 300)]
    stream_interval_ms: u64,

    /// Connect to --url on start
    #[arg(long)]
    connect: bool,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug)]
enum Flow {
    Continue,
    Quit,
}

/// Operator state between commands.
struct Session<W: Write> {
    endpoint: Endpoint,
    default_uri: String,
    credential: Option<Credential>,
    active: Option<ConnectionId>,
    subscriptions: SubscriptionSet,
    out: W,
}

impl<W: Write> Session<W> {
    fn new(endpoint: Endpoint, cli: &Cli, out: W) -> Self {
        let credential = match (&cli.client_id, &cli.client_secret) {
            (Some(id), Some(secret)) => Some(Credential::new(id, secret)),
            _ => None,
        };

        Self {
            endpoint,
            default_uri: cli.url.clone(),
            credential,
            active: None,
            subscriptions: SubscriptionSet::new(),
            out,
        }
    }

    fn run(&mut self, input: impl BufRead) -> anyhow::Result<()> {
        writeln!(self.out, "Deribit terminal. Type 'help' for commands.")?;
        self.prompt()?;

        for line in input.lines() {
            let line = line.context("reading stdin")?;
            match self.handle(line.trim()) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => writeln!(self.out, "> Error: {e:#}")?,
            }
            self.prompt()?;
        }

        self.shutdown()
    }

    fn prompt(&mut self) -> io::Result<()> {
        match self.active {
            Some(id) => write!(self.out, "deribit[{id}]> ")?,
            None => write!(self.out, "deribit> ")?,
        }
        self.out.flush()
    }

    fn handle(&mut self, line: &str) -> anyhow::Result<Flow> {
        let (verb, rest) = split_verb(line);

        match verb {
            "" => {}
            "help" => writeln!(self.out, "{HELP}")?,
            "quit" | "exit" => return Ok(Flow::Quit),
            "connect" => self.connect(rest)?,
            "use" => self.use_connection(rest)?,
            "list" => self.list()?,
            "show" => self.show(rest)?,
            "close" => self.close(rest)?,
            "auth" => self.auth(rest)?,
            "subs" => self.list_subscriptions()?,
            "stream" => self.stream()?,
            _ => match Command::parse(line)? {
                Some(command) => self.execute(&command)?,
                None => writeln!(self.out, "> Unknown command '{verb}', try 'help'")?,
            },
        }

        Ok(Flow::Continue)
    }

    fn connect(&mut self, rest: &str) -> anyhow::Result<()> {
        let uri = if rest.is_empty() {
            self.default_uri.clone()
        } else {
            rest.to_string()
        };

        writeln!(self.out, "> Connecting to {uri} ...")?;
        let id = self.endpoint.connect(&uri)?;
        self.active = Some(id);
        writeln!(self.out, "> Connection {id} open")?;
        Ok(())
    }

    fn use_connection(&mut self, rest: &str) -> anyhow::Result<()> {
        let id: ConnectionId = rest
            .parse()
            .with_context(|| format!("'{rest}' is not a connection id"))?;
        let metadata = self.endpoint.metadata(id)?;

        self.active = Some(id);
        writeln!(self.out, "> Using connection {id} ({})", metadata.status)?;
        Ok(())
    }

    fn list(&mut self) -> anyhow::Result<()> {
        let ids = self.endpoint.connection_ids();
        if ids.is_empty() {
            writeln!(self.out, "> No connections")?;
        }
        for id in ids {
            let metadata = self.endpoint.metadata(id)?;
            let marker = if self.active == Some(id) { "*" } else { " " };
            writeln!(
                self.out,
                "{marker} {:>3}  {:<10} {}",
                id.as_u32(),
                metadata.status.as_str(),
                metadata.uri
            )?;
        }
        Ok(())
    }

    fn show(&mut self, rest: &str) -> anyhow::Result<()> {
        let id = self.target(rest)?;
        let metadata = self.endpoint.metadata(id)?;
        write!(self.out, "{metadata}")?;
        Ok(())
    }

    fn close(&mut self, rest: &str) -> anyhow::Result<()> {
        let id = self.target(rest)?;
        // Surfaces UnknownConnection; close itself ignores unknown ids.
        self.endpoint.metadata(id)?;
        self.endpoint.close(id, NORMAL_CLOSURE, "closed by operator");
        writeln!(self.out, "> Close requested for connection {id}")?;
        Ok(())
    }

    fn auth(&mut self, rest: &str) -> anyhow::Result<()> {
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match args.as_slice() {
            [] | ["-s"] => {
                let Some(credential) = self.credential.clone() else {
                    bail!(
                        "no credentials, use 'auth <client_id> <secret>' \
                         or set DERIBIT_CLIENT_ID/DERIBIT_CLIENT_SECRET"
                    );
                };
                Command::Auth {
                    credential,
                    session: (!args.is_empty()).then(|| DEFAULT_SESSION_NAME.to_string()),
                }
            }
            _ => Command::parse(&format!("auth {rest}"))?
                .context("auth command did not parse")?,
        };

        if let Command::Auth { credential, .. } = &command {
            self.credential = Some(credential.clone());
        }
        self.execute(&command)
    }

    fn execute(&mut self, command: &Command) -> anyhow::Result<()> {
        let id = self.target("")?;
        let request = command.to_request();
        debug!(
            id = %id,
            method = command.method(),
            request_id = %request.id,
            "Executing command"
        );

        let reply = self.endpoint.request(id, &request.to_json()?)?;
        writeln!(self.out, "{}", pretty(&reply))?;

        let succeeded = RpcResponse::parse(&reply)
            .is_ok_and(|response| response.is_reply_to(request.id) && response.is_success());
        if succeeded {
            self.subscriptions.apply(command, id);
        }
        Ok(())
    }

    fn list_subscriptions(&mut self) -> anyhow::Result<()> {
        if self.subscriptions.is_empty() {
            writeln!(self.out, "> No active subscriptions")?;
            return Ok(());
        }

        writeln!(self.out, "> Current Subscriptions:")?;
        for (index, id) in self.subscriptions.indices() {
            writeln!(self.out, " - {index} (connection {id})")?;
        }
        Ok(())
    }

    fn stream(&mut self) -> anyhow::Result<()> {
        if self.subscriptions.is_empty() {
            bail!("no subscriptions to stream");
        }

        writeln!(
            self.out,
            "> Streaming {} channel(s), press '{STREAM_CANCEL_KEY}' to stop",
            self.subscriptions.len()
        )?;
        self.out.flush()?;

        let stats = {
            let mut cancel = KeyCancel::enable(STREAM_CANCEL_KEY)?;
            StreamViewer::new(&self.endpoint, &self.subscriptions).run(&mut cancel, &mut self.out)?
        };

        writeln!(
            self.out,
            "> Stream stopped: {} update(s) in {} poll(s)",
            stats.rendered, stats.iterations
        )?;
        Ok(())
    }

    /// Parses an explicit id or falls back to the active connection.
    fn target(&self, rest: &str) -> anyhow::Result<ConnectionId> {
        if rest.is_empty() {
            return self
                .active
                .context("no active connection, use 'connect' or 'use <id>'");
        }
        rest.parse()
            .with_context(|| format!("'{rest}' is not a connection id"))
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.endpoint.close_all("terminal exiting");

        let deadline = Instant::now() + EXIT_CLOSE_WAIT;
        while Instant::now() < deadline && !self.all_terminal() {
            thread::sleep(Duration::from_millis(20));
        }

        info!(connections = self.endpoint.connection_count(), "Terminal exiting");
        writeln!(self.out, "> Bye")?;
        Ok(())
    }

    fn all_terminal(&self) -> bool {
        self.endpoint.connection_ids().into_iter().all(|id| {
            self.endpoint
                .metadata(id)
                .map(|metadata| metadata.status.is_terminal())
                .unwrap_or(true)
        })
    }
}

/// Splits off the first word.
fn split_verb(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    }
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let endpoint = Endpoint::builder()
        .connect_timeout(Duration::from_millis(cli.connect_timeout_ms))
        .reply_timeout(Duration::from_millis(cli.reply_timeout_ms))
        .stream_interval(Duration::from_millis(cli.stream_interval_ms))
        .build()
        .context("invalid options")?;

    let stdout = io::stdout();
    let mut session = Session::new(endpoint, &cli, stdout.lock());

    if cli.connect
        && let Err(e) = session.connect("")
    {
        writeln!(session.out, "> Error: {e:#}")?;
    }

    session.run(io::stdin().lock())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session<Vec<u8>> {
        let cli = Cli::parse_from([
            "deribit-terminal",
            "--client-id",
            "id",
            "--client-secret",
            "s",
        ]);
        let endpoint = Endpoint::builder().build().expect("build");
        Session::new(endpoint, &cli, Vec::new())
    }

    fn output(session: &Session<Vec<u8>>) -> String {
        String::from_utf8_lossy(&session.out).into_owned()
    }

    #[test]
    fn test_split_verb() {
        assert_eq!(split_verb("connect  wss://x "), ("connect", "wss://x"));
        assert_eq!(split_verb("list"), ("list", ""));
        assert_eq!(split_verb(""), ("", ""));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["deribit-terminal", "--url", DEFAULT_URL]);
        assert_eq!(cli.url, DEFAULT_URL);
        assert_eq!(cli.connect_timeout_ms, 10_000);
        assert!(!cli.connect);
    }

    #[test]
    fn test_credentials_from_cli() {
        let session = session();
        assert_eq!(session.credential.as_ref().map(Credential::client_id), Some("id"));
    }

    #[test]
    fn test_unknown_command() {
        let mut session = session();
        assert!(matches!(session.handle("frobnicate"), Ok(Flow::Continue)));
        assert!(output(&session).contains("Unknown command 'frobnicate'"));
    }

    #[test]
    fn test_exchange_command_needs_active_connection() {
        let mut session = session();
        let err = session.handle("orders").unwrap_err();
        assert!(err.to_string().contains("no active connection"));
    }

    #[test]
    fn test_bad_arguments_reported() {
        let mut session = session();
        assert!(session.handle("buy BTC-PERPETUAL").is_err());
        assert!(session.handle("use abc").is_err());
        assert!(session.handle("show 3").is_err());
    }

    #[test]
    fn test_quit_and_empty_subscriptions() {
        let mut session = session();
        assert!(matches!(session.handle("quit"), Ok(Flow::Quit)));
        session.handle("subs").unwrap();
        assert!(output(&session).contains("No active subscriptions"));
        assert!(session.handle("stream").is_err());
    }

    #[test]
    fn test_subscriptions_listed_by_index_name() {
        let mut session = session();
        session
            .subscriptions
            .insert("deribit_price_index.btc_usd", ConnectionId::new(1));
        session.handle("subs").unwrap();

        let out = output(&session);
        assert!(out.contains("> Current Subscriptions:"));
        assert!(out.contains(" - btc_usd (connection 1)"));
    }

    #[test]
    fn test_list_without_connections() {
        let mut session = session();
        session.handle("list").unwrap();
        assert!(output(&session).contains("No connections"));
    }
}
