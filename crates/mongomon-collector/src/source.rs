//! One `serverStatus` round trip per collection cycle.
//!
//! A cycle walks `Idle -> Connecting -> Authenticated -> Querying ->
//! Disconnecting -> Done | Failed`. Every cycle opens its own connection and
//! closes it before returning, whatever the outcome.

use crate::document::StatusDocument;
use crate::error::{Result, SourceError};
use crate::mongo::MongoConnector;
use crate::sink::DiagnosticSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Upper bound on connect plus command for one cycle.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Authentication database; empty means the driver default.
    #[serde(default)]
    pub auth_source: String,
    /// Dump the raw status document to the diagnostics sink.
    #[serde(default)]
    pub verbose: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> String {
    "27017".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            auth_source: String::new(),
            verbose: false,
        }
    }
}

impl ConnectionConfig {
    /// `host:port`, with IPv6 literals bracketed.
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Connection string for a direct connection to this endpoint.
    pub fn uri(&self) -> String {
        format!("mongodb://{}/?directConnection=true", self.endpoint())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_source", &self.auth_source)
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// Progress of a single collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Connecting,
    Authenticated,
    Querying,
    Disconnecting,
    Done,
    Failed,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Connecting => "connecting",
            CyclePhase::Authenticated => "authenticated",
            CyclePhase::Querying => "querying",
            CyclePhase::Disconnecting => "disconnecting",
            CyclePhase::Done => "done",
            CyclePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Opens connections to a status endpoint.
#[async_trait]
pub trait StatusConnector: Send + Sync {
    type Connection: StatusConnection;

    /// Establish and authenticate a connection.
    ///
    /// Implementations must not leave anything open when they return an error.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection>;
}

/// A live connection able to run the status command once.
#[async_trait]
pub trait StatusConnection: Send + Sized {
    async fn server_status(&mut self) -> Result<StatusDocument>;

    /// Release the connection.
    async fn close(self) -> Result<()>;
}

/// Fetches one status document per call.
pub struct StatusSource<C: StatusConnector = MongoConnector> {
    connector: C,
    config: ConnectionConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl<C: StatusConnector> StatusSource<C> {
    pub fn new(connector: C, config: ConnectionConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            connector,
            config,
            sink,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Run one cycle: connect, query `serverStatus`, disconnect.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Timeout`] if connect plus command exceed
    /// [`FETCH_TIMEOUT`], otherwise whatever the connector reported. No retries.
    pub async fn fetch(&self) -> Result<StatusDocument> {
        let endpoint = self.config.endpoint();
        let deadline = Instant::now() + FETCH_TIMEOUT;
        let mut phase = CyclePhase::Idle;

        advance(&endpoint, &mut phase, CyclePhase::Connecting);
        let mut connection = match timeout_at(deadline, self.connector.connect(&self.config)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                advance(&endpoint, &mut phase, CyclePhase::Failed);
                return Err(e);
            }
            Err(_) => {
                let err = timed_out(phase);
                advance(&endpoint, &mut phase, CyclePhase::Failed);
                return Err(err);
            }
        };
        advance(&endpoint, &mut phase, CyclePhase::Authenticated);

        advance(&endpoint, &mut phase, CyclePhase::Querying);
        let outcome = match timeout_at(deadline, connection.server_status()).await {
            Ok(result) => result,
            Err(_) => Err(timed_out(phase)),
        };

        advance(&endpoint, &mut phase, CyclePhase::Disconnecting);
        if let Err(e) = connection.close().await {
            tracing::warn!(endpoint = %endpoint, error = %e, "Failed to close MongoDB connection");
        }

        match outcome {
            Ok(document) => {
                if self.config.verbose {
                    self.dump(&document);
                }
                advance(&endpoint, &mut phase, CyclePhase::Done);
                Ok(document)
            }
            Err(e) => {
                advance(&endpoint, &mut phase, CyclePhase::Failed);
                Err(e)
            }
        }
    }

    fn dump(&self, document: &StatusDocument) {
        match document.to_pretty_json() {
            Ok(rendered) => self.sink.raw_status(&rendered),
            Err(e) => tracing::warn!(error = %e, "Failed to render serverStatus as JSON"),
        }
    }
}

fn timed_out(phase: CyclePhase) -> SourceError {
    SourceError::Timeout {
        limit: FETCH_TIMEOUT,
        phase,
    }
}

fn advance(endpoint: &str, phase: &mut CyclePhase, next: CyclePhase) {
    tracing::debug!(endpoint, from = %phase, to = %next, "serverStatus cycle");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{Diagnostic, MemorySink};
    use mongodb::bson::doc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behaviour {
        Reply,
        Reject,
        Hang,
        Unreachable,
    }

    struct FakeConnector {
        behaviour: Behaviour,
        open: Arc<AtomicUsize>,
        opened: Arc<AtomicUsize>,
    }

    struct FakeConnection {
        behaviour: Behaviour,
        open: Arc<AtomicUsize>,
    }

    impl FakeConnector {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                open: Arc::new(AtomicUsize::new(0)),
                opened: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl StatusConnector for FakeConnector {
        type Connection = FakeConnection;

        async fn connect(&self, _config: &ConnectionConfig) -> Result<FakeConnection> {
            if let Behaviour::Unreachable = self.behaviour {
                return Err(SourceError::ConnectionFailed("connection refused".into()));
            }
            self.open.fetch_add(1, Ordering::SeqCst);
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConnection {
                behaviour: self.behaviour,
                open: self.open.clone(),
            })
        }
    }

    #[async_trait]
    impl StatusConnection for FakeConnection {
        async fn server_status(&mut self) -> Result<StatusDocument> {
            match self.behaviour {
                Behaviour::Reply => Ok(StatusDocument::from(
                    doc! { "connections": { "current": 7 } },
                )),
                Behaviour::Reject => Err(SourceError::CommandFailed("not authorized on admin".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(StatusDocument::new())
                }
                Behaviour::Unreachable => unreachable!("never connected"),
            }
        }

        async fn close(self) -> Result<()> {
            self.open.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn source(behaviour: Behaviour, verbose: bool) -> (StatusSource<FakeConnector>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let config = ConnectionConfig {
            verbose,
            ..ConnectionConfig::default()
        };
        (
            StatusSource::new(FakeConnector::new(behaviour), config, sink.clone()),
            sink,
        )
    }

    #[tokio::test]
    async fn successful_fetch_closes_connection() {
        let (source, sink) = source(Behaviour::Reply, false);
        let document = source.fetch().await.unwrap();

        assert!(document.get("connections").is_some());
        assert_eq!(source.connector.opened.load(Ordering::SeqCst), 1);
        assert_eq!(source.connector.open.load(Ordering::SeqCst), 0);
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn each_fetch_opens_a_fresh_connection() {
        let (source, _) = source(Behaviour::Reply, false);
        source.fetch().await.unwrap();
        source.fetch().await.unwrap();

        assert_eq!(source.connector.opened.load(Ordering::SeqCst), 2);
        assert_eq!(source.connector.open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn command_failure_still_closes_connection() {
        let (source, _) = source(Behaviour::Reject, false);
        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::CommandFailed(_)));
        assert_eq!(source.connector.open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_failure() {
        let (source, _) = source(Behaviour::Unreachable, false);
        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::ConnectionFailed(_)));
        assert_eq!(source.connector.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_command_times_out_and_closes_connection() {
        let (source, _) = source(Behaviour::Hang, false);
        let err = source.fetch().await.unwrap_err();

        match err {
            SourceError::Timeout { limit, phase } => {
                assert_eq!(limit, FETCH_TIMEOUT);
                assert_eq!(phase, CyclePhase::Querying);
            }
            other => panic!("expected timeout, got {other}"),
        }
        assert_eq!(source.connector.open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn verbose_dumps_raw_document_without_changing_it() {
        let (quiet, _) = source(Behaviour::Reply, false);
        let (loud, sink) = source(Behaviour::Reply, true);

        let expected = quiet.fetch().await.unwrap();
        let document = loud.fetch().await.unwrap();
        assert_eq!(document, expected);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        let Diagnostic::RawStatus(rendered) = &entries[0] else {
            panic!("expected raw status dump");
        };
        let json: serde_json::Value = serde_json::from_str(rendered).unwrap();
        assert_eq!(json["connections"]["current"], 7);
    }

    #[test]
    fn endpoint_brackets_ipv6_hosts() {
        let config = ConnectionConfig::default();
        assert_eq!(config.endpoint(), "localhost:27017");
        assert_eq!(config.uri(), "mongodb://localhost:27017/?directConnection=true");

        let config = ConnectionConfig {
            host: "::1".into(),
            port: "27018".into(),
            ..ConnectionConfig::default()
        };
        assert_eq!(config.endpoint(), "[::1]:27018");
    }

    #[test]
    fn debug_output_redacts_password() {
        let config = ConnectionConfig {
            password: "hunter2".into(),
            ..ConnectionConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ConnectionConfig =
            serde_json::from_value(serde_json::json!({ "username": "monitor" })).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, "27017");
        assert_eq!(config.username, "monitor");
        assert!(!config.verbose);
    }
}
