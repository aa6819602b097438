use anyhow::Context;
use clap::Parser;
use mongomon_collector::catalog::DEFAULT_KEY_PREFIX;
use mongomon_collector::source::ConnectionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Command-line flags. Anything given here overrides the config file.
#[derive(Debug, Default, Parser)]
#[command(name = "mongomon-agent", version, about = "Print MongoDB serverStatus metrics")]
pub struct Cli {
    /// Optional TOML file with the same settings as the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Hostname
    #[arg(long)]
    pub host: Option<String>,

    /// Port
    #[arg(long)]
    pub port: Option<String>,

    /// Username
    #[arg(long)]
    pub username: Option<String>,

    /// Password
    #[arg(long, env = "MONGODB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// authenticationDatabase
    #[arg(long)]
    pub source: Option<String>,

    /// Verbose mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Temp file name
    #[arg(long)]
    pub tempfile: Option<PathBuf>,

    /// Metric key prefix
    #[arg(long)]
    pub metric_key_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Authentication database
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub verbose: bool,
    /// Where previous samples are kept for counter differencing
    pub tempfile: Option<PathBuf>,
    #[serde(default = "default_metric_key_prefix")]
    pub metric_key_prefix: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> String {
    "27017".to_string()
}

fn default_metric_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            source: String::new(),
            verbose: false,
            tempfile: None,
            metric_key_prefix: default_metric_key_prefix(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Config file (if any) with command-line flags applied on top.
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(cli);
        Ok(config)
    }

    fn apply(&mut self, cli: Cli) {
        if let Some(host) = cli.host {
            self.host = host;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(username) = cli.username {
            self.username = username;
        }
        if let Some(password) = cli.password {
            self.password = password;
        }
        if let Some(source) = cli.source {
            self.source = source;
        }
        if let Some(tempfile) = cli.tempfile {
            self.tempfile = Some(tempfile);
        }
        if let Some(prefix) = cli.metric_key_prefix.filter(|p| !p.is_empty()) {
            self.metric_key_prefix = prefix;
        }
        self.verbose |= cli.verbose;
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone(),
            port: self.port.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            auth_source: self.source.clone(),
            verbose: self.verbose,
        }
    }

    /// State file path: the configured tempfile, or one per endpoint under
    /// `MACKEREL_PLUGIN_WORKDIR` (falling back to the system temp dir).
    pub fn state_path(&self) -> PathBuf {
        if let Some(path) = &self.tempfile {
            return path.clone();
        }
        let dir = std::env::var_os("MACKEREL_PLUGIN_WORKDIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        dir.join(format!("mackerel-plugin-mongodb-{}-{}", self.host, self.port))
    }
}
