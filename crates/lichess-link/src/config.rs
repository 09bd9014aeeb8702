//! Bridge configuration from environment variables and command-line flags

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use board_link::SyncConfig;

use crate::error::ConfigError;
use crate::game::SessionConfig;
use crate::orchestrator::OrchestratorConfig;

const LICHESS_URL: &str = "https://lichess.org";
const LICHESS_DEV_URL: &str = "https://lichess.dev";

#[derive(Clone)]
pub struct LinkConfig {
    /// Personal API token with board:play scope
    pub token: String,

    pub base_url: String,

    /// hidraw node of the board
    pub board_device: PathBuf,

    /// Also play correspondence games
    pub play_correspondence: bool,

    /// Verbose logging and the Lichess dev server
    pub debug: bool,

    pub refresh_delay: Duration,
    pub no_move_delay: Duration,
    pub settle_delay: Duration,
    pub poll_delay: Duration,
    pub rate_limit_delay: Duration,
    pub submit_retry_delay: Duration,
}

impl std::fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConfig")
            .field("base_url", &self.base_url)
            .field("board_device", &self.board_device)
            .field("play_correspondence", &self.play_correspondence)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

/// Flags given on the command line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub correspondence: bool,
    pub debug: bool,
    pub tokenfile: Option<PathBuf>,
}

impl CliArgs {
    /// Parse `--correspondence`, `--debug` and `--tokenfile <path>`.
    /// Unknown arguments are ignored.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ConfigError> {
        let mut out = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--correspondence" => out.correspondence = true,
                "--debug" => out.debug = true,
                "--tokenfile" => {
                    let path = args.next().ok_or(ConfigError::MissingArgument("--tokenfile"))?;
                    out.tokenfile = Some(PathBuf::from(path));
                }
                _ => {}
            }
        }
        Ok(out)
    }
}

impl LinkConfig {
    /// Load configuration from the environment, with `args` taking precedence.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let debug = args.debug;

        let token = match env::var("LICHESS_TOKEN").ok().filter(|t| !t.trim().is_empty()) {
            Some(token) => token.trim().to_string(),
            None => read_token(&token_path(args))?,
        };

        let base_url = env::var("LICHESS_BASE_URL").unwrap_or_else(|_| {
            if debug { LICHESS_DEV_URL } else { LICHESS_URL }.to_string()
        });

        let board_device = env::var("BOARD_DEVICE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/dev/hidraw0"));

        let play_correspondence = args.correspondence || env_parse("PLAY_CORRESPONDENCE", false)?;

        Ok(Self {
            token,
            base_url,
            board_device,
            play_correspondence,
            debug,
            refresh_delay: Duration::from_millis(env_parse("REFRESH_DELAY_MS", 10)?),
            no_move_delay: Duration::from_millis(env_parse("NO_MOVE_DELAY_MS", 30)?),
            settle_delay: Duration::from_millis(env_parse("SETTLE_DELAY_MS", 1000)?),
            poll_delay: Duration::from_secs(env_parse("POLL_DELAY_SECS", 10)?),
            rate_limit_delay: Duration::from_secs(env_parse("RATE_LIMIT_DELAY_SECS", 10)?),
            submit_retry_delay: Duration::from_secs(env_parse("SUBMIT_RETRY_DELAY_SECS", 3)?),
        })
    }

    pub fn sync(&self) -> SyncConfig {
        SyncConfig {
            refresh_delay: self.refresh_delay,
            no_move_delay: self.no_move_delay,
            settle_delay: self.settle_delay,
            ..SyncConfig::default()
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            play_correspondence: self.play_correspondence,
            poll_delay: self.poll_delay,
            rate_limit_delay: self.rate_limit_delay,
            session: SessionConfig {
                retry_delay: self.submit_retry_delay,
                ..SessionConfig::default()
            },
            ..OrchestratorConfig::default()
        }
    }
}

/// `--debug` selects the dev token; otherwise `--tokenfile`, then
/// `LICHESS_TOKEN_FILE`, then the default location.
fn token_path(args: &CliArgs) -> PathBuf {
    if args.debug {
        return PathBuf::from("lichess_token/dev_token");
    }
    args.tokenfile
        .clone()
        .or_else(|| env::var("LICHESS_TOKEN_FILE").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("lichess_token/token"))
}

fn read_token(path: &Path) -> Result<String, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Ok(_) => Err(ConfigError::MissingToken(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConfigError::MissingToken(path.to_path_buf()))
        }
        Err(source) => Err(ConfigError::TokenFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Unset means `default`; set but unparseable is an error.
fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_value(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
