use std::{
	path::{Path, PathBuf},
	sync::OnceLock,
	time::Duration,
};

use serde::Deserialize;

use crate::{
	Model,
	error::{Error, Result},
	staging::DEFAULT_STAGING_DIR,
};

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const MODEL_ENV: &str = "CHAT_WITH_LLM_MODEL";
pub const STAGING_DIR_ENV: &str = "CHAT_WITH_LLM_STAGING_DIR";
pub const TIMEOUT_ENV: &str = "CHAT_WITH_LLM_TIMEOUT_SECS";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
	pub api_key: Option<String>,
	pub model: Model,
	pub staging_dir: PathBuf,
	pub timeout: Duration,
}
impl Default for AppConfig {
	fn default() -> Self {
		Self {
			api_key: None,
			model: Model::default(),
			staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
			timeout: DEFAULT_TIMEOUT,
		}
	}
}

/// Overrides from the command line. Each one beats the environment, which beats the config file.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct SettingsFlags {
	/// TOML file with any of `api_key`, `model`, `staging_dir`, `timeout_secs`
	#[cfg_attr(feature = "cli", arg(long))]
	pub config: Option<PathBuf>,
	#[cfg_attr(feature = "cli", arg(long))]
	pub api_key: Option<String>,
	/// fast | medium | slow
	#[cfg_attr(feature = "cli", arg(short, long))]
	pub model: Option<Model>,
	/// Where the single active upload is kept
	#[cfg_attr(feature = "cli", arg(long))]
	pub staging_dir: Option<PathBuf>,
	/// Give up on the model after this many seconds
	#[cfg_attr(feature = "cli", arg(long))]
	pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
	api_key: Option<String>,
	model: Option<String>,
	staging_dir: Option<PathBuf>,
	timeout_secs: Option<u64>,
}
impl FileConfig {
	fn load(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path).map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
		toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))
	}
}

impl AppConfig {
	pub fn try_build(flags: SettingsFlags) -> Result<Self> {
		Self::try_build_with(flags, |key| std::env::var(key).ok())
	}

	/// Same as [try_build](Self::try_build), reading the environment through `env`.
	pub fn try_build_with(flags: SettingsFlags, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
		let file = match &flags.config {
			Some(path) => FileConfig::load(path)?,
			None => FileConfig::default(),
		};
		let defaults = Self::default();

		let model = match flags.model {
			Some(m) => m,
			None => match env(MODEL_ENV).or(file.model) {
				Some(s) => parse_model(&s)?,
				None => defaults.model,
			},
		};
		let timeout_secs = match flags.timeout_secs {
			Some(t) => Some(t),
			None => match env(TIMEOUT_ENV) {
				Some(s) => Some(s.trim().parse::<u64>().map_err(|e| Error::Config(format!("{TIMEOUT_ENV}={s}: {e}")))?),
				None => file.timeout_secs,
			},
		};
		if timeout_secs == Some(0) {
			return Err(Error::Config("timeout_secs must be at least 1".to_owned()));
		}

		Ok(Self {
			api_key: flags.api_key.or_else(|| env(API_KEY_ENV)).or(file.api_key),
			model,
			staging_dir: flags.staging_dir.or_else(|| env(STAGING_DIR_ENV).map(PathBuf::from)).or(file.staging_dir).unwrap_or(defaults.staging_dir),
			timeout: timeout_secs.map(Duration::from_secs).unwrap_or(defaults.timeout),
		})
	}

	/// The credential, or the fatal startup error.
	pub fn require_api_key(&self) -> Result<&str> {
		self.api_key.as_deref().ok_or_else(|| Error::Config(format!("{API_KEY_ENV} environment variable not set")))
	}
}

fn parse_model(s: &str) -> Result<Model> {
	s.trim().parse::<Model>().map_err(|_| Error::Config(format!("unknown model {s:?}, expected fast, medium or slow")))
}

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Initialize config with CLI flags. Call this once at startup.
/// If not called, `get` will load with default flags.
pub fn init(flags: SettingsFlags) -> Result<()> {
	let config = AppConfig::try_build(flags)?;
	CONFIG.set(config).map_err(|_| Error::Config("Config already initialized".to_owned()))?;
	Ok(())
}

/// Get the initialized config, or load with default flags if not initialized.
pub fn get() -> AppConfig {
	CONFIG.get_or_init(|| AppConfig::try_build(SettingsFlags::default()).unwrap_or_default()).clone()
}
