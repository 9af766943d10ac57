use crate::error::AppError;
use media_feed::{Identity, SupabaseConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const CONFIG_FILE: &str = "aura.toml";

/// Which collaborators back the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Supabase,
    Local,
}

/// Signed-in user of the local backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl LocalUser {
    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            display_name: self.name.clone(),
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSection {
    /// Defaults to the platform data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub user: Option<LocalUser>,
}

/// Application configuration
///
/// Read from `aura.toml` in the working directory, then from the platform
/// config directory. `SUPABASE_URL` and `SUPABASE_ANON_KEY` (also from a
/// `.env` file) override the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub supabase: Option<SupabaseConfig>,
    #[serde(default)]
    pub local: Option<LocalSection>,
    /// Where the OAuth provider sends the browser back to
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
    #[serde(default)]
    pub session_file: Option<PathBuf>,
}

fn default_redirect_url() -> String {
    "http://localhost:8080/".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            supabase: None,
            local: None,
            redirect_url: default_redirect_url(),
            session_file: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, AppError> {
        if let Err(dotenvy::Error::Io(err)) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {}", err);
        }

        let candidates = [
            Some(PathBuf::from(CONFIG_FILE)),
            dirs::config_dir().map(|dir| dir.join("aura").join(CONFIG_FILE)),
        ];
        let mut config = match candidates.iter().flatten().find(|path| path.exists()) {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        config.apply_env(
            std::env::var("SUPABASE_URL").ok(),
            std::env::var("SUPABASE_ANON_KEY").ok(),
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Invalid configuration: {}", e)))
    }

    fn apply_env(&mut self, url: Option<String>, anon_key: Option<String>) {
        if url.is_none() && anon_key.is_none() {
            return;
        }
        let supabase = self
            .supabase
            .get_or_insert_with(|| SupabaseConfig::new("", ""));
        if let Some(url) = url {
            supabase.url = url;
        }
        if let Some(anon_key) = anon_key {
            supabase.anon_key = anon_key;
        }
    }

    pub fn supabase_config(&self) -> Result<SupabaseConfig, AppError> {
        self.supabase.clone().ok_or_else(|| {
            AppError::Config(
                "Missing Supabase credentials: set SUPABASE_URL and SUPABASE_ANON_KEY".to_string(),
            )
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.local
            .as_ref()
            .and_then(|local| local.data_dir.clone())
            .or_else(|| dirs::data_dir().map(|dir| dir.join("aura")))
            .unwrap_or_else(|| PathBuf::from(".aura"))
    }

    pub fn session_file(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join("session.json"))
    }

    pub fn local_user(&self) -> Option<Identity> {
        self.local
            .as_ref()
            .and_then(|local| local.user.as_ref())
            .map(LocalUser::to_identity)
    }
}
