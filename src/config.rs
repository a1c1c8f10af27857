use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

// Creation caps and the file-count cap only bite when `production` is on;
// quota trimming and retention always run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_message_text_length: usize,
    pub max_message_files_count: usize,
    pub max_chat_messages_per_user: i64,
    pub messages_amount_to_delete_on_limit: i64,
    pub max_chat_title_length: usize,
    pub max_private_chats_per_user: i64,
    pub max_group_chats_per_user: i64,
    pub max_accounts_per_ip: i64,
    pub message_retention_days: i64,
    pub chat_retention_days: i64,
    pub presence_timeout_secs: i64,
    pub quota_throttle_mins: i64,
    pub quota_throttle_ttl_mins: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_text_length: 500,
            max_message_files_count: 5,
            max_chat_messages_per_user: 250,
            messages_amount_to_delete_on_limit: 50,
            max_chat_title_length: 20,
            max_private_chats_per_user: 25,
            max_group_chats_per_user: 25,
            max_accounts_per_ip: 1,
            message_retention_days: 7,
            chat_retention_days: 14,
            presence_timeout_secs: 300,
            quota_throttle_mins: 10,
            quota_throttle_ttl_mins: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen: String,
    pub database_path: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub jwt_secret: Option<String>,
    pub allowed_origins: Vec<String>,
    pub production: bool,
    pub bot_username: String,
    pub gateway_url: String,
    pub gateway_api_key: String,
    pub gateway_token_secret: String,
    pub gateway_token_ttl_secs: i64,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8800".to_string(),
            database_path: "./courier.sqlite3".to_string(),
            // Sized for the request handlers plus the job worker.
            database_max_connections: 16,
            database_acquire_timeout_secs: 10,
            jwt_secret: None,
            allowed_origins: vec!["http://localhost:8080".to_string()],
            production: false,
            bot_username: "bot".to_string(),
            gateway_url: "http://centrifugo:9000/api".to_string(),
            gateway_api_key: "change-me".to_string(),
            gateway_token_secret: "change-me".to_string(),
            gateway_token_ttl_secs: 24 * 3600,
            limits: Limits::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Path::new("config.toml");
        if config_path.exists() {
            let mut file = std::fs::File::open(config_path).expect("failed to open config.toml");
            let mut contents = String::new();
            file.read_to_string(&mut contents)
                .expect("failed to read config.toml");
            toml::from_str(&contents).expect("failed to parse config.toml")
        } else {
            let default_config = Config::default();
            let toml_string = toml::to_string_pretty(&default_config)
                .expect("failed to serialize default config");
            let mut file =
                std::fs::File::create(config_path).expect("failed to create config.toml");
            file.write_all(toml_string.as_bytes())
                .expect("failed to write config.toml");
            default_config
        }
    }

    pub fn from_env_config() -> Self {
        let mut final_cfg = Self::load();

        if final_cfg.jwt_secret.is_none() {
            final_cfg.jwt_secret = Some(uuid::Uuid::new_v4().to_string());
        }
        final_cfg
    }

    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret
            .as_ref()
            .expect("jwt_secret must be set")
            .as_bytes()
    }
}
