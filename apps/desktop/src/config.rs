use std::{collections::HashMap, fs};

#[derive(Debug, Default)]
pub struct Settings {
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
}

/// Layers settings: `client.toml` in the working directory, then `APP__*`
/// environment variables on top. CLI flags override both in `main`.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_values(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = Some(v);
    }
    if let Ok(v) = std::env::var("APP__TOKEN") {
        settings.token = Some(v);
    }
    if let Ok(v) = std::env::var("APP__USER_ID") {
        settings.user_id = Some(v);
    }
    if let Ok(v) = std::env::var("APP__USERNAME") {
        settings.username = Some(v);
    }

    settings
}

fn apply_file_values(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("token") {
        settings.token = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("user_id") {
        settings.user_id = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("username") {
        settings.username = Some(v.clone());
    }
}
