// Best-effort configuration. Both files are optional and every field
// has a default, so a blank SD card still boots to a working device
// (minus network credentials).

use alloc::string::{String, ToString};

use crate::json::{self, Value};
use crate::storage::{self, Storage};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_path: String,
    pub prompt_prefix: String,
    pub prompt_suffix: String,
    pub sampler: String,
    pub steps: u32,
    pub cfg_scale: f32,
    /// Ask upstream for a larger square image than the panel (e.g. 512)
    /// and let the decoder scale it down.
    pub request_size: Option<u32>,
    pub display_width: u32,
    pub display_height: u32,
    pub timeout_seconds: u32,
    pub reseed_on_category_change: bool,
    pub max_retry_pick_different: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            api_path: "/sdapi/v1/txt2img".to_string(),
            prompt_prefix: String::new(),
            prompt_suffix: String::new(),
            sampler: "Euler".to_string(),
            steps: 20,
            cfg_scale: 7.0,
            request_size: None,
            display_width: 240,
            display_height: 240,
            timeout_seconds: 30,
            reseed_on_category_change: false,
            max_retry_pick_different: 5,
        }
    }
}

impl AppConfig {
    /// Load `CONFIG.JSN`, filling in defaults field by field. Never fails.
    pub fn load(storage: &mut dyn Storage) -> Self {
        let mut cfg = Self::default();
        let Some(doc) = read_doc(storage, storage::CONFIG_FILE) else {
            return cfg;
        };

        set_string(&mut cfg.api_base_url, doc.get("api_base_url"));
        set_string(&mut cfg.api_path, doc.get("api_txt2img_path"));
        if let Some(v) = doc.get("prompt_prefix").and_then(Value::as_str) {
            cfg.prompt_prefix = v.trim().to_string();
        }
        if let Some(v) = doc.get("prompt_suffix").and_then(Value::as_str) {
            cfg.prompt_suffix = v.trim().to_string();
        }

        if let Some(g) = doc.get("generation") {
            set_string(&mut cfg.sampler, g.get("sampler_name"));
            set_u32(&mut cfg.steps, g.get("steps"));
            if let Some(v) = g.get("cfg_scale").and_then(Value::as_f64) {
                cfg.cfg_scale = v as f32;
            }
        }
        if let Some(v) = doc.get("image_request_size").and_then(Value::as_u32) {
            if v > 0 {
                cfg.request_size = Some(v);
            }
        }
        if let Some(d) = doc.get("display") {
            set_dim(&mut cfg.display_width, d.get("width"));
            set_dim(&mut cfg.display_height, d.get("height"));
        }
        if let Some(t) = doc.get("timeouts") {
            set_u32(&mut cfg.timeout_seconds, t.get("api_timeout_seconds"));
        }
        if let Some(v) = doc
            .get("reseed_on_category_change")
            .and_then(Value::as_bool)
        {
            cfg.reseed_on_category_change = v;
        }
        if let Some(s) = doc.get("selection") {
            set_u32(&mut cfg.max_retry_pick_different, s.get("max_retry_pick_different"));
        }
        cfg
    }

    /// Square size to request upstream; falls back to the panel size.
    pub fn request_dims(&self) -> (u32, u32) {
        match self.request_size {
            Some(s) => (s, s),
            None => (self.display_width, self.display_height),
        }
    }
}

/// Credentials, kept out of `CONFIG.JSN` so configs can be shared freely.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Secrets {
    pub wifi_ssid: Option<String>,
    pub wifi_password: Option<String>,
    pub api_user: Option<String>,
    pub api_password: Option<String>,
    pub api_key: Option<String>,
}

impl Secrets {
    pub fn load(storage: &mut dyn Storage) -> Self {
        let mut secrets = Self::default();
        let Some(doc) = read_doc(storage, storage::SECRETS_FILE) else {
            return secrets;
        };

        if let Some(wifi) = doc.get("wifi") {
            secrets.wifi_ssid = string_field(wifi, "ssid");
            secrets.wifi_password = string_field(wifi, "password");
        }
        if let Some(a) = doc.get("automatic1111") {
            secrets.api_user = string_field(a, "user");
            secrets.api_password = string_field(a, "password");
            secrets.api_key = string_field(a, "api_key");
        }
        if secrets.api_key.is_none() {
            secrets.api_key = string_field(&doc, "SERVICE_API_KEY");
        }
        secrets
    }
}

fn read_doc(storage: &mut dyn Storage, name: &str) -> Option<Value> {
    let data = match storage.read(name) {
        Ok(Some(d)) => d,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("{} unreadable: {}", name, e);
            return None;
        }
    };
    match json::parse(&data) {
        Ok(doc) => Some(doc),
        Err(e) => {
            log::warn!("{} is not valid json: {}", name, e);
            None
        }
    }
}

fn string_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn set_string(dst: &mut String, v: Option<&Value>) {
    if let Some(s) = v.and_then(Value::as_str) {
        *dst = s.to_string();
    }
}

fn set_u32(dst: &mut u32, v: Option<&Value>) {
    if let Some(n) = v.and_then(Value::as_u32) {
        *dst = n;
    }
}

// a zero panel dimension would make every frame zero-length; keep the
// default instead
fn set_dim(dst: &mut u32, v: Option<&Value>) {
    if let Some(n) = v.and_then(Value::as_u32) {
        if n > 0 {
            *dst = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    #[test]
    fn missing_file_gives_defaults() {
        let mut s = MemStorage::new();
        let cfg = AppConfig::load(&mut s);
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.request_dims(), (240, 240));
        assert_eq!(Secrets::load(&mut s), Secrets::default());
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let mut s = MemStorage::new();
        s.write(
            storage::CONFIG_FILE,
            br#"{
                "api_base_url": "http://imgsrv:7860",
                "prompt_prefix": "  photo of ",
                "generation": {"steps": 12},
                "image_request_size": 512,
                "timeouts": {"api_timeout_seconds": 10}
            }"#,
        )
        .unwrap();

        let cfg = AppConfig::load(&mut s);
        assert_eq!(cfg.api_base_url, "http://imgsrv:7860");
        assert_eq!(cfg.prompt_prefix, "photo of");
        assert_eq!(cfg.steps, 12);
        assert_eq!(cfg.cfg_scale, 7.0);
        assert_eq!(cfg.sampler, "Euler");
        assert_eq!(cfg.request_dims(), (512, 512));
        assert_eq!(cfg.display_width, 240);
        assert_eq!(cfg.timeout_seconds, 10);
    }

    #[test]
    fn zero_display_dimensions_keep_the_defaults() {
        let mut s = MemStorage::new();
        s.write(
            storage::CONFIG_FILE,
            br#"{"display": {"width": 0, "height": 320}}"#,
        )
        .unwrap();

        let cfg = AppConfig::load(&mut s);
        assert_eq!(cfg.display_width, 240);
        assert_eq!(cfg.display_height, 320);
        assert_eq!(cfg.request_dims(), (240, 320));
    }

    #[test]
    fn corrupt_config_gives_defaults() {
        let mut s = MemStorage::new();
        s.write(storage::CONFIG_FILE, b"{oops").unwrap();
        assert_eq!(AppConfig::load(&mut s), AppConfig::default());
    }

    #[test]
    fn secrets_parse_nested_and_fallback_keys() {
        let mut s = MemStorage::new();
        s.write(
            storage::SECRETS_FILE,
            br#"{
                "wifi": {"ssid": "homenet", "password": "hunter2"},
                "automatic1111": {"user": "pico", "password": "pw"},
                "SERVICE_API_KEY": "abc123"
            }"#,
        )
        .unwrap();

        let sec = Secrets::load(&mut s);
        assert_eq!(sec.wifi_ssid.as_deref(), Some("homenet"));
        assert_eq!(sec.api_user.as_deref(), Some("pico"));
        // nested api_key absent, top-level fallback applies
        assert_eq!(sec.api_key.as_deref(), Some("abc123"));
    }
}
