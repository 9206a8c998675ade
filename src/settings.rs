use serde::{Deserialize, Serialize};

/// Background shown when the user has not picked one.
pub const DEFAULT_BACKGROUND_IMAGE: &str = "https://images.unsplash.com/photo-1534528741775-53994a69daeb?q=80&w=1000&auto=format&fit=crop";
pub const DEFAULT_BACKGROUND_OPACITY: f32 = 0.12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelChoice {
    #[default]
    #[serde(rename = "gemini-3-flash-preview")]
    Flash,
    #[serde(rename = "gemini-3-pro-preview")]
    Pro,
}

impl ModelChoice {
    pub fn wire_id(self) -> &'static str {
        match self {
            ModelChoice::Flash => "gemini-3-flash-preview",
            ModelChoice::Pro => "gemini-3-pro-preview",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "flash" | "gemini-3-flash-preview" => Some(ModelChoice::Flash),
            "pro" | "gemini-3-pro-preview" => Some(ModelChoice::Pro),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelChoice::Flash => "flash",
            ModelChoice::Pro => "pro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub model: ModelChoice,
    pub use_search: bool,
    pub use_maps: bool,
    pub voice_language: String,
    pub background_image: Option<String>,
    pub background_opacity: f32,
    #[serde(alias = "isDarkMode")]
    pub dark_mode: bool,
    pub user_avatar: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model: ModelChoice::default(),
            use_search: true,
            use_maps: false,
            voice_language: "en-US".to_string(),
            background_image: Some(DEFAULT_BACKGROUND_IMAGE.to_string()),
            background_opacity: DEFAULT_BACKGROUND_OPACITY,
            dark_mode: false,
            user_avatar: None,
        }
    }
}

impl AppSettings {
    /// Restores the bundled background when the stored record has none or
    /// still points at a stock-photo URL from an older release.
    pub fn normalized(mut self) -> Self {
        let stale = self
            .background_image
            .as_deref()
            .map_or(true, |image| image.trim().is_empty() || image.contains("unsplash"));
        if stale {
            self.background_image = Some(DEFAULT_BACKGROUND_IMAGE.to_string());
        }
        self.background_opacity = self.background_opacity.clamp(0.0, 1.0);
        self
    }
}
