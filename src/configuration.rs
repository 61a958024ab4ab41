use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub scraper: ScraperSettings,
    #[serde(default)]
    pub challenge: ChallengeSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub api_keys: ApiKeySettings,
    #[serde(default)]
    pub instructions: InstructionSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

/// WebDriver endpoint and the fixed browser identity applied to every session.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub page_load_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        BrowserSettings {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string(),
            page_load_timeout_secs: 30,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ScraperSettings {
    pub search_base_url: String,
    /// Key under which session state for the search site is persisted.
    pub target_site: String,
    pub max_results: usize,
    pub result_container_selectors: Vec<String>,
    pub title_selectors: Vec<String>,
    pub excluded_titles: Vec<String>,
    pub human_pacing: bool,
    pub session_state_dir: String,
    pub debug_page_path: Option<String>,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        ScraperSettings {
            search_base_url: "https://www.google.com/search".to_string(),
            target_site: "google.com".to_string(),
            max_results: 100,
            result_container_selectors: to_strings(&[
                "div#search",
                r#"div[role="main"]"#,
                "div#rso",
                "div[data-sokoban-container]",
            ]),
            title_selectors: to_strings(&[
                "div.g h3",
                "div[data-sokoban-container] h3",
                "h3",
                r#"div[role="heading"]"#,
            ]),
            excluded_titles: to_strings(&[
                "popular products",
                "people also ask",
                "more products",
                "fast pickup or delivery",
                "in stores nearby",
                "images",
                "discussions and forums",
                "shopping results",
                "related searches",
                "top stories",
                "videos",
                "news",
                "maps",
                "books",
                "flights",
                "hotels",
                "finance",
                "all",
                "shopping",
                "all filters",
                "reviews",
            ]),
            human_pacing: true,
            session_state_dir: "session_state".to_string(),
            debug_page_path: Some("debug_page_source.html".to_string()),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ChallengeSettings {
    pub phrases: Vec<String>,
    /// Unset means wait for the operator indefinitely.
    pub resolution_timeout_secs: Option<u64>,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        ChallengeSettings {
            phrases: to_strings(&[
                "unusual traffic",
                "captcha",
                "automated queries",
                "automated requests",
                "systems have detected",
                "verify you are a human",
                "please type the characters below",
                "please solve this puzzle",
            ]),
            resolution_timeout_secs: None,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AnalysisSettings {
    pub custom_stop_words: Vec<String>,
    /// How many calendar years, counting back from the current one, are stop words.
    pub recent_years: u8,
    pub word_tokenizer: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            custom_stop_words: to_strings(&["|", "-", "best", "top", "guide"]),
            recent_years: 3,
            word_tokenizer: true,
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct ApiKeySettings {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
}

impl ApiKeySettings {
    pub fn openai(&self) -> Option<&str> {
        non_blank(self.openai.as_deref())
    }

    pub fn anthropic(&self) -> Option<&str> {
        non_blank(self.anthropic.as_deref())
    }

    pub fn any(&self) -> bool {
        self.openai().is_some() || self.anthropic().is_some()
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct InstructionSettings {
    pub current_path: String,
    pub default_path: String,
}

impl Default for InstructionSettings {
    fn default() -> Self {
        InstructionSettings {
            current_path: "current_instructions.txt".to_string(),
            default_path: "default_instructions.txt".to_string(),
        }
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename))
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let mut settings = settings.try_deserialize::<Settings>()?;

    // Plain provider variables are honoured when no APP_ override is present
    if settings.api_keys.openai().is_none() {
        settings.api_keys.openai = std::env::var("OPENAI_API_KEY").ok();
    }
    if settings.api_keys.anthropic().is_none() {
        settings.api_keys.anthropic = std::env::var("ANTHROPIC_API_KEY").ok();
    }

    Ok(settings)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
