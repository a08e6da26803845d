//! Command dispatch
//!
//! Turns a [`CommandIntent`] into an effect: opening a playlist or search
//! page, or fetching the weather. Failures carry a sentence to speak back.

mod browser;
mod links;
mod weather;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use browser::{BrowserSettings, ChromiumOpener, PageOpener};
pub use links::PlaylistBook;
pub use weather::{OpenWeatherClient, WeatherReport, WeatherSource};

use crate::config::Config;
use crate::intent::CommandIntent;

/// Parameter a command needs but did not get
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Playlist name
    Playlist,
    /// Search query
    Query,
    /// City name
    City,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playlist => write!(f, "playlist"),
            Self::Query => write!(f, "query"),
            Self::City => write!(f, "city"),
        }
    }
}

/// Why an action did not complete
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Required parameter was empty
    #[error("missing {0}")]
    MissingArgument(Param),

    /// No playlist with that name
    #[error("playlist not found: {0}")]
    PlaylistNotFound(String),

    /// No handler for the action
    #[error("unsupported action: {0}")]
    Unsupported(String),

    /// Weather lookups need an API key
    #[error("weather API key not configured")]
    NotConfigured,

    /// Weather service failed
    #[error("weather unavailable for {city}: {reason}")]
    WeatherUnavailable {
        /// City requested
        city: String,
        /// Failure reason
        reason: String,
    },

    /// Browser could not open the page
    #[error("browser error: {0}")]
    Browser(String),
}

impl ActionError {
    /// Sentence to speak back to the user
    #[must_use]
    pub fn feedback(&self) -> String {
        match self {
            Self::MissingArgument(Param::Playlist) => {
                "Please tell me which playlist to play.".to_string()
            }
            Self::MissingArgument(Param::Query) => {
                "Please tell me what to search for.".to_string()
            }
            Self::MissingArgument(Param::City) => {
                "Please specify a city to get the weather for.".to_string()
            }
            Self::PlaylistNotFound(name) => {
                format!("Sorry, the playlist '{name}' was not found in my YouTube links.")
            }
            Self::Unsupported(action) => {
                format!("I don't know how to perform the action: '{action}'.")
            }
            Self::NotConfigured => {
                "Weather API key not configured. Please set OPENWEATHER_API_KEY.".to_string()
            }
            Self::WeatherUnavailable { city, .. } => {
                format!("Could not retrieve weather data for {city}.")
            }
            Self::Browser(_) => "Sorry, I couldn't open the browser.".to_string(),
        }
    }
}

/// Executes command intents
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Perform `intent`, returning a confirmation to speak
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when the action cannot be performed
    async fn dispatch(&self, intent: &CommandIntent) -> Result<String, ActionError>;
}

/// Default dispatcher: playlists and searches open in a browser, weather
/// comes from a [`WeatherSource`]
pub struct CommandDispatcher {
    playlists: PlaylistBook,
    opener: Arc<dyn PageOpener>,
    weather: Option<Arc<dyn WeatherSource>>,
}

impl CommandDispatcher {
    /// Create a dispatcher from its parts
    #[must_use]
    pub fn new(
        playlists: PlaylistBook,
        opener: Arc<dyn PageOpener>,
        weather: Option<Arc<dyn WeatherSource>>,
    ) -> Self {
        Self {
            playlists,
            opener,
            weather,
        }
    }

    /// Build the standard dispatcher from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the links file exists but is malformed
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let playlists = PlaylistBook::load(&config.actions.links_path)?;
        let opener = Arc::new(ChromiumOpener::new(BrowserSettings::from(&config.actions)));
        let weather = config
            .api_keys
            .openweather
            .clone()
            .filter(|k| !k.is_empty())
            .map(|key| Arc::new(OpenWeatherClient::new(key)) as Arc<dyn WeatherSource>);

        if weather.is_none() {
            tracing::debug!("no weather API key, weather commands disabled");
        }

        Ok(Self::new(playlists, opener, weather))
    }

    async fn open(&self, url: &str) -> Result<(), ActionError> {
        self.opener.open(url).await.map_err(|e| {
            tracing::error!(error = %e, url, "failed to open page");
            ActionError::Browser(e.to_string())
        })
    }
}

/// YouTube search results URL for `query`
#[must_use]
pub fn search_url(query: &str) -> String {
    format!(
        "https://www.youtube.com/results?search_query={}",
        urlencoding::encode(query)
    )
}

#[async_trait]
impl ActionDispatcher for CommandDispatcher {
    async fn dispatch(&self, intent: &CommandIntent) -> Result<String, ActionError> {
        tracing::info!(action = intent.kind(), "dispatching command");

        match intent {
            CommandIntent::PlayPlaylist { name } => {
                if name.is_empty() {
                    return Err(ActionError::MissingArgument(Param::Playlist));
                }
                let url = self
                    .playlists
                    .url_for(name)
                    .ok_or_else(|| ActionError::PlaylistNotFound(name.clone()))?;
                self.open(url).await?;
                Ok(format!("Playing {name}."))
            }
            CommandIntent::Search { query } => {
                if query.is_empty() {
                    return Err(ActionError::MissingArgument(Param::Query));
                }
                self.open(&search_url(query)).await?;
                Ok(format!("Searching for {query} on YouTube."))
            }
            CommandIntent::Weather { city } => {
                if city.is_empty() {
                    return Err(ActionError::MissingArgument(Param::City));
                }
                let source = self.weather.as_ref().ok_or(ActionError::NotConfigured)?;
                let report = source.current(city).await.map_err(|reason| {
                    ActionError::WeatherUnavailable {
                        city: city.clone(),
                        reason,
                    }
                })?;
                Ok(report.sentence())
            }
            CommandIntent::Unknown { action } => Err(ActionError::Unsupported(action.clone())),
        }
    }
}
