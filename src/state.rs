use crate::ai::GeminiClient;
use crate::client::{DataClient, DirectTransport};
use crate::config::Config;
use reqwest::Client;
use std::{sync::Arc, time::Duration};

const USER_AGENT: &str = concat!("tube-insight/", env!("CARGO_PKG_VERSION"));
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: Client,
    /// Present only when the server holds an upstream key.
    pub data: Option<DataClient>,
    pub gemini: GeminiClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;

        let data = config.youtube_api_key.as_deref().map(|key| {
            DataClient::new(Arc::new(DirectTransport::new(
                http.clone(),
                &config.youtube_api_base,
                key,
            )))
        });
        let gemini = GeminiClient::new(
            http.clone(),
            &config.gemini_api_base,
            &config.gemini_model,
            config.gemini_api_key.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            http,
            data,
            gemini,
        })
    }
}
