use std::sync::{Arc, Mutex, MutexGuard};

use rand::{Rng, distr::Alphanumeric};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::spotify::models::{CurrentlyPlayingResponse, Playback, TokenResponse, TrackSnapshot};
use crate::store::{ACCESS_TOKEN_KEY, FileStore, REFRESH_TOKEN_KEY, TokenStore};

const STATE_LENGTH: usize = 16;

/// Access and refresh token as held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Authorization URL together with the `state` value embedded in it.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
}

impl PlayerCommand {
    fn endpoint(self) -> &'static str {
        match self {
            PlayerCommand::Play => "play",
            PlayerCommand::Pause => "pause",
        }
    }
}

impl std::fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Spotify authorization-code client that keeps its token pair in a
/// [`TokenStore`] and reads or controls the user's playback.
pub struct NowPlayingClient {
    http_client: Client,
    config: Config,
    store: Arc<dyn TokenStore>,
    tokens: Mutex<TokenPair>,
}

impl NowPlayingClient {
    pub fn new(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        let http_client = Client::builder().timeout(config.http_timeout).build()?;

        let tokens = TokenPair {
            access_token: store.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty()),
            refresh_token: store.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty()),
        };

        debug!(
            "Loaded stored tokens (access: {}, refresh: {})",
            tokens.access_token.is_some(),
            tokens.refresh_token.is_some()
        );

        Ok(Self {
            http_client,
            config: config.clone(),
            store,
            tokens: Mutex::new(tokens),
        })
    }

    /// Client backed by the JSON token file named in the config.
    pub fn with_file_store(config: &Config) -> Result<Self> {
        let store = FileStore::open(&config.token_file)?;
        Self::new(config, Arc::new(store))
    }

    pub fn authorization_url(&self) -> Result<String> {
        Ok(self.authorization_request()?.url)
    }

    /// The returned state is not checked by [`Self::exchange_code_for_token`];
    /// callers wanting CSRF protection must keep and compare it themselves.
    pub fn authorization_request(&self) -> Result<AuthorizationRequest> {
        let state = generate_state();
        let url = Url::parse_with_params(
            &format!("{}/authorize", base(&self.config.accounts_url)),
            &[
                ("client_id", self.config.spotify_client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.spotify_redirect_uri.as_str()),
                ("scope", self.config.scope().as_str()),
                ("state", state.as_str()),
            ],
        )?;

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Accepts either a full redirect URL or a bare authorization code.
    pub fn parse_response_code(input: &str) -> Option<String> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        match Url::parse(input) {
            Ok(url) => url
                .query_pairs()
                .find(|(key, _)| key == "code")
                .map(|(_, value)| value.into_owned())
                .filter(|code| !code.is_empty()),
            Err(_) if !input.contains(char::is_whitespace) => Some(input.to_string()),
            Err(_) => None,
        }
    }

    pub async fn exchange_code_for_token(&self, code: &str) -> bool {
        if code.is_empty() {
            warn!("Refusing to exchange an empty authorization code");
            return false;
        }

        match self.request_token(code).await {
            Ok(()) => {
                info!("Exchanged authorization code for tokens");
                true
            }
            Err(e) => {
                warn!("Error exchanging code for token: {}", e);
                false
            }
        }
    }

    async fn request_token(&self, code: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.token_url())
            .basic_auth(
                &self.config.spotify_client_id,
                Some(&self.config.spotify_client_secret),
            )
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.spotify_redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "Token exchange failed ({}): {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(AppError::Auth("Token response had an empty access token".into()));
        }

        let previous_access = self.store.get(ACCESS_TOKEN_KEY);
        self.store.set(ACCESS_TOKEN_KEY, &token.access_token)?;

        let refresh_written = match &token.refresh_token {
            Some(refresh_token) => self.store.set(REFRESH_TOKEN_KEY, refresh_token),
            None => self.store.delete(REFRESH_TOKEN_KEY),
        };
        if let Err(e) = refresh_written {
            self.restore(ACCESS_TOKEN_KEY, previous_access.as_deref());
            return Err(e);
        }

        debug!("Access token expires in {:?}s", token.expires_in);

        *self.tokens() = TokenPair {
            access_token: Some(token.access_token),
            refresh_token: token.refresh_token,
        };

        Ok(())
    }

    pub async fn refresh_access_token(&self) -> bool {
        let Some(refresh_token) = self.tokens().refresh_token.clone() else {
            debug!("No refresh token available");
            return false;
        };

        match self.request_refreshed_token(&refresh_token).await {
            Ok(()) => {
                info!("Refreshed Spotify access token");
                true
            }
            Err(e) => {
                warn!("Error refreshing access token: {}", e);
                false
            }
        }
    }

    async fn request_refreshed_token(&self, refresh_token: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.token_url())
            .basic_auth(
                &self.config.spotify_client_id,
                Some(&self.config.spotify_client_secret),
            )
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "Token refresh failed ({}): {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(AppError::Auth("Token response had an empty access token".into()));
        }

        // Only the access token is replaced; a rotated refresh token is dropped.
        if token.refresh_token.as_deref().is_some_and(|t| t != refresh_token) {
            debug!("Ignoring rotated refresh token from refresh response");
        }

        self.store.set(ACCESS_TOKEN_KEY, &token.access_token)?;
        self.tokens().access_token = Some(token.access_token);

        Ok(())
    }

    /// Current track, or `None` when nothing is playing, the client is not
    /// authenticated, or the request failed.
    pub async fn currently_playing(&self) -> Option<TrackSnapshot> {
        match self.try_currently_playing().await {
            Ok(playback) => playback.into_snapshot(),
            Err(e) => {
                warn!("Error fetching currently playing track: {}", e);
                None
            }
        }
    }

    /// Like [`Self::currently_playing`] but reports failures instead of
    /// folding them into "nothing playing".
    pub async fn try_currently_playing(&self) -> Result<Playback> {
        let url = format!("{}/v1/me/player/currently-playing", base(&self.config.api_url));
        let mut refreshed = false;

        loop {
            let Some(access_token) = self.access_token() else {
                debug!("No access token available");
                return Ok(Playback::Nothing);
            };

            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&access_token)
                .send()
                .await?;

            debug!("Currently playing response status: {}", response.status());

            match response.status() {
                StatusCode::UNAUTHORIZED if !refreshed => {
                    info!("Access token expired, refreshing");
                    if !self.refresh_access_token().await {
                        return Err(AppError::Auth(
                            "Access token expired and could not be refreshed".into(),
                        ));
                    }
                    refreshed = true;
                }
                StatusCode::NO_CONTENT => {
                    debug!("Nothing is currently playing");
                    return Ok(Playback::Nothing);
                }
                status if status.is_success() => {
                    let body: CurrentlyPlayingResponse = response.json().await?;
                    return Ok(match body.into_snapshot() {
                        Some(track) => Playback::Track(track),
                        None => {
                            debug!("No item in currently playing response");
                            Playback::Nothing
                        }
                    });
                }
                status => {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(AppError::SpotifyApi {
                        status: status.as_u16(),
                        message: error_text,
                    });
                }
            }
        }
    }

    /// Pauses when the current poll reports playing, otherwise plays.
    pub async fn toggle_playback(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }

        let is_playing = self
            .currently_playing()
            .await
            .is_some_and(|track| track.is_playing);

        let command = if is_playing {
            PlayerCommand::Pause
        } else {
            PlayerCommand::Play
        };

        match self.send_player_command(command).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error toggling playback ({}): {}", command, e);
                false
            }
        }
    }

    async fn send_player_command(&self, command: PlayerCommand) -> Result<()> {
        let access_token = self
            .access_token()
            .ok_or_else(|| AppError::Auth("No access token available".into()))?;

        let url = format!("{}/v1/me/player/{}", base(&self.config.api_url), command.endpoint());

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(&access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::SpotifyApi {
                status: status.as_u16(),
                message: error_text,
            });
        }

        info!("Sent {} command", command);
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn token_pair(&self) -> TokenPair {
        self.tokens().clone()
    }

    pub fn logout(&self) {
        *self.tokens() = TokenPair::default();

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.store.delete(key) {
                warn!("Failed to remove {} from token store: {}", key, e);
            }
        }

        info!("Logged out of Spotify");
    }

    /// Puts a stored entry back after a half-applied token write.
    fn restore(&self, key: &str, previous: Option<&str>) {
        let restored = match previous {
            Some(value) => self.store.set(key, value),
            None => self.store.delete(key),
        };
        if let Err(e) = restored {
            warn!("Failed to restore {} in token store: {}", key, e);
        }
    }

    fn access_token(&self) -> Option<String> {
        self.tokens()
            .access_token
            .clone()
            .filter(|token| !token.is_empty())
    }

    fn tokens(&self) -> MutexGuard<'_, TokenPair> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn token_url(&self) -> String {
        format!("{}/api/token", base(&self.config.accounts_url))
    }
}

fn base(url: &str) -> &str {
    url.trim_end_matches('/')
}

fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}
