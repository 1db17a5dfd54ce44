//! Match-Statistics Provider
//!
//! Abstract contract for the external service that returns a user's recent
//! match summaries and full match detail records, plus the HTTP client
//! implementation against it.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// One entry of a user's recent-match list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: i64,
    /// Match start, milliseconds since the Unix epoch
    pub timestamp: i64,
    pub character_id: i64,
}

/// Recent-match list response wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct MatchList {
    pub matches: Vec<MatchSummary>,
}

/// One participant's in-match record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub participant_id: i64,
    pub character_id: i64,
    /// Raw statistics keyed by stat key (e.g. "kills"); missing keys count as 0
    #[serde(default)]
    pub stats: HashMap<String, i64>,
}

/// Links a participant slot to a player account, when the game mode exposes it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantIdentity {
    pub participant_id: i64,
    /// Absent in reduced-data game modes
    pub player: Option<PlayerIdentity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerIdentity {
    pub account_id: i64,
}

/// Full match detail record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    pub match_id: i64,
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub participant_identities: Vec<ParticipantIdentity>,
}

/// Contract for the external match-statistics service
#[async_trait]
pub trait MatchProvider: Send + Sync {
    async fn recent_matches(&self, account_id: i64) -> Result<Vec<MatchSummary>, ProviderError>;
    async fn match_detail(&self, match_id: i64) -> Result<MatchDetail, ProviderError>;
}

/// HTTP client against the real statistics provider
pub struct HttpMatchProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpMatchProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, ProviderError> {
        let resp = self
            .client
            .get(&url)
            .header("X-Api-Token", &self.api_key)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl MatchProvider for HttpMatchProvider {
    async fn recent_matches(&self, account_id: i64) -> Result<Vec<MatchSummary>, ProviderError> {
        let url = format!(
            "{}/matchlists/by-account/{}/recent",
            self.base_url, account_id
        );
        let list: MatchList = self.get_json(url).await?;
        Ok(list.matches)
    }

    async fn match_detail(&self, match_id: i64) -> Result<MatchDetail, ProviderError> {
        let url = format!("{}/matches/{}", self.base_url, match_id);
        self.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_list_deserializes_camel_case() {
        let json = r#"{
            "matches": [
                { "matchId": 101, "timestamp": 1700000000000, "characterId": 7 }
            ]
        }"#;
        let list: MatchList = serde_json::from_str(json).unwrap();
        assert_eq!(list.matches.len(), 1);
        assert_eq!(list.matches[0].match_id, 101);
        assert_eq!(list.matches[0].character_id, 7);
    }

    #[test]
    fn test_match_detail_without_identities() {
        let json = r#"{
            "matchId": 5,
            "participants": [
                { "participantId": 1, "characterId": 7, "stats": { "kills": 3 } }
            ]
        }"#;
        let detail: MatchDetail = serde_json::from_str(json).unwrap();
        assert!(detail.participant_identities.is_empty());
        assert_eq!(detail.participants[0].stats.get("kills"), Some(&3));
    }
}
