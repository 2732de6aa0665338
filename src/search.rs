// SPDX-License-Identifier: MIT

//! Reverse-image-search client for metadata suggestions
//!
//! Posts image bytes to a visual-search API and maps the response onto a
//! partial metadata record. Every failure mode degrades to "no suggestion";
//! the catalog workflow never hard-fails because the service is down.

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::Result;

/// Best-effort partial record returned by the search service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub author: String,
    pub description: String,
    pub tags: Vec<String>,
    pub source: String,
}

impl Suggestion {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.author.is_empty()
            && self.description.is_empty()
            && self.tags.is_empty()
            && self.source.is_empty()
    }
}

/// Seam for the external suggestion service
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Look up a best-effort suggestion for raw image bytes. An empty
    /// suggestion is the expected answer when the service has nothing.
    async fn suggest(&self, image: &[u8]) -> Result<Suggestion>;
}

/// Client for a Bing-Visual-Search-style endpoint
pub struct VisualSearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl VisualSearchClient {
    /// Build a client from config; the API key comes from the environment
    /// variable the config names. A missing key is not an error, the client
    /// just always answers with an empty suggestion.
    pub fn from_config(config: &SearchConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!(
                "No API key in ${}; metadata suggestions are disabled",
                config.api_key_env
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        }
    }
}

#[async_trait]
impl SuggestionProvider for VisualSearchClient {
    async fn suggest(&self, image: &[u8]) -> Result<Suggestion> {
        let Some(ref key) = self.api_key else {
            return Ok(Suggestion::default());
        };

        let part = multipart::Part::bytes(image.to_vec())
            .file_name("img.jpg")
            .mime_str("image/jpeg")?;
        let form = multipart::Form::new().part("image", part);

        debug!("Posting {} bytes to {}", image.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let raw: SearchResponse = response.json().await?;
        Ok(extract_suggestion(&raw))
    }
}

// Wire format (the subset of the response we read)

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tags: Vec<ResponseTag>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseTag {
    #[serde(default, rename = "displayName")]
    display_name: String,
    #[serde(default)]
    actions: Vec<TagAction>,
}

#[derive(Debug, Default, Deserialize)]
struct TagAction {
    #[serde(default)]
    data: ActionData,
}

#[derive(Debug, Default, Deserialize)]
struct ActionData {
    #[serde(default)]
    value: Vec<MatchValue>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchValue {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "hostPageUrl")]
    host_page_url: String,
    #[serde(default, rename = "hostPageDisplayUrl")]
    host_page_display_url: String,
}

/// Map the raw response onto a suggestion: the first match of the first
/// tag's first action supplies title/description/source, the author is read
/// from the second-to-last segment of the display URL, and every tag's
/// display name becomes a tag. An empty tag list means no suggestion.
fn extract_suggestion(raw: &SearchResponse) -> Suggestion {
    let first = raw
        .tags
        .first()
        .and_then(|t| t.actions.first())
        .and_then(|a| a.data.value.first());

    let Some(first) = first else {
        return Suggestion::default();
    };

    let author = first
        .host_page_display_url
        .split('/')
        .rev()
        .nth(1)
        .unwrap_or("")
        .to_string();

    let tags = raw
        .tags
        .iter()
        .map(|t| t.display_name.clone())
        .filter(|t| !t.is_empty())
        .collect();

    Suggestion {
        title: first.name.clone(),
        author,
        description: first.name.clone(),
        tags,
        source: first.host_page_url.clone(),
    }
}

/// Ask a provider for a suggestion, degrading any failure to the empty
/// suggestion. Service trouble is an expected outcome for the catalog
/// workflow, never a hard failure.
pub async fn suggest_or_empty(provider: &dyn SuggestionProvider, image: &[u8]) -> Suggestion {
    match provider.suggest(image).await {
        Ok(suggestion) => suggestion,
        Err(e) => {
            warn!("Suggestion service failed: {}", e);
            Suggestion::default()
        }
    }
}

/// Downscale an image to at most 1024px on its longest side and re-encode as
/// JPEG before upload. Falls back to the raw bytes when decoding fails, so an
/// odd file still gets a lookup attempt.
pub fn prepare_image(path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path)?;

    let img = match image::load_from_memory(&data) {
        Ok(img) => img,
        Err(e) => {
            warn!("Could not decode {:?} ({}), uploading raw bytes", path, e);
            return Ok(data);
        }
    };

    let img = if img.width() > 1024 || img.height() > 1024 {
        img.resize(1024, 1024, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    img.write_to(&mut cursor, image::ImageFormat::Jpeg)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> SearchResponse {
        serde_json::from_str(
            r#"{
                "tags": [
                    {
                        "displayName": "painting",
                        "actions": [
                            {
                                "data": {
                                    "value": [
                                        {
                                            "name": "The Starry Night",
                                            "hostPageUrl": "https://museum.example/collection/starry-night",
                                            "hostPageDisplayUrl": "museum.example/van-gogh/starry-night"
                                        }
                                    ]
                                }
                            }
                        ]
                    },
                    {"displayName": "night sky", "actions": []}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn extracts_first_match_fields() {
        let suggestion = extract_suggestion(&sample_response());
        assert_eq!(suggestion.title, "The Starry Night");
        assert_eq!(suggestion.description, "The Starry Night");
        assert_eq!(suggestion.source, "https://museum.example/collection/starry-night");
        assert_eq!(suggestion.tags, vec!["painting", "night sky"]);
    }

    #[test]
    fn author_is_second_to_last_url_segment() {
        let suggestion = extract_suggestion(&sample_response());
        assert_eq!(suggestion.author, "van-gogh");
    }

    #[test]
    fn empty_tag_list_yields_empty_suggestion() {
        let raw: SearchResponse = serde_json::from_str(r#"{"tags": []}"#).unwrap();
        assert!(extract_suggestion(&raw).is_empty());
    }

    #[test]
    fn malformed_body_is_tolerated_by_defaults() {
        // Fields we do not know are ignored, fields we expect default to empty
        let raw: SearchResponse =
            serde_json::from_str(r#"{"tags": [{"unexpected": true}], "extra": 1}"#).unwrap();
        let suggestion = extract_suggestion(&raw);
        assert!(suggestion.is_empty());
    }

    #[test]
    fn short_display_url_degrades_to_empty_author() {
        let raw: SearchResponse = serde_json::from_str(
            r#"{"tags": [{"actions": [{"data": {"value": [{"name": "X", "hostPageDisplayUrl": "single"}]}}]}]}"#,
        )
        .unwrap();
        assert_eq!(extract_suggestion(&raw).author, "");
    }

    struct FailingProvider;

    #[async_trait]
    impl SuggestionProvider for FailingProvider {
        async fn suggest(&self, _image: &[u8]) -> crate::Result<Suggestion> {
            Err(crate::VisorError::Config("service down".to_string()))
        }
    }

    #[test]
    fn provider_failure_degrades_to_empty_suggestion() {
        let suggestion = tokio_test::block_on(suggest_or_empty(&FailingProvider, b"img"));
        assert!(suggestion.is_empty());
    }

    #[test]
    fn client_without_key_answers_empty() {
        let config = SearchConfig {
            endpoint: "https://api.invalid/visualsearch".to_string(),
            api_key_env: "VISOR_TEST_UNSET_KEY".to_string(),
            timeout_secs: 1,
        };
        let client = VisualSearchClient::from_config(&config);
        let suggestion = tokio_test::block_on(client.suggest(b"not an image")).unwrap();
        assert!(suggestion.is_empty());
    }
}
