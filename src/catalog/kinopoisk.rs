use super::*;
use serde::Deserialize;
use std::time::Instant;

/// Catalog provider backed by the kinopoisk.dev REST API (v1.4)
pub struct KinopoiskProvider {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl KinopoiskProvider {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> CatalogResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key,
            timeout,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> CatalogResult<T> {
        let start = Instant::now();
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", self.api_key.as_str())
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(path, status = status.as_u16(), "Catalog request rejected");
            return Err(CatalogError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        tracing::debug!(
            path,
            latency_ms = start.elapsed().as_millis() as u64,
            "Catalog request completed"
        );

        Ok(parsed)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> CatalogError {
        if e.is_timeout() {
            CatalogError::Timeout(self.timeout)
        } else {
            CatalogError::Request(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMovie {
    #[serde(default)]
    id: Option<CandidateId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    alternative_name: Option<String>,
    #[serde(default)]
    en_name: Option<String>,
    #[serde(default)]
    names: Vec<ApiName>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    poster: Option<ApiPoster>,
    #[serde(default)]
    genres: Vec<ApiGenre>,
    #[serde(default)]
    persons: Vec<ApiPerson>,
}

#[derive(Debug, Deserialize)]
struct ApiName {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPoster {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiGenre {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPerson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    en_name: Option<String>,
    #[serde(default)]
    en_profession: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiImagePage {
    #[serde(default)]
    docs: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl From<&ApiMovie> for TitleSummary {
    fn from(movie: &ApiMovie) -> Self {
        TitleSummary {
            id: movie.id,
            name: movie.name.clone(),
            alternative_name: movie.alternative_name.clone(),
        }
    }
}

impl ApiMovie {
    fn into_candidate(self) -> CatalogResult<Candidate> {
        let id = self
            .id
            .ok_or_else(|| CatalogError::Parse("Title details without id".to_string()))?;

        // enName and the localized names list both count as accepted spellings
        let mut aliases: Vec<String> = Vec::new();
        for alias in self
            .en_name
            .into_iter()
            .chain(self.names.into_iter().filter_map(|n| n.name))
        {
            let trimmed = alias.trim();
            if !trimmed.is_empty() && !aliases.iter().any(|a| a == trimmed) {
                aliases.push(trimmed.to_string());
            }
        }

        let poster_url = self.poster.and_then(|p| p.url.or(p.preview_url));

        Ok(Candidate {
            id,
            name: self.name,
            alternative_name: self.alternative_name,
            aliases,
            year: self.year,
            poster_url,
            genres: self.genres.into_iter().filter_map(|g| g.name).collect(),
            persons: self
                .persons
                .into_iter()
                .map(|p| crate::types::Person {
                    name: p.name,
                    en_name: p.en_name,
                    profession: p.en_profession,
                })
                .collect(),
        })
    }
}

impl ApiImage {
    fn into_asset(self) -> Option<ImageAsset> {
        Some(ImageAsset {
            url: self.url?,
            preview_url: self.preview_url,
            kind: self.kind.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl CatalogProvider for KinopoiskProvider {
    async fn random_title(&self) -> CatalogResult<TitleSummary> {
        let movie: ApiMovie = self.get_json("/v1.4/movie/random", &[]).await?;
        Ok(TitleSummary::from(&movie))
    }

    async fn title_details(&self, id: CandidateId) -> CatalogResult<Candidate> {
        let movie: ApiMovie = self
            .get_json(&format!("/v1.4/movie/{}", id), &[])
            .await?;
        movie.into_candidate()
    }

    async fn images(
        &self,
        id: CandidateId,
        types: &[String],
        limit: u32,
    ) -> CatalogResult<Vec<ImageAsset>> {
        let mut query = vec![
            ("movieId", id.to_string()),
            ("limit", limit.to_string()),
            ("page", "1".to_string()),
        ];
        query.extend(types.iter().map(|t| ("type", t.clone())));

        let page: ApiImagePage = self.get_json("/v1.4/image", &query).await?;
        let images: Vec<ImageAsset> = page
            .docs
            .into_iter()
            .filter_map(ApiImage::into_asset)
            .collect();

        tracing::info!(
            title_id = id,
            images = images.len(),
            provider = self.name(),
            "Image pool fetched"
        );

        Ok(images)
    }

    fn name(&self) -> &str {
        "kinopoisk"
    }
}
