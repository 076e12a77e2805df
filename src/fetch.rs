//! YouTube Data API client for playlist contents and video statistics

use anyhow::Context;
use serde_json::Value;

use crate::data::VideoStats;
use crate::EngageError;

/// Public YouTube Data API v3 endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Page size for both playlist listing and statistics batches, the API
/// maximum.
const PAGE_SIZE: usize = 50;

/// Explicit client configuration, passed into the constructor.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        ApiConfig {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Synchronous client over the statistics service.
pub struct YouTubeClient {
    config: ApiConfig,
}

impl YouTubeClient {
    pub fn new(config: ApiConfig) -> Self {
        YouTubeClient { config }
    }

    /// Retrieve every video id in a playlist, following `nextPageToken`
    /// until the listing is exhausted.
    pub fn playlist_video_ids(&self, playlist_id: &str) -> crate::Result<Vec<String>> {
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = ureq::get(&format!("{}/playlistItems", self.config.base_url))
                .query("part", "contentDetails")
                .query("playlistId", playlist_id)
                .query("maxResults", &PAGE_SIZE.to_string())
                .query("key", &self.config.api_key);
            if let Some(token) = &page_token {
                request = request.query("pageToken", token);
            }

            let body = fetch_json(request).context("failed to fetch playlist items")?;
            let page = parse_playlist_page(&body)?;
            video_ids.extend(page.video_ids);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(video_ids)
    }

    /// Retrieve engagement statistics for the given videos, batching ids
    /// to the API page size. Counts the service omits default to 0.
    pub fn video_statistics(&self, video_ids: &[String]) -> crate::Result<Vec<VideoStats>> {
        let mut stats = Vec::with_capacity(video_ids.len());

        for batch in video_ids.chunks(PAGE_SIZE) {
            let request = ureq::get(&format!("{}/videos", self.config.base_url))
                .query("part", "statistics")
                .query("id", &batch.join(","))
                .query("key", &self.config.api_key);

            let body = fetch_json(request).context("failed to fetch video statistics")?;
            stats.extend(parse_statistics_page(&body)?);
        }

        Ok(stats)
    }
}

/// Execute a request and decode the JSON body. Error statuses still carry
/// a JSON payload describing the remote failure, so the body is decoded
/// either way and inspected by the parsers.
fn fetch_json(request: ureq::Request) -> crate::Result<Value> {
    let response = match request.call() {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(e) => return Err(e.into()),
    };
    Ok(response.into_json::<Value>()?)
}

#[derive(Debug)]
pub(crate) struct PlaylistPage {
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Surface a remote `"error"` payload verbatim as an upstream error.
fn check_remote_error(body: &Value) -> Result<(), EngageError> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown remote error");
        return Err(EngageError::Upstream(message.to_string()));
    }
    Ok(())
}

pub(crate) fn parse_playlist_page(body: &Value) -> crate::Result<PlaylistPage> {
    check_remote_error(body)?;

    let mut video_ids = Vec::new();
    if let Some(items) = body.get("items").and_then(Value::as_array) {
        for item in items {
            if let Some(id) = item
                .pointer("/contentDetails/videoId")
                .and_then(Value::as_str)
            {
                video_ids.push(id.to_string());
            }
        }
    }

    let next_page_token = body
        .get("nextPageToken")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(PlaylistPage {
        video_ids,
        next_page_token,
    })
}

pub(crate) fn parse_statistics_page(body: &Value) -> crate::Result<Vec<VideoStats>> {
    check_remote_error(body)?;

    let mut stats = Vec::new();
    if let Some(items) = body.get("items").and_then(Value::as_array) {
        for item in items {
            let video_id = match item.get("id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => continue,
            };
            let statistics = item.get("statistics");
            stats.push(VideoStats {
                video_id,
                views: count_field(statistics, "viewCount"),
                likes: count_field(statistics, "likeCount"),
                comments: count_field(statistics, "commentCount"),
            });
        }
    }

    Ok(stats)
}

// The API serializes counts as decimal strings.
fn count_field(statistics: Option<&Value>, name: &str) -> u64 {
    statistics
        .and_then(|s| s.get(name))
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
