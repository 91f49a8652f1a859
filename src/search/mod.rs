//! Search-augmented chat
//!
//! One turn runs in three steps: derive a search query from the question,
//! fetch SerpAPI results, then stream a provider answer grounded in those
//! results. The result list itself is sent to the client first as a single
//! JSON frame so the UI can render sources while the answer streams. Search
//! failures degrade to a plain chat answer; they never abort the stream.

use crate::errors::Result;
use crate::providers::{ChatProvider, FrameStream};
use crate::relay::frame;
use crate::types::ChatMessage;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SERPAPI_URL: &str = "https://serpapi.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

/// One web search hit forwarded to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// The leading frame announcing search results to the client
#[derive(Debug, Serialize)]
struct SearchAnnouncement<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    total: usize,
    query: &'a str,
    results: &'a [SearchHit],
}

/// Search-augmented chat service
pub struct SearchService {
    client: Client,
    provider: Arc<dyn ChatProvider>,
    api_key: Option<String>,
    result_count: usize,
}

impl SearchService {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        api_key: Option<String>,
        result_count: usize,
    ) -> Self {
        let client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            provider,
            api_key,
            result_count,
        }
    }

    /// Stream a full search-augmented answer for one question
    pub async fn stream(&self, question: &str) -> Result<FrameStream> {
        let query = self.derive_query(question).await;
        let hits = match self.search(&query).await {
            Ok(hits) => hits,
            Err(err) => {
                warn!(error = %err, "web search failed, answering without results");
                Vec::new()
            }
        };

        if hits.is_empty() {
            return self
                .provider
                .stream_complete(&[ChatMessage::user(question)])
                .await;
        }

        info!(total = hits.len(), %query, "search results retrieved");
        let announcement = serde_json::to_string(&SearchAnnouncement {
            kind: "search_results",
            total: hits.len(),
            query: &query,
            results: &hits,
        })?;

        let messages = vec![
            ChatMessage::system(
                "You are an assistant with access to live web search results. \
                 Base your answer on the provided results, cite the sources you \
                 used, note how current the information is, and say so when the \
                 results are not relevant.",
            ),
            ChatMessage::user(context_prompt(question, &hits)),
        ];
        let upstream = self.provider.stream_complete(&messages).await?;

        let stream = async_stream::try_stream! {
            yield frame(&announcement);
            let mut upstream = upstream;
            while let Some(item) = upstream.next().await {
                yield item?;
            }
        };
        Ok(Box::pin(stream))
    }

    /// Ask the model for a search query, falling back to the raw question
    ///
    /// The model is told to respond with a `search("...")` call; anything
    /// that does not parse as one keeps the question unchanged.
    async fn derive_query(&self, question: &str) -> String {
        let messages = vec![
            ChatMessage::system(
                "You must use the search function to gather information. Do not \
                 answer directly; respond with exactly one call of the form \
                 search(\"query\").",
            ),
            ChatMessage::user(question),
        ];
        match self.provider.complete(&messages).await {
            Ok(reply) => parse_search_call(&reply).unwrap_or_else(|| question.to_string()),
            Err(err) => {
                warn!(error = %err, "query derivation failed, searching the raw question");
                question.to_string()
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("SERPAPI_KEY not set, skipping web search");
            return Ok(Vec::new());
        };

        let num = self.result_count.to_string();
        let response = self
            .client
            .get(SERPAPI_URL)
            .query(&[("q", query), ("api_key", api_key), ("num", num.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let body: SerpResponse = response.json().await?;
        Ok(body
            .organic_results
            .into_iter()
            .take(self.result_count)
            .map(|result| SearchHit {
                title: result.title,
                url: result.link,
                snippet: result.snippet,
            })
            .collect())
    }
}

/// Build the grounding prompt the answer is generated from
fn context_prompt(question: &str, hits: &[SearchHit]) -> String {
    let sources: Vec<String> = hits
        .iter()
        .map(|hit| {
            format!(
                "Source: {}\nLink: {}\nContent: {}\n",
                hit.title, hit.url, hit.snippet
            )
        })
        .collect();

    format!(
        "Answer the user's question based on the search results below.\n\n\
         Search results:\n\n{}\n\nUser question: {}\n\n\
         Requirements:\n\
         1. Give a complete, accurate answer\n\
         2. Cite the specific sources and links used\n\
         3. Note how current the information is\n\
         4. State the limitations when the results fall short",
        sources.join("\n---\n"),
        question
    )
}

/// Extract the quoted query from a `search("...")` reply
fn parse_search_call(reply: &str) -> Option<String> {
    let start = reply.find("search(\"")? + "search(\"".len();
    let rest = &reply[start..];
    let end = rest.find("\")")?;
    Some(rest[..end].to_string())
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpResult>,
}

#[derive(Debug, Deserialize)]
struct SerpResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_call() {
        assert_eq!(
            parse_search_call(r#"search("rust async streams")"#).as_deref(),
            Some("rust async streams")
        );
        assert_eq!(
            parse_search_call(r#"I will run search("latest deepseek release") now."#).as_deref(),
            Some("latest deepseek release")
        );
        assert!(parse_search_call("no function call here").is_none());
    }

    #[test]
    fn test_context_prompt_lists_every_source() {
        let hits = vec![
            SearchHit {
                title: "A".to_string(),
                url: "https://a.example".to_string(),
                snippet: "first".to_string(),
            },
            SearchHit {
                title: "B".to_string(),
                url: "https://b.example".to_string(),
                snippet: "second".to_string(),
            },
        ];
        let prompt = context_prompt("what happened?", &hits);
        assert!(prompt.contains("https://a.example"));
        assert!(prompt.contains("https://b.example"));
        assert!(prompt.contains("what happened?"));
    }

    #[test]
    fn test_announcement_is_single_line_json() {
        let hits = vec![SearchHit {
            title: "A".to_string(),
            url: "https://a.example".to_string(),
            snippet: "first".to_string(),
        }];
        let json = serde_json::to_string(&SearchAnnouncement {
            kind: "search_results",
            total: 1,
            query: "q",
            results: &hits,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"search_results\""));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_serp_response_parsing() {
        let json = r#"{"organic_results":[{"title":"T","link":"https://t","snippet":"s","position":1}]}"#;
        let body: SerpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.organic_results.len(), 1);
        assert_eq!(body.organic_results[0].link, "https://t");
    }
}
