//! HTTP client for an enrichment-provider endpoint.
//!
//! Speaks a small JSON contract: POST `{instruction, max_response_tokens}`,
//! receive `{text, citations[]}`. Truncated `text` is expected behavior and
//! passes through untouched; salvage is the parser's job, not the client's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dossier_analysis::{
    Citation, EnrichmentProvider, ProviderError, ProviderResponse, ResponseBudget,
};

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    instruction: &'a str,
    max_response_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    text: String,
    #[serde(default)]
    citations: Vec<Citation>,
}

/// Enrichment provider reached over HTTP.
pub struct HttpEnrichmentProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEnrichmentProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl EnrichmentProvider for HttpEnrichmentProvider {
    async fn query(
        &self,
        instruction: &str,
        budget: ResponseBudget,
    ) -> Result<ProviderResponse, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&QueryRequest {
                instruction,
                max_response_tokens: budget.0,
            })
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Request(format!(
                "provider endpoint returned {status}"
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(ProviderResponse {
            text: body.text,
            citations: body.citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_wire_shape() {
        let request = QueryRequest {
            instruction: "Research Acme Corp",
            max_response_tokens: 4096,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instruction"], "Research Acme Corp");
        assert_eq!(json["max_response_tokens"], 4096);
    }

    #[test]
    fn query_response_tolerates_missing_citations() {
        let body: QueryResponse = serde_json::from_str(r#"{"text": "{}"}"#).unwrap();
        assert!(body.citations.is_empty());
    }
}
