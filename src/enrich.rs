//! Optional language-model enrichment, modeled as an injected capability.
//!
//! The processor talks to a [`Enricher`] trait object; the default
//! [`NoopEnricher`] keeps the pipeline fully offline. [`HttpEnricher`]
//! posts a content excerpt to a chat-completion endpoint and expects a
//! small JSON object back. Every failure on this path is swallowed by the
//! processor; enrichment never blocks a memory from being captured.

use serde::Deserialize;
use serde_json::json;

use crate::errors::Error;

/// Content excerpt length sent to the enrichment service, in characters.
pub const ENRICHMENT_EXCERPT: usize = 500;

/// Structured reply from the enrichment service.
#[derive(Debug, Default, Deserialize)]
pub struct Enrichment {
    /// Up to 3 suggested keywords.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Refined memory type, when the service is confident.
    #[serde(rename = "type", default)]
    pub memory_type: Option<String>,

    /// Importance suggestion in [0, 100]; folded in with `max`, never lowers.
    #[serde(default)]
    pub importance: Option<u8>,
}

/// A capability that can suggest keywords, a type label and an importance
/// score for a content excerpt.
pub trait Enricher: Send {
    /// Whether calls are worth making at all. The no-op reports false so the
    /// processor can skip the excerpt work entirely.
    fn enabled(&self) -> bool {
        true
    }

    fn enrich(&self, excerpt: &str) -> Result<Enrichment, Error>;
}

/// Default enricher: enrichment unconfigured, nothing happens.
#[derive(Debug, Default)]
pub struct NoopEnricher;

impl Enricher for NoopEnricher {
    fn enabled(&self) -> bool {
        false
    }

    fn enrich(&self, _excerpt: &str) -> Result<Enrichment, Error> {
        Ok(Enrichment::default())
    }
}

/// Enricher backed by an OpenAI-style chat-completion endpoint.
pub struct HttpEnricher {
    agent: ureq::Agent,
    url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct CompletionReply {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl HttpEnricher {
    pub fn new(url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        HttpEnricher {
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(30))
                .build(),
            url: url.into(),
            api_key,
            model: model.into(),
        }
    }

    fn prompt(excerpt: &str) -> String {
        format!(
            "Analyze this captured development note and reply with a JSON object \
             containing \"keywords\" (up to 3 strings), \"type\" (one of code, \
             documentation, discussion, error, solution) and \"importance\" \
             (integer 1-100).\n\nNote:\n{excerpt}"
        )
    }
}

impl Enricher for HttpEnricher {
    fn enrich(&self, excerpt: &str) -> Result<Enrichment, Error> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": Self::prompt(excerpt)}],
            "max_tokens": 200,
            "temperature": 0.3,
        });

        let mut request = self.agent.post(&self.url).set("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        let reply: CompletionReply = request.send_json(body)?.into_json()?;
        let content = reply
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::Enrichment("empty completion reply".into()))?;

        let mut enrichment: Enrichment = serde_json::from_str(content.trim())
            .map_err(|e| Error::Enrichment(format!("unparseable reply: {e}")))?;
        enrichment.keywords.truncate(3);
        Ok(enrichment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_is_disabled() {
        let enricher = NoopEnricher;
        assert!(!enricher.enabled());
        let result = enricher.enrich("anything").unwrap();
        assert!(result.keywords.is_empty());
        assert!(result.memory_type.is_none());
        assert!(result.importance.is_none());
    }

    #[test]
    fn test_enrichment_deserialize() {
        let reply = r#"{"keywords": ["rust", "parser", "cli"], "type": "code", "importance": 85}"#;
        let e: Enrichment = serde_json::from_str(reply).unwrap();
        assert_eq!(e.keywords.len(), 3);
        assert_eq!(e.memory_type.as_deref(), Some("code"));
        assert_eq!(e.importance, Some(85));
    }

    #[test]
    fn test_enrichment_deserialize_partial() {
        let e: Enrichment = serde_json::from_str(r#"{"keywords": ["one"]}"#).unwrap();
        assert_eq!(e.keywords, vec!["one"]);
        assert!(e.memory_type.is_none());
        assert!(e.importance.is_none());
    }

    #[test]
    fn test_unreachable_endpoint_is_an_error() {
        let enricher = HttpEnricher::new("http://127.0.0.1:1/v1/chat/completions", None, "m");
        assert!(enricher.enrich("excerpt").is_err());
    }
}
