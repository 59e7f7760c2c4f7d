// src/services/personalizer.rs

//! Message personalization.
//!
//! The second line of the message comes from a `LineGenerator` when one is
//! configured. Any generator failure falls back to a deterministic line
//! built from the profile and the matched reference clients, so
//! `Personalizer::personalize` always returns a message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{LineTemplate, MatchField, PersonalizerConfig, Profile};

/// Maximum number of reference clients offered per profile.
const MAX_REFERENCES: usize = 3;

/// Bio characters included in the prompt.
const BIO_PROMPT_CHARS: usize = 500;

/// Produces the personalized second line for a profile.
#[async_trait]
pub trait LineGenerator: Send + Sync {
    async fn generate(&self, profile: &Profile, references: &[String]) -> Result<String>;
}

// ============================================================================
// Chat completion backend
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    content: Option<String>,
}

/// OpenAI-compatible `chat/completions` client.
pub struct ChatCompletionGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    templates: Vec<LineTemplate>,
}

impl ChatCompletionGenerator {
    /// Build from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &PersonalizerConfig, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "{} is not set; it is required for full action runs",
                    config.api_key_env
                ))
            })?;

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            templates: config.line_templates.clone(),
        })
    }
}

#[async_trait]
impl LineGenerator for ChatCompletionGenerator {
    async fn generate(&self, profile: &Profile, references: &[String]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(profile, references, &self.templates),
            }],
        };

        let response: ChatResponse = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| AppError::generator("empty completion"))
    }
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() { "N/A" } else { value }
}

fn build_prompt(profile: &Profile, references: &[String], templates: &[LineTemplate]) -> String {
    let bio: String = profile.bio_text.chars().take(BIO_PROMPT_CHARS).collect();
    let mut prompt = format!(
        "Write the second line of a short meeting request to a conference attendee. \
         It should open a conversation by connecting their work to ours.\n\n\
         Attendee:\n\
         - Name: {}\n\
         - Title: {}\n\
         - Company: {}\n\
         - Industry: {}\n\
         - Badge: {}\n\
         - Bio: {}\n\n\
         Clients we can mention (pick one or two that fit best): {}\n\n",
        or_na(&profile.display_name),
        or_na(&profile.role_title),
        or_na(&profile.organization),
        or_na(&profile.category_text),
        or_na(&profile.badge_type),
        or_na(&bio),
        references.join(", "),
    );

    if !templates.is_empty() {
        prompt.push_str(
            "Choose ONE of these patterns and fill its bracketed placeholders:\n",
        );
        for template in templates {
            let text = template
                .text
                .replace("{title}", or_na(&profile.role_title))
                .replace("{company}", or_na(&profile.organization));
            prompt.push_str(&format!(
                "- {} (use when {}): {}\n",
                template.name, template.when, text
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Use only facts present above. Keep it natural and concise, one or two sentences. \
         Reply with the line only, as plain text without quotes or formatting.",
    );
    prompt
}

// ============================================================================
// Personalizer
// ============================================================================

pub struct Personalizer {
    config: PersonalizerConfig,
    generator: Option<Arc<dyn LineGenerator>>,
}

impl Personalizer {
    pub fn new(config: PersonalizerConfig, generator: Option<Arc<dyn LineGenerator>>) -> Self {
        Self { config, generator }
    }

    /// Personalizer that only uses the deterministic line.
    pub fn offline(config: PersonalizerConfig) -> Self {
        Self::new(config, None)
    }

    /// Full message for a profile. Never fails.
    pub async fn personalize(&self, profile: &Profile) -> String {
        let references = self.match_references(profile);

        let line = match &self.generator {
            Some(generator) => match generator.generate(profile, &references).await {
                Ok(line) => {
                    log::info!("Generated personalized line for {}", profile.id);
                    line
                }
                Err(e) => {
                    log::error!("Personalization failed for {}: {}", profile.id, e);
                    self.fallback_line(profile, &references)
                }
            },
            None => self.fallback_line(profile, &references),
        };

        self.render(profile, &line)
    }

    /// Reference clients for a profile, in group order, deduplicated and
    /// capped. Falls back to the default list when no group matches.
    pub fn match_references(&self, profile: &Profile) -> Vec<String> {
        let mut matched: Vec<String> = Vec::new();

        for group in &self.config.references {
            let haystack = group
                .fields
                .iter()
                .map(|field| match field {
                    MatchField::Category => profile.category_text.as_str(),
                    MatchField::Title => profile.role_title.as_str(),
                    MatchField::Bio => profile.bio_text.as_str(),
                })
                .collect::<Vec<_>>()
                .join("\n")
                .to_lowercase();

            let hit = group
                .keywords
                .iter()
                .any(|keyword| haystack.contains(&keyword.to_lowercase()));
            if !hit {
                continue;
            }

            for client in &group.clients {
                if !matched.contains(client) {
                    matched.push(client.clone());
                }
            }
        }

        if matched.is_empty() {
            matched = self.config.default_references.clone();
        }
        matched.truncate(MAX_REFERENCES);
        matched
    }

    /// Deterministic second line.
    pub fn fallback_line(&self, profile: &Profile, references: &[String]) -> String {
        let company = if profile.organization.trim().is_empty() {
            "your company"
        } else {
            profile.organization.trim()
        };
        let reference = references
            .first()
            .or_else(|| self.config.default_references.first())
            .map(String::as_str)
            .unwrap_or("our clients");
        format!(
            "I noticed your work at {company} - we've been helping similar companies like \
             {reference} with their AI transformation."
        )
    }

    fn render(&self, profile: &Profile, line: &str) -> String {
        let name = if profile.display_name.trim().is_empty() {
            "there"
        } else {
            profile.display_name.trim()
        };
        self.config
            .template
            .replace("{name}", name)
            .replace("{second_line}", line)
    }
}
