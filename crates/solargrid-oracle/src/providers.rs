//! LLM-backed oracle providers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use solargrid_types::EnergyReport;

use crate::{DecisionOracle, OracleError, Result, WalletDirectory};

const SYSTEM_PROMPT: &str = "You are an AI agent responsible for handling SOLAR token transactions in an energy marketplace.\n\
You must correctly process transactions ensuring that:\n\
- The receiver of kWh ALWAYS sends SOLAR tokens in return.\n\
- The sender of kWh ALWAYS receives SOLAR tokens.\n\
- If a house has extra energy, it receives SOLAR tokens from the Public Grid.\n\
- If a house needs energy, it sends SOLAR tokens to the seller.\n\
- Your final output must only contain SOLAR token transactions formatted as follows:\n\
   - 'Wallet [Sender Wallet] sends [Token Amount] SOLAR to Wallet [Receiver Wallet] on Sonic Network.'";

/// Configuration for an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiConfig {
    /// Read endpoint settings from the environment
    /// (`SOLARGRID_OPENAI_URL`, `OPENAI_API_KEY`, `SOLARGRID_OPENAI_MODEL`)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| OracleError::Decision("OPENAI_API_KEY is not set".into()))?;
        Ok(Self {
            base_url: std::env::var("SOLARGRID_OPENAI_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            api_key,
            model: std::env::var("SOLARGRID_OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4".to_string()),
        })
    }
}

/// Oracle backed by an OpenAI-compatible chat-completions API
pub struct OpenAiOracle {
    config: OpenAiConfig,
    directory: WalletDirectory,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiOracle {
    pub fn new(config: OpenAiConfig, directory: WalletDirectory) -> Self {
        Self {
            config,
            directory,
            client: reqwest::Client::new(),
        }
    }

    fn user_prompt(&self, report: &EnergyReport) -> String {
        let wallets = serde_json::to_string_pretty(&self.directory.houses)
            .unwrap_or_else(|_| "{}".to_string());
        let report_json =
            serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string());
        format!(
            "Analyze the energy flow and structure transactions using the following wallets:\n\n\
             {wallets}\n\n\
             The Public Grid wallet is {}.\n\n\
             Example format:\n\
             - Wallet 0x... sends 3 SOLAR to Wallet 0x... on Sonic Network.\n\
             - Wallet 0x... sends 5 SOLAR to Wallet 0x... on Sonic Network.\n\n\
             Analyze and generate transactions for: {report_json}",
            self.directory.public_grid
        )
    }
}

#[async_trait]
impl DecisionOracle for OpenAiOracle {
    async fn decide(&self, report: &EnergyReport) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: self.user_prompt(report),
                },
            ],
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Decision(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OracleError::Decision(format!(
                "oracle returned HTTP {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Decision(format!("malformed response: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Decision("response contained no content".into()))?;

        debug!(chars = content.len(), "oracle decision received");
        Ok(content)
    }
}

/// Test oracle that returns canned decision text
pub struct ScriptedOracle {
    text: String,
}

impl ScriptedOracle {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(&self, _report: &EnergyReport) -> Result<String> {
        Ok(self.text.clone())
    }
}
