//! Terminal chat client
//!
//! A rustyline REPL against a running AssistGen server: authenticate, keep
//! a running conversation, and render the relayed stream with thinking and
//! answer separated. The password is hashed before it leaves the terminal;
//! the server never sees plaintext.

pub mod config;
pub mod display;

use crate::errors::{AppError, Result};
use crate::relay::consumer::StreamConsumer;
use crate::types::{ChatMessage, ChatRequest, StreamEvent, Token, UserProfile};
use colored::Colorize;
use config::ClientConfig;
use display::StreamPrinter;
use reqwest::Client;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Which relay endpoint a turn goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    Reason,
    Search,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Chat => "/chat",
            Endpoint::Reason => "/reason",
            Endpoint::Search => "/search",
        }
    }
}

/// Buffers left after a completed stream
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub think: String,
    pub response: String,
}

/// Hash a password client-side before transmission
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// HTTP client for one AssistGen server
pub struct ChatClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Token> {
        let response = self
            .http
            .post(format!("{}/api/register", self.base_url))
            .json(&json!({
                "username": username,
                "email": email,
                "password": password_hash,
            }))
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;

        match response.status().as_u16() {
            409 => Err(AppError::DuplicateUser),
            code if code >= 400 => Err(AppError::UpstreamHttp { status: code }),
            _ => {
                let token: Token = response.json().await?;
                self.token = Some(token.access_token.clone());
                Ok(token)
            }
        }
    }

    pub async fn login(&mut self, email: &str, password_hash: &str) -> Result<Token> {
        let response = self
            .http
            .post(format!("{}/api/token", self.base_url))
            .json(&json!({ "email": email, "password": password_hash }))
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;

        match response.status().as_u16() {
            401 => Err(AppError::InvalidCredentials),
            code if code >= 400 => Err(AppError::UpstreamHttp { status: code }),
            _ => {
                let token: Token = response.json().await?;
                self.token = Some(token.access_token.clone());
                Ok(token)
            }
        }
    }

    pub async fn validate(&self) -> Result<bool> {
        let Some(token) = &self.token else {
            return Ok(false);
        };
        let response = self
            .http
            .get(format!("{}/api/validate-token", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;
        Ok(response.status().is_success())
    }

    pub async fn me(&self) -> Result<UserProfile> {
        let token = self.token.as_ref().ok_or(AppError::Unauthorized)?;
        let response = self
            .http
            .get(format!("{}/api/users/me", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;
        if response.status().as_u16() == 401 {
            return Err(AppError::Unauthorized);
        }
        Ok(response.json().await?)
    }

    /// Stream one turn, invoking `on_event` for every classified event
    pub async fn stream<F>(
        &self,
        endpoint: Endpoint,
        messages: &[ChatMessage],
        mut on_event: F,
    ) -> Result<StreamOutcome>
    where
        F: FnMut(&StreamEvent),
    {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, endpoint.path()))
            .json(&ChatRequest {
                messages: messages.to_vec(),
            });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;
        match response.status().as_u16() {
            401 => return Err(AppError::Unauthorized),
            code if code >= 400 => return Err(AppError::UpstreamHttp { status: code }),
            _ => {}
        }

        let mut consumer = StreamConsumer::new();
        consumer
            .consume(response.bytes_stream(), |event| on_event(event))
            .await?;
        Ok(StreamOutcome {
            think: consumer.think().to_string(),
            response: consumer.response().to_string(),
        })
    }
}

/// Interactive REPL session
struct Repl {
    editor: DefaultEditor,
    client: ChatClient,
    config: ClientConfig,
    conversation: Vec<ChatMessage>,
}

/// Run the interactive chat REPL
pub async fn run_repl(server_override: Option<String>) -> anyhow::Result<()> {
    let config = ClientConfig::load()?;
    let base_url = server_override.unwrap_or_else(|| config.server_url());
    let mut client = ChatClient::new(&base_url)?;
    if let Some(token) = config.token() {
        client.set_token(token.to_string());
    }

    println!("\n{}", "AssistGen terminal client".bold().cyan());
    println!("{}", format!("Server: {base_url}").dimmed());
    println!(
        "Type a message to chat, or {} for commands ({} to quit)\n",
        "/help".green(),
        "/exit".green()
    );

    let mut repl = Repl {
        editor: DefaultEditor::new()?,
        client,
        config,
        conversation: Vec::new(),
    };
    let history_path = history_path();
    if history_path.exists() {
        let _ = repl.editor.load_history(&history_path);
    }

    repl.report_login_state().await;

    loop {
        match repl.editor.readline("> ") {
            Ok(line) => {
                let input = line.trim().to_string();
                if input.is_empty() {
                    continue;
                }
                let _ = repl.editor.add_history_entry(&input);
                if input.starts_with('/') {
                    if !repl.handle_command(&input).await? {
                        break;
                    }
                } else {
                    repl.run_turn(Endpoint::Chat, &input).await;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use /exit to quit");
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = repl.editor.save_history(&history_path);
    Ok(())
}

fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".assistgen")
        .join("history")
}

impl Repl {
    async fn report_login_state(&mut self) {
        if self.client.token().is_none() {
            println!("Not logged in. Use {} or {}.", "/login".green(), "/register".green());
            return;
        }
        match self.client.validate().await {
            Ok(true) => {
                if let Ok(profile) = self.client.me().await {
                    println!("Logged in as {}", profile.username.green());
                }
            }
            _ => {
                println!("{}", "Cached token is no longer valid; use /login".yellow());
                self.client.clear_token();
                self.config.clear_token();
                let _ = self.config.save();
            }
        }
    }

    fn prompt(&mut self, label: &str) -> anyhow::Result<String> {
        Ok(self.editor.readline(label)?.trim().to_string())
    }

    /// Returns false when the REPL should exit
    async fn handle_command(&mut self, input: &str) -> anyhow::Result<bool> {
        let (command, rest) = match input.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (input, ""),
        };

        match command {
            "/help" | "/h" => {
                println!("  /login             log in with email and password");
                println!("  /register          create an account");
                println!("  /logout            drop the cached token");
                println!("  /reason <text>     ask the reasoning model");
                println!("  /search <text>     web-search-augmented answer");
                println!("  /clear             reset the conversation");
                println!("  /me                show the logged-in profile");
                println!("  /exit              quit");
            }
            "/exit" | "/quit" | "/q" => {
                println!("{}", "Goodbye!".green());
                return Ok(false);
            }
            "/clear" => {
                self.conversation.clear();
                println!("Conversation cleared.");
            }
            "/login" => self.login_flow().await?,
            "/register" => self.register_flow().await?,
            "/logout" => {
                self.client.clear_token();
                self.config.clear_token();
                self.config.save()?;
                println!("Logged out.");
            }
            "/me" => match self.client.me().await {
                Ok(profile) => {
                    println!("{} <{}>  since {}", profile.username, profile.email, profile.created_at)
                }
                Err(err) => println!("{}", err.to_string().red()),
            },
            "/reason" if !rest.is_empty() => self.run_turn(Endpoint::Reason, rest).await,
            "/search" if !rest.is_empty() => self.run_turn(Endpoint::Search, rest).await,
            "/reason" | "/search" => println!("Usage: {command} <text>"),
            _ => println!("Unknown command: {command} (try /help)"),
        }
        Ok(true)
    }

    async fn login_flow(&mut self) -> anyhow::Result<()> {
        let email = self.prompt("email: ")?;
        let password = self.prompt("password: ")?;
        match self.client.login(&email, &hash_password(&password)).await {
            Ok(token) => {
                self.config.set_token(token.access_token);
                self.config.save()?;
                println!("{}", "Logged in.".green());
            }
            Err(err) => println!("{}", err.to_string().red()),
        }
        Ok(())
    }

    async fn register_flow(&mut self) -> anyhow::Result<()> {
        let username = self.prompt("username: ")?;
        let email = self.prompt("email: ")?;
        let password = self.prompt("password: ")?;
        match self
            .client
            .register(&username, &email, &hash_password(&password))
            .await
        {
            Ok(token) => {
                self.config.set_token(token.access_token);
                self.config.save()?;
                println!("{}", "Account created.".green());
            }
            Err(err) => println!("{}", err.to_string().red()),
        }
        Ok(())
    }

    /// One chat turn: send the conversation, render the stream
    async fn run_turn(&mut self, endpoint: Endpoint, text: &str) {
        self.conversation.push(ChatMessage::user(text));

        let mut printer = StreamPrinter::new();
        let outcome = self
            .client
            .stream(endpoint, &self.conversation, |event| printer.render(event))
            .await;
        printer.finish();

        match outcome {
            Ok(outcome) => {
                self.conversation
                    .push(ChatMessage::assistant(outcome.response));
            }
            Err(err) => {
                // The turn failed; keep the conversation as it was before.
                self.conversation.pop();
                println!("{}", err.to_string().red());
                if matches!(err, AppError::Unauthorized) {
                    println!("Use {} to authenticate.", "/login".green());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::Chat.path(), "/chat");
        assert_eq!(Endpoint::Reason.path(), "/reason");
        assert_eq!(Endpoint::Search.path(), "/search");
    }

    #[test]
    fn test_hash_password_is_stable_hex() {
        let hash = hash_password("correct horse battery staple");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_password("correct horse battery staple"));
        assert_ne!(hash, hash_password("other"));
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = ChatClient::new("http://127.0.0.1:8000/").unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:8000");
    }
}
