//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use leadline_agent::{MemoryQueryTool, MockTool, ReasoningConfig, ToolRegistry};
use leadline_llm::{CompletionResponse, MockBackend};
use leadline_pipeline::enrichment_pipeline;
use leadline_server::{AppState, Server, ServerConfig, SharedCheckout};
use reqwest::Client;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const URL: &str = "https://b.com/company";
pub const SUMMARY: &str = "B Corp is a 50-person software company.";

/// Scripted collaborators for the enrichment pipeline.
pub struct Stubs {
    pub message_post: Arc<MockTool>,
    pub backend: Arc<MockBackend>,
    tools: ToolRegistry,
}

impl Stubs {
    pub fn new() -> Self {
        let message_post = Arc::new(
            MockTool::new("message_post").with_response(json!({"status": 200, "response": "ok"})),
        );

        let mut tools = ToolRegistry::new();
        tools.register(
            MockTool::new("web_scrape")
                .off_prompt()
                .with_response(json!("Title: B Corp")),
        );
        tools.register(
            MockTool::new("company_lookup")
                .off_prompt()
                .with_response(json!({"name": "B Corp", "industry": "Software"})),
        );
        tools.register(MockTool::new("speech_synthesis").with_response(json!({
            "artifact_id": "audio-1",
            "path": "/tmp/leadline/audio-1.mp3",
            "media_type": "audio/mpeg"
        })));
        tools.register(MockTool::new("audio_playback").with_response(json!({"played": "audio-1"})));
        tools.register_arc(message_post.clone());
        tools.register(MemoryQueryTool::new());

        let backend = Arc::new(MockBackend::new(vec![
            CompletionResponse::tool_call("m1", "t1", "web_scrape", json!({"url": "b.com"})),
            CompletionResponse::text_only("m2", URL),
            CompletionResponse::text_only("m3", SUMMARY),
        ]));

        Self {
            message_post,
            backend,
            tools,
        }
    }

    pub fn state(&self, config: ServerConfig) -> Result<AppState> {
        let pipeline = enrichment_pipeline(
            &self.tools,
            self.backend.clone(),
            ReasoningConfig::default(),
        )?;
        Ok(AppState::new(pipeline, config))
    }

    /// Wait until the webhook delivery has been posted.
    pub async fn wait_for_delivery(&self) -> Result<()> {
        timeout(Duration::from_secs(5), async {
            while self.message_post.call_count() == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .map_err(|_| anyhow::anyhow!("Timeout waiting for delivery"))
    }
}

/// A test server that runs in the background.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub stubs: Stubs,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server without checkout configured.
    pub async fn start() -> Result<Self> {
        Self::start_with_checkout(None).await
    }

    pub async fn start_with_checkout(checkout: Option<SharedCheckout>) -> Result<Self> {
        let addr = find_available_port().await?;
        let stubs = Stubs::new();

        let config = ServerConfig::new()
            .with_bind_address(addr)
            .with_request_logging(false);
        let mut state = stubs.state(config)?;
        if let Some(checkout) = checkout {
            state = state.with_shared_checkout(checkout);
        }

        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        // Redirects are asserted on, not followed.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            stubs,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
