//! Integration tests for the enrichment pipeline with scripted collaborators.

use std::sync::Arc;
use std::time::Duration;

use leadline_agent::{
    MemoryQueryTool, MockTool, ReasoningConfig, RuleKind, StepExecutionError, ToolError,
    ToolRegistry,
};
use leadline_llm::{CompletionResponse, Content, ContentBlock, MockBackend};
use leadline_pipeline::{
    Pipeline, PipelineDefinition, ReasoningDefinition, StepDefinition, StepError, StepKind,
    StepOutput, enrichment_definition, enrichment_pipeline,
};
use serde_json::{Value, json};

const EMAIL: &str = "a@b.com";
const URL: &str = "https://b.com/company";
const SUMMARY: &str = "B Corp is a 50-person software company.";

/// Every collaborator of the enrichment pipeline, kept for call-count assertions.
struct Stubs {
    web_scrape: Arc<MockTool>,
    company_lookup: Arc<MockTool>,
    speech: Arc<MockTool>,
    playback: Arc<MockTool>,
    message_post: Arc<MockTool>,
}

impl Stubs {
    fn new() -> Self {
        Self {
            web_scrape: Arc::new(
                MockTool::new("web_scrape")
                    .off_prompt()
                    .with_response(json!("Title: B Corp\nLinks:\nhttps://b.com/company")),
            ),
            company_lookup: Arc::new(
                MockTool::new("company_lookup")
                    .off_prompt()
                    .with_response(json!({"name": "B Corp", "industry": "Software", "company_size": [51, 200]})),
            ),
            speech: Arc::new(MockTool::new("speech_synthesis").with_response(json!({
                "artifact_id": "audio-1",
                "path": "/tmp/leadline/audio-1.mp3",
                "media_type": "audio/mpeg",
                "bytes": 4
            }))),
            playback: Arc::new(MockTool::new("audio_playback").with_response(json!({"played": "audio-1"}))),
            message_post: Arc::new(
                MockTool::new("message_post").with_response(json!({"status": 200, "response": "ok"})),
            ),
        }
    }

    fn with_web_scrape(mut self, tool: MockTool) -> Self {
        self.web_scrape = Arc::new(tool);
        self
    }

    fn registry(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register_arc(self.web_scrape.clone());
        tools.register_arc(self.company_lookup.clone());
        tools.register_arc(self.speech.clone());
        tools.register_arc(self.playback.clone());
        tools.register_arc(self.message_post.clone());
        tools.register(MemoryQueryTool::new());
        tools
    }

    fn downstream_calls(&self) -> usize {
        self.company_lookup.call_count()
            + self.speech.call_count()
            + self.playback.call_count()
            + self.message_post.call_count()
    }
}

/// The model scrapes, answers the URL, looks the company up and summarizes.
fn happy_backend() -> Arc<MockBackend> {
    Arc::new(MockBackend::new(vec![
        CompletionResponse::tool_call("m1", "t1", "web_scrape", json!({"url": "b.com"})),
        CompletionResponse::text_only("m2", URL),
        CompletionResponse::tool_call(
            "m3",
            "t2",
            "company_lookup",
            json!({"operation": "get_company", "linkedin_url": URL}),
        ),
        CompletionResponse::text_only("m4", SUMMARY),
    ]))
}

fn tool_result_content(content: &Content) -> Option<&str> {
    match content {
        Content::Blocks(blocks) => blocks.iter().find_map(|b| match b {
            ContentBlock::ToolResult { content, .. } => Some(content.as_str()),
            _ => None,
        }),
        Content::Text(_) => None,
    }
}

#[tokio::test]
async fn test_enrichment_delivers_exact_payload() {
    let stubs = Stubs::new();
    let backend = happy_backend();
    let pipeline =
        enrichment_pipeline(&stubs.registry(), backend.clone(), ReasoningConfig::default()).unwrap();

    let result = pipeline.run(EMAIL).await.unwrap();

    let outputs = result.ordered_outputs();
    assert_eq!(
        outputs[..4],
        [
            &StepOutput::text(URL),
            &StepOutput::text(SUMMARY),
            &StepOutput::Artifact {
                id: "audio-1".into(),
                location: "/tmp/leadline/audio-1.mp3".into(),
                media_type: "audio/mpeg".into(),
            },
            &StepOutput::Void,
        ]
    );
    let StepOutput::Delivered { ack } = outputs[4] else {
        panic!("last step should deliver, got {:?}", outputs[4]);
    };
    let ack: Value = serde_json::from_str(ack).unwrap();
    assert_eq!(ack, json!({"status": 200, "response": "ok"}));

    assert_eq!(
        stubs.message_post.calls(),
        vec![json!({"email": EMAIL, "summary": SUMMARY, "url": URL})]
    );
    assert_eq!(stubs.speech.calls()[0]["text"], SUMMARY);
    assert_eq!(stubs.playback.calls()[0]["artifact_id"], "audio-1");

    // The summary step saw the first step's answer in its instruction.
    let requests = backend.requests();
    assert_eq!(requests.len(), 4);
    assert!(requests[2].messages[0].content.to_text().contains(URL));
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn test_identical_stubs_give_identical_outputs() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let stubs = Stubs::new();
        let pipeline =
            enrichment_pipeline(&stubs.registry(), happy_backend(), ReasoningConfig::default())
                .unwrap();
        runs.push(pipeline.run(EMAIL).await.unwrap());
    }

    assert_ne!(runs[0].run_id, runs[1].run_id);
    assert_eq!(runs[0].ordered_outputs(), runs[1].ordered_outputs());
}

#[tokio::test]
async fn test_discovery_timeout_halts_run() {
    let stubs = Stubs::new().with_web_scrape(
        MockTool::new("web_scrape").with_error(ToolError::Timeout(Duration::from_millis(1000))),
    );
    let backend = Arc::new(MockBackend::new(vec![CompletionResponse::tool_call(
        "m1",
        "t1",
        "web_scrape",
        json!({"url": "b.com"}),
    )]));

    // Same pipeline, minus the best-guess rule on the discovery step.
    let mut definition = enrichment_definition();
    if let StepKind::Reasoning(ref mut first) = definition.steps[0].kind {
        first.rules.retain(|r| r.kind != RuleKind::BestGuess);
    }
    let pipeline = Pipeline::new(
        definition,
        &stubs.registry(),
        backend.clone(),
        ReasoningConfig::default(),
    )
    .unwrap();

    let err = pipeline.run(EMAIL).await.unwrap_err();

    assert_eq!(err.step_id, "linkedin_url");
    assert_eq!(err.position, 0);
    match err.cause {
        StepError::Execution(StepExecutionError::Tool { ref tool, ref source }) => {
            assert_eq!(tool, "web_scrape");
            assert!(source.is_timeout());
        }
        ref other => panic!("unexpected cause: {other}"),
    }
    assert_eq!(stubs.web_scrape.call_count(), 1);
    assert_eq!(stubs.downstream_calls(), 0);
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn test_timeout_retried_when_configured() {
    let stubs = Stubs::new().with_web_scrape(
        MockTool::new("web_scrape")
            .off_prompt()
            .with_script(vec![Err(ToolError::Timeout(Duration::from_millis(1000)))])
            .with_response(json!("https://b.com/company")),
    );
    let config = ReasoningConfig {
        tool_retries: 1,
        ..ReasoningConfig::default()
    };
    let pipeline = enrichment_pipeline(&stubs.registry(), happy_backend(), config).unwrap();

    let result = pipeline.run(EMAIL).await.unwrap();
    assert_eq!(stubs.web_scrape.call_count(), 2);
    assert_eq!(result.outputs.len(), 5);
}

#[tokio::test]
async fn test_best_guess_with_empty_discovery() {
    let stubs = Stubs::new().with_web_scrape(MockTool::new("web_scrape").with_response(json!("")));
    let backend = Arc::new(MockBackend::new(vec![
        CompletionResponse::tool_call("m1", "t1", "web_scrape", json!({"url": "b.com"})),
        CompletionResponse::text_only("m2", ""),
        CompletionResponse::text_only("m3", "I could not find a LinkedIn page."),
    ]));

    let mut definition = enrichment_definition();
    definition.steps.truncate(1);
    let pipeline = Pipeline::new(
        definition,
        &stubs.registry(),
        backend.clone(),
        ReasoningConfig::default(),
    )
    .unwrap();

    let result = pipeline.run(EMAIL).await.unwrap();
    let answer = result.output("linkedin_url").unwrap().render();

    assert!(!answer.is_empty());
    assert!(answer.starts_with("https://"));
    assert_eq!(answer, "https://www.linkedin.com/company/b");
    // one corrective re-prompt before the fallback
    assert_eq!(backend.request_count(), 3);
}

#[tokio::test]
async fn test_off_prompt_payload_reaches_later_step_unchanged() {
    let raw = "Ünïcödé page\n  <a href=\"/x\">x</a>\ttrailing  \n";
    let stubs = Stubs::new()
        .with_web_scrape(MockTool::new("web_scrape").off_prompt().with_response(Value::String(raw.into())));
    let backend = Arc::new(MockBackend::new(vec![
        CompletionResponse::tool_call("m1", "t1", "web_scrape", json!({"url": "b.com"})),
        CompletionResponse::text_only("m2", "scraped"),
        CompletionResponse::tool_call(
            "m3",
            "t2",
            "memory_query",
            json!({"action": "fetch", "memory_name": "web_scrape-1"}),
        ),
        CompletionResponse::text_only("m4", "done"),
    ]));

    let definition = PipelineDefinition::new("memory")
        .step(
            StepDefinition::reasoning(ReasoningDefinition::new("Scrape {{ args[0] }}").tool("web_scrape"))
                .with_id("scrape"),
        )
        .step(StepDefinition::reasoning(
            ReasoningDefinition::new("Page:{{ memory.web_scrape }}").tool("memory_query"),
        ));
    let pipeline = Pipeline::new(
        definition,
        &stubs.registry(),
        backend.clone(),
        ReasoningConfig::default(),
    )
    .unwrap();

    pipeline.run(EMAIL).await.unwrap();

    let requests = backend.requests();
    // The first step's model only ever saw a reference.
    let reference = tool_result_content(&requests[1].messages[2].content).unwrap();
    assert!(!reference.contains("Ünïcödé"));
    assert!(reference.contains("web_scrape-1"));

    // The second step got the payload through its template and through memory_query.
    assert_eq!(
        requests[2].messages[0].content.to_text(),
        format!("Page:{}", raw)
    );
    assert_eq!(
        tool_result_content(&requests[3].messages[2].content),
        Some(raw)
    );
}

#[tokio::test]
async fn test_memory_reference_absent_fails_step() {
    let stubs = Stubs::new();
    let backend = Arc::new(MockBackend::new(vec![CompletionResponse::text_only("m1", "hi")]));
    let definition = PipelineDefinition::new("memory")
        .step(StepDefinition::reasoning(ReasoningDefinition::new("Say hi")))
        .step(StepDefinition::reasoning(ReasoningDefinition::new(
            "Page: {{ memory.web_scrape }}",
        )));
    let pipeline =
        Pipeline::new(definition, &stubs.registry(), backend.clone(), ReasoningConfig::default())
            .unwrap();

    let err = pipeline.run(EMAIL).await.unwrap_err();
    assert_eq!(err.step_id, "#1");
    assert!(matches!(err.cause, StepError::Render(_)));
    assert_eq!(backend.request_count(), 1);
}
