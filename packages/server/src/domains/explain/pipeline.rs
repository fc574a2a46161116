//! Explanation orchestration.
//!
//! redaction → optional retrieval → streamed generation → terminal frame →
//! persistence. The caller has already authenticated and validated; from
//! here on every failure is reported in-band as an `error` frame.

use explain_stream::{
    normalize_newlines, parse_structured, DonePayload, ExplainRequest, Source, StreamFrame,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use super::demo::demo_explanation;
use super::prompts;
use crate::common::{hash_text, redact, ExplanationRecord};
use crate::domains::auth::AuthContext;
use crate::kernel::{BaseSearchService, ServerDeps};

pub const MAX_SOURCES: usize = 5;
pub const EXCERPT_CHARS: usize = 300;

const FRAME_BUFFER: usize = 64;

/// Selection text as it is allowed to leave the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedText {
    pub redacted: String,
    /// Hash of the original, unredacted text
    pub text_hash: String,
    pub replacements: usize,
}

pub fn prepare_text(request: &ExplainRequest) -> PreparedText {
    let text_hash = hash_text(&request.text);
    if !request.redaction_enabled {
        return PreparedText {
            redacted: request.text.clone(),
            text_hash,
            replacements: 0,
        };
    }

    let result = redact(&request.text);
    PreparedText {
        replacements: result.count(),
        redacted: result.redacted,
        text_hash,
    }
}

/// Query the retrieval backend. Never fails; a broken backend yields no sources.
pub async fn retrieve_sources(search: Option<&dyn BaseSearchService>, redacted: &str) -> Vec<Source> {
    let Some(search) = search else {
        return Vec::new();
    };

    let query = prompts::retrieval_query(redacted);
    if query.is_empty() {
        return Vec::new();
    }

    match search.search(&query, MAX_SOURCES).await {
        Ok(results) => results
            .into_iter()
            .take(MAX_SOURCES)
            .map(|r| Source {
                title: if r.title.trim().is_empty() {
                    "Untitled".to_string()
                } else {
                    r.title
                },
                url: r.url,
                content: r.content.chars().take(EXCERPT_CHARS).collect(),
                score: r.score,
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "source retrieval failed, continuing without sources");
            Vec::new()
        }
    }
}

/// Run one explanation, returning its frames in emission order.
///
/// Dropping the returned stream aborts generation at the next token and
/// skips persistence.
pub fn explain(deps: ServerDeps, request: ExplainRequest, auth: AuthContext) -> ReceiverStream<StreamFrame> {
    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    tokio::spawn(run(deps, request, auth, tx));
    ReceiverStream::new(rx)
}

async fn run(deps: ServerDeps, request: ExplainRequest, auth: AuthContext, tx: mpsc::Sender<StreamFrame>) {
    let prepared = prepare_text(&request);
    info!(
        user_id = %auth.user_id,
        mode = request.mode.as_str(),
        text_len = prepared.redacted.len(),
        replacements = prepared.replacements,
        text_hash = %prepared.text_hash,
        "explain request"
    );

    let Some(generator) = deps.generator.clone() else {
        emit_demo(&tx, prepared.text_hash).await;
        return;
    };

    let sources = tokio::select! {
        _ = tx.closed() => {
            debug!("client disconnected during retrieval");
            return;
        }
        sources = retrieve_sources(deps.search.as_deref(), &prepared.redacted) => sources,
    };
    debug!(count = sources.len(), "sources retrieved");

    let chat = prompts::explain_chat_request(&deps.models.explain_model, &prepared.redacted, &sources);
    let mut tokens = match generator.stream_chat(chat).await {
        Ok(tokens) => tokens,
        Err(e) => {
            error!(error = %e, "generation request failed");
            let _ = tx.send(StreamFrame::error(format!("Generation failed: {}", e))).await;
            return;
        }
    };

    let mut collected = String::new();
    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                info!(text_hash = %prepared.text_hash, "client disconnected, generation aborted");
                return;
            }
            next = tokens.next() => next,
        };

        match next {
            Some(Ok(token)) => {
                // Keep the stored text identical to what consumers accumulate.
                let token = normalize_newlines(&token);
                collected.push_str(&token);
                if tx.send(StreamFrame::delta(token)).await.is_err() {
                    return;
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "generation failed mid-stream");
                let _ = tx.send(StreamFrame::error(format!("Generation failed: {}", e))).await;
                return;
            }
            None => break,
        }
    }

    let json = parse_structured(&collected).map(|mut explanation| {
        explanation.attach_sources(&sources);
        explanation
    });
    if json.is_none() {
        debug!(len = collected.len(), "output was not structured, sending raw text");
    }

    let response_json = json
        .as_ref()
        .and_then(|explanation| serde_json::to_value(explanation).ok())
        .unwrap_or_else(|| Value::String(collected.clone()));

    let done = StreamFrame::Done(DonePayload {
        json,
        text_hash: prepared.text_hash.clone(),
        sources,
    });
    if tx.send(done).await.is_err() {
        debug!("client disconnected before the terminal frame");
        return;
    }
    drop(tx);

    let record = ExplanationRecord {
        user_id: auth.user_id,
        workspace_id: auth.workspace_id,
        mode: request.mode,
        context_level: request.context_level,
        metadata: request.metadata,
        text_hash: prepared.text_hash,
        response_json,
    };
    if let Err(e) = deps.store.save(record).await {
        warn!(error = %e, "failed to persist explanation");
    }
}

async fn emit_demo(tx: &mpsc::Sender<StreamFrame>, text_hash: String) {
    debug!("demo mode, sending canned explanation");
    let demo = demo_explanation();
    let preview = serde_json::to_string(&demo).unwrap_or_default();

    if tx.send(StreamFrame::delta(preview)).await.is_err() {
        return;
    }
    let _ = tx
        .send(StreamFrame::Done(DonePayload {
            json: Some(demo),
            text_hash,
            sources: Vec::new(),
        }))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::AuthMethod;
    use crate::kernel::test_dependencies::{MockExplanationStore, MockGenerator, MockSearchService};
    use crate::kernel::TestDependencies;
    use explain_stream::{ContextLevel, Mode, PageMetadata};
    use std::time::Duration;

    const JSON_TOKENS: &[&str] = &[
        "Here you go: {\"summary\": \"Rates",
        " rose.\", \"keyPoints\": [\"a\", \"b\"],",
        " \"bottomLine\": \"Borrowing costs more.\"}",
    ];

    fn request(text: &str) -> ExplainRequest {
        ExplainRequest {
            text: text.to_string(),
            mode: Mode::Executive,
            context_level: ContextLevel::Standard,
            metadata: PageMetadata {
                url: Some("https://news.example.com/a".into()),
                domain: Some("news.example.com".into()),
                title: None,
            },
            redaction_enabled: true,
            context_snippet: None,
            expanded_context_enabled: None,
            conversation_id: None,
        }
    }

    fn auth() -> AuthContext {
        AuthContext {
            user_id: "user-1".into(),
            workspace_id: Some("ws-1".into()),
            method: AuthMethod::ExtensionToken,
        }
    }

    async fn run_to_end(deps: &TestDependencies, request: ExplainRequest) -> Vec<StreamFrame> {
        explain(deps.server_deps(), request, auth()).collect().await
    }

    fn done_payload(frames: &[StreamFrame]) -> &DonePayload {
        match frames.last() {
            Some(StreamFrame::Done(payload)) => payload,
            other => panic!("expected done frame, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_text_hashes_original() {
        let prepared = prepare_text(&request("mail a@b.com today"));
        assert!(!prepared.redacted.contains("a@b.com"));
        assert_eq!(prepared.replacements, 1);
        assert_eq!(prepared.text_hash, hash_text("mail a@b.com today"));

        let mut plain = request("mail a@b.com today");
        plain.redaction_enabled = false;
        assert_eq!(prepare_text(&plain).redacted, "mail a@b.com today");
    }

    #[tokio::test]
    async fn test_demo_mode_emits_canned_payload() {
        let deps = TestDependencies::new().demo();
        let frames = run_to_end(&deps, request("Some selected text")).await;

        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], StreamFrame::Delta { .. }));
        let done = done_payload(&frames);
        assert_eq!(done.json, Some(demo_explanation()));
        assert_eq!(done.text_hash, hash_text("Some selected text"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(deps.store.attempts(), 0);
        assert_eq!(deps.search.call_count(), 0);
    }

    #[tokio::test]
    async fn test_streams_tokens_then_structured_done() {
        let deps = TestDependencies::new()
            .with_generator(MockGenerator::new().with_tokens(JSON_TOKENS))
            .with_search(MockSearchService::new().with_result("", "https://src.example", &"x".repeat(400)));

        let frames = run_to_end(&deps, request("Rates rose, call me at a@b.com")).await;

        let deltas: Vec<&str> = frames
            .iter()
            .filter_map(|f| match f {
                StreamFrame::Delta { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, JSON_TOKENS);

        let done = done_payload(&frames);
        let json = done.json.as_ref().unwrap();
        assert_eq!(json.summary.as_deref(), Some("Rates rose."));
        assert_eq!(json.sources.len(), 1);
        assert_eq!(json.sources[0].title, "Untitled");
        assert_eq!(done.sources[0].content.len(), EXCERPT_CHARS);

        // Only redacted text leaves the server.
        assert!(!deps.search.queries()[0].contains("a@b.com"));
        let calls = deps.generator.calls();
        assert!(!calls[0].messages[1].content.contains("a@b.com"));
        assert!(calls[0].messages[1].content.contains("Relevant sources found"));

        assert_eq!(deps.store.wait_for_attempts(1).await, 1);
        let saved = deps.store.saved();
        assert_eq!(saved[0].user_id, "user-1");
        assert_eq!(saved[0].workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(saved[0].text_hash, done.text_hash);
        assert!(saved[0].response_json.is_object());
    }

    #[tokio::test]
    async fn test_unstructured_output_falls_back_to_raw() {
        let deps = TestDependencies::new()
            .without_retrieval()
            .with_generator(MockGenerator::new().with_tokens(&["Hel", "lo wo", "rld"]));

        let frames = run_to_end(&deps, request("Some text")).await;
        assert_eq!(frames.len(), 4);
        assert!(done_payload(&frames).json.is_none());

        assert_eq!(deps.store.wait_for_attempts(1).await, 1);
        assert_eq!(deps.store.saved()[0].response_json, Value::String("Hello world".into()));
    }

    #[tokio::test]
    async fn test_stored_text_matches_decoded_stream() {
        let deps = TestDependencies::new()
            .without_retrieval()
            .with_generator(MockGenerator::new().with_tokens(&["line one\r", "\nline two\r\n", "end\r"]));

        let frames = run_to_end(&deps, request("Some text")).await;
        let mut decoder = explain_stream::FrameDecoder::new();
        let wire: String = frames.iter().map(explain_stream::encode_frame).collect();
        let mut accumulator = explain_stream::ExplanationAccumulator::new();
        for frame in decoder.push(wire.as_bytes()) {
            accumulator.apply(frame);
        }

        assert_eq!(deps.store.wait_for_attempts(1).await, 1);
        assert_eq!(
            deps.store.saved()[0].response_json,
            Value::String(accumulator.text().to_string())
        );
        assert_eq!(accumulator.text(), "line one\n\nline two\nend\n");
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_not_fatal() {
        let deps = TestDependencies::new()
            .with_generator(MockGenerator::new().with_tokens(JSON_TOKENS))
            .with_search(MockSearchService::new().failing());

        let frames = run_to_end(&deps, request("Some text")).await;
        let done = done_payload(&frames);
        assert!(done.sources.is_empty());
        assert!(done.json.as_ref().unwrap().sources.is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_with_error_frame() {
        let deps = TestDependencies::new()
            .with_generator(MockGenerator::new().with_tokens(JSON_TOKENS).failing_after(2));

        let frames = run_to_end(&deps, request("Some text")).await;
        assert_eq!(frames.len(), 3);
        match &frames[2] {
            StreamFrame::Error { message } => assert!(message.contains("mid-stream")),
            other => panic!("expected error frame, got {:?}", other),
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(deps.store.attempts(), 0);
    }

    #[tokio::test]
    async fn test_rejected_generation_is_single_error_frame() {
        let deps = TestDependencies::new().with_generator(MockGenerator::new().failing_on_start());

        let frames = run_to_end(&deps, request("Some text")).await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], StreamFrame::Error { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_aborts_without_persisting() {
        let deps = TestDependencies::new()
            .with_generator(MockGenerator::new().with_tokens(JSON_TOKENS).hanging_after(1));

        let mut frames = explain(deps.server_deps(), request("Some text"), auth());
        assert!(matches!(frames.next().await, Some(StreamFrame::Delta { .. })));
        drop(frames);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(deps.store.attempts(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_surfaced() {
        let deps = TestDependencies::new()
            .with_generator(MockGenerator::new().with_tokens(JSON_TOKENS))
            .with_store(MockExplanationStore::new().failing());

        let frames = run_to_end(&deps, request("Some text")).await;
        assert!(matches!(frames.last(), Some(StreamFrame::Done(_))));
        assert_eq!(deps.store.wait_for_attempts(1).await, 1);
        assert!(deps.store.saved().is_empty());
    }
}
