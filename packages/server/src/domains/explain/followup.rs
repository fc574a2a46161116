use tracing::info;

use super::demo::DEMO_FOLLOWUP_ANSWER;
use super::error::{ExplainError, Result};
use super::prompts;
use crate::common::{redact, FollowupRequest};
use crate::kernel::ServerDeps;

/// Answer a question about an explanation the user has already seen.
pub async fn answer_followup(deps: &ServerDeps, request: FollowupRequest) -> Result<String> {
    let Some(generator) = &deps.generator else {
        return Ok(DEMO_FOLLOWUP_ANSWER.to_string());
    };

    let original = redact(&request.original_text).redacted;
    info!(
        conversation_id = %request.conversation_id,
        question_len = request.question.len(),
        "follow-up question"
    );

    let chat = prompts::followup_chat_request(
        &deps.models.followup_model,
        &request.prior_answer_json,
        &original,
        &request.question,
    );
    generator
        .complete(chat)
        .await
        .map_err(|e| ExplainError::Backend(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FOLLOWUP_MODEL;
    use crate::kernel::test_dependencies::MockGenerator;
    use crate::kernel::TestDependencies;
    use serde_json::json;

    fn followup() -> FollowupRequest {
        FollowupRequest {
            conversation_id: "c1".into(),
            question: "What does this mean for savers?".into(),
            prior_answer_json: json!({"summary": "Rates rose."}),
            original_text: "Rates rose. Contact a@b.com".into(),
        }
    }

    #[tokio::test]
    async fn test_followup_uses_followup_model_and_redacts() {
        let deps = TestDependencies::new()
            .with_generator(MockGenerator::new().with_completion("- Savers earn more"));

        let answer = answer_followup(&deps.server_deps(), followup()).await.unwrap();
        assert_eq!(answer, "- Savers earn more");

        let calls = deps.generator.calls();
        assert_eq!(calls[0].model, DEFAULT_FOLLOWUP_MODEL);
        let user = &calls[0].messages[1].content;
        assert!(user.starts_with("Prior answer: {\"summary\":\"Rates rose.\"}"));
        assert!(user.ends_with("Question: What does this mean for savers?"));
        assert!(!user.contains("a@b.com"));
    }

    #[tokio::test]
    async fn test_followup_in_demo_mode() {
        let deps = TestDependencies::new().demo();
        let answer = answer_followup(&deps.server_deps(), followup()).await.unwrap();
        assert_eq!(answer, DEMO_FOLLOWUP_ANSWER);
        assert_eq!(deps.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_followup_backend_failure() {
        let deps = TestDependencies::new().with_generator(MockGenerator::new().failing_on_start());
        let err = answer_followup(&deps.server_deps(), followup()).await.unwrap_err();
        assert!(matches!(err, ExplainError::Backend(_)));
    }
}
