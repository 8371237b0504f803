use std::sync::Arc;

use practice_core::model::{
    AnswerKey, DifficultyTier, ItemId, ItemKind, LearnerId, PracticeItem,
};
use practice_core::time::fixed_now;
use serde_json::json;
use services::{AssessmentService, ProviderError};
use services::assessment::{
    AssessmentOutcome, FixedQuota, HttpScoringOracle, HttpScrapeProvider, HttpSearchProvider,
    OracleConfig, ScoringOracle, ScrapeConfig, SearchConfig,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oracle_config(server: &MockServer) -> OracleConfig {
    OracleConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: "test-key".to_string(),
        model: "grader-1".to_string(),
    }
}

fn search_config(server: &MockServer) -> SearchConfig {
    SearchConfig {
        base_url: format!("{}/search", server.uri()),
        api_key: "search-key".to_string(),
        engine_id: "cx-1".to_string(),
        language: "en".to_string(),
    }
}

fn scrape_config(server: &MockServer) -> ScrapeConfig {
    ScrapeConfig {
        base_url: server.uri(),
    }
}

fn http_service(server: &MockServer, quota: Arc<FixedQuota>) -> AssessmentService {
    AssessmentService::new(
        Arc::new(HttpScoringOracle::new(Some(oracle_config(server)))),
        Arc::new(HttpSearchProvider::new(Some(search_config(server)))),
        Arc::new(HttpScrapeProvider::new(Some(scrape_config(server)))),
        quota,
    )
}

fn chat_body(content: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"content": content}}]})
}

fn free_text_item(kind: ItemKind, points: f64) -> PracticeItem {
    PracticeItem::new(
        ItemId::new(21),
        kind,
        "romanticism",
        DifficultyTier::new(3).unwrap(),
        points,
        "Discuss the image of exile in the ballad cycle.",
        Some("Ballads and Romances".to_string()),
        AnswerKey::FreeText {
            expected_concepts: vec!["exile".into(), "memory".into()],
            model_answer: None,
        },
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn research_grading_round_trips_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_string_contains("web search query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
            "romantic exile reference material",
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Respond with only a JSON object"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
            r#"{"score": 7.5, "isCorrect": true, "feedback": "Well grounded."}"#,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "romantic exile reference material"))
        .and(query_param("num", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "title": "Exile in the ballads",
                    "link": "https://letters.example/exile-essay",
                    "snippet": "On the exile motif."
                },
                {
                    "title": "Cycle commentary",
                    "link": "https://journal.example/ballads",
                    "snippet": "A survey of the cycle."
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "The ballad cycle frames exile as a wound that memory keeps open. "
                .repeat(5)
        })))
        .expect(2)
        .mount(&server)
        .await;

    let quota = Arc::new(FixedQuota::new(5));
    let service = http_service(&server, quota.clone());
    let learner = LearnerId::new(31);

    let graded = service
        .assess(
            learner,
            &free_text_item(ItemKind::SynthesisNote, 10.0),
            "The cycle treats exile as memory made landscape.",
        )
        .await
        .unwrap();

    assert_eq!(graded.outcome, AssessmentOutcome::ResearchSuccess);
    assert_eq!(graded.result.score, 7.5);
    assert!(graded.result.is_correct);
    assert_eq!(graded.result.citations.len(), 2);
    assert_eq!(
        graded.result.citations[0].url(),
        "https://letters.example/exile-essay"
    );
    assert_eq!(quota.used_by(learner), 1);
}

#[tokio::test]
async fn essay_breakdown_decodes_when_research_is_down() {
    let server = MockServer::start().await;

    // No query mock and a failing search backend: the pipeline degrades to a
    // direct essay assessment.
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Respond with only a JSON object"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
            r#"{"formalScore": 1, "literaryScore": 12, "compositionScore": 6,
                "languageScore": 9,
                "detailedFeedback": {"strengths": ["clear thesis"],
                                     "weaknesses": ["thin closing"],
                                     "suggestions": ["tighten the ending"]},
                "wordCount": 410}"#,
        )))
        .mount(&server)
        .await;

    let quota = Arc::new(FixedQuota::new(5));
    let service = http_service(&server, quota.clone());
    let learner = LearnerId::new(32);

    let graded = service
        .assess(
            learner,
            &free_text_item(ItemKind::Essay, 35.0),
            "An essay about exile and return.",
        )
        .await
        .unwrap();

    assert_eq!(graded.outcome, AssessmentOutcome::DegradedToDirect);
    assert_eq!(graded.result.score, 28.0);
    let essay = graded.result.essay.unwrap();
    assert_eq!(essay.literary, 12.0);
    assert_eq!(essay.total, 28.0);
    assert_eq!(essay.word_count, 410);
    assert_eq!(essay.strengths, vec!["clear thesis".to_string()]);
    assert_eq!(quota.used_by(learner), 3);
}

#[tokio::test]
async fn dead_oracle_hard_falls_back_without_billing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let quota = Arc::new(FixedQuota::new(5));
    let service = http_service(&server, quota.clone());
    let learner = LearnerId::new(33);

    let graded = service
        .assess(
            learner,
            &free_text_item(ItemKind::ShortAnswer, 2.0),
            "An answer nobody will grade.",
        )
        .await
        .unwrap();

    assert_eq!(graded.outcome, AssessmentOutcome::HardFallback);
    assert_eq!(graded.result.score, 0.0);
    assert_eq!(graded.result.max_score, 2.0);
    assert!(!graded.result.feedback.is_empty());
    assert_eq!(quota.used_by(learner), 0);
}

#[tokio::test]
async fn empty_completion_is_reported_as_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let oracle = HttpScoringOracle::new(Some(oracle_config(&server)));
    let err = oracle.complete("grade this").await.unwrap_err();
    assert!(matches!(err, ProviderError::EmptyResponse));
}
