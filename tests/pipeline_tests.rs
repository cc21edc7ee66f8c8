//! Integration tests for synergy analysis and priority scoring.
//!
//! The reasoning gateway is replaced by a scripted one so every response,
//! failure and delay is deterministic.

use std::sync::Arc;
use std::time::Duration;
use synergy_board::board::Board;
use synergy_board::context::{NO_ACTIVE_TASKS_MESSAGE, NO_TASKS_MESSAGE};
use synergy_board::db::Database;
use synergy_board::error::ErrorCode;
use synergy_board::gateway::{GatewayError, ReasoningGateway, ScriptedGateway};
use synergy_board::pipeline::{PRIORITIES_CALCULATED, Pipeline};
use synergy_board::prompts::PromptKind;
use synergy_board::types::{NewProject, NewTask, PriorityUpdate, TaskStatus};
use synergy_board::validate::RejectReason;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

struct Fixture {
    board: Board,
    owner: i64,
    outsider: i64,
    project_id: i64,
}

impl Fixture {
    fn new() -> Self {
        let board = Board::new(Arc::new(setup_db()));
        let owner = board.register("ana", "hash", "Backend Developer").unwrap().id;
        let outsider = board.register("eve", "hash", "QA").unwrap().id;
        let project_id = board
            .create_project(
                owner,
                &NewProject {
                    name: Some("Apollo".to_string()),
                    ..NewProject::default()
                },
            )
            .unwrap()
            .id;
        Self {
            board,
            owner,
            outsider,
            project_id,
        }
    }

    fn add_task(&self, content: &str) -> i64 {
        self.add_task_to(self.project_id, content)
    }

    fn add_task_to(&self, project_id: i64, content: &str) -> i64 {
        self.board
            .add_task(
                self.owner,
                project_id,
                &NewTask {
                    content: Some(content.to_string()),
                    assignee_id: Some(self.owner),
                    due_date: Some("2030-01-01".to_string()),
                },
            )
            .unwrap()
            .id
    }

    fn pipeline(&self, gateway: &Arc<ScriptedGateway>) -> Pipeline {
        self.pipeline_with_timeout(gateway, TIMEOUT)
    }

    fn pipeline_with_timeout(&self, gateway: &Arc<ScriptedGateway>, timeout: Duration) -> Pipeline {
        let shared: Arc<dyn ReasoningGateway> = gateway.clone();
        Pipeline::new(self.board.clone(), Some(shared), timeout)
    }

    fn priorities(&self) -> Vec<(i64, i32)> {
        self.board
            .db()
            .list_project_tasks(self.project_id)
            .unwrap()
            .into_iter()
            .map(|t| (t.task.id, t.task.priority))
            .collect()
    }
}

mod synergy_tests {
    use super::*;

    #[tokio::test]
    async fn empty_project_returns_canned_text_without_gateway_call() {
        let fx = Fixture::new();
        let gateway = Arc::new(ScriptedGateway::new());

        let report = fx.pipeline(&gateway).synergy(fx.owner, fx.project_id).await.unwrap();

        assert_eq!(report.analysis, NO_TASKS_MESSAGE);
        assert!(!report.from_gateway);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_project_needs_no_configured_gateway() {
        let fx = Fixture::new();
        let pipeline = Pipeline::new(fx.board.clone(), None, TIMEOUT);

        let report = pipeline.synergy(fx.owner, fx.project_id).await.unwrap();
        assert_eq!(report.analysis, NO_TASKS_MESSAGE);
    }

    #[tokio::test]
    async fn analysis_is_passed_through() {
        let fx = Fixture::new();
        fx.add_task("Design login page");
        let gateway = Arc::new(ScriptedGateway::new().with_response("### Skill Mismatch\n- ana"));

        let report = fx.pipeline(&gateway).synergy(fx.owner, fx.project_id).await.unwrap();

        assert_eq!(report.analysis, "### Skill Mismatch\n- ana");
        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, PromptKind::Synergy);
        assert!(calls[0].prompt.contains("Design login page"));
        assert!(calls[0].prompt.contains("Backend Developer"));
    }

    #[tokio::test]
    async fn blank_analysis_is_invalid() {
        let fx = Fixture::new();
        fx.add_task("Design login page");
        let gateway = Arc::new(ScriptedGateway::new().with_response("   "));

        let err = fx
            .pipeline(&gateway)
            .synergy(fx.owner, fx.project_id)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResponseInvalid);
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_unavailable() {
        let fx = Fixture::new();
        fx.add_task("Design login page");
        let pipeline = Pipeline::new(fx.board.clone(), None, TIMEOUT);

        let err = pipeline.synergy(fx.owner, fx.project_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::GatewayUnavailable);
    }

    #[tokio::test]
    async fn gateway_failures_map_to_codes() {
        let fx = Fixture::new();
        fx.add_task("Design login page");
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_error(GatewayError::Failed("HTTP 500".to_string()))
                .with_error(GatewayError::Unavailable("connect refused".to_string())),
        );
        let pipeline = fx.pipeline(&gateway);

        let first = pipeline.synergy(fx.owner, fx.project_id).await.unwrap_err();
        let second = pipeline.synergy(fx.owner, fx.project_id).await.unwrap_err();

        assert_eq!(first.code, ErrorCode::GatewayError);
        assert_eq!(second.code, ErrorCode::GatewayUnavailable);
    }
}

mod priority_tests {
    use super::*;

    #[tokio::test]
    async fn all_done_returns_canned_text_without_gateway_call() {
        let fx = Fixture::new();
        let id = fx.add_task("Build API");
        fx.board.move_task(fx.owner, id, "Done").unwrap();
        let gateway = Arc::new(ScriptedGateway::new());

        let report = fx
            .pipeline(&gateway)
            .prioritize(fx.owner, fx.project_id)
            .await
            .unwrap();

        assert_eq!(report.message, NO_ACTIVE_TASKS_MESSAGE);
        assert!(report.priorities.is_empty());
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn foreign_id_is_reported_and_known_id_applied() {
        let fx = Fixture::new();
        let api = fx.add_task("Build API");
        let gateway = Arc::new(ScriptedGateway::new().with_response(format!(
            r#"[{{"task_id": {}, "priority": 95}}, {{"task_id": 999, "priority": 10}}]"#,
            api
        )));

        let report = fx
            .pipeline(&gateway)
            .prioritize(fx.owner, fx.project_id)
            .await
            .unwrap();

        assert_eq!(report.message, PRIORITIES_CALCULATED);
        assert_eq!(report.priorities, vec![PriorityUpdate { task_id: api, priority: 95 }]);
        assert_eq!(report.rejected_count, 1);
        assert_eq!(report.rejected[0].task_id, 999);
        assert_eq!(report.rejected[0].reason, RejectReason::UnknownTask);
        assert_eq!(fx.priorities(), vec![(api, 95)]);
    }

    #[tokio::test]
    async fn tasks_changed_while_scoring_are_rejected() {
        let fx = Fixture::new();
        let a = fx.add_task("Build API");
        let b = fx.add_task("Write docs");
        let c = fx.add_task("Ship release");
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_response(format!(
                    r#"[{{"task_id": {}, "priority": 95}}, {{"task_id": {}, "priority": 10}}, {{"task_id": {}, "priority": 40}}]"#,
                    a, b, c
                ))
                .with_delay(Duration::from_millis(100)),
        );
        let pipeline = fx.pipeline(&gateway);

        let (report, _) = tokio::join!(pipeline.prioritize(fx.owner, fx.project_id), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            fx.board.delete_task(fx.owner, b).unwrap();
            fx.board.move_task(fx.owner, c, "Done").unwrap();
        });

        let report = report.unwrap();
        assert_eq!(report.priorities, vec![PriorityUpdate { task_id: a, priority: 95 }]);
        assert_eq!(report.rejected_count, 2);
        let reasons: Vec<_> = report.rejected.iter().map(|r| (r.task_id, r.reason)).collect();
        assert!(reasons.contains(&(b, RejectReason::UnknownTask)));
        assert!(reasons.contains(&(c, RejectReason::InactiveTask)));
        assert_eq!(fx.priorities(), vec![(a, 95), (c, 50)]);
    }

    #[tokio::test]
    async fn fenced_response_is_accepted() {
        let fx = Fixture::new();
        let api = fx.add_task("Build API");
        let ui = fx.add_task("Design login page");
        let gateway = Arc::new(ScriptedGateway::new().with_response(format!(
            "```json\n[{{\"task_id\": {}, \"priority\": 92}}, {{\"task_id\": {}, \"priority\": 40}}]\n```",
            api, ui
        )));

        fx.pipeline(&gateway)
            .prioritize(fx.owner, fx.project_id)
            .await
            .unwrap();

        assert_eq!(fx.priorities(), vec![(api, 92), (ui, 40)]);
    }

    #[tokio::test]
    async fn invalid_json_writes_nothing() {
        let fx = Fixture::new();
        fx.add_task("Build API");
        fx.add_task("Design login page");
        let before = fx.priorities();
        let gateway = Arc::new(
            ScriptedGateway::new().with_response("Here are your priorities: API first, then UI."),
        );

        let err = fx
            .pipeline(&gateway)
            .prioritize(fx.owner, fx.project_id)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ResponseInvalid);
        assert_eq!(fx.priorities(), before);
    }

    #[tokio::test]
    async fn out_of_range_scores_are_rejected_not_clamped() {
        let fx = Fixture::new();
        let a = fx.add_task("Build API");
        let b = fx.add_task("Design login page");
        let gateway = Arc::new(ScriptedGateway::new().with_response(format!(
            r#"[{{"task_id": {}, "priority": 150}}, {{"task_id": {}, "priority": 0}}]"#,
            a, b
        )));

        let report = fx
            .pipeline(&gateway)
            .prioritize(fx.owner, fx.project_id)
            .await
            .unwrap();

        assert!(report.priorities.is_empty());
        assert_eq!(report.rejected_count, 2);
        assert!(report
            .rejected
            .iter()
            .all(|r| r.reason == RejectReason::OutOfRange));
        assert_eq!(fx.priorities(), vec![(a, 50), (b, 50)]);
    }

    #[tokio::test]
    async fn done_tasks_are_neither_sent_nor_rescored() {
        let fx = Fixture::new();
        let active = fx.add_task("Build API");
        let done = fx.add_task("Ship launch party");
        fx.board.move_task(fx.owner, done, "Done").unwrap();
        let gateway = Arc::new(ScriptedGateway::new().with_response(format!(
            r#"[{{"task_id": {}, "priority": 90}}, {{"task_id": {}, "priority": 99}}]"#,
            active, done
        )));

        let report = fx
            .pipeline(&gateway)
            .prioritize(fx.owner, fx.project_id)
            .await
            .unwrap();

        let prompt = &gateway.calls()[0].prompt;
        assert!(prompt.contains("Build API"));
        assert!(!prompt.contains("Ship launch party"));
        assert_eq!(report.rejected[0].reason, RejectReason::InactiveTask);
        assert_eq!(fx.priorities(), vec![(active, 90), (done, 50)]);
        assert_eq!(
            fx.board.db().get_task(done).unwrap().unwrap().status,
            TaskStatus::Done
        );
    }

    #[tokio::test]
    async fn repeated_batch_is_idempotent() {
        let fx = Fixture::new();
        let api = fx.add_task("Build API");
        let response = format!(r#"[{{"task_id": {}, "priority": 77}}]"#, api);
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_response(response.clone())
                .with_response(response),
        );
        let pipeline = fx.pipeline(&gateway);

        pipeline.prioritize(fx.owner, fx.project_id).await.unwrap();
        let first = fx.priorities();
        pipeline.prioritize(fx.owner, fx.project_id).await.unwrap();

        assert_eq!(first, vec![(api, 77)]);
        assert_eq!(fx.priorities(), first);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_unavailable() {
        let fx = Fixture::new();
        let api = fx.add_task("Build API");
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_response(format!(r#"[{{"task_id": {}, "priority": 99}}]"#, api))
                .with_delay(Duration::from_millis(500)),
        );

        let err = fx
            .pipeline_with_timeout(&gateway, Duration::from_millis(20))
            .prioritize(fx.owner, fx.project_id)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::GatewayUnavailable);
        assert_eq!(fx.priorities(), vec![(api, 50)]);
    }

    #[tokio::test]
    async fn same_project_runs_are_serialized() {
        let fx = Fixture::new();
        let api = fx.add_task("Build API");
        let response = format!(r#"[{{"task_id": {}, "priority": 60}}]"#, api);
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_response(response.clone())
                .with_response(response)
                .with_delay(Duration::from_millis(50)),
        );
        let pipeline = fx.pipeline(&gateway);

        let (a, b) = tokio::join!(
            pipeline.prioritize(fx.owner, fx.project_id),
            pipeline.prioritize(fx.owner, fx.project_id),
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(gateway.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn different_projects_may_overlap() {
        let fx = Fixture::new();
        let other = fx
            .board
            .create_project(
                fx.owner,
                &NewProject {
                    name: Some("Gemini".to_string()),
                    ..NewProject::default()
                },
            )
            .unwrap()
            .id;
        fx.add_task("Build API");
        fx.add_task_to(other, "Build UI");
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_response("[]")
                .with_response("[]")
                .with_delay(Duration::from_millis(50)),
        );
        let pipeline = fx.pipeline(&gateway);

        let (a, b) = tokio::join!(
            pipeline.prioritize(fx.owner, fx.project_id),
            pipeline.prioritize(fx.owner, other),
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(gateway.max_in_flight(), 2);
    }
}

mod access_tests {
    use super::*;

    #[tokio::test]
    async fn non_member_is_rejected_before_gateway() {
        let fx = Fixture::new();
        fx.add_task("Build API");
        let gateway = Arc::new(ScriptedGateway::new().with_response("[]"));
        let pipeline = fx.pipeline(&gateway);

        let synergy = pipeline.synergy(fx.outsider, fx.project_id).await.unwrap_err();
        let scoring = pipeline.prioritize(fx.outsider, fx.project_id).await.unwrap_err();

        assert_eq!(synergy.code, ErrorCode::AuthorizationError);
        assert_eq!(scoring.code, ErrorCode::AuthorizationError);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let fx = Fixture::new();
        let gateway = Arc::new(ScriptedGateway::new());

        let err = fx
            .pipeline(&gateway)
            .prioritize(fx.owner, fx.project_id + 1)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProjectNotFound);
    }
}
