//! Cache reconciliation integration tests
//!
//! Drives the task cache through the MCP tool surface against a mock
//! TickTick server: refresh, partial failure, write-through and persistence.

use mockito::{Mock, Server, ServerGuard};
use rmcp::handler::server::wrapper::Parameters;
use serde_json::Value;
use tempfile::TempDir;
use ticktick_mcp::cache::TaskCache;
use ticktick_mcp::config::Config;
use ticktick_mcp::format::ResponseFormat;
use ticktick_mcp::server::TickTickMcpServer;
use ticktick_mcp::server::params::{CacheTaskIdParams, FormatParams, TaskRefParams};

fn config(dir: &TempDir, url: &str) -> Config {
    let mut config = Config::default();
    config.api.v1_base_url = format!("{}/open/v1", url);
    config.api.v2_base_url = format!("{}/api/v2", url);
    config.api.retry_count = 0;
    config.api.retry_delay_ms = 1;
    config.auth.token_dir = dir.path().join("tokens");
    config.auth.access_token = Some("static-token".to_string());
    config.cache.path = dir.path().join("cache.json");
    config.cache.auto_refresh = false;
    config
}

fn json() -> Parameters<FormatParams> {
    Parameters(FormatParams {
        response_format: ResponseFormat::Json,
    })
}

async fn project_data(server: &mut ServerGuard, project_id: &str, body: &str) -> Mock {
    server
        .mock("GET", format!("/open/v1/project/{}/data", project_id).as_str())
        .with_status(200)
        .with_body(body)
        .create_async()
        .await
}

/// Integration test: refresh adds new tasks, drops vanished ones, keeps failed projects
#[tokio::test]
async fn test_refresh_reconciles_with_partial_failure() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let _projects = server
        .mock("GET", "/open/v1/project")
        .with_status(200)
        .with_body(r#"[{"id":"p1","name":"Work"},{"id":"p2","name":"Home"}]"#)
        .create_async()
        .await;
    let _inbox = project_data(&mut server, "inbox", r#"{"tasks":[]}"#).await;
    let _p1 = project_data(
        &mut server,
        "p1",
        r#"{"tasks":[
            {"id":"t1","projectId":"p1","title":"Write report","priority":5,"tags":["work"]},
            {"id":"done","projectId":"p1","title":"Old","status":2}
        ]}"#,
    )
    .await;
    let _p2 = server
        .mock("GET", "/open/v1/project/p2/data")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let mcp = TickTickMcpServer::from_config(&config(&dir, &server.url())).unwrap();
    {
        let mut cache = mcp.services().cache.write().await;
        cache.register("gone", "p1", "Deleted remotely", 0, vec![], None).unwrap();
        cache.register("h1", "p2", "Water plants", 1, vec![], None).unwrap();
    }

    let out = mcp.cache_refresh(json()).await;
    let report: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["added"], 1);
    assert_eq!(report["removed"], 1);
    assert_eq!(report["failed_projects"], serde_json::json!(["p2"]));

    let cache = mcp.services().cache.read().await;
    assert!(cache.get("t1").is_some());
    assert!(cache.get("h1").is_some(), "entries of a failed project are kept");
    assert!(cache.get("gone").is_none());
    assert!(cache.get("done").is_none(), "completed tasks are not cached");
    assert!(cache.last_refresh().is_some());
}

/// Integration test: a failed project listing leaves the cache untouched
#[tokio::test]
async fn test_refresh_aborts_when_projects_fail() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let _projects = server
        .mock("GET", "/open/v1/project")
        .with_status(500)
        .create_async()
        .await;

    let mcp = TickTickMcpServer::from_config(&config(&dir, &server.url())).unwrap();
    mcp.services()
        .cache
        .write()
        .await
        .register("t1", "p1", "Keep me", 0, vec![], None)
        .unwrap();

    let out = mcp.cache_refresh(Parameters(FormatParams::default())).await;
    assert!(out.starts_with("**Error**"), "unexpected output: {}", out);

    let cache = mcp.services().cache.read().await;
    assert_eq!(cache.len(), 1);
    assert!(cache.last_refresh().is_none());
}

/// Integration test: completing a task through the tools removes it from the cache
#[tokio::test]
async fn test_complete_writes_through() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let complete = server
        .mock("POST", "/open/v1/project/p1/task/t1/complete")
        .with_status(200)
        .create_async()
        .await;

    let mcp = TickTickMcpServer::from_config(&config(&dir, &server.url())).unwrap();
    mcp.services()
        .cache
        .write()
        .await
        .register("t1", "p1", "Ship it", 3, vec![], None)
        .unwrap();

    let out = mcp
        .complete_task(Parameters(TaskRefParams {
            task_id: "t1".to_string(),
            project_id: None,
            response_format: ResponseFormat::Markdown,
        }))
        .await;
    complete.assert_async().await;
    assert_eq!(out, "Task `t1` completed");

    let out = mcp
        .cache_get(Parameters(CacheTaskIdParams {
            task_id: "t1".to_string(),
            response_format: ResponseFormat::Markdown,
        }))
        .await;
    assert!(out.starts_with("**Error**: Not found"));
}

/// Integration test: the cache file survives a restart
#[tokio::test]
async fn test_cache_persists_across_servers() {
    let server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = config(&dir, &server.url());

    {
        let mcp = TickTickMcpServer::from_config(&config).unwrap();
        mcp.services()
            .cache
            .write()
            .await
            .register("t9", "p3", "Renew passport", 5, vec!["errands".to_string()], None)
            .unwrap();
    }

    let reopened = TaskCache::open(&config.cache.path);
    let entry = reopened.get("t9").unwrap();
    assert_eq!(entry.project_id, "p3");
    assert_eq!(entry.tags, vec!["errands".to_string()]);
}
