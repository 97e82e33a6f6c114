mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/health")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Server is running");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_return_the_error_envelope() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/v1/does-not-exist")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["errorMessages"][0]["message"], "API Not Found");
    Ok(())
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, server.url("/api/v1/courses"))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await?;

    assert_eq!(
        res.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
    Ok(())
}
