//! Context helpers: parameters, JSON binding and response writers.

use std::io::Write;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde::{Deserialize, Serialize};
use waypost::{BoxError, Engine, Renderer};

mod common;

#[derive(Debug, Deserialize, Serialize)]
struct User {
    name: String,
    age: u32,
}

fn user_engine() -> Engine {
    let engine = Engine::new();
    engine.post("/users", |c| {
        Box::pin(async move {
            let user: User = c.bind_json().await?;
            c.json(&user)
        })
    });
    engine
}

#[tokio::test]
async fn test_path_value() {
    let engine = Engine::new();
    engine.get("/users/{id}/posts/{post}", |c| {
        Box::pin(async move {
            let text = format!(
                "{}:{}:{:?}",
                c.path_value("id"),
                c.path_value("post"),
                c.path_value("nope")
            );
            c.string(StatusCode::OK, &text)
        })
    });

    let res = common::get(engine.router(), "/users/42/posts/7").await;
    assert_eq!(res.body, "42:7:\"\"");
}

#[tokio::test]
async fn test_query_params() {
    let engine = Engine::new();
    engine.get("/q", |c| {
        Box::pin(async move {
            let text = format!(
                "x={:?} missing={:?} y={:?} has_x={} has_z={} enc={:?}",
                c.query_param("x", "dflt"),
                c.query_param("missing", "dflt"),
                c.query_values("y"),
                c.has_query_param("x"),
                c.has_query_param("z"),
                c.query_param("enc", ""),
            );
            c.string(StatusCode::OK, &text)
        })
    });

    let res = common::get(engine.router(), "/q?x=&y=1&y=2&enc=a%20b+c").await;
    assert_eq!(
        res.body,
        "x=\"\" missing=\"dflt\" y=[\"1\", \"2\"] has_x=true has_z=false enc=\"a b c\""
    );
}

#[tokio::test]
async fn test_bind_json_valid() {
    let res = common::post_json(
        user_engine().router(),
        "/users",
        r#"{"name":"ada","age":36}"#,
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, r#"{"name":"ada","age":36}"#);
    assert_eq!(res.header("content-type"), Some("application/json; charset=utf-8"));
}

#[tokio::test]
async fn test_bind_json_rejections() {
    let cases = [
        ("unknown field", r#"{"name":"ada","age":36,"email":"a@b.c"}"#),
        ("trailing data", r#"{"name":"ada","age":36} {"name":"bob","age":1}"#),
        ("type mismatch", r#"{"name":"ada","age":"old"}"#),
        ("malformed", r#"{"name":"ada","#),
        ("empty body", ""),
    ];

    for (case, body) in cases {
        let res = common::post_json(user_engine().router(), "/users", body).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{}", case);
        assert_eq!(res.body, "Bad Request\n", "{}", case);
    }
}

#[tokio::test]
async fn test_bind_json_cause_is_logged() {
    let (logs, _guard) = common::capture_logs();
    let res = common::post_json(
        user_engine().router(),
        "/users",
        r#"{"name":"ada","age":36,"email":"a@b.c"}"#,
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let lines = logs.lines_with("request error");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("code=400"));
    assert!(lines[0].contains("email"));
}

#[tokio::test]
async fn test_string_and_no_content() {
    let engine = Engine::new();
    engine.put("/created", |c| Box::pin(async move { c.string(StatusCode::CREATED, "made") }));
    engine.delete("/gone", |c| Box::pin(async move { c.no_content(StatusCode::NO_CONTENT) }));

    let router = engine.router();
    let req = Request::put("/created").body(Body::empty()).unwrap();
    let res = common::send(router.clone(), req).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body, "made");

    let req = Request::delete("/gone").body(Body::empty()).unwrap();
    let res = common::send(router, req).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_empty());
}

#[tokio::test]
async fn test_html_and_raw() {
    let engine = Engine::new();
    engine.get("/page", |c| Box::pin(async move { c.html("<p>hi</p>") }));
    engine.get("/bytes", |c| Box::pin(async move { c.raw(&[0x68, 0x69]) }));

    let router = engine.router();
    let res = common::get(router.clone(), "/page").await;
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(res.body, "<p>hi</p>");

    let res = common::get(router, "/bytes").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, "hi");
    assert!(res.header("content-type").is_none());
}

#[tokio::test]
async fn test_json_serialization_failure_is_500() {
    use std::collections::HashMap;

    let engine = Engine::new();
    engine.get("/bad-json", |c| {
        Box::pin(async move {
            // Non-string map keys cannot be encoded as JSON.
            let mut map = HashMap::new();
            map.insert(vec![1u8], 1u8);
            c.json(&map)
        })
    });

    let res = common::get(engine.router(), "/bad-json").await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_redirect_relative() {
    let engine = Engine::new();
    engine.get("/a/b/c", |c| Box::pin(async move { c.redirect(StatusCode::FOUND, "../d?x=1") }));

    let res = common::get(engine.router(), "/a/b/c").await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.header("location"), Some("/a/d?x=1"));
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(res.body, "<a href=\"/a/d?x=1\">Found</a>.\n\n");
}

#[tokio::test]
async fn test_redirect_post_has_no_body() {
    let engine = Engine::new();
    engine.post("/form", |c| {
        Box::pin(async move { c.redirect(StatusCode::SEE_OTHER, "https://example.com/done") })
    });

    let req = Request::post("/form").body(Body::empty()).unwrap();
    let res = common::send(engine.router(), req).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(res.header("location"), Some("https://example.com/done"));
    assert!(res.body.is_empty());
}

struct Greeting;

impl Renderer for Greeting {
    fn render(&self, out: &mut dyn Write, name: &str, data: &serde_json::Value) -> Result<(), BoxError> {
        if name != "greeting" {
            return Err(format!("no template named {}", name).into());
        }
        write!(out, "<h1>Hello, {}</h1>", data["who"].as_str().unwrap_or("stranger"))?;
        Ok(())
    }
}

#[tokio::test]
async fn test_view_through_renderer() {
    let engine = Engine::new();
    engine.set_renderer(Greeting);
    engine.get("/hi", |c| {
        Box::pin(async move { c.view("greeting", &serde_json::json!({ "who": "ada" })) })
    });
    engine.get("/unknown", |c| Box::pin(async move { c.view("nope", &()) }));

    let router = engine.router();
    let res = common::get(router.clone(), "/hi").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(res.body, "<h1>Hello, ada</h1>");

    let res = common::get(router, "/unknown").await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_view_without_renderer() {
    let engine = Engine::new();
    engine.get("/hi", |c| Box::pin(async move { c.view("greeting", &()) }));

    let res = common::get(engine.router(), "/hi").await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body, "Internal Server Error\n");
}

#[tokio::test]
async fn test_request_scoped_values() {
    struct Tenant;
    impl waypost::ContextKey for Tenant {
        type Value = String;
    }

    let engine = Engine::new();
    engine.get("/tenant", |c| {
        Box::pin(async move {
            let before = c.get::<Tenant>().is_none();
            c.put::<Tenant>("acme".to_owned());
            c.put::<Tenant>("globex".to_owned());
            let text = format!("{} {}", before, c.get::<Tenant>().map_or("", String::as_str));
            c.string(StatusCode::OK, &text)
        })
    });

    let res = common::get(engine.router(), "/tenant").await;
    assert_eq!(res.body, "true globex");
}
