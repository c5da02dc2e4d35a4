//! End-to-end serving over a real socket.

use std::time::Duration;

use axum::http::StatusCode;
use tokio::net::TcpListener;
use waypost::config::ServerConfig;
use waypost::http::HttpServer;
use waypost::lifecycle::Shutdown;
use waypost::{middleware, Engine};

mod common;

#[tokio::test]
async fn test_serve_and_graceful_shutdown() {
    let mut engine = Engine::new();
    engine.use_middleware([middleware::request_id()]);
    engine.get("/hello/{name}", |c| {
        Box::pin(async move {
            let text = format!("hello {}", c.path_value("name"));
            c.string(StatusCode::OK, &text)
        })
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        bind_address: addr.to_string(),
        request_timeout_secs: 5,
        shutdown_timeout_secs: 1,
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&engine, config);
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    let res = client
        .get(format!("http://{}/hello/world", addr))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hello world");

    let res = client
        .get(format!("http://{}/nowhere", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(engine.idle_contexts(), 1);
}

#[tokio::test]
async fn test_slow_request_times_out() {
    let engine = Engine::new();
    engine.get("/slow", |c| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            c.string(StatusCode::OK, "late")
        })
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        bind_address: addr.to_string(),
        request_timeout_secs: 1,
        shutdown_timeout_secs: 1,
    };

    let shutdown = Shutdown::new();
    let served = engine.serve(listener, config, shutdown.subscribe());
    let client = async {
        let res = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get(format!("http://{}/slow", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 408);

        // The timed-out handler was dropped mid-flight; its context is back.
        assert_eq!(engine.idle_contexts(), 1);
        shutdown.trigger();
    };

    let (served, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(served, client)
    })
    .await
    .expect("server did not stop");
    assert!(served.is_ok());
}
