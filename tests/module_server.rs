//! Module server tests over real sockets.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use routekit::lifecycle::Shutdown;

mod common;

#[tokio::test]
async fn test_port_retry_and_serving() {
    let dir = tempfile::tempdir().unwrap();
    common::write_fixture(
        dir.path(),
        &[
            ("routekit.toml", &common::project_config(38610)),
            ("routes/index.tsx", "import { a } from \"../lib/a.ts\";\nexport default a;\n"),
            ("lib/a.ts", "export const a = 1;\n"),
        ],
    );

    // Hold the configured port so the server has to move up.
    let _taken = TcpListener::bind("127.0.0.1:38610").await.unwrap();

    let ctx = common::context(dir.path(), Arc::new(common::TestCache::new(common::framework_modules())));
    let server = common::server(&ctx);
    let (listener, port) = server.listen().await.unwrap();
    assert!(port > 38610);
    assert_eq!(ctx.modules_port(), port);

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let res = client
        .get(format!("http://127.0.0.1:{}/routes/index.tsx", port))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert!(res.headers().contains_key("x-request-id"));
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("application/javascript"));
    let body = res.text().await.unwrap();
    assert!(body.contains("from \"/lib/a.ts?v="));

    let record = ctx.graph().get("./routes/index.tsx").unwrap();
    assert_eq!(record.deps, vec!["./lib/a.ts"]);

    let res = client
        .get(format!("http://127.0.0.1:{}/routes/missing.tsx", port))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_listener() {
    let dir = tempfile::tempdir().unwrap();
    common::write_fixture(dir.path(), &[("routekit.toml", &common::project_config(38620))]);

    let ctx = common::context(dir.path(), Arc::new(common::TestCache::new(Default::default())));
    let server = common::server(&ctx);
    let (listener, port) = server.listen().await.unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok());

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err());
}
