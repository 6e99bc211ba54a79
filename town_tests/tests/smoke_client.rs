use town_client::{api::LoginError, GameClient};
use town_shared::{config::ClientConfig, error::AuthError, render::RecordingRenderer};
use town_tests::{
    bind_ephemeral, client_config, init_tracing, stub_deps, MemoryAssets, StubApi,
};

/// Smoke test: a rejected token stops startup before any socket is opened.
#[tokio::test]
async fn rejected_token_fails_start() -> anyhow::Result<()> {
    init_tracing();
    let cfg = ClientConfig {
        token: Some("expired".into()),
        ..Default::default()
    };
    let (deps, assets) = stub_deps(StubApi::default(), MemoryAssets::default());

    let err = GameClient::start(&cfg, deps).await.err().expect("start should fail");
    assert!(matches!(
        err.downcast_ref::<LoginError>(),
        Some(LoginError::Auth(AuthError::Rejected(_)))
    ));
    assert_eq!(assets.total_fetches(), 0);
    Ok(())
}

#[tokio::test]
async fn no_token_anywhere_fails_start() -> anyhow::Result<()> {
    let (deps, _) = stub_deps(StubApi::default(), MemoryAssets::default());
    let err = GameClient::start(&ClientConfig::default(), deps)
        .await
        .err()
        .expect("start should fail");
    assert_eq!(err.downcast_ref::<AuthError>(), Some(&AuthError::MissingToken));
    Ok(())
}

/// Smoke test: a missing item texture still leaves a drawable frame.
#[tokio::test]
async fn missing_texture_draws_fallback() -> anyhow::Result<()> {
    init_tracing();
    let server = bind_ephemeral().await?;
    let cfg = client_config(server.addr());
    let accept = tokio::spawn(async move { server.accept_join().await.map(|(conn, _)| conn) });

    let (deps, _) = stub_deps(
        StubApi::default(),
        MemoryAssets::with_missing(&["items/tree.png"]),
    );
    let client = GameClient::start(&cfg, deps).await?;
    let _conn = accept.await??;

    let (w, h) = client.config.canvas_size();
    let mut renderer = RecordingRenderer::new(w, h);
    client.draw(&mut renderer);

    let images: Vec<&str> = renderer.images().into_iter().map(|(a, _, _)| a).collect();
    assert!(images.contains(&"scenes/grass.png"));
    assert!(!images.contains(&"items/tree.png"));
    assert!(renderer.texts().contains(&"Kim"));
    Ok(())
}
