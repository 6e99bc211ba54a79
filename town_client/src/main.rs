//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p town_client -- [--addr 127.0.0.1:5001] [--api http://127.0.0.1:5000]
//!       [--token demo-token-123] [--name Kim] [--sprite char4.png]
//!       [--assets ./static/assets] [--storage .aitown] [--config client.json]
//!
//! The client logs in, joins the game and runs the frame loop headless,
//! drawing into a recording backend. Keyboard and UI input come from
//! console commands:
//!   press <key> / release <key> - Hold or release up/down/left/right/w/a/s/d
//!   interact                    - Interact with the first item in reach
//!   say <message>               - Send a chat message
//!   focus / blur                - Focus or blur the chat input
//!   bag                         - List bag slots
//!   music                       - Toggle background music
//!   status                      - Show client status
//!   quit                        - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::sync::mpsc;
use town_client::{ClientDeps, GameClient};
use town_shared::{config::ClientConfig, render::RecordingRenderer};
use tracing::info;

fn parse_args() -> anyhow::Result<ClientConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {path}"))?;
            ClientConfig::from_json_str(&raw).with_context(|| format!("parse config {path}"))?
        }
        _ => ClientConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--addr", Some(v)) => cfg.server_addr = v,
            ("--api", Some(v)) => cfg.api_base = v,
            ("--assets", Some(v)) => cfg.asset_dir = Some(v),
            ("--storage", Some(v)) => cfg.storage_dir = v,
            ("--token", Some(v)) => cfg.token = Some(v),
            ("--name", Some(v)) => cfg.nickname = Some(v),
            ("--sprite", Some(v)) => cfg.sprite = Some(v),
            ("--config", Some(_)) => {}
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }
    Ok(cfg)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(server = %cfg.server_addr, api = %cfg.api_base, "Starting client");

    let deps = ClientDeps::from_config(&cfg);
    let mut client = GameClient::start(&cfg, deps).await.context("start client")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Joined as {}. Type 'status' for info, 'quit' to exit.", client.local.nickname);
    println!();

    let (width, height) = client.config.canvas_size();
    let mut renderer = RecordingRenderer::new(width, height);
    let mut ticker = tokio::time::interval(Duration::from_secs_f32(1.0 / cfg.frame_hz.max(1) as f32));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            for out in client.exec_console(&line) {
                println!("{out}");
            }
        }

        client.frame(&mut renderer, Instant::now());

        for alert in client.take_alerts() {
            println!("!! {alert}");
        }

        if renderer.frames() % (u64::from(cfg.frame_hz.max(1)) * 10) == 0 {
            info!(
                frame = renderer.frames(),
                draw_calls = renderer.commands.len(),
                entities = client.entities.len(),
                "Frame"
            );
        }

        if !client.is_running() {
            println!("Client stopped: {:?}", client.state);
            break;
        }
    }

    Ok(())
}
