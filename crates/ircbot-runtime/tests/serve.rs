//! The connection loop against a scripted local server.

use std::path::Path;

use ircbot_framework::{Base, CommandsLayer, OptionsLayer};
use ircbot_runtime::{BotConfig, BotRuntime, ControlEvent, RuntimeError, control_channel};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tower::ServiceBuilder;

/// Accepts one client, sends `script`, and records what the client says
/// until it quits.
async fn fake_server(listener: TcpListener, script: &'static [&'static str]) -> Vec<String> {
    let (stream, _) = listener.accept().await.unwrap();
    let (read, mut write) = stream.into_split();
    for line in script {
        write.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
    }

    let mut received = Vec::new();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await.unwrap() {
        let quit = line == "QUIT";
        received.push(line);
        if quit {
            break;
        }
    }
    received
}

fn config(port: u16, data_dir: &Path) -> BotConfig {
    let mut config = BotConfig::default();
    config.irc.server = "127.0.0.1".to_string();
    config.irc.port = port;
    config.irc.nick = "testbot".to_string();
    config.irc.channels = vec!["#dev".to_string()];
    config.irc.admins = vec!["#dev".to_string()];
    config.storage.data_dir = Some(data_dir.to_path_buf());
    config.cache.file = Some("testbot.cache.yaml".to_string());
    config
}

fn handler(runtime: &BotRuntime) -> impl ircbot_framework::Handler {
    ServiceBuilder::new()
        .layer(runtime.cache_layer())
        .layer(OptionsLayer::new())
        .layer(runtime.admin_layer())
        .layer(CommandsLayer::new())
        .service(Base)
}

#[tokio::test]
async fn test_serve_until_quit_command() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(fake_server(
        listener,
        &[
            ":irc.example.net 001 testbot :Welcome",
            "PING :abc",
            ":bob!u@h PRIVMSG #dev :testbot: admins",
            ":bob!u@h PRIVMSG #dev :testbot: quit",
        ],
    ));

    let runtime = BotRuntime::from_config(config(port, dir.path()));
    let mut bot = runtime.build(handler(&runtime)).await;
    let (_events, control) = control_channel();
    runtime.serve(&mut bot, control).await.unwrap();

    let received = server.await.unwrap();
    assert_eq!(
        received,
        [
            "NICK testbot",
            "USER ircbot 0 * testbot",
            "JOIN #dev",
            "PRIVMSG #dev :\x01ACTION is here to help\x01",
            "PRIVMSG #dev :Type \"testbot: help\" to know more.",
            "PONG abc",
            "PRIVMSG #dev :OK, admins: #dev.",
            "PRIVMSG #dev :OK, quitting...",
            "PART #dev :Daisy, Daisy, give me your answer do",
            "QUIT",
        ]
    );
    // flushed on the way out
    assert!(dir.path().join("testbot.cache.yaml").exists());
    assert!(!bot.context().session().outbound().is_connected());
}

#[tokio::test]
async fn test_terminate_and_flush_events() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(fake_server(listener, &[]));

    let runtime = BotRuntime::from_config(config(port, dir.path()));
    let mut bot = runtime.build(handler(&runtime)).await;
    let (events, control) = control_channel();
    events.send(ControlEvent::Flush).unwrap();
    events.send(ControlEvent::Terminate).unwrap();
    runtime.serve(&mut bot, control).await.unwrap();

    let received = server.await.unwrap();
    assert_eq!(
        &received[received.len() - 2..],
        ["PART #dev :Daisy, Daisy, give me your answer do", "QUIT"]
    );
    assert!(dir.path().join("testbot.cache.yaml").exists());
}

#[tokio::test]
async fn test_connect_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let runtime = BotRuntime::from_config(config(port, dir.path()));
    let mut bot = runtime.build(handler(&runtime)).await;
    let (_events, control) = control_channel();
    let result = runtime.serve(&mut bot, control).await;

    assert!(matches!(result, Err(RuntimeError::Transport(_))));
    assert!(!dir.path().join("testbot.cache.yaml").exists());
}
