//! Command routing and hook dispatch tests.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{start_session, RECV_PASSWORD};
use svclinkd::dispatch::{CommandEffect, Dispatcher};

#[tokio::test]
async fn privmsg_routes_to_registered_command() {
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .command("greet", |_net, _source, args| {
                Ok(vec![CommandEffect::Reply(format!(
                    "hello {}",
                    args.first().map(String::as_str).unwrap_or("there")
                ))])
            })
            .build(),
    );
    let (handle, mut conn) = start_session(dispatcher).await;
    let pseudo = conn.complete_handshake(RECV_PASSWORD).await;

    conn.send(":9ZZ UID 9ZZAAAAAA 1000 Caller host host c 1.2.3.4 1000 + :Caller")
        .await;
    conn.send(&format!(":9ZZAAAAAA PRIVMSG {pseudo} :GREET world"))
        .await;

    let notice = conn.expect_command("NOTICE").await;
    assert_eq!(notice.source.as_deref(), Some(pseudo.as_str()));
    assert_eq!(notice.args[0], "9ZZAAAAAA");
    assert_eq!(notice.args[1], "hello world");

    conn.close().await;
    let (_session, result) = handle.await.expect("session task");
    assert!(result.is_ok());
}

#[tokio::test]
async fn unknown_command_reports_to_sender() {
    let (handle, mut conn) = start_session(Arc::new(Dispatcher::builder().build())).await;
    let pseudo = conn.complete_handshake(RECV_PASSWORD).await;

    conn.send(":9ZZ UID 9ZZAAAAAA 1000 Caller host host c 1.2.3.4 1000 + :Caller")
        .await;
    conn.send(&format!(":9ZZAAAAAA PRIVMSG {pseudo} :nosuchthing"))
        .await;

    let notice = conn.expect_command("NOTICE").await;
    assert!(notice.args[1].contains("Unknown command"));

    conn.close().await;
    let (_session, result) = handle.await.expect("session task");
    assert!(result.is_ok());
}

#[tokio::test]
async fn handler_error_is_contained() {
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .command("boom", |_net, _source, _args| {
                anyhow::bail!("plugin exploded")
            })
            .build(),
    );
    let (handle, mut conn) = start_session(dispatcher).await;
    let pseudo = conn.complete_handshake(RECV_PASSWORD).await;

    conn.send(":9ZZ UID 9ZZAAAAAA 1000 Caller host host c 1.2.3.4 1000 + :Caller")
        .await;
    conn.send(&format!(":9ZZAAAAAA PRIVMSG {pseudo} :boom")).await;

    // The failure is reported to the sender, not propagated to the loop.
    let notice = conn.expect_command("NOTICE").await;
    assert!(notice.args[1].contains("plugin exploded"));

    // The session is still processing messages.
    conn.send(":9ZZ PING 9ZZ 0AL").await;
    conn.expect_command("PONG").await;

    conn.close().await;
    let (_session, result) = handle.await.expect("session task");
    assert!(result.is_ok());
}

#[tokio::test]
async fn mode_effect_applies_and_sends() {
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .command("lockdown", |_net, _source, _args| {
                Ok(vec![CommandEffect::Mode {
                    target: "#services".to_string(),
                    tokens: vec!["+nt".to_string()],
                }])
            })
            .build(),
    );
    let (handle, mut conn) = start_session(dispatcher).await;
    let pseudo = conn.complete_handshake(RECV_PASSWORD).await;

    conn.send(":9ZZ UID 9ZZAAAAAA 1000 Caller host host c 1.2.3.4 1000 + :Caller")
        .await;
    conn.send(&format!(":9ZZAAAAAA PRIVMSG {pseudo} :lockdown"))
        .await;

    let fmode = conn.expect_command("FMODE").await;
    assert_eq!(fmode.source.as_deref(), Some(pseudo.as_str()));
    assert_eq!(fmode.args[0], "#services");
    assert_eq!(fmode.args[2], "+nt");

    conn.close().await;
    let (session, result) = handle.await.expect("session task");
    assert!(result.is_ok());
    let chan = session.net.channel("#services").expect("home channel");
    assert!(chan.modes.contains(&('n', None)));
    assert!(chan.modes.contains(&('t', None)));
}

#[tokio::test]
async fn inbound_fmode_applies_roles_and_settings() {
    let (handle, mut conn) = start_session(Arc::new(Dispatcher::builder().build())).await;
    let pseudo = conn.complete_handshake(RECV_PASSWORD).await;

    conn.send(":9ZZ FMODE #services 1000 +ok TestServ sekrit")
        .await;
    conn.close().await;

    let (session, result) = handle.await.expect("session task");
    assert!(result.is_ok());
    let chan = session.net.channel("#services").expect("home channel");
    assert!(chan.has_role("op", &pseudo), "nick resolved to pseudoclient");
    assert!(chan.modes.contains(&('k', Some("sekrit".to_string()))));
}

#[tokio::test]
async fn kick_hook_sees_payload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .hook("KICK", move |_net, source, payload| {
                assert_eq!(source, "9ZZAAAAAA");
                assert_eq!(payload.channel.as_deref(), Some("#chat"));
                assert_eq!(payload.target.as_deref(), Some("9ZZAAAAAB"));
                assert_eq!(payload.text.as_deref(), Some("bye"));
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build(),
    );
    let (handle, mut conn) = start_session(dispatcher).await;
    conn.complete_handshake(RECV_PASSWORD).await;

    conn.send(":9ZZ UID 9ZZAAAAAA 1000 Oper host host op 1.2.3.4 1000 + :Oper")
        .await;
    conn.send(":9ZZ UID 9ZZAAAAAB 1000 Victim host host v 1.2.3.4 1000 + :Victim")
        .await;
    conn.send(":9ZZ FJOIN #chat 1000 + :o,9ZZAAAAAA ,9ZZAAAAAB")
        .await;
    conn.send(":9ZZAAAAAA KICK #chat 9ZZAAAAAB :bye").await;
    conn.close().await;

    let (session, result) = handle.await.expect("session task");
    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // The kicked user is gone from the channel but the channel survives.
    let chan = session.net.channel("#chat").expect("channel");
    assert!(!chan.users.contains("9ZZAAAAAB"));
    assert!(chan.has_role("op", "9ZZAAAAAA"));
}
