//! Inbound command handlers.
//!
//! Each handler applies one remote state-change message to the network
//! mirror and fires the matching hook. Handlers are looked up by
//! uppercased command name; unrecognized commands are ignored for
//! forward-compatibility with protocol extensions.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::dispatch::{CommandEffect, HookPayload};
use crate::error::{HandlerError, HandlerResult, LinkError, OpError};
use crate::modes;
use crate::state::{Channel, User};
use crate::sync::handshake::LinkState;
use crate::sync::session::Session;

/// Route one source-prefixed message to its handler.
pub(crate) async fn dispatch(
    session: &mut Session,
    source: &str,
    command: &str,
    args: &[String],
) -> HandlerResult {
    match command {
        "PING" => handle_ping(session, source, args).await,
        "UID" => handle_uid(session, source, args).await,
        "FJOIN" => handle_fjoin(session, source, args).await,
        "QUIT" => handle_quit(session, source, args).await,
        "KILL" => handle_kill(session, source, args).await,
        "KICK" => handle_kick(session, source, args).await,
        "PART" => handle_part(session, source, args).await,
        "NICK" => handle_nick(session, source, args).await,
        "SAVE" => handle_save(session, source, args).await,
        "SERVER" => handle_server(session, source, args).await,
        "BURST" => handle_burst(session, source, args).await,
        "ENDBURST" => handle_endburst(session, source, args).await,
        "SQUIT" => handle_squit(session, source, args).await,
        "FMODE" | "MODE" => handle_mode(session, source, command, args).await,
        "IDLE" => handle_idle(session, source, args).await,
        "ERROR" => handle_error(session, source, args).await,
        "PRIVMSG" => handle_privmsg(session, source, args).await,
        other => {
            trace!(network = %session.net.name, command = %other, "ignoring unrecognized command");
            Ok(())
        }
    }
}

// ============================================================================
// Keepalive and queries
// ============================================================================

// :7NU PING 7NU 0AL
async fn handle_ping(session: &mut Session, _source: &str, args: &[String]) -> HandlerResult {
    match args.get(1) {
        Some(dest) if *dest == session.net.sid => {
            let reply = format!("PONG {dest}");
            session.send_from_server(&reply).await?;
        }
        Some(_) => {} // not for us
        None => {
            if let Some(origin) = args.first() {
                let reply = format!("PONG {origin}");
                session.send_from_server(&reply).await?;
            }
        }
    }
    Ok(())
}

// Remote WHOIS idle query:
// <- :70MAAAAAA IDLE 1MLAAAAIG
// -> :1MLAAAAIG IDLE 70MAAAAAA 1433036797 0
async fn handle_idle(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    let target = args
        .first()
        .ok_or_else(|| HandlerError::malformed("IDLE", "missing target"))?
        .clone();
    let reply = format!("IDLE {source} {} 0", session.net.start_ts);
    session.send_from_user(&target, &reply).await?;
    Ok(())
}

// ============================================================================
// Clients
// ============================================================================

// :70M UID 70MAAAAAB 1429934638 GL 0::1 hidden-7j810p.IP gl 0::1 1429934638 +Wiosw +ACGKNOX :realname
async fn handle_uid(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    if args.len() < 9 {
        return Err(HandlerError::malformed("UID", format!("{} args", args.len())));
    }
    let uid = args[0].clone();
    let ts: i64 = args[1]
        .parse()
        .map_err(|_| HandlerError::malformed("UID", format!("bad timestamp {:?}", args[1])))?;
    let nick = args[2].clone();
    let realhost = &args[3];
    let host = &args[4];
    let ident = &args[5];
    let ip = &args[6];
    let realname = args.last().map(String::as_str).unwrap_or_default();

    let user = User::new(&uid, &nick, ts, ident, host, realhost, ip, realname);
    session.net.add_user(user)?;

    // Announced user modes, when present between the signon TS and the
    // realname.
    if args.len() > 9 {
        let tokens: Vec<&str> = args[8..args.len() - 1].iter().map(String::as_str).collect();
        let ops = modes::parse(&session.net, &uid, &tokens);
        modes::apply(&mut session.net, &uid, &ops);
    }

    debug!(network = %session.net.name, uid = %uid, nick = %nick, "user introduced");
    session.dispatcher.run_hooks(
        &session.net,
        "UID",
        source,
        &HookPayload {
            target: Some(uid),
            text: Some(nick),
            ts: Some(ts),
            ..Default::default()
        },
    );
    Ok(())
}

// :1SRAAGB4T QUIT :Quit: message
async fn handle_quit(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    let was_pseudoclient = session.is_pseudoclient(source);
    session.net.remove_user(source)?;
    session.dispatcher.run_hooks(
        &session.net,
        "QUIT",
        source,
        &HookPayload {
            target: Some(source.to_string()),
            text: args.first().cloned(),
            ..Default::default()
        },
    );
    if was_pseudoclient {
        session.respawn_pseudoclient().await?;
    }
    Ok(())
}

// :source KILL target :reason
async fn handle_kill(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    let target = args
        .first()
        .ok_or_else(|| HandlerError::malformed("KILL", "missing target"))?
        .clone();
    let was_pseudoclient = session.is_pseudoclient(&target);
    session.net.remove_user(&target)?;
    session.dispatcher.run_hooks(
        &session.net,
        "KILL",
        source,
        &HookPayload {
            target: Some(target),
            text: args.get(1).cloned(),
            ..Default::default()
        },
    );
    if was_pseudoclient {
        session.respawn_pseudoclient().await?;
    }
    Ok(())
}

// :70MAAAAAA NICK Newnick [ts]
async fn handle_nick(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    let newnick = args
        .first()
        .ok_or_else(|| HandlerError::malformed("NICK", "missing nickname"))?
        .clone();
    match session.net.users.get_mut(source) {
        Some(user) => user.nick = newnick.clone(),
        None => {
            return Err(crate::error::DesyncError::UnknownUser(source.to_string()).into());
        }
    }
    session.dispatcher.run_hooks(
        &session.net,
        "NICK",
        source,
        &HookPayload {
            text: Some(newnick),
            ..Default::default()
        },
    );
    Ok(())
}

// Nick-collision resolution: the collided user's nick becomes its UID.
// <- :70M SAVE 0AL000001 1433728673
async fn handle_save(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    let target = args
        .first()
        .ok_or_else(|| HandlerError::malformed("SAVE", "missing target"))?
        .clone();
    match session.net.users.get_mut(&target) {
        Some(user) => user.nick = target.clone(),
        None => {
            return Err(crate::error::DesyncError::UnknownUser(target).into());
        }
    }
    session.dispatcher.run_hooks(
        &session.net,
        "SAVE",
        source,
        &HookPayload {
            target: Some(target),
            ..Default::default()
        },
    );
    Ok(())
}

// ============================================================================
// Channels
// ============================================================================

// :70M FJOIN #chat 1423790411 +nt :o,1SRAABIT4 v,1IOAAF53R
async fn handle_fjoin(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    if args.len() < 3 {
        return Err(HandlerError::malformed("FJOIN", format!("{} args", args.len())));
    }
    let channel = args[0].clone();
    let ts: i64 = args[1]
        .parse()
        .map_err(|_| HandlerError::malformed("FJOIN", format!("bad timestamp {:?}", args[1])))?;

    let key = session.net.lower(&channel);
    session
        .net
        .channels
        .entry(key.clone())
        .or_insert_with(|| Channel::new(channel.as_str(), ts));

    // Channel modes announced between the TS and the member list.
    if args.len() > 3 {
        let tokens: Vec<&str> = args[2..args.len() - 1].iter().map(String::as_str).collect();
        let ops = modes::parse(&session.net, &channel, &tokens);
        modes::apply(&mut session.net, &channel, &ops);
    }

    // Each member token is "<prefix letters>,<uid>"; a user can hold more
    // than one prefix at once.
    let memberlist = args.last().map(String::as_str).unwrap_or_default();
    for member in memberlist.split_whitespace() {
        let Some((prefixes, uid)) = member.split_once(',') else {
            warn!(network = %session.net.name, member = %member, "malformed FJOIN member token");
            continue;
        };
        let roles: Vec<String> = prefixes
            .chars()
            .filter_map(|c| session.net.tables.prefix_by_letter(c).map(|p| p.name.clone()))
            .collect();
        if let Err(e) = session.net.join_channel(uid, &channel, ts, &roles) {
            warn!(network = %session.net.name, error = %e, "skipping FJOIN member");
        }
    }

    // A burst whose members all failed to resolve must not leave an empty
    // channel behind.
    if session.net.channel(&channel).is_some_and(|c| c.is_empty()) {
        session.net.channels.remove(&key);
    }

    session.dispatcher.run_hooks(
        &session.net,
        "FJOIN",
        source,
        &HookPayload {
            channel: Some(channel),
            ts: Some(ts),
            ..Default::default()
        },
    );
    Ok(())
}

// :70MAAAAAA KICK #endlessvoid 70MAAAAAA :some reason
async fn handle_kick(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    if args.len() < 2 {
        return Err(HandlerError::malformed("KICK", format!("{} args", args.len())));
    }
    let channel = args[0].clone();
    let kicked = args[1].clone();
    session.net.part_channel(&kicked, &channel)?;
    session.dispatcher.run_hooks(
        &session.net,
        "KICK",
        source,
        &HookPayload {
            channel: Some(channel.clone()),
            target: Some(kicked.clone()),
            text: args.get(2).cloned(),
            ..Default::default()
        },
    );
    if session.is_pseudoclient(&kicked) {
        let uid = kicked;
        session.join_client(&uid, &channel).await?;
    }
    Ok(())
}

// :70MAAAAAA PART #channel [:reason]
async fn handle_part(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    let channel = args
        .first()
        .ok_or_else(|| HandlerError::malformed("PART", "missing channel"))?
        .clone();
    session.net.part_channel(source, &channel)?;
    session.dispatcher.run_hooks(
        &session.net,
        "PART",
        source,
        &HookPayload {
            channel: Some(channel),
            text: args.get(1).cloned(),
            ..Default::default()
        },
    );
    Ok(())
}

// :70MAAAAAA FMODE #chat 1433653462 +hhT 70MAAAAAA 70MAAAAAD
async fn handle_mode(
    session: &mut Session,
    source: &str,
    command: &str,
    args: &[String],
) -> HandlerResult {
    // FMODE carries the channel TS after the target; MODE does not.
    let (label, min_args) = if command == "FMODE" {
        ("FMODE", 3)
    } else {
        ("MODE", 2)
    };
    if args.len() < min_args {
        return Err(HandlerError::malformed(label, format!("{} args", args.len())));
    }
    let target = args[0].clone();
    let tokens: Vec<&str> = args[min_args - 1..].iter().map(String::as_str).collect();
    let ops = modes::parse(&session.net, &target, &tokens);
    if ops.is_empty() {
        return Ok(());
    }
    modes::apply(&mut session.net, &target, &ops);
    session.dispatcher.run_hooks(
        &session.net,
        "MODE",
        source,
        &HookPayload {
            target: Some(target),
            text: Some(modes::serialize(&ops)),
            ..Default::default()
        },
    );
    Ok(())
}

// ============================================================================
// Servers and the link
// ============================================================================

// :70M SERVER millennium.overdrive.pw * 1 1ML :server description
async fn handle_server(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    if args.len() < 4 {
        return Err(HandlerError::malformed("SERVER", format!("{} args", args.len())));
    }
    let name = &args[0];
    let sid = args[3].clone();
    session.net.add_server(sid.clone(), Some(source.to_string()));
    info!(
        network = %session.net.name,
        server = %name,
        sid = %sid,
        uplink = %source,
        "server introduced"
    );
    session.dispatcher.run_hooks(
        &session.net,
        "SERVER",
        source,
        &HookPayload {
            target: Some(sid),
            text: Some(name.clone()),
            ..Default::default()
        },
    );
    Ok(())
}

// :70M BURST 1433044587
async fn handle_burst(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    let ts = args.first().and_then(|a| a.parse::<i64>().ok());
    session.remote_burst_ts = ts;
    debug!(network = %session.net.name, server = %source, "remote burst started");
    Ok(())
}

async fn handle_endburst(session: &mut Session, source: &str, _args: &[String]) -> HandlerResult {
    info!(network = %session.net.name, server = %source, "remote burst complete");
    session
        .dispatcher
        .run_hooks(&session.net, "ENDBURST", source, &HookPayload::default());
    Ok(())
}

// :70M SQUIT 1ML :Server quit by GL!gl@0::1
async fn handle_squit(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    let target = args
        .first()
        .ok_or_else(|| HandlerError::malformed("SQUIT", "missing target"))?
        .clone();

    let local_link = target == session.net.sid || session.peer_sid.as_deref() == Some(&target);
    if local_link {
        session.state = LinkState::Splitting;
        warn!(network = %session.net.name, server = %target, "SQUIT names the local link, splitting");
        // Collapse the mirror before the loop ends so observers see the
        // final state.
        if let Ok(detached) = session.net.detach_server(&target) {
            info!(
                network = %session.net.name,
                servers = detached.servers.len(),
                users = detached.users.len(),
                "local split cleanup"
            );
        }
        return Err(HandlerError::Fatal(LinkError::LocalSplit(target)));
    }

    let detached = session.net.detach_server(&target)?;
    info!(
        network = %session.net.name,
        server = %target,
        servers = detached.servers.len(),
        users = detached.users.len(),
        "netsplit"
    );
    session.dispatcher.run_hooks(
        &session.net,
        "SQUIT",
        source,
        &HookPayload {
            target: Some(target),
            text: args.get(1).cloned(),
            ..Default::default()
        },
    );
    Ok(())
}

async fn handle_error(session: &mut Session, _source: &str, args: &[String]) -> HandlerResult {
    session.state = LinkState::Splitting;
    let text = args.first().cloned().unwrap_or_default();
    Err(HandlerError::Fatal(LinkError::Remote(text)))
}

// ============================================================================
// Command routing
// ============================================================================

// :70MAAAAAA PRIVMSG 0ALAAAAAA :command arg1 arg2
async fn handle_privmsg(session: &mut Session, source: &str, args: &[String]) -> HandlerResult {
    if args.len() < 2 {
        return Err(HandlerError::malformed("PRIVMSG", format!("{} args", args.len())));
    }
    let target = args[0].clone();
    if !session.is_pseudoclient(&target) {
        return Ok(());
    }

    let text = &args[1];
    let mut words = text.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(());
    };
    let cmd = cmd.to_ascii_lowercase();
    let cmd_args: Vec<String> = words.map(str::to_string).collect();

    let dispatcher = Arc::clone(&session.dispatcher);
    match dispatcher.command(&cmd) {
        None => {
            session
                .notice(&target, source, &format!("Unknown command {cmd:?}."))
                .await?;
        }
        Some(handler) => match handler(&session.net, source, &cmd_args) {
            Ok(effects) => {
                for effect in effects {
                    apply_effect(session, &target, source, effect).await?;
                }
            }
            Err(err) => {
                // The plugin is untrusted relative to read-loop stability:
                // report the failure to the sender and keep the session up.
                warn!(
                    network = %session.net.name,
                    command = %cmd,
                    caller = %session.net.hostmask(source),
                    error = %err,
                    "command handler failed"
                );
                session
                    .notice(
                        &target,
                        source,
                        &format!("Error in command {cmd:?}: {err}"),
                    )
                    .await?;
            }
        },
    }
    Ok(())
}

/// Apply one effect a command handler requested.
///
/// Transport failures take the link down; anything else is reported back
/// to the invoking user and the remaining effects still run.
async fn apply_effect(
    session: &mut Session,
    pseudoclient: &str,
    source: &str,
    effect: CommandEffect,
) -> HandlerResult {
    let result = match effect {
        CommandEffect::Reply(text) => session.notice(pseudoclient, source, &text).await,
        CommandEffect::Join(channel) => session.join_client(pseudoclient, &channel).await,
        CommandEffect::Part { channel, reason } => {
            session
                .part_client(pseudoclient, &channel, reason.as_deref())
                .await
        }
        CommandEffect::Kick {
            channel,
            target,
            reason,
        } => {
            session
                .kick_client(pseudoclient, &channel, &target, reason.as_deref())
                .await
        }
        CommandEffect::Mode { target, tokens } => {
            let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
            let ops = modes::parse(&session.net, &target, &tokens);
            session.mode_client(pseudoclient, &target, &ops).await
        }
        CommandEffect::Nick(newnick) => session.nick_client(pseudoclient, &newnick).await,
    };
    match result {
        Ok(()) => Ok(()),
        Err(OpError::Link(fatal)) => Err(HandlerError::Fatal(fatal)),
        Err(err) => {
            warn!(network = %session.net.name, error = %err, "could not apply command effect");
            session
                .notice(pseudoclient, source, &format!("Could not apply: {err}"))
                .await?;
            Ok(())
        }
    }
}
