//! Outbound pseudoclient operations.
//!
//! Every operation validates its target, formats the wire line, sends it,
//! and then updates the network mirror to match. The protocol has no
//! transactional acknowledgment for these messages, so the local store
//! must reflect what was sent as soon as it is sent. Validation failures
//! abort before any send or mutation (all-or-nothing).

use svclink_proto::{ChannelExt, ModeChange, NickExt};
use tracing::warn;

use crate::error::OpError;
use crate::modes;
use crate::state::User;
use crate::sync::session::Session;

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Session {
    /// Introduce a new client owned by our server.
    ///
    /// Returns the new client's UID. `manipulatable` marks whether oper
    /// interactions may touch the client; automatically spawned service
    /// clients pass `false`.
    pub async fn spawn_client(
        &mut self,
        nick: &str,
        ident: &str,
        host: &str,
        realname: &str,
        manipulatable: bool,
    ) -> Result<String, OpError> {
        if !nick.is_valid_nick() {
            return Err(OpError::InvalidNick(nick.to_string()));
        }
        let uid = self.uids.next()?;
        let ts = now_ts();
        self.send_from_server(&format!(
            "UID {uid} {ts} {nick} {host} {host} {ident} 0.0.0.0 {ts} +o :{realname}"
        ))
        .await
        .map_err(OpError::Link)?;

        let mut user = User::new(&uid, nick, ts, ident, host, host, "0.0.0.0", realname);
        user.modes.insert(('o', None));
        user.manipulatable = manipulatable;
        if let Err(e) = self.net.add_user(user) {
            warn!(network = %self.net.name, error = %e, "spawned client could not be recorded");
        }
        Ok(uid)
    }

    /// Join one of our clients to a channel. One channel per line.
    pub async fn join_client(&mut self, uid: &str, channel: &str) -> Result<(), OpError> {
        if !self.net.is_internal_client(uid) {
            return Err(OpError::NotInternalClient(uid.to_string()));
        }
        if !channel.is_channel_name() {
            return Err(OpError::InvalidChannel(channel.to_string()));
        }
        // Joining an existing channel reuses its timestamp; a fresh one is
        // stamped now.
        let ts = self
            .net
            .channel(channel)
            .map(|c| c.ts)
            .unwrap_or_else(now_ts);
        self.send_from_server(&format!("FJOIN {channel} {ts} + :,{uid}"))
            .await
            .map_err(OpError::Link)?;
        if let Err(e) = self.net.join_channel(uid, channel, ts, &[]) {
            warn!(network = %self.net.name, error = %e, "join could not be recorded");
        }
        Ok(())
    }

    /// Part one of our clients from a channel.
    pub async fn part_client(
        &mut self,
        uid: &str,
        channel: &str,
        reason: Option<&str>,
    ) -> Result<(), OpError> {
        if !self.net.is_internal_client(uid) {
            return Err(OpError::NotInternalClient(uid.to_string()));
        }
        if !channel.is_channel_name() {
            return Err(OpError::InvalidChannel(channel.to_string()));
        }
        let msg = match reason {
            Some(reason) => format!("PART {channel} :{reason}"),
            None => format!("PART {channel}"),
        };
        self.send_from_user(uid, &msg).await.map_err(OpError::Link)?;
        if let Err(e) = self.net.part_channel(uid, channel) {
            warn!(network = %self.net.name, error = %e, "part could not be recorded");
        }
        Ok(())
    }

    /// Kick a user from a channel as one of our clients.
    pub async fn kick_client(
        &mut self,
        uid: &str,
        channel: &str,
        target: &str,
        reason: Option<&str>,
    ) -> Result<(), OpError> {
        if !self.net.is_internal_client(uid) {
            return Err(OpError::NotInternalClient(uid.to_string()));
        }
        if !channel.is_channel_name() {
            return Err(OpError::InvalidChannel(channel.to_string()));
        }
        let reason = reason.unwrap_or("No reason given");
        self.send_from_user(uid, &format!("KICK {channel} {target} :{reason}"))
            .await
            .map_err(OpError::Link)?;
        if let Err(e) = self.net.part_channel(target, channel) {
            warn!(network = %self.net.name, error = %e, "kick could not be recorded");
        }
        Ok(())
    }

    /// Change one of our clients' nickname.
    pub async fn nick_client(&mut self, uid: &str, newnick: &str) -> Result<(), OpError> {
        if !self.net.is_internal_client(uid) {
            return Err(OpError::NotInternalClient(uid.to_string()));
        }
        if !newnick.is_valid_nick() {
            return Err(OpError::InvalidNick(newnick.to_string()));
        }
        self.send_from_user(uid, &format!("NICK {newnick} {}", now_ts()))
            .await
            .map_err(OpError::Link)?;
        if let Some(user) = self.net.users.get_mut(uid) {
            user.nick = newnick.to_string();
        }
        Ok(())
    }

    /// Quit and remove one of our clients.
    ///
    /// Only internal clients can be quit; removing a remote user from the
    /// mirror goes through the store directly.
    pub async fn quit_client(&mut self, uid: &str, reason: &str) -> Result<(), OpError> {
        if !self.net.is_internal_client(uid) {
            return Err(OpError::NotInternalClient(uid.to_string()));
        }
        self.send_from_user(uid, &format!("QUIT :{reason}"))
            .await
            .map_err(OpError::Link)?;
        if let Err(e) = self.net.remove_user(uid) {
            warn!(network = %self.net.name, error = %e, "quit could not be recorded");
        }
        Ok(())
    }

    /// Send a mode change from one of our clients and apply it locally.
    ///
    /// `ops` is an already-parsed sequence (see [`crate::modes::parse`]).
    /// An empty sequence is a no-op.
    pub async fn mode_client(
        &mut self,
        uid: &str,
        target: &str,
        ops: &[ModeChange],
    ) -> Result<(), OpError> {
        if !self.net.is_internal_client(uid) {
            return Err(OpError::NotInternalClient(uid.to_string()));
        }
        if ops.is_empty() {
            return Ok(());
        }
        let modestring = modes::serialize(ops);
        if target.is_channel_name() {
            let ts = self
                .net
                .channel(target)
                .ok_or_else(|| OpError::UnknownTarget(target.to_string()))?
                .ts;
            self.send_from_user(uid, &format!("FMODE {target} {ts} {modestring}"))
                .await
                .map_err(OpError::Link)?;
        } else {
            if !self.net.users.contains_key(target) {
                return Err(OpError::UnknownTarget(target.to_string()));
            }
            self.send_from_user(uid, &format!("MODE {target} {modestring}"))
                .await
                .map_err(OpError::Link)?;
        }
        modes::apply(&mut self.net, target, ops);
        Ok(())
    }

    /// Send a PRIVMSG from one of our clients.
    pub async fn message(&mut self, uid: &str, target: &str, text: &str) -> Result<(), OpError> {
        if !self.net.is_internal_client(uid) {
            return Err(OpError::NotInternalClient(uid.to_string()));
        }
        self.send_from_user(uid, &format!("PRIVMSG {target} :{text}"))
            .await
            .map_err(OpError::Link)
    }

    /// Send a NOTICE from one of our clients.
    pub async fn notice(&mut self, uid: &str, target: &str, text: &str) -> Result<(), OpError> {
        if !self.net.is_internal_client(uid) {
            return Err(OpError::NotInternalClient(uid.to_string()));
        }
        self.send_from_user(uid, &format!("NOTICE {target} :{text}"))
            .await
            .map_err(OpError::Link)
    }
}
