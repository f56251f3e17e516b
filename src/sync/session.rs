//! One network session: socket, handshake, burst, and the sequential
//! read loop.
//!
//! Message processing is strictly sequential: the loop blocks on socket
//! input and processes exactly one line to completion, including all state
//! mutations and hook invocations, before reading further. Reordering
//! would desynchronize the mirror from the network's true state.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use svclink_proto::line::{tokenize, WireLine};
use svclink_proto::ModeTables;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, trace, warn};

use crate::config::NetworkConfig;
use crate::dispatch::Dispatcher;
use crate::error::{HandlerResult, LinkError, OpError};
use crate::state::{Network, UidGenerator};
use crate::sync::commands;
use crate::sync::handshake::{verify_server_intro, LinkState};
use crate::sync::stream::{connect_uplink, LinkStream};

/// Maximum accepted wire line length. Burst lines (member lists) can run
/// long, so this is far above the client-protocol 512.
const MAX_LINE_LEN: usize = 4096;

/// A live session with one network's uplink.
pub struct Session {
    pub config: NetworkConfig,
    /// The network mirror. Exclusively owned by this session.
    pub net: Network,
    pub uids: UidGenerator,
    pub dispatcher: Arc<Dispatcher>,
    pub state: LinkState,
    /// SID of the direct peer, learned from its SERVER introduction.
    pub peer_sid: Option<String>,
    /// Burst start timestamp announced by the peer, if any.
    pub remote_burst_ts: Option<i64>,
    link: Framed<LinkStream, LinesCodec>,
}

impl Session {
    /// Open the socket and construct the session state.
    pub async fn connect(
        config: NetworkConfig,
        tables: ModeTables,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, LinkError> {
        info!(
            network = %config.name,
            host = %config.uplink.hostname,
            port = config.uplink.port,
            tls = config.uplink.tls,
            "connecting to uplink"
        );
        let stream = connect_uplink(
            &config.uplink.hostname,
            config.uplink.port,
            config.uplink.tls,
            config.uplink.verify_cert,
        )
        .await?;
        let link = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));

        let start_ts = chrono::Utc::now().timestamp();
        let net = Network::new(
            config.name.clone(),
            config.server.sid.clone(),
            config.casemapping,
            tables,
            start_ts,
        );
        let uids = UidGenerator::with_default_scheme(config.server.sid.clone());

        Ok(Self {
            config,
            net,
            uids,
            dispatcher,
            state: LinkState::Handshaking,
            peer_sid: None,
            remote_burst_ts: None,
            link,
        })
    }

    /// Drive the session to completion: handshake, burst, then the read
    /// loop until the link ends.
    pub async fn run(&mut self) -> Result<(), LinkError> {
        let result = self.run_inner().await;
        self.state = LinkState::Disconnected;
        match &result {
            Ok(()) => info!(network = %self.net.name, "uplink closed the connection, session over"),
            Err(e) => warn!(network = %self.net.name, error = %e, "session terminated"),
        }
        result
    }

    async fn run_inner(&mut self) -> Result<(), LinkError> {
        self.send_handshake().await?;
        self.run_burst().await?;
        self.read_loop().await
    }

    // ========================================================================
    // Outbound plumbing
    // ========================================================================

    /// Send one raw line.
    pub async fn send_line(&mut self, line: impl Into<String>) -> Result<(), LinkError> {
        let line = line.into();
        trace!(network = %self.net.name, "-> {}", line);
        self.link.send(line).await?;
        Ok(())
    }

    /// Send a line sourced from our server.
    pub async fn send_from_server(&mut self, msg: &str) -> Result<(), LinkError> {
        let line = format!(":{} {}", self.net.sid, msg);
        self.send_line(line).await
    }

    /// Send a line sourced from one of our clients.
    pub async fn send_from_user(&mut self, uid: &str, msg: &str) -> Result<(), LinkError> {
        let line = format!(":{uid} {msg}");
        self.send_line(line).await
    }

    // ========================================================================
    // Handshake and burst
    // ========================================================================

    async fn send_handshake(&mut self) -> Result<(), LinkError> {
        self.state = LinkState::Handshaking;
        self.send_line("CAPAB START 1202").await?;
        self.send_line(
            "CAPAB CAPABILITIES :NICKMAX=32 CHANMAX=64 MAXMODES=20 \
             IDENTMAX=12 MAXQUIT=255 PROTOCOL=1202",
        )
        .await?;
        self.send_line("CAPAB END").await?;
        let intro = format!(
            "SERVER {} {} 0 {} :{}",
            self.config.server.name,
            self.config.uplink.send_password,
            self.config.server.sid,
            self.config.server.description
        );
        self.send_line(intro).await
    }

    async fn run_burst(&mut self) -> Result<(), LinkError> {
        self.state = LinkState::Bursting;
        let ts = self.net.start_ts;
        self.send_from_server(&format!("BURST {ts}")).await?;

        let bot = self.config.bot.clone();
        let host = self.config.server.name.clone();
        let uid = self
            .spawn_client(&bot.nick, &bot.ident, &host, &bot.realname, false)
            .await
            .map_err(op_fatal)?;
        self.net.pseudoclient = Some(uid.clone());

        self.send_from_server("ENDBURST").await?;

        for channel in &bot.channels {
            self.join_client(&uid, channel).await.map_err(op_fatal)?;
        }

        self.state = LinkState::Linked;
        info!(network = %self.net.name, pseudoclient = %uid, "burst complete, link is up");
        Ok(())
    }

    // ========================================================================
    // The read loop
    // ========================================================================

    async fn read_loop(&mut self) -> Result<(), LinkError> {
        while let Some(item) = self.link.next().await {
            let line = item?;
            trace!(network = %self.net.name, "<- {}", line);
            if let Err(err) = self.handle_line(&line).await {
                match err.into_fatal() {
                    Err(fatal) => return Err(fatal),
                    Ok(contained) => {
                        // All handler failures short of link-fatal are
                        // contained here; the loop continues with the next
                        // line.
                        warn!(network = %self.net.name, error = %contained, "error handling message");
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> HandlerResult {
        let Some(wire) = tokenize(line) else {
            return Ok(());
        };
        match &wire.source {
            None => self.handle_unprefixed(&wire).await,
            Some(source) => {
                let source = source.clone();
                let command = wire.command_upper();
                commands::dispatch(self, &source, &command, &wire.args).await
            }
        }
    }

    /// Handshake-time messages arrive without a source prefix. The
    /// uplink's `SERVER` introduction carries the credential we verify;
    /// everything else unprefixed is capability chatter we ignore.
    async fn handle_unprefixed(&mut self, wire: &WireLine) -> HandlerResult {
        match wire.command_upper().as_str() {
            "SERVER" => {
                let intro = verify_server_intro(&wire.args, &self.config.uplink.recv_password)?;
                info!(
                    network = %self.net.name,
                    server = %intro.name,
                    sid = %intro.sid,
                    "uplink introduced itself"
                );
                // Keep the mirror's server tree rooted locally: the peer
                // hangs off our own record.
                self.net
                    .add_server(intro.sid.clone(), Some(self.net.sid.clone()));
                self.peer_sid = Some(intro.sid);
                Ok(())
            }
            "CAPAB" => {
                debug!(network = %self.net.name, "uplink capabilities: {}", wire.args.join(" "));
                Ok(())
            }
            other => {
                trace!(network = %self.net.name, command = %other, "ignoring unprefixed message");
                Ok(())
            }
        }
    }

    // ========================================================================
    // Pseudoclient lifecycle helpers
    // ========================================================================

    /// Whether a UID is the designated pseudoclient.
    pub fn is_pseudoclient(&self, uid: &str) -> bool {
        self.net.pseudoclient.as_deref() == Some(uid)
    }

    /// Spawn a fresh pseudoclient and rejoin its configured channels,
    /// after the previous incarnation was killed or quit.
    pub(crate) async fn respawn_pseudoclient(&mut self) -> Result<(), OpError> {
        let bot = self.config.bot.clone();
        let host = self.config.server.name.clone();
        let uid = self
            .spawn_client(&bot.nick, &bot.ident, &host, &bot.realname, false)
            .await?;
        self.net.pseudoclient = Some(uid.clone());
        for channel in &bot.channels {
            self.join_client(&uid, channel).await?;
        }
        info!(network = %self.net.name, pseudoclient = %uid, "pseudoclient respawned");
        Ok(())
    }
}

/// During burst and respawn, operation failures take the link down.
pub(crate) fn op_fatal(err: OpError) -> LinkError {
    match err {
        OpError::Link(e) => e,
        OpError::Uid(e) => LinkError::Uid(e),
        other => LinkError::Burst(other.to_string()),
    }
}
