//! Integration test common infrastructure.
//!
//! Provides a scripted fake uplink listening on a real socket, and
//! configuration builders for driving a `Session` against it.

pub mod uplink;

#[allow(unused_imports)]
pub use uplink::{FakeUplink, UplinkConn};

use svclinkd::config::{BotBlock, ModeTableConfig, NetworkConfig, ServerBlock, UplinkBlock};

/// Password our session sends to the uplink.
pub const SEND_PASSWORD: &str = "linkpass-out";
/// Password the fake uplink must present to us.
pub const RECV_PASSWORD: &str = "linkpass-in";

/// A network config pointing at the fake uplink.
#[allow(dead_code)]
pub fn network_config(port: u16) -> NetworkConfig {
    NetworkConfig {
        name: "testnet".to_string(),
        server: ServerBlock {
            name: "services.test.net".to_string(),
            sid: "0AL".to_string(),
            description: "Test services".to_string(),
        },
        uplink: UplinkBlock {
            hostname: "127.0.0.1".to_string(),
            port,
            send_password: SEND_PASSWORD.to_string(),
            recv_password: RECV_PASSWORD.to_string(),
            tls: false,
            verify_cert: true,
        },
        bot: BotBlock {
            nick: "TestServ".to_string(),
            ident: "testserv".to_string(),
            realname: "Test service".to_string(),
            channels: vec!["#services".to_string()],
        },
        casemapping: svclink_proto::Casemapping::Rfc1459,
        modes: ModeTableConfig::default(),
    }
}

use std::sync::Arc;

use svclinkd::dispatch::Dispatcher;
use svclinkd::error::LinkError;
use svclinkd::sync::Session;
use tokio::task::JoinHandle;

/// Bind a fake uplink, connect a session to it, and run the session in a
/// background task. Returns the running session handle and the uplink's
/// side of the link.
#[allow(dead_code)]
pub async fn start_session(
    dispatcher: Arc<Dispatcher>,
) -> (
    JoinHandle<(Session, Result<(), LinkError>)>,
    UplinkConn,
) {
    let fake = FakeUplink::bind().await;
    let config = network_config(fake.port);
    let tables = config.modes.build().expect("mode tables");
    let session = Session::connect(config, tables, dispatcher)
        .await
        .expect("session connect");
    let conn = fake.accept().await;
    let handle = tokio::spawn(async move {
        let mut session = session;
        let result = session.run().await;
        (session, result)
    });
    (handle, conn)
}
