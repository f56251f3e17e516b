//! A scripted fake uplink server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use svclink_proto::line::{tokenize, WireLine};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A listener waiting for the session under test to dial in.
pub struct FakeUplink {
    listener: TcpListener,
    pub port: u16,
}

impl FakeUplink {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake uplink");
        let port = listener.local_addr().expect("local addr").port();
        Self { listener, port }
    }

    pub async fn accept(self) -> UplinkConn {
        let (stream, _) = timeout(IO_TIMEOUT, self.listener.accept())
            .await
            .expect("timed out waiting for session to connect")
            .expect("accept");
        UplinkConn {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(4096)),
        }
    }
}

/// The accepted link, speaking newline-delimited protocol lines.
pub struct UplinkConn {
    framed: Framed<TcpStream, LinesCodec>,
}

#[allow(dead_code)]
impl UplinkConn {
    pub async fn send(&mut self, line: &str) {
        timeout(IO_TIMEOUT, self.framed.send(line.to_string()))
            .await
            .expect("timed out sending line")
            .expect("send line");
    }

    /// Read the next line, failing the test on timeout or closed socket.
    pub async fn recv(&mut self) -> String {
        timeout(IO_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for line")
            .expect("link closed unexpectedly")
            .expect("line decode")
    }

    /// Read lines until one carries the given command (case-insensitive),
    /// returning it tokenized. Intervening lines are discarded.
    pub async fn expect_command(&mut self, command: &str) -> WireLine {
        loop {
            let line = self.recv().await;
            if let Some(wire) = tokenize(&line) {
                if wire.command_upper() == command.to_ascii_uppercase() {
                    return wire;
                }
            }
        }
    }

    /// Perform the uplink's half of the handshake and read through the
    /// session's burst. Returns the pseudoclient UID from the burst.
    pub async fn complete_handshake(&mut self, recv_password: &str) -> String {
        let intro = self.expect_command("SERVER").await;
        assert_eq!(intro.args.get(1).map(String::as_str), Some(super::SEND_PASSWORD));
        assert_eq!(intro.args.get(3).map(String::as_str), Some("0AL"));

        self.send(&format!(
            "SERVER hub.test.net {recv_password} 0 9ZZ :Test Hub"
        ))
        .await;
        self.send(":9ZZ BURST 1000").await;

        let uid_line = self.expect_command("UID").await;
        let pseudo_uid = uid_line.args[0].clone();
        self.expect_command("ENDBURST").await;
        // The pseudoclient's home-channel join follows the burst marker;
        // consume it so callers only see the lines their own script causes.
        let fjoin = self.expect_command("FJOIN").await;
        assert_eq!(fjoin.args[0], "#services");
        self.send(":9ZZ ENDBURST").await;
        pseudo_uid
    }

    /// Close the link, ending the session's read loop.
    pub async fn close(mut self) {
        let _ = SinkExt::<String>::close(&mut self.framed).await;
    }
}
