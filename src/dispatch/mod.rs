//! Command and hook dispatch.
//!
//! Plugins register named commands and hook callbacks against an explicit
//! [`Dispatcher`], built once per process and shared by reference with
//! every session that needs to invoke it. The core never interprets
//! command text itself; it routes `PRIVMSG`s aimed at the pseudoclient to
//! the matching handler and applies whatever effects it returns.
//!
//! Command handlers are untrusted relative to read-loop stability: a
//! returned error is contained at this boundary and reported back to the
//! invoking user, never propagated into the session.

use std::collections::HashMap;

use crate::state::Network;

/// Structured payload passed to hook callbacks.
///
/// Not every event populates every field; a kick carries a channel, a
/// target, and a reason text, while a nick change only carries text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookPayload {
    pub channel: Option<String>,
    pub target: Option<String>,
    pub text: Option<String>,
    pub ts: Option<i64>,
}

/// An action a command handler asks the session to take.
///
/// Handlers get read-only access to the network mirror and describe their
/// side effects as data; the session applies them through the normal
/// pseudoclient operations so the store always matches the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEffect {
    /// Notice the invoking user.
    Reply(String),
    /// Join the pseudoclient to a channel.
    Join(String),
    /// Part the pseudoclient from a channel.
    Part {
        channel: String,
        reason: Option<String>,
    },
    /// Kick a user from a channel as the pseudoclient.
    Kick {
        channel: String,
        target: String,
        reason: Option<String>,
    },
    /// Apply a raw mode change as the pseudoclient. `tokens[0]` is the
    /// mode string, the rest are its arguments.
    Mode {
        target: String,
        tokens: Vec<String>,
    },
    /// Change the pseudoclient's nickname.
    Nick(String),
}

/// A registered command handler.
///
/// Arguments: the network mirror, the invoking UID, and the command's
/// whitespace-split arguments.
pub type CommandFn =
    Box<dyn Fn(&Network, &str, &[String]) -> anyhow::Result<Vec<CommandEffect>> + Send + Sync>;

/// A registered hook callback.
///
/// Hooks are advisory observers invoked after a state-changing operation;
/// they cannot block or reject it. Arguments: the network mirror, the
/// acting UID/SID, and the event payload.
pub type HookFn = Box<dyn Fn(&Network, &str, &HookPayload) + Send + Sync>;

/// The process-wide registry of commands and hooks.
#[derive(Default)]
pub struct Dispatcher {
    commands: HashMap<String, CommandFn>,
    hooks: HashMap<String, Vec<HookFn>>,
}

impl Dispatcher {
    /// Start building a registry.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Look up a command handler by name (case-insensitive).
    pub fn command(&self, name: &str) -> Option<&CommandFn> {
        self.commands.get(&name.to_ascii_lowercase())
    }

    /// Invoke every hook registered for `event` (case-insensitive).
    pub fn run_hooks(&self, net: &Network, event: &str, source: &str, payload: &HookPayload) {
        if let Some(hooks) = self.hooks.get(&event.to_ascii_uppercase()) {
            for hook in hooks {
                hook(net, source, payload);
            }
        }
    }
}

/// Builder for [`Dispatcher`]. Registration happens once, before any
/// session starts; the built registry is immutable.
#[derive(Default)]
pub struct DispatcherBuilder {
    commands: HashMap<String, CommandFn>,
    hooks: HashMap<String, Vec<HookFn>>,
}

impl DispatcherBuilder {
    /// Bind a command handler to a name.
    pub fn command<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&Network, &str, &[String]) -> anyhow::Result<Vec<CommandEffect>>
            + Send
            + Sync
            + 'static,
    {
        self.commands
            .insert(name.to_ascii_lowercase(), Box::new(handler));
        self
    }

    /// Bind a hook callback to an event name.
    pub fn hook<F>(mut self, event: &str, callback: F) -> Self
    where
        F: Fn(&Network, &str, &HookPayload) + Send + Sync + 'static,
    {
        self.hooks
            .entry(event.to_ascii_uppercase())
            .or_default()
            .push(Box::new(callback));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            commands: self.commands,
            hooks: self.hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use svclink_proto::{Casemapping, ModeTables};

    fn network() -> Network {
        Network::new(
            "testnet",
            "0AL",
            Casemapping::Rfc1459,
            ModeTables::inspircd(),
            1000,
        )
    }

    #[test]
    fn test_command_lookup_is_case_insensitive() {
        let dispatcher = Dispatcher::builder()
            .command("Version", |_, _, _| {
                Ok(vec![CommandEffect::Reply("ok".into())])
            })
            .build();
        assert!(dispatcher.command("VERSION").is_some());
        assert!(dispatcher.command("version").is_some());
        assert!(dispatcher.command("nope").is_none());
    }

    #[test]
    fn test_hooks_fire_in_registration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&calls);
        let b = Arc::clone(&calls);
        let dispatcher = Dispatcher::builder()
            .hook("kick", move |_, _, _| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .hook("KICK", move |_, _, payload| {
                assert_eq!(payload.channel.as_deref(), Some("#chat"));
                b.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        let net = network();
        let payload = HookPayload {
            channel: Some("#chat".into()),
            ..Default::default()
        };
        dispatcher.run_hooks(&net, "KICK", "70MAAAAAA", &payload);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Unregistered events are a no-op.
        dispatcher.run_hooks(&net, "TOPIC", "70MAAAAAA", &payload);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_errors_are_values_not_panics() {
        let dispatcher = Dispatcher::builder()
            .command("boom", |_, _, _| anyhow::bail!("handler exploded"))
            .build();
        let net = network();
        let handler = dispatcher.command("boom").unwrap();
        let err = handler(&net, "70MAAAAAA", &[]).unwrap_err();
        assert_eq!(err.to_string(), "handler exploded");
    }
}
