//! Boundary types shared with the embedding host.
//!
//! The host owns players, world geometry, chat delivery, and the parsing of
//! reply commands such as `/accept`. This crate only sees the narrow shapes
//! defined here.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::request::Request;

/// Stable identity of a player as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Delivers literal prompt text to a player.
///
/// Formatting, colouring, and localisation belong to the implementation;
/// `params` are positional substitutions for `{0}`, `{1}`, ...
pub trait Messenger: Send + Sync {
    fn tell(&self, player: &PlayerId, message: &str, params: &[&str]);
}

/// The host's reply correlator, which turns chat commands into responses.
///
/// Informed when a pending request ends without an answer so that a late
/// reply is not routed anywhere.
pub trait ResponseRouter: Send + Sync {
    fn cancel(&self, request: &Request);
}

/// Why a player entered a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnterReason {
    Move,
    Teleport,
    Respawn,
    Join,
}

/// Why a player left a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveReason {
    Move,
    Teleport,
    Dead,
    Quit,
}

/// Messenger that records every message; handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(PlayerId, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, with positional parameters substituted.
    pub fn messages(&self) -> Vec<(PlayerId, String)> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages sent to one player.
    pub fn messages_for(&self, player: &PlayerId) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(to, _)| to == player)
            .map(|(_, text)| text)
            .collect()
    }
}

impl Messenger for RecordingMessenger {
    fn tell(&self, player: &PlayerId, message: &str, params: &[&str]) {
        let mut text = message.to_string();
        for (i, param) in params.iter().enumerate() {
            text = text.replace(&format!("{{{}}}", i), param);
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((player.clone(), text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_messenger_substitutes_params() {
        let messenger = RecordingMessenger::new();
        let alice = PlayerId::from("alice");
        messenger.tell(&alice, "Expires in {0} seconds.", &["30"]);
        messenger.tell(&PlayerId::from("bob"), "hello", &[]);
        assert_eq!(messenger.messages_for(&alice), vec!["Expires in 30 seconds."]);
        assert_eq!(messenger.messages().len(), 2);
    }
}
