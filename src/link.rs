//! Wi-Fi link / cloud session state.
//!
//! ```text
//!            link up                 link lost / connect failed
//!   Idle ─────────────▶ Connected ─────────────────────────────▶ Disconnected
//!                          ▲                                         │
//!                          │ cloud_reconnected()          link up    │
//!                          └──────────── Reconnected ◀───────────────┘
//! ```
//!
//! Link callbacks only move the state; the publish loop performs the
//! actual shadow reconnect when it sees `Reconnected`.

/// Current link state as seen by the cloud task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// The station has never been connected.
    #[default]
    Idle,
    Connected,
    /// Link is back; the shadow session must be re-established.
    Reconnected,
    Disconnected,
}

/// What the caller must do after a link transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    None,
    /// First connection: start the cloud session.
    StartCloud,
    /// Link went away: tear down the shadow session.
    DropCloud,
}

#[derive(Debug, Default)]
pub struct Link {
    state: LinkState,
}

impl Link {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn on_link_up(&mut self) -> LinkAction {
        match self.state {
            LinkState::Idle => {
                self.state = LinkState::Connected;
                LinkAction::StartCloud
            }
            LinkState::Disconnected => {
                self.state = LinkState::Reconnected;
                LinkAction::None
            }
            LinkState::Connected | LinkState::Reconnected => LinkAction::None,
        }
    }

    pub fn on_link_lost(&mut self) -> LinkAction {
        self.drop_link()
    }

    pub fn on_connect_failed(&mut self) -> LinkAction {
        self.drop_link()
    }

    /// The shadow session came back after a `Reconnected` link.
    pub fn cloud_reconnected(&mut self) {
        if self.state == LinkState::Reconnected {
            self.state = LinkState::Connected;
        }
    }

    fn drop_link(&mut self) -> LinkAction {
        match self.state {
            // Never connected: nothing to tear down, and the next link up
            // must still start the cloud session.
            LinkState::Idle => LinkAction::None,
            _ => {
                self.state = LinkState::Disconnected;
                LinkAction::DropCloud
            }
        }
    }
}
