//! Local call lifecycle.
//!
//! ```text
//! Idle --start--> Active
//! Idle --remote start--> Announced --join--> Joining --media ready--> Active
//! Active --end / remote end--> Ending --cleanup--> Idle
//! any --transport lost--> Idle
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use huddle_common::PeerId;

use crate::error::CallError;
use crate::registry::MembershipRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallState {
    /// No call known in the room.
    Idle,
    /// Someone else started a call; we have not joined.
    Announced,
    /// Joining: local media acquisition in flight.
    Joining,
    /// In the call.
    Active,
    /// Tearing down links and media.
    Ending,
}

/// The current session instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSession {
    pub state: CallState,
    pub owner_id: Option<PeerId>,
    pub started_at: Option<DateTime<Utc>>,
    /// Bumped every time a new session instance begins.
    pub generation: u64,
}

/// Identifies one asynchronous request issued under a session instance.
///
/// Tickets go stale when the session instance changes or the session is
/// reset to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub generation: u64,
    pub attempt: u64,
}

pub struct CallSessionStateMachine {
    self_id: PeerId,
    session: CallSession,
    attempts: u64,
    /// `attempts` at the last reset; tickets at or below it are stale.
    reset_mark: u64,
}

impl CallSessionStateMachine {
    pub fn new(self_id: PeerId) -> Self {
        Self {
            self_id,
            session: CallSession {
                state: CallState::Idle,
                owner_id: None,
                started_at: None,
                generation: 0,
            },
            attempts: 0,
            reset_mark: 0,
        }
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn state(&self) -> CallState {
        self.session.state
    }

    pub fn owner(&self) -> Option<&PeerId> {
        self.session.owner_id.as_ref()
    }

    pub fn is_owner(&self) -> bool {
        self.session.owner_id.as_ref() == Some(&self.self_id)
    }

    /// Start is offered only to a lone member with no call in the room.
    pub fn can_start(&self, registry: &MembershipRegistry) -> bool {
        self.session.state == CallState::Idle && registry.count() == 1
    }

    /// The owner may end. Once the owner has left the room, any member in
    /// the call may.
    pub fn can_end(&self, registry: &MembershipRegistry) -> bool {
        if self.session.state != CallState::Active {
            return false;
        }
        match &self.session.owner_id {
            Some(owner) => *owner == self.self_id || !registry.contains(owner),
            None => true,
        }
    }

    /// `Idle -> Active` with self as owner. The returned ticket covers the
    /// owner's media acquisition.
    pub fn start_call(&mut self, registry: &MembershipRegistry) -> Result<Ticket, CallError> {
        if self.session.state != CallState::Idle {
            return Err(self.invalid("start"));
        }
        if registry.count() != 1 {
            return Err(CallError::NotPermitted(
                "a call can only be started while alone in the room".into(),
            ));
        }
        self.rebuild(CallState::Active, self.self_id.clone(), Utc::now());
        tracing::info!(generation = self.session.generation, "call started locally");
        Ok(self.next_ticket())
    }

    /// A `videoCall:started` arrived. The last start received wins.
    ///
    /// Returns `true` if this opened a new announcement.
    pub fn remote_started(&mut self, owner: PeerId, started_at: Option<DateTime<Utc>>) -> bool {
        let started_at = started_at.unwrap_or_else(Utc::now);
        match self.session.state {
            CallState::Idle => {
                if owner == self.self_id {
                    tracing::debug!("ignoring call start naming self while idle");
                    return false;
                }
                self.rebuild(CallState::Announced, owner, started_at);
                tracing::info!(owner = %self.owner_label(), "call announced");
                true
            }
            CallState::Announced | CallState::Joining | CallState::Active => {
                if self.session.owner_id.as_ref() != Some(&owner) {
                    tracing::info!(
                        state = ?self.session.state,
                        owner = %owner,
                        "call owner replaced by later start"
                    );
                }
                self.session.owner_id = Some(owner);
                self.session.started_at = Some(started_at);
                false
            }
            CallState::Ending => {
                tracing::debug!("ignoring call start while ending");
                false
            }
        }
    }

    /// `Announced -> Joining`.
    pub fn begin_join(&mut self) -> Result<Ticket, CallError> {
        if self.session.state != CallState::Announced {
            return Err(self.invalid("join"));
        }
        self.session.state = CallState::Joining;
        tracing::info!(generation = self.session.generation, "joining call");
        Ok(self.next_ticket())
    }

    /// `Joining -> Active`.
    pub fn media_ready(&mut self) -> Result<(), CallError> {
        if self.session.state != CallState::Joining {
            return Err(self.invalid("complete join"));
        }
        self.session.state = CallState::Active;
        tracing::info!(generation = self.session.generation, "joined call");
        Ok(())
    }

    /// Local media acquisition failed.
    ///
    /// A joiner falls back to `Announced`. The owner of a call it started
    /// itself moves to `Ending` and the return value is `true`: the caller
    /// must announce the end and tear down.
    pub fn media_failed(&mut self) -> Result<bool, CallError> {
        match self.session.state {
            CallState::Joining => {
                self.session.state = CallState::Announced;
                Ok(false)
            }
            CallState::Active if self.is_owner() => {
                self.session.state = CallState::Ending;
                Ok(true)
            }
            CallState::Active => {
                self.session.state = CallState::Announced;
                Ok(false)
            }
            _ => Err(self.invalid("abort join")),
        }
    }

    /// `Active -> Ending` for a local end, subject to ending authority.
    pub fn begin_end(&mut self, registry: &MembershipRegistry) -> Result<(), CallError> {
        if self.session.state != CallState::Active {
            return Err(self.invalid("end"));
        }
        if !self.can_end(registry) {
            return Err(CallError::NotPermitted(format!(
                "only {} can end this call",
                registry.owner_display_name(self.session.owner_id.as_ref())
            )));
        }
        self.session.state = CallState::Ending;
        Ok(())
    }

    /// A `videoCall:ended` arrived. Returns the state it interrupted.
    ///
    /// `Announced`/`Joining` go straight to `Idle`; `Active` moves to
    /// `Ending` and waits for [`cleanup_complete`](Self::cleanup_complete).
    pub fn remote_ended(&mut self) -> CallState {
        let previous = self.session.state;
        match previous {
            CallState::Announced | CallState::Joining => self.reset(),
            CallState::Active => self.session.state = CallState::Ending,
            CallState::Idle | CallState::Ending => {}
        }
        previous
    }

    /// `Ending -> Idle`.
    pub fn cleanup_complete(&mut self) {
        if self.session.state == CallState::Ending {
            self.reset();
        }
    }

    /// Any state to `Idle`.
    pub fn transport_lost(&mut self) {
        self.reset();
    }

    /// Whether a completion issued under `ticket` may still be applied.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.session.generation && ticket.attempt > self.reset_mark
    }

    /// Ticket for a request that is not itself a transition (screen capture).
    pub fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket()
    }

    fn next_ticket(&mut self) -> Ticket {
        self.attempts += 1;
        Ticket {
            generation: self.session.generation,
            attempt: self.attempts,
        }
    }

    fn rebuild(&mut self, state: CallState, owner: PeerId, started_at: DateTime<Utc>) {
        self.session = CallSession {
            state,
            owner_id: Some(owner),
            started_at: Some(started_at),
            generation: self.session.generation + 1,
        };
    }

    fn reset(&mut self) {
        if self.session.state != CallState::Idle {
            tracing::info!(from = ?self.session.state, "call session idle");
        }
        self.session.state = CallState::Idle;
        self.session.owner_id = None;
        self.session.started_at = None;
        self.reset_mark = self.attempts;
    }

    fn owner_label(&self) -> String {
        self.session
            .owner_id
            .as_ref()
            .map(PeerId::to_string)
            .unwrap_or_default()
    }

    fn invalid(&self, action: &'static str) -> CallError {
        CallError::InvalidTransition {
            from: self.session.state,
            action,
        }
    }
}
