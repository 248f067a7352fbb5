use std::time::Instant;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    /// Connected but no `hello` yet.
    Joining,
    Play,
}

#[derive(Debug)]
pub(crate) struct ConnectionInfo {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    state: ConnectionState,
    closed: bool,
    pub(crate) keep_alive_id: Option<i64>,
    pub(crate) last_active: Instant,
}

impl ConnectionInfo {
    pub(crate) fn new(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            state: ConnectionState::Joining,
            closed: false,
            keep_alive_id: None,
            last_active: Instant::now(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub(crate) fn joined(&self) -> bool {
        self.state == ConnectionState::Play
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}
