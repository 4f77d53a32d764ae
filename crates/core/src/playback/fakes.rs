//! In-memory players and backlight used by the playback and session tests.

use std::{
    cell::RefCell,
    io,
    path::{Path, PathBuf},
    rc::Rc,
};

use super::{CancellationToken, PlayerProcess, PlayerSpawner};
use crate::{
    backlight::{BacklightState, BacklightSurface},
    CyberdeckError, Result,
};

/// Everything the fakes observed, in order.
#[derive(Debug, Default)]
pub(crate) struct FakeLog {
    /// Total liveness polls across all players.
    pub polls: u64,
    /// Backlight writes tagged with the poll count at the time of the write.
    pub writes: Vec<(u64, BacklightState)>,
    pub spawned: Vec<(PathBuf, bool)>,
    pub terminated: bool,
    pub waited: bool,
}

pub(crate) type SharedLog = Rc<RefCell<FakeLog>>;

pub(crate) struct RecordingBacklight {
    log: SharedLog,
}

impl RecordingBacklight {
    pub fn new(log: SharedLog) -> Self {
        Self { log }
    }
}

impl BacklightSurface for RecordingBacklight {
    fn write_state(&mut self, state: BacklightState) -> io::Result<()> {
        let mut log = self.log.borrow_mut();
        let polls = log.polls;
        log.writes.push((polls, state));
        Ok(())
    }
}

pub(crate) struct FakeSpawner {
    log: SharedLog,
    running_for: Option<u64>,
    cancel_at: Option<(u64, CancellationToken)>,
    fail_on: Option<usize>,
}

impl FakeSpawner {
    /// Players that never exit on their own.
    pub fn new() -> Self {
        Self {
            log: SharedLog::default(),
            running_for: None,
            cancel_at: None,
            fail_on: None,
        }
    }

    /// Non-looping players report running for `polls` polls, then exit.
    /// Looping players keep running.
    pub fn running_for(mut self, polls: u64) -> Self {
        self.running_for = Some(polls);
        self
    }

    /// Cancels `token` during the poll whose global count reaches `poll`.
    pub fn cancelling_at(mut self, poll: u64, token: CancellationToken) -> Self {
        self.cancel_at = Some((poll, token));
        self
    }

    /// The spawn with this index fails.
    pub fn failing_on(mut self, spawn: usize) -> Self {
        self.fail_on = Some(spawn);
        self
    }

    pub fn log(&self) -> SharedLog {
        Rc::clone(&self.log)
    }
}

impl PlayerSpawner for FakeSpawner {
    type Process = FakeProcess;

    fn spawn(&mut self, path: &Path, looping: bool) -> Result<FakeProcess> {
        let index = self.log.borrow().spawned.len();
        if self.fail_on == Some(index) {
            return Err(CyberdeckError::Spawn {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "player missing"),
            });
        }

        self.log
            .borrow_mut()
            .spawned
            .push((path.to_path_buf(), looping));
        let remaining = if looping { None } else { self.running_for };
        Ok(FakeProcess {
            log: Rc::clone(&self.log),
            remaining,
            cancel_at: self.cancel_at.clone(),
            exited: false,
        })
    }
}

pub(crate) struct FakeProcess {
    log: SharedLog,
    remaining: Option<u64>,
    cancel_at: Option<(u64, CancellationToken)>,
    exited: bool,
}

impl PlayerProcess for FakeProcess {
    fn is_running(&mut self) -> Result<bool> {
        let polls = {
            let mut log = self.log.borrow_mut();
            log.polls += 1;
            log.polls
        };
        if let Some((at, token)) = &self.cancel_at {
            if *at == polls {
                token.cancel();
            }
        }
        if self.exited {
            return Ok(false);
        }
        match &mut self.remaining {
            Some(0) => {
                self.exited = true;
                Ok(false)
            }
            Some(left) => {
                *left -= 1;
                Ok(true)
            }
            None => Ok(true),
        }
    }

    fn terminate(&mut self) -> Result<()> {
        self.exited = true;
        self.log.borrow_mut().terminated = true;
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        self.log.borrow_mut().waited = true;
        Ok(())
    }
}
