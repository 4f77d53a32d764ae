use std::{
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    backlight::{BacklightDriver, BacklightState, BacklightSurface},
    config::PlaybackConfig,
    AudioClip, CyberdeckError, Result,
};

#[cfg(test)]
pub(crate) mod fakes;

const CANCEL_POLL: Duration = Duration::from_millis(50);
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Shared interrupt flag. Clones observe the same flag, so a signal handler
/// can hold one while the playback loop polls another.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration`, waking early on cancellation. Returns `true`
    /// when the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(CANCEL_POLL));
        }
    }
}

/// Lifecycle of one player process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Cancelled,
    Completed,
}

/// Signals delivered to the caller while a clip plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The player was spawned and the backlight switched on.
    Started,
    /// Periodic redraw point; the backlight is switched on right after.
    Heartbeat { tick: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackResult {
    pub state: PlaybackState,
    pub ticks: u64,
}

impl PlaybackResult {
    pub fn is_cancelled(&self) -> bool {
        self.state == PlaybackState::Cancelled
    }
}

/// A running audio player.
pub trait PlayerProcess {
    /// Polls without blocking.
    fn is_running(&mut self) -> Result<bool>;
    fn terminate(&mut self) -> Result<()>;
    /// Blocks until the process has exited and been reaped.
    fn wait(&mut self) -> Result<()>;
}

/// Starts audio players.
pub trait PlayerSpawner {
    type Process: PlayerProcess;

    fn spawn(&mut self, path: &Path, looping: bool) -> Result<Self::Process>;
}

/// [`PlayerSpawner`] running a VLC-compatible command line player.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::new("cvlc")
    }
}

impl PlayerSpawner for CommandPlayer {
    type Process = ChildPlayer;

    fn spawn(&mut self, path: &Path, looping: bool) -> Result<ChildPlayer> {
        let mut command = Command::new(&self.program);
        command
            .arg(path)
            .arg(if looping { "--loop" } else { "--play-and-exit" })
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Keep terminal Ctrl-C away from the player; the controller stops it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|source| CyberdeckError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ChildPlayer { child })
    }
}

#[derive(Debug)]
pub struct ChildPlayer {
    child: Child,
}

impl PlayerProcess for ChildPlayer {
    fn is_running(&mut self) -> Result<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    /// Asks the player to exit with `SIGTERM`, falling back to a hard kill
    /// if it is still running after a short grace period.
    fn terminate(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            let pid = libc::pid_t::try_from(self.child.id())
                .map_err(|_| CyberdeckError::msg("player pid out of range"))?;
            // SAFETY: `pid` is our own child and has not been reaped yet, so
            // it cannot have been recycled for another process.
            if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
                let deadline = Instant::now() + TERMINATE_GRACE;
                while Instant::now() < deadline {
                    if self.child.try_wait()?.is_some() {
                        return Ok(());
                    }
                    thread::sleep(CANCEL_POLL);
                }
                tracing::warn!(pid, "player ignored SIGTERM, killing it");
            }
        }

        self.child.kill()?;
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        self.child.wait()?;
        Ok(())
    }
}

/// What the breathing effect does on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Heartbeat,
    Dim,
    Hold,
}

/// Tick periods of the breathing effect. The heartbeat period is a multiple
/// of the dim period so a tick is never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    heartbeat_ticks: u64,
    dim_ticks: u64,
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self {
            heartbeat_ticks: 90,
            dim_ticks: 30,
        }
    }
}

impl DutyCycle {
    pub fn new(heartbeat_ticks: u64, dim_ticks: u64) -> Result<Self> {
        if heartbeat_ticks == 0 || dim_ticks == 0 || heartbeat_ticks % dim_ticks != 0 {
            return Err(CyberdeckError::InvalidConfig(format!(
                "heartbeat period {heartbeat_ticks} must be a positive multiple of dim period {dim_ticks}"
            )));
        }
        Ok(Self {
            heartbeat_ticks,
            dim_ticks,
        })
    }

    pub fn action(&self, tick: u64) -> TickAction {
        if tick % self.heartbeat_ticks == 0 {
            TickAction::Heartbeat
        } else if tick % self.dim_ticks == 0 {
            TickAction::Dim
        } else {
            TickAction::Hold
        }
    }
}

/// Plays one clip at a time while pulsing the backlight.
///
/// The controller is the only writer of the backlight: every write happens
/// on the calling thread, between polls of the player. Whatever way a
/// playback ends, the backlight is left on.
#[derive(Debug)]
pub struct PlaybackController<S, B> {
    spawner: S,
    backlight: BacklightDriver<B>,
    cancel: CancellationToken,
    duty: DutyCycle,
    tick_interval: Duration,
    state: PlaybackState,
}

impl<S: PlayerSpawner, B: BacklightSurface> PlaybackController<S, B> {
    pub fn new(spawner: S, backlight: BacklightDriver<B>, cancel: CancellationToken) -> Self {
        Self {
            spawner,
            backlight,
            cancel,
            duty: DutyCycle::default(),
            tick_interval: Duration::from_millis(500),
            state: PlaybackState::Idle,
        }
    }

    pub fn from_config(
        spawner: S,
        backlight: BacklightDriver<B>,
        cancel: CancellationToken,
        config: &PlaybackConfig,
    ) -> Result<Self> {
        let duty = DutyCycle::new(config.heartbeat_ticks, config.dim_ticks)?;
        Ok(Self::new(spawner, backlight, cancel)
            .with_duty_cycle(duty)
            .with_tick_interval(config.tick_interval()))
    }

    pub fn with_duty_cycle(mut self, duty: DutyCycle) -> Self {
        self.duty = duty;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn backlight_mut(&mut self) -> &mut BacklightDriver<B> {
        &mut self.backlight
    }

    /// Plays `clip` until the player exits or the cancellation token fires.
    ///
    /// Nothing is spawned when the token is already cancelled. A spawn
    /// failure is returned before anything else happens. An error from
    /// `on_tick` or from polling the player stops the player and is returned
    /// after cleanup.
    pub fn play<F>(
        &mut self,
        clip: &AudioClip,
        looping: bool,
        mut on_tick: F,
    ) -> Result<PlaybackResult>
    where
        F: FnMut(PlaybackEvent) -> Result<()>,
    {
        self.state = PlaybackState::Idle;
        if self.cancel.is_cancelled() {
            self.backlight.set(BacklightState::On);
            self.state = PlaybackState::Cancelled;
            tracing::info!(clip = %clip.name, "cancelled before playback started");
            return Ok(PlaybackResult {
                state: PlaybackState::Cancelled,
                ticks: 0,
            });
        }
        let mut process = self.spawner.spawn(&clip.path, looping)?;
        self.state = PlaybackState::Running;
        tracing::info!(clip = %clip.name, looping, "playback started");

        let mut ticks = 0;
        let outcome = self.drive(&mut process, &mut ticks, &mut on_tick);
        if !matches!(outcome, Ok(PlaybackState::Completed)) {
            self.stop(&mut process);
        }
        self.backlight.set(BacklightState::On);

        self.state = match &outcome {
            Ok(state) => *state,
            Err(_) => PlaybackState::Cancelled,
        };
        let state = outcome?;
        tracing::info!(clip = %clip.name, ?state, ticks, "playback finished");
        Ok(PlaybackResult { state, ticks })
    }

    fn drive<F>(
        &mut self,
        process: &mut S::Process,
        ticks: &mut u64,
        on_tick: &mut F,
    ) -> Result<PlaybackState>
    where
        F: FnMut(PlaybackEvent) -> Result<()>,
    {
        on_tick(PlaybackEvent::Started)?;
        self.backlight.set(BacklightState::On);

        loop {
            if self.cancel.is_cancelled() {
                return Ok(PlaybackState::Cancelled);
            }
            if !process.is_running()? {
                return Ok(PlaybackState::Completed);
            }

            *ticks += 1;
            match self.duty.action(*ticks) {
                TickAction::Heartbeat => {
                    tracing::debug!(tick = *ticks, "heartbeat");
                    on_tick(PlaybackEvent::Heartbeat { tick: *ticks })?;
                    self.backlight.set(BacklightState::On);
                }
                TickAction::Dim => {
                    tracing::debug!(tick = *ticks, "dimming backlight");
                    self.backlight.set(BacklightState::Off);
                }
                TickAction::Hold => {}
            }

            if self.cancel.sleep(self.tick_interval) {
                return Ok(PlaybackState::Cancelled);
            }
        }
    }

    fn stop(&mut self, process: &mut S::Process) {
        if let Err(err) = process.terminate() {
            tracing::warn!(%err, "failed to terminate player");
        }
        if let Err(err) = process.wait() {
            tracing::warn!(%err, "failed to reap player");
        }
    }
}

/// Convenience for playing a file that was never probed, such as the alarm.
pub fn unprobed_clip(path: impl Into<PathBuf>) -> AudioClip {
    AudioClip::new(path, 0)
}

#[cfg(test)]
mod tests {
    use super::{fakes::*, *};
    use crate::backlight::BacklightState::{Off, On};

    fn controller(spawner: FakeSpawner) -> PlaybackController<FakeSpawner, RecordingBacklight> {
        let backlight = BacklightDriver::new(RecordingBacklight::new(spawner.log()));
        PlaybackController::new(spawner, backlight, CancellationToken::new())
            .with_tick_interval(Duration::ZERO)
    }

    fn clip() -> AudioClip {
        AudioClip::new("/audio/breath.mp3", 90)
    }

    #[test]
    fn duty_cycle_is_mutually_exclusive() {
        let duty = DutyCycle::default();
        assert_eq!(duty.action(30), TickAction::Dim);
        assert_eq!(duty.action(90), TickAction::Heartbeat);
        assert_eq!(duty.action(91), TickAction::Hold);
        assert!(DutyCycle::new(45, 30).is_err());
        assert!(DutyCycle::new(90, 0).is_err());
    }

    #[test]
    fn breathes_on_the_tick_schedule() {
        let spawner = FakeSpawner::new().running_for(180);
        let log = spawner.log();
        let mut controller = controller(spawner);

        let mut events = Vec::new();
        let result = controller
            .play(&clip(), false, |event| {
                events.push(event);
                Ok(())
            })
            .unwrap();

        assert_eq!(result.state, PlaybackState::Completed);
        assert_eq!(result.ticks, 180);
        assert_eq!(controller.state(), PlaybackState::Completed);
        assert_eq!(
            events,
            [
                PlaybackEvent::Started,
                PlaybackEvent::Heartbeat { tick: 90 },
                PlaybackEvent::Heartbeat { tick: 180 },
            ]
        );

        let log = log.borrow();
        assert_eq!(
            log.writes,
            [
                (0, On),
                (30, Off),
                (60, Off),
                (90, On),
                (120, Off),
                (150, Off),
                (180, On),
                (181, On),
            ]
        );
        assert!(!log.terminated);
        assert_eq!(log.spawned, [(PathBuf::from("/audio/breath.mp3"), false)]);
    }

    #[test]
    fn cancellation_at_any_tick_restores_backlight() {
        for cancel_at in [1, 29, 30, 31, 60, 89, 90, 135] {
            let token = CancellationToken::new();
            let spawner = FakeSpawner::new().cancelling_at(cancel_at, token.clone());
            let log = spawner.log();
            let backlight = BacklightDriver::new(RecordingBacklight::new(log.clone()));
            let mut controller = PlaybackController::new(spawner, backlight, token)
                .with_tick_interval(Duration::ZERO);

            let result = controller.play(&clip(), false, |_| Ok(())).unwrap();

            assert!(result.is_cancelled(), "tick {cancel_at}");
            assert_eq!(result.ticks, cancel_at);
            let log = log.borrow();
            assert!(log.terminated && log.waited, "player left running at tick {cancel_at}");
            assert_eq!(log.writes.last().map(|w| w.1), Some(On), "tick {cancel_at}");
        }
    }

    #[test]
    fn cancellation_before_first_poll() {
        let spawner = FakeSpawner::new();
        let log = spawner.log();
        let mut controller = controller(spawner);
        let token = controller.cancellation().clone();

        let result = controller
            .play(&clip(), true, |event| {
                if event == PlaybackEvent::Started {
                    token.cancel();
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(result.state, PlaybackState::Cancelled);
        assert_eq!(result.ticks, 0);
        assert_eq!(log.borrow().polls, 0);
        assert!(log.borrow().waited);
    }

    #[test]
    fn cancelled_token_spawns_nothing() {
        let spawner = FakeSpawner::new();
        let log = spawner.log();
        let mut controller = controller(spawner);
        controller.cancellation().cancel();

        let mut events = Vec::new();
        let result = controller
            .play(&clip(), false, |event| {
                events.push(event);
                Ok(())
            })
            .unwrap();

        assert_eq!(result.state, PlaybackState::Cancelled);
        assert_eq!(controller.state(), PlaybackState::Cancelled);
        assert!(events.is_empty());
        let log = log.borrow();
        assert!(log.spawned.is_empty());
        assert_eq!(log.writes, [(0, On)]);
    }

    #[test]
    fn callback_errors_still_clean_up() {
        let spawner = FakeSpawner::new();
        let log = spawner.log();
        let mut controller = controller(spawner);

        let err = controller
            .play(&clip(), false, |event| match event {
                PlaybackEvent::Heartbeat { .. } => Err(CyberdeckError::msg("display gone")),
                PlaybackEvent::Started => Ok(()),
            })
            .unwrap_err();

        assert!(format!("{err}").contains("display gone"));
        assert_eq!(controller.state(), PlaybackState::Cancelled);
        let log = log.borrow();
        assert!(log.terminated && log.waited);
        assert_eq!(log.writes.last(), Some(&(90, On)));
    }

    #[test]
    fn spawn_failure_is_returned_untouched() {
        let spawner = FakeSpawner::new().failing_on(0);
        let log = spawner.log();
        let mut controller = controller(spawner);

        let err = controller.play(&clip(), false, |_| Ok(())).unwrap_err();

        assert!(matches!(err, CyberdeckError::Spawn { .. }));
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(log.borrow().writes.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn terminate_stops_a_real_child_gracefully() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let mut player = ChildPlayer { child };
        assert!(player.is_running().unwrap());

        let started = Instant::now();
        player.terminate().unwrap();
        player.wait().unwrap();

        assert!(started.elapsed() < TERMINATE_GRACE);
        assert!(!player.is_running().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn terminate_after_exit_is_a_no_op() {
        let child = Command::new("true").spawn().unwrap();
        let mut player = ChildPlayer { child };
        player.wait().unwrap();

        assert!(player.terminate().is_ok());
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let token = CancellationToken::new();
        token.clone().cancel();
        let started = Instant::now();
        assert!(token.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!CancellationToken::new().sleep(Duration::ZERO));
    }
}
