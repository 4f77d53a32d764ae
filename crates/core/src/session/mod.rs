use std::{io::Write, path::Path, time::Duration};

use rand::Rng;

use crate::{
    backlight::{BacklightState, BacklightSurface},
    playback::{unprobed_clip, PlaybackController, PlayerSpawner},
    render::{write_wake_up, DisplayRenderer, GeometrySource, HighlightMode},
    AudioClip, ClipCatalog, CyberdeckError, Result, SessionPlan, SessionPlanner,
};

/// How a session that started playing came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Cancelled before the alarm; the remaining clips were not played.
    Interrupted,
    /// Every clip played and the alarm was stopped by the user.
    AlarmDismissed,
    /// Every clip played and the alarm player exited by itself.
    AlarmFinished,
}

/// Plans a session, plays it clip by clip, then rings the alarm.
pub struct SessionRunner<S, B, G, R, W> {
    controller: PlaybackController<S, B>,
    planner: SessionPlanner,
    renderer: DisplayRenderer,
    geometry: G,
    rng: R,
    out: W,
}

impl<S, B, G, R, W> SessionRunner<S, B, G, R, W>
where
    S: PlayerSpawner,
    B: BacklightSurface,
    G: GeometrySource,
    R: Rng,
    W: Write,
{
    pub fn new(controller: PlaybackController<S, B>, geometry: G, rng: R, out: W) -> Self {
        Self {
            controller,
            planner: SessionPlanner::new(),
            renderer: DisplayRenderer::new(),
            geometry,
            rng,
            out,
        }
    }

    pub fn controller(&self) -> &PlaybackController<S, B> {
        &self.controller
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Plans `budget_seconds` worth of clips from `catalog` and runs them.
    /// Nothing is played when the catalog is empty, nothing fits, or the
    /// session was interrupted while the catalog was loading.
    pub fn run(
        &mut self,
        catalog: &ClipCatalog,
        budget_seconds: u32,
        alarm: &Path,
    ) -> Result<SessionOutcome> {
        if self.controller.cancellation().is_cancelled() {
            return Ok(interrupted(&mut self.controller, "before planning"));
        }
        if catalog.is_empty() {
            return Err(CyberdeckError::EmptyCatalog);
        }
        let plan = self
            .planner
            .plan(catalog.clips(), budget_seconds, &mut self.rng)?;
        self.run_plan(&plan, alarm)
    }

    /// Plays every clip of `plan` in order with its padding pause, then loops
    /// the alarm until cancelled. A spawn failure aborts the whole session.
    pub fn run_plan(&mut self, plan: &SessionPlan, alarm: &Path) -> Result<SessionOutcome> {
        let Self {
            controller,
            renderer,
            geometry,
            rng,
            out,
            ..
        } = self;
        let padding = Duration::from_secs_f64(plan.padding_seconds());

        for (index, entry) in plan.iter().enumerate() {
            if controller.cancellation().is_cancelled() {
                return Ok(interrupted(controller, "before a clip"));
            }
            let clip: &AudioClip = &entry.clip;
            tracing::info!(index, clip = %clip.name, offset = entry.offset_seconds, "starting clip");

            let result = controller.play(clip, false, |_| {
                draw_heartbeat(renderer, plan, clip, &*geometry, HighlightMode::Active, rng, out)
            })?;
            if result.is_cancelled() {
                tracing::info!(clip = %clip.name, "session interrupted during playback");
                return Ok(SessionOutcome::Interrupted);
            }

            draw_heartbeat(renderer, plan, clip, &*geometry, HighlightMode::Transition, rng, out)?;
            if controller.cancellation().sleep(padding) {
                return Ok(interrupted(controller, "during padding"));
            }
        }

        if controller.cancellation().is_cancelled() {
            return Ok(interrupted(controller, "before the alarm"));
        }

        tracing::info!(alarm = %alarm.display(), "session complete, sounding alarm");
        let alarm = unprobed_clip(alarm);
        let result = controller.play(&alarm, true, |_| Ok(write_wake_up(out)?))?;

        Ok(if result.is_cancelled() {
            SessionOutcome::AlarmDismissed
        } else {
            SessionOutcome::AlarmFinished
        })
    }
}

/// Leaves the backlight on and reports an interrupted session.
fn interrupted<S, B>(controller: &mut PlaybackController<S, B>, stage: &str) -> SessionOutcome
where
    S: PlayerSpawner,
    B: BacklightSurface,
{
    controller.backlight_mut().set(BacklightState::On);
    tracing::info!(stage, "session interrupted");
    SessionOutcome::Interrupted
}

fn draw_heartbeat<G, R, W>(
    renderer: &DisplayRenderer,
    plan: &SessionPlan,
    active: &AudioClip,
    geometry: &G,
    mode: HighlightMode,
    rng: &mut R,
    out: &mut W,
) -> Result<()>
where
    G: GeometrySource + ?Sized,
    R: Rng + ?Sized,
    W: Write + ?Sized,
{
    let frame = renderer.render_heartbeat(plan, Some(active), geometry.geometry(), mode, rng);
    frame.write_to(out)?;
    Ok(())
}
