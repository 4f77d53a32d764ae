use std::sync::Arc;

use rand::{seq::SliceRandom, Rng};

use crate::{AudioClip, CyberdeckError, Result};

/// A clip placed on the session timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledClip {
    pub clip: Arc<AudioClip>,
    /// Planned start, in seconds from the beginning of the session.
    pub offset_seconds: f64,
}

/// The ordered clips of one session together with the silence between them.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    scheduled: Vec<ScheduledClip>,
    total_budget_seconds: u32,
    padding_seconds: f64,
}

impl SessionPlan {
    /// Walks `candidates` in order, keeping every clip strictly shorter than
    /// the budget still remaining, then spreads the leftover time evenly after
    /// each kept clip.
    pub fn fit(candidates: &[Arc<AudioClip>], budget_seconds: u32) -> Result<Self> {
        let mut remaining = budget_seconds;
        let mut selected = Vec::new();
        for clip in candidates {
            if clip.duration_seconds < remaining {
                remaining -= clip.duration_seconds;
                selected.push(Arc::clone(clip));
            }
        }

        if selected.is_empty() {
            return Err(CyberdeckError::NoClipsSelected);
        }

        let padding_seconds = f64::from(remaining) / selected.len() as f64;
        let mut offset = 0.0;
        let scheduled = selected
            .into_iter()
            .map(|clip| {
                let offset_seconds = offset;
                offset += f64::from(clip.duration_seconds) + padding_seconds;
                ScheduledClip {
                    clip,
                    offset_seconds,
                }
            })
            .collect();

        Ok(Self {
            scheduled,
            total_budget_seconds: budget_seconds,
            padding_seconds,
        })
    }

    pub fn scheduled(&self) -> &[ScheduledClip] {
        &self.scheduled
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScheduledClip> {
        self.scheduled.iter()
    }

    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    pub fn total_budget_seconds(&self) -> u32 {
        self.total_budget_seconds
    }

    /// Pause inserted after every clip, including the last one before the
    /// alarm.
    pub fn padding_seconds(&self) -> f64 {
        self.padding_seconds
    }

    /// Sum of the selected clip lengths.
    pub fn audio_seconds(&self) -> u32 {
        self.scheduled
            .iter()
            .map(|entry| entry.clip.duration_seconds)
            .sum()
    }
}

impl<'a> IntoIterator for &'a SessionPlan {
    type Item = &'a ScheduledClip;
    type IntoIter = std::slice::Iter<'a, ScheduledClip>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Randomised first-fit selection of clips for a session budget.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionPlanner;

impl SessionPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Shuffles the catalog with `rng` and fits it into `budget_seconds`.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        catalog: &[Arc<AudioClip>],
        budget_seconds: u32,
        rng: &mut R,
    ) -> Result<SessionPlan> {
        let mut candidates = catalog.to_vec();
        candidates.shuffle(rng);
        let plan = SessionPlan::fit(&candidates, budget_seconds)?;
        tracing::info!(
            clips = plan.len(),
            budget = budget_seconds,
            padding = plan.padding_seconds(),
            "planned meditation session"
        );
        Ok(plan)
    }
}

/// Formats seconds as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn humanize_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
