//! Full-screen heartbeat overlay: the session status block drifting through a
//! field of green noise.

use std::io::{self, Write};

use rand::{seq::SliceRandom, Rng};

use crate::{timeline::humanize_duration, AudioClip, SessionPlan};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const RESET: &str = "\x1b[0m";
const ACTIVE_PREFIX: &str = "\x1b[1;33m>> ";
const TRANSITION_PREFIX: &str = "\x1b[1;32m++ ";
const IDLE_PREFIX: &str = "   ";
const SPACE_WEIGHT: u32 = 50;

const NOISE_SYMBOLS: &str = concat!(
    "abcdefghijklmnopqrstuvwxyz",
    "0123456789",
    "!@#$%^&*()_+-][}{;:<>,./?`~",
    "абвгдежзиклмнопрстуфхцчшщъыьэюя",
    "ｦｧｨｩｪｫｬｭｮｯｰｱｲｳｴｵｶｷｸｹｺｻｼｽｾｿﾀﾁﾂﾃﾄﾅﾆﾇﾈﾉﾊﾋﾌﾍﾎﾏﾐﾑﾒﾓﾔﾕﾖﾗﾘﾙﾚﾛﾜﾝ",
);

/// 256-colour palette indices, all shades of green.
pub const GREEN_PALETTE: [u8; 12] = [22, 28, 34, 35, 40, 41, 46, 47, 76, 77, 82, 83];

const WAKE_UP_BANNER: &str = r"
 _    _         _              _   _
| |  | |       | |            | | | |
| |  | |  __ _ | | __  ___    | | | | _ __
| |/\| | / _` || |/ / / _ \   | | | || '_ \
\  /\  /| (_| ||   < |  __/   | |_| || |_) |
 \/  \/  \__,_||_|\_\ \___|    \___/ | .__/
                                     | |
                                     |_|
";

/// Which highlight the active clip receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightMode {
    /// The clip is playing.
    Active,
    /// The clip just finished and the session is in its padding pause.
    Transition,
}

impl HighlightMode {
    fn prefix(self) -> &'static str {
        match self {
            Self::Active => ACTIVE_PREFIX,
            Self::Transition => TRANSITION_PREFIX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub columns: u16,
    pub lines: u16,
}

impl TerminalGeometry {
    pub const FALLBACK: Self = Self {
        columns: 80,
        lines: 24,
    };

    pub fn new(columns: u16, lines: u16) -> Self {
        Self { columns, lines }
    }
}

/// Reports the current terminal size at draw time.
pub trait GeometrySource {
    fn geometry(&self) -> TerminalGeometry;
}

impl GeometrySource for TerminalGeometry {
    fn geometry(&self) -> TerminalGeometry {
        *self
    }
}

/// One character of background noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseCell {
    pub symbol: char,
    pub color: u8,
}

/// A fully generated heartbeat screen.
#[derive(Debug, Clone)]
pub struct Frame {
    top: usize,
    status: Vec<String>,
    noise: Vec<Vec<NoiseCell>>,
}

impl Frame {
    /// Line on which the status block starts.
    pub fn top(&self) -> usize {
        self.top
    }

    pub fn status_lines(&self) -> &[String] {
        &self.status
    }

    pub fn noise_rows(&self) -> &[Vec<NoiseCell>] {
        &self.noise
    }

    pub fn noise_cell_count(&self) -> usize {
        self.noise.iter().map(Vec::len).sum()
    }

    /// Clears the screen and draws noise above, the status block, then noise
    /// below.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let (above, below) = self.noise.split_at(self.top);
        let lines: Vec<String> = above
            .iter()
            .map(|row| paint_row(row))
            .chain(self.status.iter().cloned())
            .chain(below.iter().map(|row| paint_row(row)))
            .collect();

        out.write_all(CLEAR_SCREEN.as_bytes())?;
        out.write_all(lines.join("\n").as_bytes())?;
        out.flush()
    }
}

fn paint_row(row: &[NoiseCell]) -> String {
    let mut line = String::with_capacity(row.len() * 12);
    for cell in row {
        line.push_str(&format!("\x1b[38;5;{}m{}", cell.color, cell.symbol));
    }
    line.push_str(RESET);
    line
}

/// Builds heartbeat frames. Holds only the weighted alphabet; every random
/// choice comes from the caller's generator.
#[derive(Debug, Clone)]
pub struct DisplayRenderer {
    alphabet: Vec<(char, u32)>,
}

impl Default for DisplayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayRenderer {
    pub fn new() -> Self {
        let alphabet = std::iter::once((' ', SPACE_WEIGHT))
            .chain(NOISE_SYMBOLS.chars().map(|symbol| (symbol, 1)))
            .collect();
        Self { alphabet }
    }

    /// The status block for `plan`, with `active` highlighted according to
    /// `mode`. Clips are matched by identity, not by value.
    pub fn status_block(
        &self,
        plan: &SessionPlan,
        active: Option<&AudioClip>,
        columns: u16,
        mode: HighlightMode,
    ) -> Vec<String> {
        let rule = "=".repeat(usize::from(columns));
        let mut status = vec![
            rule.clone(),
            String::new(),
            "Meditation Session".to_string(),
            String::new(),
        ];

        for entry in plan {
            let is_active = active.is_some_and(|clip| std::ptr::eq(clip, &*entry.clip));
            let prefix = if is_active {
                mode.prefix()
            } else {
                IDLE_PREFIX
            };
            status.push(format!(
                "{prefix}{} {} ({}){RESET}",
                humanize_duration(entry.offset_seconds as u64),
                entry.clip.name,
                humanize_duration(u64::from(entry.clip.duration_seconds)),
            ));
        }

        status.push(String::new());
        status.push(rule);
        status
    }

    pub fn render_heartbeat<R: Rng + ?Sized>(
        &self,
        plan: &SessionPlan,
        active: Option<&AudioClip>,
        geometry: TerminalGeometry,
        mode: HighlightMode,
        rng: &mut R,
    ) -> Frame {
        let status = self.status_block(plan, active, geometry.columns, mode);
        let rows = usize::from(geometry.lines).saturating_sub(status.len());
        let columns = usize::from(geometry.columns);

        let top = rng.gen_range(0..=rows);
        let mut noise = Vec::with_capacity(rows);
        for _ in 0..rows {
            let mut row = Vec::with_capacity(columns);
            for _ in 0..columns {
                row.push(self.noise_cell(rng));
            }
            noise.push(row);
        }

        Frame { top, status, noise }
    }

    fn noise_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> NoiseCell {
        let symbol = self
            .alphabet
            .choose_weighted(rng, |(_, weight)| *weight)
            .map_or(' ', |(symbol, _)| *symbol);
        let color = GREEN_PALETTE.choose(rng).copied().unwrap_or(GREEN_PALETTE[0]);
        NoiseCell { symbol, color }
    }
}

/// Clears the screen and shows the end-of-session banner.
pub fn write_wake_up<W: Write + ?Sized>(out: &mut W) -> io::Result<()> {
    write!(out, "{CLEAR_SCREEN}\x1b[1;32m{WAKE_UP_BANNER}{RESET}\n\n")?;
    out.flush()
}
