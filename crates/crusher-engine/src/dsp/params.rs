//! Live parameter store shared between the control side and the audio thread.
//!
//! The control thread writes through [`CrusherParams`] setters, which clamp
//! into range. The audio thread calls [`CrusherParams::snapshot`] once per
//! block and works from the returned [`ParamSnapshot`]. Each value is its own
//! atomic; the three loads are not a transaction.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub const STEPS_MIN: u32 = 1;
pub const STEPS_MAX: u32 = 32;
pub const STEPS_DEFAULT: u32 = 16;
pub const MIX_DEFAULT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamId {
    Steps,
    Mix,
    Bypass,
}

impl ParamId {
    pub const ALL: [ParamId; 3] = [ParamId::Steps, ParamId::Mix, ParamId::Bypass];

    pub fn name(self) -> &'static str {
        match self {
            ParamId::Steps => "steps",
            ParamId::Mix => "mix",
            ParamId::Bypass => "bypass",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ParamId::Steps => "Bit Steps",
            ParamId::Mix => "Dry Wet Mix",
            ParamId::Bypass => "Bypass",
        }
    }

    /// (min, max) in plain units. Bypass is 0 = off, 1 = on.
    pub fn range(self) -> (f32, f32) {
        match self {
            ParamId::Steps => (STEPS_MIN as f32, STEPS_MAX as f32),
            ParamId::Mix => (0.0, 1.0),
            ParamId::Bypass => (0.0, 1.0),
        }
    }

    /// Resolution values snap to when set.
    pub fn interval(self) -> f32 {
        match self {
            ParamId::Steps => 1.0,
            ParamId::Mix => 0.01,
            ParamId::Bypass => 1.0,
        }
    }

    pub fn default_value(self) -> f32 {
        match self {
            ParamId::Steps => STEPS_DEFAULT as f32,
            ParamId::Mix => MIX_DEFAULT,
            ParamId::Bypass => 0.0,
        }
    }

    /// Round `value` to this parameter's interval.
    pub fn snap(self, value: f32) -> f32 {
        let per_unit = (1.0 / self.interval()).round();
        (value * per_unit).round() / per_unit
    }

    /// User-facing text: steps as an integer, mix in percent, bypass on/off.
    pub fn format_value(self, value: f32) -> String {
        match self {
            ParamId::Steps => format!("{}", value.round() as u32),
            ParamId::Mix => format!("{}%", (value * 100.0).round() as i32),
            ParamId::Bypass => if value > 0.5 { "on".into() } else { "off".into() },
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        ParamId::ALL
            .into_iter()
            .find(|id| id.name() == key || id.label().to_ascii_lowercase() == key)
            .ok_or_else(|| Error::UnknownParam(s.trim().to_string()))
    }
}

/// Values the processor works from for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub steps: u32,
    pub mix: f32,
    pub bypass: bool,
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        Self { steps: STEPS_DEFAULT, mix: MIX_DEFAULT, bypass: false }
    }
}

/// Lock-free parameter store. Share it behind an `Arc`.
#[derive(Debug)]
pub struct CrusherParams {
    steps: AtomicU32,
    // f32 bits
    mix: AtomicU32,
    bypass: AtomicBool,
}

impl Default for CrusherParams {
    fn default() -> Self {
        Self::new(ParamSnapshot::default())
    }
}

impl CrusherParams {
    pub fn new(initial: ParamSnapshot) -> Self {
        let p = Self {
            steps: AtomicU32::new(STEPS_DEFAULT),
            mix: AtomicU32::new(MIX_DEFAULT.to_bits()),
            bypass: AtomicBool::new(false),
        };
        p.set_steps(initial.steps);
        p.set_mix(initial.mix);
        p.set_bypass(initial.bypass);
        p
    }

    pub fn set_steps(&self, steps: u32) {
        self.steps.store(steps.clamp(STEPS_MIN, STEPS_MAX), Ordering::Relaxed);
    }

    pub fn set_mix(&self, mix: f32) {
        if !mix.is_finite() {
            return;
        }
        let mix = ParamId::Mix.snap(mix.clamp(0.0, 1.0));
        self.mix.store(mix.to_bits(), Ordering::Relaxed);
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.bypass.store(bypass, Ordering::Relaxed);
    }

    /// Set a parameter from a plain value, the way automation delivers it.
    /// Steps round to the nearest integer, mix snaps to 0.01, bypass is on
    /// above 0.5.
    pub fn set(&self, id: ParamId, value: f32) {
        if !value.is_finite() {
            return;
        }
        match id {
            ParamId::Steps => {
                let (lo, hi) = id.range();
                self.set_steps(value.round().clamp(lo, hi) as u32);
            }
            ParamId::Mix => self.set_mix(value),
            ParamId::Bypass => self.set_bypass(value > 0.5),
        }
    }

    pub fn get(&self, id: ParamId) -> f32 {
        let s = self.snapshot();
        match id {
            ParamId::Steps => s.steps as f32,
            ParamId::Mix => s.mix,
            ParamId::Bypass => {
                if s.bypass {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Current value of `id` formatted for display.
    pub fn display(&self, id: ParamId) -> String {
        id.format_value(self.get(id))
    }

    #[inline]
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            steps: self.steps.load(Ordering::Relaxed),
            mix: f32::from_bits(self.mix.load(Ordering::Relaxed)),
            bypass: self.bypass.load(Ordering::Relaxed),
        }
    }

    /// Apply a parsed assignment.
    pub fn apply(&self, a: &Assignment) {
        self.set(a.id, a.value);
    }
}

/// A `name=value` parameter change, as typed on the command line or the
/// live control prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub id: ParamId,
    pub value: f32,
}

impl FromStr for Assignment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, raw) = s
            .split_once('=')
            .ok_or_else(|| Error::BadAssignment(s.trim().to_string()))?;
        let id: ParamId = key.parse()?;
        let raw = raw.trim();
        let value = match id {
            ParamId::Bypass => parse_switch(raw)?,
            ParamId::Mix => parse_mix(raw)?,
            ParamId::Steps => raw
                .parse::<f32>()
                .map_err(|_| Error::BadValue { param: id.name(), value: raw.to_string() })?,
        };
        Ok(Self { id, value })
    }
}

/// Mix as a 0..1 ratio or a percentage (`50%`).
pub fn parse_mix(raw: &str) -> Result<f32> {
    let raw = raw.trim();
    let bad = || Error::BadValue { param: ParamId::Mix.name(), value: raw.to_string() };
    match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().map(|v| v / 100.0).map_err(|_| bad()),
        None => raw.parse::<f32>().map_err(|_| bad()),
    }
}

fn parse_switch(raw: &str) -> Result<f32> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(1.0),
        "off" | "false" | "no" | "0" => Ok(0.0),
        _ => Err(Error::BadValue { param: ParamId::Bypass.name(), value: raw.to_string() }),
    }
}
