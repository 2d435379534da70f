//! Output actuator - maps command values to a duty level.
//!
//! The mapping itself is [`triangle_level`]; this module owns the
//! last-known level and the translation into the physical duty domain,
//! including inversion for active-low outputs.

use crate::command::{decode_command, CommandBuf};
use crate::config;
use crate::triangle::triangle_level;

/// Physical output driven by the command pipeline (PWM channel, DAC, ...).
pub trait Actuator {
    /// Request a new duty value in `[0, max_duty]`.
    fn set_duty(&mut self, duty: u16);
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
    fn set_duty(&mut self, duty: u16) {
        (**self).set_duty(duty)
    }
}

/// Level → duty conversion for a particular output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyScale {
    pub max_level: u16,
    pub max_duty: u16,
    /// Full duty means off.
    pub active_low: bool,
}

impl DutyScale {
    /// On-board LED: 34 levels, 13-bit PWM, active-low.
    pub const DEFAULT: DutyScale = DutyScale {
        max_level: config::MAX_LEVEL,
        max_duty: config::MAX_DUTY,
        active_low: config::ACTUATOR_ACTIVE_LOW,
    };

    pub fn duty_for(&self, level: u16) -> u16 {
        if self.max_level == 0 {
            return self.off_duty();
        }
        let level = level.min(self.max_level);
        let scaled =
            (u32::from(level) * u32::from(self.max_duty) / u32::from(self.max_level)) as u16;
        if self.active_low {
            self.max_duty - scaled
        } else {
            scaled
        }
    }

    /// Duty that turns the output fully off.
    pub fn off_duty(&self) -> u16 {
        if self.active_low {
            self.max_duty
        } else {
            0
        }
    }
}

impl Default for DutyScale {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Exclusive owner of the actuator. Holds the last applied level, so the
/// output keeps its state between commands.
pub struct LevelDriver<A: Actuator> {
    actuator: A,
    scale: DutyScale,
    level: u16,
}

impl<A: Actuator> LevelDriver<A> {
    /// Take ownership of `actuator` and park it at level 0.
    pub fn new(mut actuator: A, scale: DutyScale) -> Self {
        actuator.set_duty(scale.duty_for(0));
        Self {
            actuator,
            scale,
            level: 0,
        }
    }

    /// Last applied level.
    pub fn level(&self) -> u16 {
        self.level
    }

    /// Decode a drained command, map it, and drive the output.
    pub fn apply(&mut self, command: &CommandBuf) -> u16 {
        let value = decode_command(command);
        let level = triangle_level(value, self.scale.max_level);
        self.set_level(level);
        trace!("actuator: command={} level={}", value, level);
        level
    }

    pub fn set_level(&mut self, level: u16) {
        self.level = level;
        self.actuator.set_duty(self.scale.duty_for(level));
    }

    pub fn into_inner(self) -> A {
        self.actuator
    }
}
