//! General Instrument AY-3-8910 Programmable Sound Generator emulator.
//!
//! Three square-wave tone generators, a shared noise generator, a shared
//! envelope generator, and a per-channel mixer.
//!
//! The chip is pull-based: register writes land immediately, and the host
//! asks for a block of samples whenever its audio buffer needs filling.
//! Each output sample covers two internal half-sample steps. During each
//! step the tone generators report how much of the step their square wave
//! spent high, so a tone whose period is shorter than a sample averages
//! out instead of aliasing.
//!
//! # Register map (16 registers, active 0–13)
//!
//! | Reg | Name      | Bits |
//! |-----|-----------|------|
//! | R0  | A fine    | 7-0  |
//! | R1  | A coarse  | 3-0  |
//! | R2  | B fine    | 7-0  |
//! | R3  | B coarse  | 3-0  |
//! | R4  | C fine    | 7-0  |
//! | R5  | C coarse  | 3-0  |
//! | R6  | Noise     | 4-0  |
//! | R7  | Mixer     | 7-0  |
//! | R8  | A volume  | 4-0  |
//! | R9  | B volume  | 4-0  |
//! | R10 | C volume  | 4-0  |
//! | R11 | Env fine  | 7-0  |
//! | R12 | Env coarse| 7-0  |
//! | R13 | Env shape | 3-0  |
//! | R14 | Port A    | 7-0  |
//! | R15 | Port B    | 7-0  |

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use emu_core::{Observable, StateError, StateReader, StateWriter, Value};

const REG_MIXER: usize = 7;
const REG_A_VOLUME: usize = 8;
const REG_ENV_FINE: usize = 11;
const REG_ENV_COARSE: usize = 12;
const REG_ENV_SHAPE: usize = 13;

/// Internal steps per half sample. Periods are kept in these units.
const STEP: i32 = 2;

/// Full-scale DAC level.
const MAX_OUTPUT: f64 = 4095.0;

/// Samples generated per inner pass, bounding the counter pre-advance.
const MAX_CHUNK: usize = 4096;

/// 32-entry logarithmic volume table, 1.5 dB per step, entry 0 silent.
fn volume_table() -> [u32; 32] {
    let mut table = [0u32; 32];
    let mut out = MAX_OUTPUT;
    for level in (1..32).rev() {
        table[level] = (out + 0.5) as u32;
        out /= 1.188_502_227;
    }
    table
}

/// A single tone generator (square wave with 12-bit period).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ToneGenerator {
    /// Half-period in internal steps.
    period: i32,
    /// Steps until the next output toggle.
    counter: i32,
    /// Current square wave output (true = high).
    output: bool,
    /// Volume follows the envelope.
    envelope: bool,
    /// Current DAC level from the volume table.
    volume: u32,
}

impl ToneGenerator {
    const fn new() -> Self {
        Self {
            period: 0,
            counter: 0,
            output: false,
            envelope: false,
            volume: 0,
        }
    }

    /// Advance by `steps`. When `audible`, return the number of steps the
    /// output spent high; otherwise just keep the phase moving.
    fn advance(&mut self, steps: i32, audible: bool) -> i32 {
        let mut high = 0;
        if audible && self.output {
            high += self.counter;
        }
        self.counter -= steps;
        while self.counter <= 0 {
            self.counter += self.period;
            if self.counter > 0 {
                self.output = !self.output;
                if audible && self.output {
                    high += self.period;
                }
                break;
            }
            // A whole period passed inside this step: high for half of it.
            self.counter += self.period;
            if audible {
                high += self.period;
            }
        }
        if audible && self.output {
            high -= self.counter;
        }
        high
    }
}

/// 17-bit LFSR noise generator with 5-bit period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NoiseGenerator {
    period: i32,
    counter: i32,
    /// LFSR state.
    lfsr: u32,
    /// Current noise output.
    output: bool,
}

impl NoiseGenerator {
    const fn new() -> Self {
        Self {
            period: 0,
            counter: 0,
            lfsr: 1, // Non-zero seed
            output: true,
        }
    }

    /// Clock the shift register once. Returns true if the output toggled.
    fn clock(&mut self) -> bool {
        // Output changes when bits 0 and 1 differ.
        let toggled = (self.lfsr + 1) & 2 != 0;
        if toggled {
            self.output = !self.output;
        }
        if self.lfsr & 1 != 0 {
            self.lfsr ^= 0x24000;
        }
        self.lfsr >>= 1;
        toggled
    }

    /// Mixer mask: all noise bits set when the output is high.
    fn mask(&self) -> u8 {
        if self.output { 0xFF } else { 0x00 }
    }
}

/// Shared envelope generator with 16-bit period and 16 shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EnvelopeGenerator {
    period: i32,
    counter: i32,
    /// Position within the 32-step ramp, counting down from 31.
    position: i8,
    /// Freeze at the end of the first ramp.
    hold: bool,
    /// Reverse direction at the end of each ramp.
    alternate: bool,
    /// 0x1F when ramping up, 0x00 when ramping down.
    attack: u8,
    /// Frozen.
    holding: bool,
    /// Current DAC level.
    volume: u32,
}

impl EnvelopeGenerator {
    const fn new() -> Self {
        Self {
            period: 0,
            counter: 0,
            position: 0,
            hold: false,
            alternate: false,
            attack: 0,
            holding: false,
            volume: 0,
        }
    }

    /// Restart with a new shape (R13 & 0x0F).
    ///
    /// Shapes without the continue bit behave as the continuous shape that
    /// holds at zero: hold, alternating if attacking.
    fn set_shape(&mut self, shape: u8, table: &[u32; 32]) {
        self.attack = if shape & 0x04 != 0 { 0x1F } else { 0x00 };
        if shape & 0x08 == 0 {
            self.hold = true;
            self.alternate = self.attack != 0;
        } else {
            self.hold = shape & 0x01 != 0;
            self.alternate = shape & 0x02 != 0;
        }
        self.counter = self.period;
        self.position = 0x1F;
        self.holding = false;
        self.volume = self.level(table);
    }

    fn level(&self, table: &[u32; 32]) -> u32 {
        table[usize::from(self.position as u8 ^ self.attack)]
    }

    /// Advance one half sample. Returns true if the volume changed.
    fn step(&mut self, table: &[u32; 32]) -> bool {
        if self.holding {
            return false;
        }
        self.counter -= STEP;
        if self.counter > 0 {
            return false;
        }
        loop {
            self.position = self.position.wrapping_sub(1);
            self.counter += self.period;
            if self.counter > 0 {
                break;
            }
        }

        if self.position < 0 {
            if self.hold {
                if self.alternate {
                    self.attack ^= 0x1F;
                }
                self.holding = true;
                self.position = 0;
            } else {
                // An odd number of wraps inverts direction.
                if self.alternate && (self.position as u8) & 0x20 != 0 {
                    self.attack ^= 0x1F;
                }
                self.position &= 0x1F;
            }
        }
        self.volume = self.level(table);
        true
    }
}

/// AY-3-8910 PSG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ay38910 {
    /// Register file, as masked by the chip.
    regs: [u8; 16],
    tones: [ToneGenerator; 3],
    noise: NoiseGenerator,
    envelope: EnvelopeGenerator,
    volume_table: [u32; 32],
}

impl Ay38910 {
    /// Create a chip with every register written to zero.
    #[must_use]
    pub fn new() -> Self {
        let mut psg = Self {
            regs: [0; 16],
            tones: [ToneGenerator::new(); 3],
            noise: NoiseGenerator::new(),
            envelope: EnvelopeGenerator::new(),
            volume_table: volume_table(),
        };
        psg.power_on();
        psg
    }

    /// Reinitialise generator state and clear registers 0-13.
    pub fn reset(&mut self) {
        self.regs = [0; 16];
        self.tones = [ToneGenerator::new(); 3];
        self.noise = NoiseGenerator::new();
        self.envelope = EnvelopeGenerator::new();
        self.power_on();
    }

    fn power_on(&mut self) {
        for reg in 0..=REG_ENV_SHAPE as u8 {
            self.write_register(reg, 0);
        }
    }

    /// Read a register as the chip stores it.
    #[must_use]
    pub fn register(&self, reg: u8) -> u8 {
        self.regs[usize::from(reg & 0x0F)]
    }

    /// Write a register. Period changes adjust the running counters by the
    /// difference instead of restarting them, so the waveform keeps its
    /// phase.
    pub fn write_register(&mut self, reg: u8, value: u8) {
        let reg = usize::from(reg & 0x0F);
        self.regs[reg] = value;
        match reg {
            0..=5 => {
                let channel = reg / 2;
                self.regs[channel * 2 + 1] &= 0x0F;
                let period = i32::from(self.regs[channel * 2])
                    + 256 * i32::from(self.regs[channel * 2 + 1]);
                let tone = &mut self.tones[channel];
                retune(&mut tone.period, &mut tone.counter, period);
            }
            6 => {
                self.regs[6] &= 0x1F;
                retune(
                    &mut self.noise.period,
                    &mut self.noise.counter,
                    i32::from(self.regs[6]),
                );
            }
            8..=10 => {
                self.regs[reg] &= 0x1F;
                let level = self.regs[reg];
                let tone = &mut self.tones[reg - REG_A_VOLUME];
                tone.envelope = level & 0x10 != 0;
                tone.volume = if tone.envelope {
                    self.envelope.volume
                } else if level == 0 {
                    0
                } else {
                    self.volume_table[usize::from(level) * 2 + 1]
                };
            }
            REG_ENV_FINE | REG_ENV_COARSE => {
                let period = i32::from(self.regs[REG_ENV_FINE])
                    + 256 * i32::from(self.regs[REG_ENV_COARSE]);
                retune(&mut self.envelope.period, &mut self.envelope.counter, period);
            }
            REG_ENV_SHAPE => {
                self.regs[REG_ENV_SHAPE] &= 0x0F;
                self.envelope
                    .set_shape(self.regs[REG_ENV_SHAPE], &self.volume_table);
                self.propagate_envelope();
            }
            // Mixer and I/O ports are stored only.
            _ => {}
        }
    }

    fn propagate_envelope(&mut self) {
        for tone in &mut self.tones {
            if tone.envelope {
                tone.volume = self.envelope.volume;
            }
        }
    }

    /// Generate `samples` unsigned output levels (0-15) from the current
    /// register state.
    pub fn generate(&mut self, samples: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples);
        let mut remaining = samples;
        while remaining > 0 {
            let chunk = remaining.min(MAX_CHUNK);
            self.generate_chunk(chunk, &mut out);
            remaining -= chunk;
        }
        out
    }

    fn generate_chunk(&mut self, samples: usize, out: &mut Vec<u8>) {
        let mut length = samples as i32 * 2;
        let lead = length * STEP;
        let mixer = self.regs[REG_MIXER];

        // Silent or tone-disabled channels are pushed past the whole block
        // so the inner loop rarely has to toggle them.
        for (channel, tone) in self.tones.iter_mut().enumerate() {
            let tone_disabled = mixer & (1 << channel) != 0;
            if tone_disabled || self.regs[REG_A_VOLUME + channel] == 0 {
                if tone.counter <= lead {
                    tone.counter += lead;
                }
                if tone_disabled {
                    tone.output = true;
                }
            }
        }
        if mixer & 0x38 == 0x38 && self.noise.counter <= lead {
            self.noise.counter += lead;
        }

        let mut gate = self.noise.mask() | mixer;
        while length > 0 {
            let mut high = [0i32; 3];
            let mut left = STEP;
            loop {
                let next = self.noise.counter.min(left);
                for (channel, tone) in self.tones.iter_mut().enumerate() {
                    high[channel] += tone.advance(next, gate & (0x08 << channel) != 0);
                }
                self.noise.counter -= next;
                if self.noise.counter <= 0 {
                    if self.noise.clock() {
                        gate = self.noise.mask() | mixer;
                    }
                    self.noise.counter += self.noise.period;
                }
                left -= next;
                if left <= 0 {
                    break;
                }
            }

            if self.envelope.step(&self.volume_table) {
                self.propagate_envelope();
            }

            let mixed = high
                .iter()
                .zip(&self.tones)
                .map(|(&h, tone)| h as u32 * tone.volume)
                .sum::<u32>()
                / (3 * STEP as u32);
            length -= 1;
            if length & 1 != 0 {
                out.push((mixed >> 8) as u8);
            }
        }
    }

    // --- Save state ---

    /// Append registers and generator state.
    pub fn save_state(&self, w: &mut StateWriter) {
        w.put_bytes(&self.regs);
        for tone in &self.tones {
            w.put_i32(tone.period);
            w.put_i32(tone.counter);
            w.put_bool(tone.output);
        }
        w.put_i32(self.noise.period);
        w.put_i32(self.noise.counter);
        w.put_u32(self.noise.lfsr);
        w.put_bool(self.noise.output);
        let env = &self.envelope;
        w.put_i32(env.period);
        w.put_i32(env.counter);
        w.put_u8(env.position as u8);
        w.put_bool(env.hold);
        w.put_bool(env.alternate);
        w.put_u8(env.attack);
        w.put_bool(env.holding);
    }

    /// Size of the block written by [`save_state`](Self::save_state).
    pub const STATE_SIZE: usize = 16 + 3 * 9 + 13 + 13;

    /// Restore the block written by [`save_state`](Self::save_state).
    /// Volumes are rederived from the registers and envelope position.
    /// On error the chip is unchanged.
    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        let mut psg = Self::new();
        psg.regs.copy_from_slice(r.bytes(16)?);
        for tone in &mut psg.tones {
            tone.period = positive(r.i32()?, "psg.tone.period")?;
            tone.counter = r.i32()?;
            tone.output = r.bool("psg.tone.output")?;
        }
        psg.noise.period = positive(r.i32()?, "psg.noise.period")?;
        psg.noise.counter = positive(r.i32()?, "psg.noise.counter")?;
        psg.noise.lfsr = r.u32()?;
        psg.noise.output = r.bool("psg.noise.output")?;
        let env = &mut psg.envelope;
        env.period = positive(r.i32()?, "psg.envelope.period")?;
        env.counter = r.i32()?;
        let position = r.u8()?;
        if position > 0x1F {
            return Err(StateError::InvalidField {
                field: "psg.envelope.position",
                value: u32::from(position),
            });
        }
        env.position = position as i8;
        env.hold = r.bool("psg.envelope.hold")?;
        env.alternate = r.bool("psg.envelope.alternate")?;
        env.attack = match r.u8()? {
            attack @ (0x00 | 0x1F) => attack,
            other => {
                return Err(StateError::InvalidField {
                    field: "psg.envelope.attack",
                    value: u32::from(other),
                });
            }
        };
        env.holding = r.bool("psg.envelope.holding")?;

        psg.envelope.volume = psg.envelope.level(&psg.volume_table);
        for channel in 0..3 {
            let level = psg.regs[REG_A_VOLUME + channel];
            let tone = &mut psg.tones[channel];
            tone.envelope = level & 0x10 != 0;
            tone.volume = if tone.envelope {
                psg.envelope.volume
            } else if level == 0 {
                0
            } else {
                psg.volume_table[usize::from(level & 0x0F) * 2 + 1]
            };
        }
        *self = psg;
        Ok(())
    }
}

impl Default for Ay38910 {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a new period (in register units) to a generator: zero acts as
/// one, and the running counter moves by the difference.
fn retune(period: &mut i32, counter: &mut i32, register_period: i32) {
    let old = *period;
    *period = register_period.max(1) * STEP;
    *counter += *period - old;
    if *counter <= 0 {
        *counter = 1;
    }
}

fn positive(value: i32, field: &'static str) -> Result<i32, StateError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(StateError::InvalidField {
            field,
            value: value as u32,
        })
    }
}

const PSG_QUERY_PATHS: &[&str] = &[
    "reg.0", "reg.1", "reg.2", "reg.3", "reg.4", "reg.5", "reg.6", "reg.7", "reg.8", "reg.9",
    "reg.10", "reg.11", "reg.12", "reg.13", "reg.14", "reg.15",
];

impl Observable for Ay38910 {
    fn query(&self, path: &str) -> Option<Value> {
        let index: usize = path.strip_prefix("reg.")?.parse().ok()?;
        self.regs.get(index).map(|&value| value.into())
    }

    fn query_paths(&self) -> &'static [&'static str] {
        PSG_QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_psg(writes: &[(u8, u8)]) -> Ay38910 {
        let mut psg = Ay38910::new();
        for &(reg, value) in writes {
            psg.write_register(reg, value);
        }
        psg
    }

    #[test]
    fn volume_table_is_logarithmic() {
        let table = volume_table();
        assert_eq!(table[0], 0);
        assert_eq!(table[31], 4095);
        for pair in table[1..].windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn silent_when_no_channels_enabled() {
        let mut psg = make_psg(&[(7, 0xFF)]);
        assert!(psg.generate(256).iter().all(|&s| s == 0));
    }

    #[test]
    fn generate_returns_requested_count() {
        let mut psg = Ay38910::new();
        assert_eq!(psg.generate(0).len(), 0);
        assert_eq!(psg.generate(882).len(), 882);
        assert_eq!(psg.generate(MAX_CHUNK + 3).len(), MAX_CHUNK + 3);
    }

    #[test]
    fn tone_a_produces_square_wave() {
        // Tone A on, noise off, full volume, period 8.
        let mut psg = make_psg(&[(0, 8), (7, 0x3E), (8, 0x0F)]);
        let samples = psg.generate(64);
        let max = *samples.iter().max().unwrap_or(&0);
        let min = *samples.iter().min().unwrap_or(&0);
        assert!(max > 0, "tone should be audible");
        assert_eq!(min, 0, "square wave has a low half");
        // Full-scale single channel is a third of the DAC range.
        assert!(max <= 5);
    }

    #[test]
    fn tone_disabled_channel_is_dc_at_volume() {
        // Tone and noise both disabled on A: constant high level.
        let mut psg = make_psg(&[(7, 0x3F), (8, 0x0F)]);
        let samples = psg.generate(32);
        assert!(samples.iter().all(|&s| s == samples[0]));
        assert!(samples[0] > 0);
    }

    #[test]
    fn period_zero_matches_period_one() {
        let setup = [(7, 0x3E), (8, 0x0C), (6, 0)];
        let mut zero = make_psg(&setup);
        let mut one = make_psg(&setup);
        zero.write_register(0, 0);
        one.write_register(0, 1);
        assert_eq!(zero.generate(500), one.generate(500));

        zero.write_register(6, 0);
        one.write_register(6, 1);
        zero.write_register(7, 0x36);
        one.write_register(7, 0x36);
        assert_eq!(zero.generate(500), one.generate(500));
    }

    #[test]
    fn period_change_keeps_phase() {
        let mut psg = make_psg(&[(0, 100)]);
        let before = psg.tones[0].counter;
        psg.write_register(0, 110);
        assert_eq!(psg.tones[0].counter, before + 10 * STEP);
        psg.write_register(0, 1);
        assert!(psg.tones[0].counter >= 1);
    }

    #[test]
    fn coarse_and_noise_registers_are_masked() {
        let psg = make_psg(&[(1, 0xFF), (6, 0xFF), (8, 0xFF), (13, 0xFF)]);
        assert_eq!(psg.register(1), 0x0F);
        assert_eq!(psg.register(6), 0x1F);
        assert_eq!(psg.register(8), 0x1F);
        assert_eq!(psg.register(13), 0x0F);
        assert_eq!(psg.tones[0].period, 0x0F00 * STEP);
    }

    #[test]
    fn noise_lfsr_advances_and_stays_nonzero() {
        // Noise only on A.
        let mut psg = make_psg(&[(6, 1), (7, 0x37), (8, 0x0F)]);
        let samples = psg.generate(400);
        assert_ne!(psg.noise.lfsr, 1);
        assert_ne!(psg.noise.lfsr, 0);
        assert!(samples.iter().any(|&s| s > 0));
        assert!(samples.iter().any(|&s| s == 0));
    }

    #[test]
    fn envelope_sawtooth_down_repeats() {
        // Shape 0x08: continue, decay, repeat.
        let mut psg = make_psg(&[(7, 0x3F), (8, 0x10), (11, 1), (13, 0x08)]);
        assert_eq!(psg.tones[0].volume, 4095);
        let samples = psg.generate(64);
        assert!(!psg.envelope.holding);
        assert!(samples.windows(2).any(|w| w[1] > w[0]), "ramp restarts");
    }

    #[test]
    fn envelope_one_shot_decay_holds_at_zero() {
        // Shape 0x00: decay once then hold silent.
        let mut psg = make_psg(&[(7, 0x3F), (8, 0x10), (11, 1), (13, 0x00)]);
        psg.generate(200);
        assert!(psg.envelope.holding);
        assert_eq!(psg.tones[0].volume, 0);
        assert!(psg.generate(16).iter().all(|&s| s == 0));
    }

    #[test]
    fn envelope_attack_hold_stays_high() {
        // Shape 0x0D: attack, then hold at maximum.
        let mut psg = make_psg(&[(7, 0x3F), (8, 0x10), (11, 1), (13, 0x0D)]);
        assert_eq!(psg.envelope.volume, 0);
        psg.generate(200);
        assert!(psg.envelope.holding);
        assert_eq!(psg.envelope.volume, 4095);
    }

    #[test]
    fn state_round_trip_continues_identically() {
        let mut psg = make_psg(&[
            (0, 30),
            (2, 45),
            (6, 7),
            (7, 0x30),
            (8, 0x0F),
            (9, 0x10),
            (10, 8),
            (11, 3),
            (13, 0x0E),
        ]);
        psg.generate(123);

        let mut w = StateWriter::new();
        psg.save_state(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), Ay38910::STATE_SIZE);

        let mut restored = Ay38910::new();
        restored
            .load_state(&mut StateReader::new(&bytes))
            .expect("valid block");
        assert_eq!(restored, psg);
        assert_eq!(restored.generate(300), psg.generate(300));
    }

    #[test]
    fn load_state_rejects_nonpositive_period() {
        let mut psg = make_psg(&[(0, 5)]);
        let mut w = StateWriter::new();
        psg.save_state(&mut w);
        let mut bytes = w.into_bytes();
        bytes[16..20].copy_from_slice(&0i32.to_le_bytes());
        let before = psg.clone();
        assert!(psg.load_state(&mut StateReader::new(&bytes)).is_err());
        assert_eq!(psg, before);
    }

    #[test]
    fn register_paths() {
        let psg = make_psg(&[(14, 0xAB)]);
        assert_eq!(psg.query("reg.14"), Some(Value::U8(0xAB)));
        assert_eq!(psg.query("reg.16"), None);
        assert_eq!(psg.query("tone"), None);
    }
}
