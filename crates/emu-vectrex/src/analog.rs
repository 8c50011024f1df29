//! Analog beam integrator and vector lists.
//!
//! The VIA's port A feeds a DAC whose output is sampled into one of
//! several sample-and-hold circuits, selected by port B bits 1-2:
//! reference (R), Y, and intensity (Z). X follows the DAC directly. The
//! integrators move the beam by `(X - R, R - Y)` every cycle while the
//! ramp line (PB7) is low, CA2 low pulls the beam back to the centre, and
//! CB2 unblanks it.
//!
//! Each straight run of the unblanked beam becomes one [`Vector`]. Runs
//! are de-duplicated within a frame through a spatial hash, and a run
//! that repeats a vector from the previous frame marks the old copy as
//! erased so the host does not fade it out.

use emu_core::{Observable, StateError, StateReader, StateWriter, Value};
use mos_via_6522::Via6522;

/// Horizontal extent of the visible area, in integrator units.
pub const MAX_X: i32 = 33_000;
/// Vertical extent of the visible area, in integrator units.
pub const MAX_Y: i32 = 41_000;
/// Capacity of each vector list.
pub const VECTOR_CAPACITY: usize = 50_000;
/// Number of spatial hash buckets (largest prime below 2^16).
pub const HASH_BUCKETS: usize = 65_521;
/// Colour of an erase-list entry that has been redrawn this frame.
pub const ERASED: u8 = 128;

const CENTRE_X: i32 = MAX_X / 2;
const CENTRE_Y: i32 = MAX_Y / 2;

/// One emitted line segment in device space.
///
/// A point is a segment whose ends coincide. `color` is the beam
/// intensity (0-127), or [`ERASED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "native", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub color: u8,
}

impl Vector {
    /// False for erased entries, which must not be drawn.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.color != ERASED
    }

    fn same_geometry(&self, x0: i32, y0: i32, x1: i32, y1: i32) -> bool {
        self.x0 == x0 && self.y0 == y0 && self.x1 == x1 && self.y1 == y1
    }
}

fn in_bounds(x: i32, y: i32) -> bool {
    (0..MAX_X).contains(&x) && (0..MAX_Y).contains(&y)
}

/// The run currently being traced by the unblanked beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    /// Integrator input when the run started.
    dx: i32,
    dy: i32,
    color: u8,
}

impl Segment {
    fn start(x: i32, y: i32, dx: i32, dy: i32, color: u8) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x,
            y1: y,
            dx,
            dy,
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Beam {
    Idle,
    Vectoring(Segment),
}

/// Sample-and-hold levels and beam position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Integrator {
    /// Reference (R) sample-and-hold.
    rsh: u8,
    /// X: the DAC output.
    xsh: u8,
    ysh: u8,
    /// Intensity, 0-127.
    zsh: u8,
    /// Joystick pot levels.
    jch: [u8; 4],
    /// Pot selected by the multiplexer.
    jsh: u8,
    /// Selected pot above the DAC level.
    compare: bool,
    dx: i32,
    dy: i32,
    x: i32,
    y: i32,
    beam: Beam,
}

impl Integrator {
    const fn new() -> Self {
        Self {
            rsh: 0x80,
            xsh: 0x80,
            ysh: 0x80,
            zsh: 0,
            jch: [0x80; 4],
            jsh: 0x80,
            compare: false,
            dx: 0,
            dy: 0,
            x: CENTRE_X,
            y: CENTRE_Y,
            beam: Beam::Idle,
        }
    }
}

/// Double-buffered vector lists with the de-duplication hash.
struct VectorLists {
    draw: Vec<Vector>,
    erase: Vec<Vector>,
    /// Most recent list index stored for each bucket. Stale entries are
    /// harmless: a hit is only trusted if the geometry matches.
    hash: Box<[u32]>,
}

impl VectorLists {
    fn new() -> Self {
        Self {
            draw: Vec::with_capacity(VECTOR_CAPACITY),
            erase: Vec::with_capacity(VECTOR_CAPACITY),
            hash: vec![0; HASH_BUCKETS].into_boxed_slice(),
        }
    }

    fn clear(&mut self) {
        self.draw.clear();
        self.erase.clear();
    }

    fn bucket(x0: i32, y0: i32, x1: i32, y1: i32) -> usize {
        let key = [y0, x1, y1]
            .iter()
            .fold(x0 as u64, |key, &c| key.wrapping_mul(31).wrapping_add(c as u64));
        (key % HASH_BUCKETS as u64) as usize
    }

    fn add_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        let bucket = Self::bucket(x0, y0, x1, y1);
        let index = self.hash[bucket] as usize;

        if let Some(existing) = self.draw.get_mut(index) {
            if existing.same_geometry(x0, y0, x1, y1) {
                existing.color = color;
                return;
            }
        }

        if let Some(old) = self.erase.get_mut(index) {
            if old.same_geometry(x0, y0, x1, y1) {
                old.color = ERASED;
            }
        }

        if self.draw.len() < VECTOR_CAPACITY {
            self.hash[bucket] = self.draw.len() as u32;
            self.draw.push(Vector {
                x0,
                y0,
                x1,
                y1,
                color,
            });
        }
    }

    /// The draw list becomes the erase list and a fresh draw list starts.
    fn swap(&mut self) {
        std::mem::swap(&mut self.draw, &mut self.erase);
        self.draw.clear();
    }

    /// Force a list to `count` entries. Missing entries are padded with
    /// erased vectors.
    fn resize(list: &mut Vec<Vector>, count: usize) {
        list.resize(
            count,
            Vector {
                color: ERASED,
                ..Vector::default()
            },
        );
    }
}

/// Analog section state decoded from a save state, not yet applied.
pub struct AnalogSnapshot {
    integrator: Integrator,
    draw_count: usize,
    erase_count: usize,
}

/// The analog section: DAC sample-and-holds, joystick multiplexer, beam
/// integrators and the vector lists they feed.
pub struct Analog {
    integrator: Integrator,
    lists: VectorLists,
}

impl Analog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            integrator: Integrator::new(),
            lists: VectorLists::new(),
        }
    }

    /// Power-on levels with the beam centred and both lists empty.
    pub fn reset(&mut self) {
        self.integrator = Integrator::new();
        self.lists.clear();
    }

    /// Port A was written: the DAC output changes.
    pub fn set_dac(&mut self, ora: u8) {
        self.integrator.xsh = ora ^ 0x80;
    }

    /// Set a joystick pot channel (0-3) level.
    pub fn set_joystick_channel(&mut self, channel: usize, level: u8) {
        if let Some(slot) = self.integrator.jch.get_mut(channel) {
            *slot = level;
        }
    }

    #[must_use]
    pub fn joystick_channel(&self, channel: usize) -> Option<u8> {
        self.integrator.jch.get(channel).copied()
    }

    /// Port A or B was written: route the DAC through the multiplexer
    /// selected by ORB bits 1-2 (demultiplexing when ORB bit 0 is low) and
    /// recompute the comparator and integrator inputs.
    pub fn update_multiplexer(&mut self, orb: u8) {
        let s = &mut self.integrator;
        let demux = orb & 0x01 == 0;
        match orb & 0x06 {
            0x00 => {
                s.jsh = s.jch[0];
                if demux {
                    s.ysh = s.xsh;
                }
            }
            0x02 => {
                s.jsh = s.jch[1];
                if demux {
                    s.rsh = s.xsh;
                }
            }
            0x04 => {
                s.jsh = s.jch[2];
                if demux {
                    s.zsh = s.xsh.saturating_sub(0x80);
                }
            }
            _ => s.jsh = s.jch[3],
        }

        s.compare = s.jsh > s.xsh;
        s.dx = i32::from(s.xsh) - i32::from(s.rsh);
        s.dy = i32::from(s.rsh) - i32::from(s.ysh);
    }

    /// Comparator output, fed back to PB5.
    #[must_use]
    pub fn compare(&self) -> bool {
        self.integrator.compare
    }

    /// One cycle of beam movement, driven by the VIA's output lines.
    pub fn step(&mut self, via: &Via6522) {
        let unblanked = via.cb2();
        let s = &mut self.integrator;

        let (dx, dy) = if !via.ca2() {
            (CENTRE_X - s.x, CENTRE_Y - s.y)
        } else if via.pb7() {
            (0, 0)
        } else {
            (s.dx, s.dy)
        };
        let here_in_bounds = in_bounds(s.x, s.y);

        s.beam = match s.beam {
            Beam::Idle if unblanked && here_in_bounds => {
                Beam::Vectoring(Segment::start(s.x, s.y, dx, dy, s.zsh))
            }
            Beam::Idle => Beam::Idle,
            Beam::Vectoring(seg) if !unblanked => {
                self.lists.add_line(seg.x0, seg.y0, seg.x1, seg.y1, seg.color);
                Beam::Idle
            }
            Beam::Vectoring(seg) if seg.dx != dx || seg.dy != dy || seg.color != s.zsh => {
                self.lists.add_line(seg.x0, seg.y0, seg.x1, seg.y1, seg.color);
                if here_in_bounds {
                    Beam::Vectoring(Segment::start(s.x, s.y, dx, dy, s.zsh))
                } else {
                    Beam::Idle
                }
            }
            // Left the screen mid-run: drop the partial vector.
            Beam::Vectoring(_) if !here_in_bounds => Beam::Idle,
            vectoring @ Beam::Vectoring(_) => vectoring,
        };

        s.x = s.x.wrapping_add(dx);
        s.y = s.y.wrapping_add(dy);

        if let Beam::Vectoring(seg) = &mut s.beam {
            if in_bounds(s.x, s.y) {
                seg.x1 = s.x;
                seg.y1 = s.y;
            }
        }
    }

    /// Frame boundary: this frame's vectors become next frame's erase list.
    pub fn end_frame(&mut self) {
        self.lists.swap();
    }

    /// Vectors drawn so far this frame.
    #[must_use]
    pub fn draw_list(&self) -> &[Vector] {
        &self.lists.draw
    }

    /// Vectors from the previous frame.
    #[must_use]
    pub fn erase_list(&self) -> &[Vector] {
        &self.lists.erase
    }

    /// Beam position.
    #[must_use]
    pub fn beam_position(&self) -> (i32, i32) {
        (self.integrator.x, self.integrator.y)
    }

    #[must_use]
    pub fn is_vectoring(&self) -> bool {
        matches!(self.integrator.beam, Beam::Vectoring(_))
    }

    // --- Save state ---

    /// Append sample-and-holds, beam state, the in-flight vector and the
    /// list counts. List contents are not saved.
    pub fn save_state(&self, w: &mut StateWriter) {
        let s = &self.integrator;
        for byte in [s.rsh, s.xsh, s.ysh, s.zsh] {
            w.put_u8(byte);
        }
        w.put_bytes(&s.jch);
        w.put_u8(s.jsh);
        w.put_bool(s.compare);
        w.put_i32(s.dx);
        w.put_i32(s.dy);
        w.put_i32(s.x);
        w.put_i32(s.y);
        let (vectoring, seg) = match s.beam {
            Beam::Idle => (false, Segment::start(0, 0, 0, 0, 0)),
            Beam::Vectoring(seg) => (true, seg),
        };
        w.put_bool(vectoring);
        for value in [seg.x0, seg.y0, seg.x1, seg.y1, seg.dx, seg.dy] {
            w.put_i32(value);
        }
        w.put_u8(seg.color);
        w.put_u32(self.lists.draw.len() as u32);
        w.put_u32(self.lists.erase.len() as u32);
    }

    pub const STATE_SIZE: usize = 4 + 4 + 1 + 1 + 4 * 4 + 1 + 6 * 4 + 1 + 4 + 4;

    /// Decode a saved block without applying it.
    pub fn read_state(r: &mut StateReader<'_>) -> Result<AnalogSnapshot, StateError> {
        let mut s = Integrator::new();
        s.rsh = r.u8()?;
        s.xsh = r.u8()?;
        s.ysh = r.u8()?;
        s.zsh = intensity(r.u8()?, "analog.zsh")?;
        s.jch.copy_from_slice(r.bytes(4)?);
        s.jsh = r.u8()?;
        s.compare = r.bool("analog.compare")?;
        s.dx = r.i32()?;
        s.dy = r.i32()?;
        s.x = r.i32()?;
        s.y = r.i32()?;
        let vectoring = r.bool("analog.vectoring")?;
        let x0 = r.i32()?;
        let y0 = r.i32()?;
        let x1 = r.i32()?;
        let y1 = r.i32()?;
        let dx = r.i32()?;
        let dy = r.i32()?;
        let color = intensity(r.u8()?, "analog.vector.color")?;
        if vectoring {
            // A committed run must stay on screen.
            for (field, x, y) in [("analog.vector.start", x0, y0), ("analog.vector.end", x1, y1)] {
                if !in_bounds(x, y) {
                    return Err(StateError::InvalidField {
                        field,
                        value: x as u32,
                    });
                }
            }
            s.beam = Beam::Vectoring(Segment {
                x0,
                y0,
                x1,
                y1,
                dx,
                dy,
                color,
            });
        }
        let draw_count = (r.u32()? as usize).min(VECTOR_CAPACITY);
        let erase_count = (r.u32()? as usize).min(VECTOR_CAPACITY);
        Ok(AnalogSnapshot {
            integrator: s,
            draw_count,
            erase_count,
        })
    }

    /// Apply a decoded block. Current list contents are kept up to the
    /// restored counts.
    pub fn restore(&mut self, snapshot: AnalogSnapshot) {
        self.integrator = snapshot.integrator;
        VectorLists::resize(&mut self.lists.draw, snapshot.draw_count);
        VectorLists::resize(&mut self.lists.erase, snapshot.erase_count);
    }
}

impl Default for Analog {
    fn default() -> Self {
        Self::new()
    }
}

fn intensity(value: u8, field: &'static str) -> Result<u8, StateError> {
    if value < ERASED {
        Ok(value)
    } else {
        Err(StateError::InvalidField {
            field,
            value: u32::from(value),
        })
    }
}

const ANALOG_QUERY_PATHS: &[&str] = &[
    "rsh",
    "xsh",
    "ysh",
    "zsh",
    "jsh",
    "compare",
    "dx",
    "dy",
    "x",
    "y",
    "vectoring",
    "draw_count",
    "erase_count",
];

impl Observable for Analog {
    fn query(&self, path: &str) -> Option<Value> {
        let s = &self.integrator;
        match path {
            "rsh" => Some(s.rsh.into()),
            "xsh" => Some(s.xsh.into()),
            "ysh" => Some(s.ysh.into()),
            "zsh" => Some(s.zsh.into()),
            "jsh" => Some(s.jsh.into()),
            "compare" => Some(s.compare.into()),
            "dx" => Some(s.dx.into()),
            "dy" => Some(s.dy.into()),
            "x" => Some(s.x.into()),
            "y" => Some(s.y.into()),
            "vectoring" => Some(self.is_vectoring().into()),
            "draw_count" => Some((self.lists.draw.len() as u32).into()),
            "erase_count" => Some((self.lists.erase.len() as u32).into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        ANALOG_QUERY_PATHS
    }
}
