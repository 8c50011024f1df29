//! Controller input.
//!
//! Three layers:
//! 1. `Controllers`: the analog pot levels and the button byte the
//!    machine sees.
//! 2. Immediate `set_joystick`/`set_button`/`set_direction` on `Vectrex`.
//! 3. `InputQueue`: frame-stamped events for scripted sequences.
//!
//! Each controller has a two-axis pot joystick and four buttons. The pots
//! sit on analog multiplexer channels 0/1 (player one) and 2/3 (player
//! two). The buttons pull PSG port A (register 14) low: bits 0-3 for
//! player one, bits 4-7 for player two.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::bus::VectrexBus;

/// Pot level with the stick centred.
pub const CENTRE: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// First multiplexer channel (X axis); Y is the next one.
    const fn first_channel(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 2,
        }
    }

    const fn button_shift(self) -> u8 {
        match self {
            Self::One => 0,
            Self::Two => 4,
        }
    }
}

/// Controller button, numbered left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    One,
    Two,
    Three,
    Four,
}

impl Button {
    /// Bit in register 14 for this button on `player`'s controller.
    #[must_use]
    pub const fn mask(self, player: Player) -> u8 {
        let bit = match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
            Self::Four => 3,
        };
        1 << (bit + player.button_shift())
    }
}

/// Digital stick direction, pushing one axis to its end stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Pot levels and button states for both controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controllers {
    /// Multiplexer channels 0-3.
    axes: [u8; 4],
    /// Register 14, active low.
    buttons: u8,
}

impl Controllers {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            axes: [CENTRE; 4],
            buttons: 0xFF,
        }
    }

    pub fn set_joystick(&mut self, player: Player, x: u8, y: u8) {
        let channel = player.first_channel();
        self.axes[channel] = x;
        self.axes[channel + 1] = y;
    }

    pub fn set_button(&mut self, player: Player, button: Button, pressed: bool) {
        let mask = button.mask(player);
        if pressed {
            self.buttons &= !mask;
        } else {
            self.buttons |= mask;
        }
    }

    /// Up and right read full scale; down and left read zero. Releasing
    /// recentres the axis.
    pub fn set_direction(&mut self, player: Player, direction: Direction, pressed: bool) {
        let (axis, end_stop) = match direction {
            Direction::Left => (0, 0x00),
            Direction::Right => (0, 0xFF),
            Direction::Up => (1, 0xFF),
            Direction::Down => (1, 0x00),
        };
        self.axes[player.first_channel() + axis] = if pressed { end_stop } else { CENTRE };
    }

    #[must_use]
    pub fn axis(&self, channel: usize) -> Option<u8> {
        self.axes.get(channel).copied()
    }

    /// Register 14 as the CPU reads it.
    #[must_use]
    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    /// Read back the levels the bus is currently driving.
    pub(crate) fn from_bus(bus: &VectrexBus) -> Self {
        let mut axes = [CENTRE; 4];
        for (channel, level) in axes.iter_mut().enumerate() {
            *level = bus.analog.joystick_channel(channel).unwrap_or(CENTRE);
        }
        Self {
            axes,
            buttons: bus.psg.register(14),
        }
    }

    /// Drive the pots and button lines on the bus.
    pub(crate) fn apply(&self, bus: &mut VectrexBus) {
        for (channel, &level) in self.axes.iter().enumerate() {
            bus.analog.set_joystick_channel(channel, level);
        }
        bus.set_buttons(self.buttons);
    }
}

impl Default for Controllers {
    fn default() -> Self {
        Self::new()
    }
}

/// A change to controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Button {
        player: Player,
        button: Button,
        pressed: bool,
    },
    Direction {
        player: Player,
        direction: Direction,
        pressed: bool,
    },
    Joystick {
        player: Player,
        x: u8,
        y: u8,
    },
}

/// A timed input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Host frame number at which to apply this event.
    pub frame: u64,
    pub action: InputAction,
}

/// Queue of timed input events, kept in frame order.
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Enqueue a raw input event after any others for the same frame.
    pub fn push(&mut self, event: InputEvent) {
        let pos = self
            .events
            .iter()
            .position(|e| e.frame > event.frame)
            .unwrap_or(self.events.len());
        self.events.insert(pos, event);
    }

    /// Enqueue a button press and its release `hold_frames` later.
    pub fn enqueue_button(&mut self, player: Player, button: Button, at_frame: u64, hold_frames: u64) {
        for (frame, pressed) in [(at_frame, true), (at_frame + hold_frames, false)] {
            self.push(InputEvent {
                frame,
                action: InputAction::Button {
                    player,
                    button,
                    pressed,
                },
            });
        }
    }

    /// Enqueue a stick push and its release `hold_frames` later.
    pub fn enqueue_direction(
        &mut self,
        player: Player,
        direction: Direction,
        at_frame: u64,
        hold_frames: u64,
    ) {
        for (frame, pressed) in [(at_frame, true), (at_frame + hold_frames, false)] {
            self.push(InputEvent {
                frame,
                action: InputAction::Direction {
                    player,
                    direction,
                    pressed,
                },
            });
        }
    }

    /// Apply every event due at or before `frame`. Returns true if any
    /// event was applied.
    pub fn process(&mut self, frame: u64, controllers: &mut Controllers) -> bool {
        let mut applied = false;
        while let Some(event) = self.events.front().copied() {
            if event.frame > frame {
                break;
            }
            self.events.pop_front();
            match event.action {
                InputAction::Button {
                    player,
                    button,
                    pressed,
                } => controllers.set_button(player, button, pressed),
                InputAction::Direction {
                    player,
                    direction,
                    pressed,
                } => controllers.set_direction(player, direction, pressed),
                InputAction::Joystick { player, x, y } => controllers.set_joystick(player, x, y),
            }
            applied = true;
        }
        applied
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Frames a scripted press is held when no duration is given.
pub const DEFAULT_HOLD_FRAMES: u64 = 5;

/// A scripted press parsed from `<control>@<frame>[:<hold>]`.
///
/// Controls are `b1`-`b4`, `up`, `down`, `left` and `right` for player
/// one. A `p2-` prefix selects player two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedPress {
    pub player: Player,
    pub control: Control,
    pub frame: u64,
    pub hold: u64,
}

/// Anything a scripted press can hold down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Button(Button),
    Direction(Direction),
}

impl ScriptedPress {
    pub fn enqueue(&self, queue: &mut InputQueue) {
        match self.control {
            Control::Button(button) => {
                queue.enqueue_button(self.player, button, self.frame, self.hold);
            }
            Control::Direction(direction) => {
                queue.enqueue_direction(self.player, direction, self.frame, self.hold);
            }
        }
    }
}

/// Malformed `--press` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePressError(String);

impl fmt::Display for ParsePressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid press `{}` (expected <control>@<frame>[:<hold>])", self.0)
    }
}

impl std::error::Error for ParsePressError {}

impl FromStr for ScriptedPress {
    type Err = ParsePressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePressError(s.to_string());
        let (name, timing) = s.split_once('@').ok_or_else(err)?;
        let (player, name) = match name.strip_prefix("p2-") {
            Some(rest) => (Player::Two, rest),
            None => (Player::One, name.strip_prefix("p1-").unwrap_or(name)),
        };
        let control = match name {
            "b1" => Control::Button(Button::One),
            "b2" => Control::Button(Button::Two),
            "b3" => Control::Button(Button::Three),
            "b4" => Control::Button(Button::Four),
            "up" => Control::Direction(Direction::Up),
            "down" => Control::Direction(Direction::Down),
            "left" => Control::Direction(Direction::Left),
            "right" => Control::Direction(Direction::Right),
            _ => return Err(err()),
        };
        let (frame, hold) = match timing.split_once(':') {
            Some((frame, hold)) => (frame, hold.parse().map_err(|_| err())?),
            None => (timing, DEFAULT_HOLD_FRAMES),
        };
        Ok(Self {
            player,
            control,
            frame: frame.parse().map_err(|_| err())?,
            hold,
        })
    }
}
