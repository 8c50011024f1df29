//! Top-level Vectrex system.
//!
//! # Step loop
//!
//! Each CPU instruction:
//! 1. CPU: service IRQ (the VIA's output) and execute one instruction
//! 2. For every cycle the instruction took: VIA timers, analog beam, VIA
//!    line update
//! 3. Frame countdown: every 50,000 cycles the draw list is handed to the
//!    render callback and becomes the erase list
//!
//! The host calls [`Vectrex::run_frame`] once per display refresh (20 ms,
//! 30,000 cycles), so vector frames and host frames drift against each
//! other. [`Vectrex::last_frame`] always holds the most recent complete
//! vector frame.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use emu_core::{Cpu, Observable, StateError, StateReader, StateWriter, Value};
use motorola_6809::Mc6809;

use crate::analog::Vector;
use crate::bus::VectrexBus;
use crate::config::{BIOS_SIZE, CARTRIDGE_SIZE, FRAME_CYCLES, HOST_FRAME_CYCLES, VectrexConfig};
use crate::error::VectrexError;
use crate::input::{Button, Controllers, Direction, InputQueue, Player};

/// Called with the finished draw list at every frame boundary.
pub type RenderCallback = Box<dyn FnMut(&[Vector])>;

/// Vectrex system.
pub struct Vectrex {
    cpu: Mc6809,
    bus: VectrexBus,
    /// Cycles left until the next vector frame boundary.
    frame_countdown: i64,
    /// Completed vector frames.
    frame_count: u64,
    /// Host frames run, the clock for the input queue.
    host_frames: u64,
    controllers: Controllers,
    input_queue: InputQueue,
    render: Option<RenderCallback>,
}

impl Vectrex {
    /// Build a machine and power it on.
    ///
    /// # Errors
    ///
    /// Fails if the system ROM is not exactly 8 KB or the cartridge image is
    /// empty or larger than 64 KB.
    pub fn new(config: &VectrexConfig) -> Result<Self, VectrexError> {
        if config.bios.len() != BIOS_SIZE {
            return Err(VectrexError::BiosSize {
                len: config.bios.len(),
            });
        }
        if let Some(image) = &config.cartridge {
            check_cartridge(image)?;
        }

        let mut bus = VectrexBus::new(&config.bios);
        if let Some(image) = &config.cartridge {
            bus.install_cartridge(image);
        }

        let mut vectrex = Self {
            cpu: Mc6809::new(),
            bus,
            frame_countdown: FRAME_CYCLES,
            frame_count: 0,
            host_frames: 0,
            controllers: Controllers::new(),
            input_queue: InputQueue::new(),
            render: None,
        };
        vectrex.reset();
        Ok(vectrex)
    }

    /// Power-on reset. The system ROM and cartridge survive; everything
    /// else returns to its initial state and the CPU fetches the reset
    /// vector. Held controller state is re-applied.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.controllers.apply(&mut self.bus);
        self.frame_countdown = FRAME_CYCLES;
        self.cpu.reset(&mut self.bus);
    }

    /// Insert a cartridge and reset. On error nothing changes.
    ///
    /// # Errors
    ///
    /// Fails for an empty image or one larger than 64 KB.
    pub fn load_cartridge(&mut self, image: &[u8]) -> Result<(), VectrexError> {
        check_cartridge(image)?;
        self.bus.install_cartridge(image);
        self.reset();
        Ok(())
    }

    /// Remove the cartridge and reset.
    pub fn unload_cartridge(&mut self) {
        self.bus.remove_cartridge();
        self.reset();
    }

    /// Execute one instruction and the peripheral cycles it spans. Returns
    /// true if a frame boundary was crossed.
    fn step(&mut self) -> (u32, bool) {
        let irq = self.bus.via.irq_active();
        let cycles = self.cpu.step(&mut self.bus, irq, false);
        for _ in 0..cycles {
            self.bus.tick();
        }

        self.frame_countdown -= i64::from(cycles);
        if self.frame_countdown >= 0 {
            return (cycles, false);
        }
        self.frame_countdown += FRAME_CYCLES;
        if let Some(render) = self.render.as_mut() {
            render(self.bus.analog.draw_list());
        }
        self.bus.analog.end_frame();
        self.frame_count += 1;
        (cycles, true)
    }

    /// Run whole instructions until at least `cycles` cycles have elapsed.
    /// Returns true if at least one frame boundary was crossed.
    pub fn run(&mut self, cycles: u64) -> bool {
        let mut remaining = cycles as i64;
        let mut crossed = false;
        while remaining > 0 {
            let (spent, boundary) = self.step();
            remaining -= i64::from(spent);
            crossed |= boundary;
        }
        crossed
    }

    /// Run one host frame (20 ms).
    ///
    /// Applies input events due this frame, then runs 30,000 cycles.
    /// Returns true if a new vector frame completed.
    pub fn run_frame(&mut self) -> bool {
        if self
            .input_queue
            .process(self.host_frames, &mut self.controllers)
        {
            self.controllers.apply(&mut self.bus);
        }
        self.host_frames += 1;
        self.run(HOST_FRAME_CYCLES)
    }

    /// Install a callback that receives the draw list at each frame
    /// boundary, before the lists swap.
    pub fn set_render_callback(&mut self, callback: impl FnMut(&[Vector]) + 'static) {
        self.render = Some(Box::new(callback));
    }

    pub fn clear_render_callback(&mut self) {
        self.render = None;
    }

    /// The most recently completed frame.
    #[must_use]
    pub fn last_frame(&self) -> &[Vector] {
        self.bus.analog.erase_list()
    }

    /// Vectors drawn since the last frame boundary.
    #[must_use]
    pub fn draw_list(&self) -> &[Vector] {
        self.bus.analog.draw_list()
    }

    #[must_use]
    pub fn erase_list(&self) -> &[Vector] {
        self.bus.analog.erase_list()
    }

    /// Pull `count` PSG output levels (0-15) at the host sample rate.
    pub fn generate_audio(&mut self, count: usize) -> Vec<u8> {
        self.bus.psg.generate(count)
    }

    // --- Input ---

    /// Set a joystick position, 0x00-0xFF per axis with 0x80 centred.
    pub fn set_joystick(&mut self, player: Player, x: u8, y: u8) {
        self.controllers.set_joystick(player, x, y);
        self.controllers.apply(&mut self.bus);
    }

    pub fn set_button(&mut self, player: Player, button: Button, pressed: bool) {
        self.controllers.set_button(player, button, pressed);
        self.controllers.apply(&mut self.bus);
    }

    pub fn set_direction(&mut self, player: Player, direction: Direction, pressed: bool) {
        self.controllers.set_direction(player, direction, pressed);
        self.controllers.apply(&mut self.bus);
    }

    /// Timed input events, applied at the start of each host frame.
    pub fn input_queue(&mut self) -> &mut InputQueue {
        &mut self.input_queue
    }

    #[must_use]
    pub fn controllers(&self) -> &Controllers {
        &self.controllers
    }

    // --- Save state ---

    /// Exact size of a save-state blob.
    #[must_use]
    pub const fn state_size() -> usize {
        Mc6809::STATE_SIZE + VectrexBus::STATE_SIZE
    }

    /// Serialize the machine. The frame countdown and list contents are
    /// not included.
    #[must_use]
    pub fn save_state(&self) -> Vec<u8> {
        let mut w = StateWriter::with_capacity(Self::state_size());
        self.cpu.save_state(&mut w);
        self.bus.save_state(&mut w);
        w.into_bytes()
    }

    /// Restore a blob from [`save_state`](Self::save_state).
    ///
    /// # Errors
    ///
    /// Fails if the blob is not exactly [`state_size`](Self::state_size)
    /// bytes or any field is out of range. On error nothing changes.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), VectrexError> {
        if data.len() != Self::state_size() {
            return Err(StateError::SizeMismatch {
                expected: Self::state_size(),
                actual: data.len(),
            }
            .into());
        }
        let mut r = StateReader::new(data);
        let mut cpu = self.cpu.clone();
        cpu.load_state(&mut r)?;
        self.bus.load_state(&mut r)?;
        self.cpu = cpu;
        self.controllers = Controllers::from_bus(&self.bus);
        Ok(())
    }

    // --- Accessors ---

    #[must_use]
    pub fn cpu(&self) -> &Mc6809 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Mc6809 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &VectrexBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut VectrexBus {
        &mut self.bus
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn host_frames(&self) -> u64 {
        self.host_frames
    }

    /// Cycles left until the next vector frame boundary.
    #[must_use]
    pub fn frame_countdown(&self) -> i64 {
        self.frame_countdown
    }
}

fn check_cartridge(image: &[u8]) -> Result<(), VectrexError> {
    if image.is_empty() {
        Err(VectrexError::EmptyCartridge)
    } else if image.len() > CARTRIDGE_SIZE {
        Err(VectrexError::CartridgeTooLarge { len: image.len() })
    } else {
        Ok(())
    }
}

fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl Observable for Vectrex {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("via.") {
            self.bus.via.query(rest)
        } else if let Some(rest) = path.strip_prefix("psg.") {
            self.bus.psg.query(rest)
        } else if let Some(rest) = path.strip_prefix("analog.") {
            self.bus.analog.query(rest)
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest).map(|a| Value::U8(self.bus.peek(a)))
        } else {
            match path {
                "frame_count" => Some(self.frame_count.into()),
                "host_frames" => Some(self.host_frames.into()),
                "bank_offset" => Some(self.bus.bank_switch().offset().into()),
                "big_cartridge" => Some(self.bus.is_big_cartridge().into()),
                "draw_count" => Some((self.draw_list().len() as u32).into()),
                "erase_count" => Some((self.erase_list().len() as u32).into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<6809_paths>",
            "via.<6522_paths>",
            "psg.reg.<0-15>",
            "analog.<analog_paths>",
            "memory.<address>",
            "frame_count",
            "host_frames",
            "bank_offset",
            "big_cartridge",
            "draw_count",
            "erase_count",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// BIOS whose reset vector points at `program`, placed at $E000.
    fn make_bios(program: &[u8]) -> Vec<u8> {
        let mut bios = vec![0x12; BIOS_SIZE]; // NOP
        bios[..program.len()].copy_from_slice(program);
        bios[0x1FFE] = 0xE0;
        bios[0x1FFF] = 0x00;
        bios
    }

    fn make_vectrex() -> Vectrex {
        // BRA *
        Vectrex::new(&VectrexConfig {
            bios: make_bios(&[0x20, 0xFE]),
            cartridge: None,
        })
        .expect("valid config")
    }

    #[test]
    fn rejects_wrong_bios_size() {
        let result = Vectrex::new(&VectrexConfig {
            bios: vec![0; 4096],
            cartridge: None,
        });
        assert_eq!(result.err(), Some(VectrexError::BiosSize { len: 4096 }));
    }

    #[test]
    fn reset_fetches_vector() {
        let vectrex = make_vectrex();
        assert_eq!(vectrex.query("cpu.pc"), Some(Value::U16(0xE000)));
        assert_eq!(vectrex.frame_countdown(), FRAME_CYCLES);
        assert_eq!(vectrex.query("psg.reg.14"), Some(Value::U8(0xFF)));
    }

    #[test]
    fn run_frame_advances_host_clock() {
        let mut vectrex = make_vectrex();
        assert!(!vectrex.run_frame());
        assert_eq!(vectrex.host_frames(), 1);
        // 30,000 + 30,000 cycles crosses the 50,000 boundary.
        assert!(vectrex.run_frame());
        assert_eq!(vectrex.frame_count(), 1);
        assert!(vectrex.frame_countdown() > 0);
        assert!(vectrex.frame_countdown() <= FRAME_CYCLES);
    }

    #[test]
    fn render_callback_sees_each_frame() {
        let mut vectrex = make_vectrex();
        let frames = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&frames);
        vectrex.set_render_callback(move |_vectors| *seen.borrow_mut() += 1);
        vectrex.run(3 * 50_000 + 10);
        assert_eq!(*frames.borrow(), 3);
        vectrex.clear_render_callback();
        vectrex.run(50_000);
        assert_eq!(*frames.borrow(), 3);
    }

    #[test]
    fn cartridge_load_errors_leave_machine_alone() {
        let mut vectrex = make_vectrex();
        vectrex.load_cartridge(&[0x67, 0x20, 0x47]).expect("valid image");
        vectrex.run(100);
        let before = vectrex.save_state();

        assert_eq!(
            vectrex.load_cartridge(&[]),
            Err(VectrexError::EmptyCartridge)
        );
        let oversized = vec![0; CARTRIDGE_SIZE + 1];
        assert_eq!(
            vectrex.load_cartridge(&oversized),
            Err(VectrexError::CartridgeTooLarge {
                len: CARTRIDGE_SIZE + 1
            })
        );
        assert_eq!(vectrex.save_state(), before);
        assert_eq!(vectrex.query("memory.0x0001"), Some(Value::U8(0x20)));
    }

    #[test]
    fn unload_clears_cartridge_space() {
        let mut vectrex = make_vectrex();
        vectrex.load_cartridge(&[0x67]).expect("valid image");
        vectrex.unload_cartridge();
        assert_eq!(vectrex.query("memory.$0000"), Some(Value::U8(0)));
    }

    #[test]
    fn buttons_drive_register_14() {
        let mut vectrex = make_vectrex();
        vectrex.set_button(Player::One, Button::One, true);
        vectrex.set_button(Player::Two, Button::Four, true);
        assert_eq!(vectrex.bus().psg.register(14), 0x7E);
        vectrex.set_button(Player::One, Button::One, false);
        assert_eq!(vectrex.bus().psg.register(14), 0x7F);
    }

    #[test]
    fn controllers_survive_reset() {
        let mut vectrex = make_vectrex();
        vectrex.set_joystick(Player::Two, 0x10, 0xF0);
        vectrex.set_button(Player::One, Button::Two, true);
        vectrex.reset();
        assert_eq!(vectrex.bus().analog.joystick_channel(2), Some(0x10));
        assert_eq!(vectrex.bus().analog.joystick_channel(3), Some(0xF0));
        assert_eq!(vectrex.bus().psg.register(14), 0xFD);
    }

    #[test]
    fn queued_input_applies_on_its_frame() {
        let mut vectrex = make_vectrex();
        vectrex
            .input_queue()
            .enqueue_direction(Player::One, Direction::Right, 1, 2);
        vectrex.run_frame();
        assert_eq!(vectrex.bus().analog.joystick_channel(0), Some(0x80));
        vectrex.run_frame();
        assert_eq!(vectrex.bus().analog.joystick_channel(0), Some(0xFF));
        vectrex.run_frame();
        vectrex.run_frame();
        assert_eq!(vectrex.bus().analog.joystick_channel(0), Some(0x80));
    }

    #[test]
    fn state_size_is_exact() {
        let vectrex = make_vectrex();
        assert_eq!(vectrex.save_state().len(), Vectrex::state_size());
        assert_eq!(Vectrex::state_size(), 15 + 69 + 1024 + 1 + 28 + 60 + 9);
    }

    #[test]
    fn load_state_rejects_wrong_size() {
        let mut vectrex = make_vectrex();
        let mut blob = vectrex.save_state();
        blob.push(0);
        vectrex.run(1000);
        let before = vectrex.save_state();
        assert_eq!(
            vectrex.load_state(&blob),
            Err(VectrexError::State(StateError::SizeMismatch {
                expected: Vectrex::state_size(),
                actual: Vectrex::state_size() + 1,
            }))
        );
        assert_eq!(vectrex.save_state(), before);
    }

    #[test]
    fn load_state_restores_controllers() {
        let mut vectrex = make_vectrex();
        vectrex.set_joystick(Player::One, 0x00, 0x40);
        let blob = vectrex.save_state();
        vectrex.set_joystick(Player::One, 0x80, 0x80);
        vectrex.load_state(&blob).expect("valid blob");
        assert_eq!(vectrex.controllers().axis(0), Some(0x00));
        assert_eq!(vectrex.controllers().axis(1), Some(0x40));
    }

    #[test]
    fn observable_routing() {
        let vectrex = make_vectrex();
        assert_eq!(vectrex.query("memory.0xC805"), Some(Value::U8(0x05)));
        assert_eq!(vectrex.query("memory.$D000"), Some(Value::U8(0)));
        assert_eq!(vectrex.query("bank_offset"), Some(Value::U32(0)));
        assert_eq!(vectrex.query("draw_count"), Some(Value::U32(0)));
        assert_eq!(vectrex.query("analog.xsh"), Some(Value::U8(0x80)));
        assert!(vectrex.query("via.ier").is_some());
        assert_eq!(vectrex.query("nonsense"), None);
    }
}
