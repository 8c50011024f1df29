//! Whole-machine tests driven by small hand-assembled BIOS programs.
//!
//! Every program starts at $E000 (the reset vector points there). The
//! listing is in the comments.

use emu_core::{Observable, Value};
use emu_vectrex::analog::{MAX_X, MAX_Y};
use emu_vectrex::{Vector, Vectrex, VectrexConfig};
use pretty_assertions::assert_eq;

const BIOS_SIZE: usize = 0x2000;

fn make_bios(program: &[u8]) -> Vec<u8> {
    let mut bios = vec![0x12; BIOS_SIZE]; // NOP
    bios[..program.len()].copy_from_slice(program);
    bios[0x1FFE] = 0xE0;
    bios[0x1FFF] = 0x00;
    bios
}

fn make_vectrex(program: &[u8], cartridge: Option<Vec<u8>>) -> Vectrex {
    Vectrex::new(&VectrexConfig {
        bios: make_bios(program),
        cartridge,
    })
    .expect("valid config")
}

#[test]
fn port_a_write_reaches_dac() {
    // E000: LDA #$7F
    // E002: STA $D001
    // E005: BRA *
    let mut vectrex = make_vectrex(&[0x86, 0x7F, 0xB7, 0xD0, 0x01, 0x20, 0xFE], None);
    vectrex.run(7);

    assert_eq!(vectrex.query("via.ora"), Some(Value::U8(0x7F)));
    // The DAC sees port A with bit 7 inverted.
    assert_eq!(vectrex.query("analog.xsh"), Some(Value::U8(0xFF)));
    // ORB = 0 routes the DAC to the Y hold.
    assert_eq!(vectrex.query("analog.ysh"), Some(Value::U8(0xFF)));
    // The sound chip was idle, so none of its registers moved.
    assert_eq!(vectrex.query("psg.reg.0"), Some(Value::U8(0x00)));
    assert_eq!(vectrex.query("psg.reg.14"), Some(Value::U8(0xFF)));
}

/// Draws one diagonal from the centre per loop, recentring between.
const DIAGONAL_LOOP: [u8; 29] = [
    0x86, 0xCC, //       E000: LDA #$CC
    0xB7, 0xD0, 0x0C, // E002: STA $D00C   blank, zero integrators
    0x86, 0x00, //       E005: LDA #$00
    0xB7, 0xD0, 0x01, // E007: STA $D001   X = Y = R: beam still
    0x86, 0xEE, //       E00A: LDA #$EE
    0xB7, 0xD0, 0x0C, // E00C: STA $D00C   unblank, release
    0x86, 0x90, //       E00F: LDA #$90
    0xB7, 0xD0, 0x01, // E011: STA $D001   X = Y = $10: move down-left
    0x12, //             E014: NOP
    0x12, //             E015: NOP
    0x86, 0x00, //       E016: LDA #$00
    0xB7, 0xD0, 0x01, // E018: STA $D001   stop
    0x20, 0xE3, //       E01B: BRA $E000
];

fn is_diagonal(v: &Vector) -> bool {
    v.x1 < v.x0 && v.y1 > v.y0 && v.x0 - v.x1 == v.y1 - v.y0
}

#[test]
fn repeated_line_is_stored_once_per_frame() {
    let mut vectrex = make_vectrex(&DIAGONAL_LOOP, None);
    vectrex.run(3 * 50_000);

    let frame = vectrex.last_frame();
    let diagonals: Vec<&Vector> = frame.iter().filter(|v| is_diagonal(v)).collect();
    assert_eq!(diagonals.len(), 1, "frame: {frame:?}");

    let line = diagonals[0];
    assert_eq!((line.x0, line.y0), (MAX_X / 2, MAX_Y / 2));
    assert!(line.x0 - line.x1 > 0);
    // Besides the diagonal, only the dots where the beam rests at each end.
    assert!(frame.len() <= 3, "frame: {frame:?}");
}

#[test]
fn line_survives_into_next_frame_list() {
    let mut vectrex = make_vectrex(&DIAGONAL_LOOP, None);
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&seen);
    vectrex.set_render_callback(move |vectors| {
        sink.borrow_mut()
            .push(vectors.iter().filter(|v| is_diagonal(v)).count());
    });
    for _ in 0..11 {
        vectrex.run_frame();
    }
    // 11 host frames = 330,000 cycles, past six vector frame boundaries.
    assert_eq!(*seen.borrow(), vec![1; 6]);
    assert_eq!(vectrex.frame_count(), 6);
}

/// Runs the 64 KB bank-switch sequence, then copies cartridge $0010 to
/// RAM $C880.
const BANK_SWITCH: [u8; 36] = [
    0x86, 0x9F, 0xB7, 0xD0, 0x02, // E000: LDA #$9F; STA $D002  DDRB, bit 6 clear
    0x86, 0xFF, 0xB7, 0xD0, 0x03, // E005: LDA #$FF; STA $D003  DDRA
    0x86, 0x01, 0xB7, 0xD0, 0x00, // E00A: LDA #$01; STA $D000  ORB
    0x86, 0x00, 0xB7, 0xD0, 0x01, // E00F: LDA #$00; STA $D001  ORA
    0x86, 0x98, 0xB7, 0xD0, 0x0B, // E014: LDA #$98; STA $D00B  ACR
    0xB7, 0xD0, 0x04, //             E019: STA $D004            T1CL commits
    0xB6, 0x00, 0x10, //             E01C: LDA $0010
    0xB7, 0xC8, 0x80, //             E01F: STA $C880
    0x20, 0xFE, //                   E022: BRA *
];

fn make_banked_cartridge() -> Vec<u8> {
    let mut image = vec![0x00; 0x1_0000];
    image[0x0010] = 0x11;
    image[0x8000] = 0x01; // 64 KB marker
    image[0x8010] = 0x22;
    image
}

#[test]
fn bank_switch_sequence_selects_upper_half() {
    let mut vectrex = make_vectrex(&BANK_SWITCH, Some(make_banked_cartridge()));
    assert_eq!(vectrex.query("big_cartridge"), Some(Value::Bool(true)));
    vectrex.run(200);

    assert_eq!(vectrex.query("bank_offset"), Some(Value::U32(0x8000)));
    assert_eq!(vectrex.query("memory.0xC880"), Some(Value::U8(0x22)));
}

#[test]
fn small_cartridge_ignores_bank_switch_sequence() {
    let mut image = make_banked_cartridge();
    image.truncate(0x8000);
    let mut vectrex = make_vectrex(&BANK_SWITCH, Some(image));
    vectrex.run(200);

    assert_eq!(vectrex.query("bank_offset"), Some(Value::U32(0)));
    assert_eq!(vectrex.query("memory.0xC880"), Some(Value::U8(0x11)));
}

#[test]
fn reset_returns_to_lower_bank() {
    let mut vectrex = make_vectrex(&BANK_SWITCH, Some(make_banked_cartridge()));
    vectrex.run(200);
    vectrex.reset();
    assert_eq!(vectrex.query("bank_offset"), Some(Value::U32(0)));
    assert_eq!(vectrex.query("memory.0x0010"), Some(Value::U8(0x11)));
}

#[test]
fn save_state_resumes_identically() {
    let mut vectrex = make_vectrex(&DIAGONAL_LOOP, None);
    vectrex.run(12_345);
    let blob = vectrex.save_state();

    let mut copy = make_vectrex(&DIAGONAL_LOOP, None);
    copy.load_state(&blob).expect("valid blob");
    assert_eq!(copy.save_state(), blob);

    vectrex.run(1_000);
    copy.run(1_000);
    assert_eq!(copy.query("cpu.pc"), vectrex.query("cpu.pc"));
    assert_eq!(copy.query("analog.x"), vectrex.query("analog.x"));
    assert_eq!(copy.query("analog.y"), vectrex.query("analog.y"));
}

#[test]
fn corrupt_state_is_rejected_whole() {
    let mut vectrex = make_vectrex(&DIAGONAL_LOOP, None);
    vectrex.run(5_000);
    let mut blob = vectrex.save_state();
    // CPU wait state is byte 14; 7 is not a valid status.
    blob[14] = 7;

    let before = vectrex.save_state();
    assert!(vectrex.load_state(&blob).is_err());
    assert_eq!(vectrex.save_state(), before);
}

#[test]
fn buttons_visible_through_sound_port() {
    // E000: LDA #$0E       select register 14
    // E002: STA $D001
    // E005: LDA #$18       latch address
    // E007: STA $D000
    // E00A: LDA #$08       chip drives port A
    // E00C: STA $D000
    // E00F: LDA $D001
    // E012: STA $C880
    // E015: BRA *
    let program = [
        0x86, 0x0E, 0xB7, 0xD0, 0x01, 0x86, 0x18, 0xB7, 0xD0, 0x00, 0x86, 0x08, 0xB7, 0xD0,
        0x00, 0xB6, 0xD0, 0x01, 0xB7, 0xC8, 0x80, 0x20, 0xFE,
    ];
    let mut vectrex = make_vectrex(&program, None);
    vectrex.set_button(emu_vectrex::Player::One, emu_vectrex::Button::Three, true);
    vectrex.run(100);
    assert_eq!(vectrex.query("memory.0xC880"), Some(Value::U8(0xFB)));
}

#[cfg(feature = "native")]
#[test]
fn vector_dump_parses_back() {
    let mut vectrex = make_vectrex(&DIAGONAL_LOOP, None);
    vectrex.run(2 * 50_000);
    let path = std::env::temp_dir().join(format!("emu-vectrex-dump-{}.json", std::process::id()));

    emu_vectrex::capture::save_vectors(vectrex.last_frame(), &path).expect("write dump");
    let text = std::fs::read_to_string(&path).expect("read dump");
    let json: serde_json::Value = serde_json::from_str(&text).expect("valid json");
    let entries = json.as_array().expect("array");
    assert_eq!(entries.len(), vectrex.last_frame().len());
    assert!(entries[0].get("x0").is_some());
    assert!(entries[0].get("color").is_some());

    let back = emu_vectrex::capture::load_vectors(&path).expect("parse dump");
    assert_eq!(back, vectrex.last_frame());
    let _ = std::fs::remove_file(&path);
}
