//! Instruction-level tests for the 6809 interpreter.
//!
//! Programs are hand-assembled; the listing is in the comments.

use emu_core::{Bus, Cpu, SimpleBus};
use motorola_6809::{IrqStatus, Mc6809, flags};
use pretty_assertions::assert_eq;

/// Load `program` at `org`, point the reset vector at it and reset.
fn make_cpu(org: u16, program: &[u8]) -> (Mc6809, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.load(0xFFFE, &org.to_be_bytes());
    bus.load(org, program);
    let mut cpu = Mc6809::new();
    cpu.reset(&mut bus);
    (cpu, bus)
}

fn step(cpu: &mut Mc6809, bus: &mut SimpleBus) -> u32 {
    cpu.step(bus, false, false)
}

#[test]
fn bsr_then_rts() {
    // 2000: BSR $2012
    // 2012: RTS
    let (mut cpu, mut bus) = make_cpu(0x2000, &[0x8D, 0x10]);
    bus.load(0x2012, &[0x39]);
    cpu.regs.s = 0xCBE0;

    assert_eq!(step(&mut cpu, &mut bus), 7);
    assert_eq!(cpu.regs.pc, 0x2012);
    assert_eq!(cpu.regs.s, 0xCBDE);
    assert_eq!(bus.peek_word(0xCBDE), 0x2002);

    assert_eq!(step(&mut cpu, &mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x2002);
    assert_eq!(cpu.regs.s, 0xCBE0);
}

#[test]
fn cwai_stacks_once_then_vectors_on_irq() {
    // 1000: CWAI #$EF
    // 3000: BRA *
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0x3C, 0xEF]);
    bus.load(0xFFF8, &[0x30, 0x00]);
    bus.load(0x3000, &[0x20, 0xFE]);
    cpu.regs.s = 0x0400;
    cpu.regs.u = 0x1122;
    cpu.regs.x = 0x3344;
    cpu.regs.y = 0x5566;
    cpu.regs.a = 0x77;
    cpu.regs.b = 0x88;
    cpu.regs.dp = 0x99;
    cpu.regs.cc = 0x00;

    assert_eq!(step(&mut cpu, &mut bus), 4 + 12);
    assert_eq!(cpu.irq_status(), IrqStatus::Cwai);
    assert_eq!(cpu.regs.s, 0x03F4);
    let frame: Vec<u8> = (0..12).map(|i| bus.peek(0x03F4 + i)).collect();
    assert_eq!(
        frame,
        vec![
            0x80, // CC with E set
            0x77, 0x88, 0x99, // A B DP
            0x33, 0x44, // X
            0x55, 0x66, // Y
            0x11, 0x22, // U
            0x10, 0x02, // PC after CWAI
        ]
    );

    // No interrupt: wait a cycle without fetching.
    assert_eq!(step(&mut cpu, &mut bus), 1);
    assert_eq!(cpu.regs.pc, 0x1002);

    // IRQ: vector without pushing again, then BRA * at the handler.
    assert_eq!(cpu.step(&mut bus, true, false), 7 + 3);
    assert_eq!(cpu.irq_status(), IrqStatus::Normal);
    assert_eq!(cpu.regs.pc, 0x3000);
    assert_eq!(cpu.regs.s, 0x03F4);
    assert!(cpu.regs.flag(flags::I));
    assert!(!cpu.regs.flag(flags::F));
}

#[test]
fn rti_restores_full_frame_when_e_set() {
    // 1000: LDA #$12 ; SWI
    // 2000: CLRA ; RTI
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0x86, 0x12, 0x3F]);
    bus.load(0xFFFA, &[0x20, 0x00]);
    bus.load(0x2000, &[0x4F, 0x3B]);
    cpu.regs.s = 0x0400;

    step(&mut cpu, &mut bus);
    assert_eq!(step(&mut cpu, &mut bus), 7 + 12);
    assert_eq!(cpu.regs.pc, 0x2000);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0);
    assert_eq!(step(&mut cpu, &mut bus), 3 + 12);
    assert_eq!(cpu.regs.a, 0x12);
    assert_eq!(cpu.regs.pc, 0x1003);
    assert_eq!(cpu.regs.s, 0x0400);
}

#[test]
fn rti_after_firq_pulls_pc_and_cc() {
    // 1000: NOP
    // 3000: RTI
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0x12, 0x12]);
    bus.load(0xFFF6, &[0x30, 0x00]);
    bus.load(0x3000, &[0x3B]);
    cpu.regs.s = 0x0400;
    cpu.regs.cc = 0;

    // Vector, stack PC and CC, then the RTI at the handler.
    assert_eq!(cpu.step(&mut bus, false, true), 7 + 3 + 3 + 3);
    assert_eq!(bus.peek(0x03FD), 0x00, "E cleared in stacked CC");
    assert_eq!(cpu.regs.pc, 0x1000);
    assert_eq!(cpu.regs.cc, 0);
    assert_eq!(cpu.regs.s, 0x0400);
}

#[test]
fn documented_cycle_counts() {
    let cases: &[(&[u8], u32, &str)] = &[
        (&[0x12], 2, "NOP"),
        (&[0x86, 0x01], 2, "LDA #"),
        (&[0x96, 0x10], 4, "LDA <"),
        (&[0xA6, 0x84], 4, "LDA ,X"),
        (&[0xB6, 0x12, 0x34], 5, "LDA >"),
        (&[0xCC, 0x12, 0x34], 3, "LDD #"),
        (&[0xBE, 0x12, 0x34], 6, "LDX >"),
        (&[0xDD, 0x20], 5, "STD <"),
        (&[0xB7, 0x12, 0x34], 5, "STA >"),
        (&[0x83, 0x00, 0x01], 4, "SUBD #"),
        (&[0xE3, 0x84], 6, "ADDD ,X"),
        (&[0xBC, 0x12, 0x34], 7, "CMPX >"),
        (&[0x9D, 0x20], 7, "JSR <"),
        (&[0xBD, 0x20, 0x00], 8, "JSR >"),
        (&[0x00, 0x10], 6, "NEG <"),
        (&[0x6C, 0x84], 6, "INC ,X"),
        (&[0x7C, 0x12, 0x34], 7, "INC >"),
        (&[0x0F, 0x10], 6, "CLR <"),
        (&[0x0E, 0x10], 3, "JMP <"),
        (&[0x7E, 0x20, 0x00], 4, "JMP >"),
        (&[0x4F], 2, "CLRA"),
        (&[0x5C], 2, "INCB"),
        (&[0x3D], 11, "MUL"),
        (&[0x3A], 3, "ABX"),
        (&[0x1D], 2, "SEX"),
        (&[0x19], 2, "DAA"),
        (&[0x1A, 0x00], 3, "ORCC"),
        (&[0x1C, 0xFF], 3, "ANDCC"),
        (&[0x1E, 0x89], 8, "EXG A,B"),
        (&[0x1F, 0x12], 6, "TFR X,Y"),
        (&[0x30, 0x01], 5, "LEAX 1,X"),
        (&[0x34, 0x06], 7, "PSHS A,B"),
        (&[0x36, 0x10], 7, "PSHU X"),
        (&[0x20, 0x00], 3, "BRA"),
        (&[0x27, 0x00], 3, "BEQ not taken"),
        (&[0x16, 0x00, 0x00], 5, "LBRA"),
        (&[0x17, 0x00, 0x00], 9, "LBSR"),
        (&[0x10, 0x27, 0x00, 0x00], 5, "LBEQ not taken"),
        (&[0x10, 0x26, 0x00, 0x00], 6, "LBNE taken"),
        (&[0x10, 0x83, 0x00, 0x00], 5, "CMPD #"),
        (&[0x10, 0x8E, 0x00, 0x00], 4, "LDY #"),
        (&[0x10, 0xAE, 0x84], 6, "LDY ,X"),
        (&[0x10, 0xBF, 0x12, 0x34], 7, "STY >"),
        (&[0x10, 0xCE, 0x04, 0x00], 4, "LDS #"),
        (&[0x10, 0xFF, 0x12, 0x34], 7, "STS >"),
        (&[0x11, 0x93, 0x10], 7, "CMPU <"),
        (&[0x11, 0xBC, 0x12, 0x34], 8, "CMPS >"),
        (&[0x3F], 7 + 12, "SWI"),
        (&[0x10, 0x3F], 8 + 12, "SWI2"),
        (&[0x11, 0x3F], 8 + 12, "SWI3"),
    ];

    for &(program, expected, name) in cases {
        let (mut cpu, mut bus) = make_cpu(0x1000, program);
        cpu.regs.x = 0x0800;
        cpu.regs.s = 0x0400;
        cpu.regs.u = 0x0600;
        assert_eq!(step(&mut cpu, &mut bus), expected, "{name}");
    }
}

#[test]
fn indexed_mode_surcharges() {
    // LDA with each indexed post-byte; base cost 4.
    let cases: &[(&[u8], u32, &str)] = &[
        (&[0x84], 0, ",X"),
        (&[0x1F], 1, "-1,X"),
        (&[0x80], 2, ",X+"),
        (&[0x81], 3, ",X++"),
        (&[0x82], 2, ",-X"),
        (&[0x83], 3, ",--X"),
        (&[0x85], 1, "B,X"),
        (&[0x86], 1, "A,X"),
        (&[0x88, 0x05], 1, "n8,X"),
        (&[0x89, 0x00, 0x05], 4, "n16,X"),
        (&[0x8B], 4, "D,X"),
        (&[0x8C, 0x00], 1, "n8,PC"),
        (&[0x8D, 0x00, 0x00], 5, "n16,PC"),
        (&[0x91], 6, "[,X++]"),
        (&[0x93], 6, "[,--X]"),
        (&[0x94], 3, "[,X]"),
        (&[0x95], 4, "[B,X]"),
        (&[0x98, 0x05], 4, "[n8,X]"),
        (&[0x99, 0x00, 0x05], 7, "[n16,X]"),
        (&[0x9B], 7, "[D,X]"),
        (&[0x9C, 0x00], 4, "[n8,PC]"),
        (&[0x9D, 0x00, 0x00], 8, "[n16,PC]"),
        (&[0x9F, 0x12, 0x34], 5, "[n16]"),
        (&[0x87], 0, "undefined"),
    ];

    for &(post, extra, name) in cases {
        let mut program = vec![0xA6];
        program.extend_from_slice(post);
        let (mut cpu, mut bus) = make_cpu(0x1000, &program);
        cpu.regs.x = 0x0800;
        assert_eq!(step(&mut cpu, &mut bus), 4 + extra, "{name}");
        assert_eq!(
            cpu.regs.pc,
            0x1001 + post.len() as u16,
            "{name}: PC past operand"
        );
    }
}

#[test]
fn indexed_effective_addresses() {
    // LDA -1,X
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0xA6, 0x1F]);
    bus.load(0x07FF, &[0x42]);
    cpu.regs.x = 0x0800;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0x42);

    // LDA 2,PC (PC is 0x1003 after the post-byte and offset)
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0xA6, 0x8C, 0x02, 0x00, 0x00, 0x5A]);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0x5A);

    // LDA ,Y++ then LDA ,-Y
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0xA6, 0xA1, 0xE6, 0xA2]);
    bus.load(0x0900, &[0x11, 0x22]);
    cpu.regs.y = 0x0900;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0x11);
    assert_eq!(cpu.regs.y, 0x0902);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.b, 0x22);
    assert_eq!(cpu.regs.y, 0x0901);

    // LDA [,U]
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0xA6, 0xD4]);
    bus.load(0x0600, &[0x0A, 0x00]);
    bus.load(0x0A00, &[0x99]);
    cpu.regs.u = 0x0600;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0x99);

    // LDA B,S with a negative B
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0xA6, 0xE5]);
    bus.load(0x03FE, &[0x77]);
    cpu.regs.s = 0x0400;
    cpu.regs.b = 0xFE;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0x77);
}

#[test]
fn undefined_opcodes_only_advance_pc() {
    let programs: [&[u8]; 6] = [&[0x01], &[0x87], &[0xCD], &[0x8F], &[0x10, 0x00], &[0x11, 0x8E]];
    for program in programs {
        let (mut cpu, mut bus) = make_cpu(0x1000, program);
        cpu.regs.set_d(0x1234);
        cpu.regs.x = 0x5678;
        let before = cpu.regs;
        assert_eq!(step(&mut cpu, &mut bus), 0, "{program:02X?}");
        let mut expected = before;
        expected.pc = 0x1000 + program.len() as u16;
        assert_eq!(cpu.regs, expected, "{program:02X?}");
    }
}

#[test]
fn countdown_loop() {
    // 1000: LDA #3
    // 1002: DECA
    // 1003: BNE $1002
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0x86, 0x03, 0x4A, 0x26, 0xFD]);
    let mut steps = 0;
    while cpu.regs.pc != 0x1005 && steps < 20 {
        step(&mut cpu, &mut bus);
        steps += 1;
    }
    assert_eq!(cpu.regs.a, 0);
    assert_eq!(steps, 1 + 3 * 2);
    assert!(cpu.regs.flag(flags::Z));
}

#[test]
fn signed_branch_uses_n_xor_v() {
    // LDA #$80 ; CMPA #$01 ; BLT +2 ; LDA #$11 ; NOP
    let (mut cpu, mut bus) =
        make_cpu(0x1000, &[0x86, 0x80, 0x81, 0x01, 0x2D, 0x02, 0x86, 0x11, 0x12]);
    for _ in 0..3 {
        step(&mut cpu, &mut bus);
    }
    assert!(cpu.regs.flag(flags::V));
    assert!(!cpu.regs.flag(flags::N));
    assert_eq!(cpu.regs.pc, 0x1008);
    assert_eq!(cpu.regs.a, 0x80);
}

#[test]
fn store_and_read_modify_write_touch_memory() {
    // LDA #$81 ; STA $0500 ; ASL $0500 ; CLR <$10
    let (mut cpu, mut bus) = make_cpu(
        0x1000,
        &[0x86, 0x81, 0xB7, 0x05, 0x00, 0x78, 0x05, 0x00, 0x0F, 0x10],
    );
    bus.write(0x0010, 0xAA);
    for _ in 0..4 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!(bus.peek(0x0500), 0x02);
    assert_eq!(bus.peek(0x0010), 0x00);
    assert!(cpu.regs.flag(flags::Z));
    assert!(!cpu.regs.flag(flags::C), "CLR clears the carry ASL set");
}

#[test]
fn direct_page_selects_high_byte() {
    // LDA #$05 ; TFR A,DP ; LDB <$20
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0x86, 0x05, 0x1F, 0x8B, 0xD6, 0x20]);
    bus.load(0x0520, &[0x3C]);
    for _ in 0..3 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.regs.dp, 0x05);
    assert_eq!(cpu.regs.b, 0x3C);
}

#[test]
fn exchange_and_transfer() {
    // LDA #1 ; LDB #2 ; EXG A,B ; TFR A,X ; TFR X,B
    let (mut cpu, mut bus) = make_cpu(
        0x1000,
        &[0x86, 0x01, 0xC6, 0x02, 0x1E, 0x89, 0x1F, 0x81, 0x1F, 0x19],
    );
    for _ in 0..3 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!((cpu.regs.a, cpu.regs.b), (2, 1));
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.x, 0xFF02, "8-bit source reads with 0xFF high byte");
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.b, 0x02);
}

#[test]
fn sixteen_bit_arithmetic() {
    // LDD #$7FFF ; ADDD #1 ; SUBD #$8001
    let (mut cpu, mut bus) = make_cpu(
        0x1000,
        &[0xCC, 0x7F, 0xFF, 0xC3, 0x00, 0x01, 0x83, 0x80, 0x01],
    );
    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.d(), 0x8000);
    assert!(cpu.regs.flag(flags::V));
    assert!(cpu.regs.flag(flags::N));
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.d(), 0xFFFF);
    assert!(cpu.regs.flag(flags::C), "borrow");
}

#[test]
fn decimal_adjust_and_multiply() {
    // LDA #$09 ; ADDA #$01 ; DAA ; LDB #$10 ; LDA #$10 ; MUL
    let (mut cpu, mut bus) = make_cpu(
        0x1000,
        &[0x86, 0x09, 0x8B, 0x01, 0x19, 0xC6, 0x10, 0x86, 0x10, 0x3D],
    );
    for _ in 0..3 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.regs.a, 0x10);
    for _ in 0..3 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.regs.d(), 0x0100);
    assert!(!cpu.regs.flag(flags::Z));
}

#[test]
fn lea_sets_zero_only_for_x_and_y() {
    // LEAX -1,X ; LEAS -1,S
    let (mut cpu, mut bus) = make_cpu(0x1000, &[0x30, 0x1F, 0x32, 0x7F]);
    cpu.regs.x = 1;
    cpu.regs.s = 1;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.x, 0);
    assert!(cpu.regs.flag(flags::Z));
    cpu.regs.set_flag(flags::Z, false);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.s, 0);
    assert!(!cpu.regs.flag(flags::Z));
}
