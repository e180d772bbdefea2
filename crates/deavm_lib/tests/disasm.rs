use deavm_lib::{
    ActionKind, BranchTarget, DeavmError, DisasmMode, DisasmOptions, RenderContext, StringFormat, decode_actions, disassemble,
    disassemble_with_options, encode_actions, render, render_stream,
};
use pretty_assertions::assert_eq;

const PLAY: u8 = 0x06;
const STOP: u8 = 0x07;
const RETURN: u8 = 0x3e;
const IF: u8 = 0x9d;
const JUMP: u8 = 0x99;

#[derive(Default)]
struct Asm {
    bytes: Vec<u8>,
}

fn cstr(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

impl Asm {
    fn new() -> Self {
        Self::default()
    }

    fn op(mut self, code: u8) -> Self {
        self.bytes.push(code);
        self
    }

    fn rec(mut self, code: u8, payload: &[u8]) -> Self {
        self.bytes.push(code);
        self.bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self
    }

    fn branch(self, code: u8, offset: i16) -> Self {
        self.rec(code, &offset.to_le_bytes())
    }

    fn push_str(self, s: &str) -> Self {
        let mut p = vec![0];
        p.extend(cstr(s));
        self.rec(0x96, &p)
    }

    fn push_const(self, idx: u8) -> Self {
        self.rec(0x96, &[8, idx])
    }

    fn pool(self, constants: &[&str]) -> Self {
        let mut p = (constants.len() as u16).to_le_bytes().to_vec();
        for c in constants {
            p.extend(cstr(c));
        }
        self.rec(0x88, &p)
    }

    fn function(self, name: &str, params: &[&str], body: Asm) -> Self {
        let mut p = cstr(name);
        p.extend_from_slice(&(params.len() as u16).to_le_bytes());
        for param in params {
            p.extend(cstr(param));
        }
        p.extend_from_slice(&(body.bytes.len() as u16).to_le_bytes());
        let mut s = self.rec(0x9b, &p);
        s.bytes.extend(body.bytes);
        s
    }

    fn with(self, body: Asm) -> Self {
        let mut s = self.rec(0x94, &(body.bytes.len() as u16).to_le_bytes());
        s.bytes.extend(body.bytes);
        s
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn build(self) -> Vec<u8> {
        self.bytes
    }
}

fn listing(bytes: &[u8]) -> String {
    disassemble(bytes).unwrap()
}

#[test]
fn self_loop_branch_labels_itself() {
    // if at byte 6 with offset -5 lands on its own position
    let bytes = Asm::new().push_str("a").branch(IF, -5).build();
    assert_eq!(listing(&bytes), "  push \"a\"\nL1:\n  if L1\n");
}

#[test]
fn backward_branch_to_the_first_action() {
    let bytes = Asm::new().push_str("a").branch(IF, -11).build();
    assert_eq!(listing(&bytes), "L1:\n  push \"a\"\n  if L1\n");
}

#[test]
fn constant_pool_resolves_push_operands() {
    let bytes = Asm::new().pool(&["x", "y"]).push_const(1).build();
    assert_eq!(listing(&bytes), "  constantPool\n    0: x\n    1: y\n  push \"y\"\n");
}

#[test]
fn end_of_block_label_follows_the_branch_count() {
    // two branches share the play target, so the end label is L3
    let bytes = Asm::new()
        .branch(IF, 5)
        .branch(JUMP, 0)
        .op(PLAY)
        .branch(JUMP, 0)
        .build();
    let stream = decode_actions(&bytes, StringFormat::NulTerminated).unwrap();
    assert_eq!(stream.label_count, 2);
    assert_eq!(stream.actions[3].branch().map(|b| b.target), Some(BranchTarget::EndOfBlock));
    assert_eq!(
        render_stream(&stream),
        "  if L1\n  jump L1\nL1:\n  play\n  jump L3\nL3:\n"
    );
}

#[test]
fn try_without_catch_body_omits_the_catch_section() {
    let mut payload = vec![0b0000_0011, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00];
    payload.extend(cstr("e"));
    let mut bytes = Asm::new().rec(0x8f, &payload).build();
    bytes.extend_from_slice(&[STOP, PLAY]);

    assert_eq!(
        listing(&bytes),
        "  try {\n      stop\n  }\n  finally {\n      play\n  }\n"
    );
}

#[test]
fn try_with_register_catch() {
    let bytes = [0x8f, 0x08, 0x00, 0b0000_0101, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, RETURN];
    assert_eq!(listing(&bytes), "  catch($2) {\n      return\n  }\n");
}

#[test]
fn unknown_opcode_is_marked_with_its_code() {
    let bytes = Asm::new().rec(0xc7, &[1, 2, 3]).op(STOP).build();
    let stream = decode_actions(&bytes, StringFormat::NulTerminated).unwrap();
    assert_eq!(stream.actions[0].kind, ActionKind::Unknown { data: vec![1, 2, 3] });
    assert_eq!(render_stream(&stream), "  unknown (0xc7)\n  stop\n");
}

#[test]
fn nested_pool_does_not_leak_into_the_parent() {
    let body = Asm::new().pool(&["in"]).push_const(0);
    let bytes = Asm::new()
        .pool(&["out"])
        .function("f", &[], body)
        .push_const(0)
        .build();
    assert_eq!(
        listing(&bytes),
        "  constantPool\n\
         \x20   0: out\n\
         \x20 defineFunction f() {\n\
         \x20     constantPool\n\
         \x20       0: in\n\
         \x20     push \"in\"\n\
         \x20 }\n\
         \x20 push \"out\"\n"
    );
}

#[test]
fn nested_body_inherits_the_enclosing_pool() {
    let bytes = Asm::new()
        .pool(&["p"])
        .with(Asm::new().push_const(0))
        .build();
    assert_eq!(
        listing(&bytes),
        "  constantPool\n    0: p\n  with {\n      push \"p\"\n  }\n"
    );
}

#[test]
fn nested_streams_get_their_own_labels_and_end_label() {
    let body = Asm::new().op(PLAY).branch(JUMP, -6).branch(IF, 0);
    let bytes = Asm::new().function("loop", &["a", "b"], body).op(STOP).build();
    assert_eq!(
        listing(&bytes),
        "  defineFunction loop(a, b) {\n\
         \x20   L1:\n\
         \x20     play\n\
         \x20     jump L1\n\
         \x20     if L2\n\
         \x20   L2:\n\
         \x20 }\n\
         \x20 stop\n"
    );
}

#[test]
fn function2_header_lists_flags() {
    let mut payload = cstr("g");
    payload.extend_from_slice(&[1, 0, 4, 0b0000_1001, 0b0000_0000, 1]);
    payload.extend(cstr("x"));
    payload.extend_from_slice(&[1, 0]);
    let mut bytes = Asm::new().rec(0x8e, &payload).build();
    bytes.push(RETURN);

    assert_eq!(
        listing(&bytes),
        "  defineFunction2 g($1:x) {\n      // preload: this\n      // suppress: arguments\n      return\n  }\n"
    );
}

#[test]
fn positions_are_contiguous() {
    let asm = Asm::new()
        .pool(&["a"])
        .push_str("s")
        .function("f", &["p"], Asm::new().op(RETURN))
        .branch(JUMP, 0)
        .op(STOP);
    let total = asm.len() as u32;
    let stream = decode_actions(&asm.build(), StringFormat::NulTerminated).unwrap();

    for pair in stream.actions.windows(2) {
        assert_eq!(pair[1].pos, pair[0].pos + pair[0].size());
    }
    assert_eq!(stream.actions.last().map(|a| a.end()), Some(total));
    assert_eq!(stream.byte_len(), total);
}

#[test]
fn labels_are_unique_and_ordered_by_position() {
    // the later target is resolved first
    let bytes = Asm::new()
        .branch(JUMP, 6)
        .op(PLAY)
        .branch(JUMP, -11)
        .op(STOP)
        .op(PLAY)
        .build();
    let stream = decode_actions(&bytes, StringFormat::NulTerminated).unwrap();
    let labels: Vec<(u32, &str)> = stream
        .iter()
        .filter_map(|a| a.label.as_deref().map(|l| (a.pos, l)))
        .collect();
    assert_eq!(labels, vec![(0, "L1"), (11, "L2")]);
}

#[test]
fn resolution_is_idempotent() {
    let bytes = Asm::new()
        .push_str("a")
        .branch(IF, 1)
        .op(PLAY)
        .branch(JUMP, -15)
        .build();
    let mut stream = decode_actions(&bytes, StringFormat::NulTerminated).unwrap();
    let before = stream.clone();
    let count = stream.resolve();
    assert_eq!(count, before.label_count);
    assert_eq!(stream, before);
}

#[test]
fn unresolved_branches_are_reported_and_rendered() {
    let bytes = Asm::new().with(Asm::new().branch(JUMP, 100)).build();
    let stream = decode_actions(&bytes, StringFormat::NulTerminated).unwrap();
    assert!(stream.has_unresolved_branches());
    assert_eq!(render_stream(&stream), "  with {\n      jump ILLEGAL_BRANCH\n  }\n");

    let clean = decode_actions(&Asm::new().branch(JUMP, 0).build(), StringFormat::NulTerminated).unwrap();
    assert!(!clean.has_unresolved_branches());
}

#[test]
fn out_of_range_constant_is_not_fatal() {
    let bytes = Asm::new().pool(&["a"]).push_const(4).build();
    assert_eq!(listing(&bytes), "  constantPool\n    0: a\n  push <constant 4 out of range>\n");
}

#[test]
fn render_with_an_inherited_pool() {
    let stream = decode_actions(&Asm::new().push_const(0).build(), StringFormat::NulTerminated).unwrap();
    let mut ctx = RenderContext::new(&stream, vec!["outer".into()], stream.label_count);
    assert_eq!(render(&stream, &mut ctx, 4), "      push \"outer\"\n");
}

#[test]
fn records_mode() {
    let bytes = Asm::new()
        .with(Asm::new().op(STOP).branch(JUMP, -6))
        .op(PLAY)
        .build();
    let options = DisasmOptions {
        mode: DisasmMode::Records,
        ..DisasmOptions::default()
    };
    assert_eq!(
        disassemble_with_options(&bytes, options).unwrap(),
        "[0] [ActionWith]\n    [0] [ActionStop]\n    [1] [ActionJump] BranchOffset: -6 [0]\n[1] [ActionPlay]\n"
    );
}

#[test]
fn length_prefixed_strings_option() {
    let bytes = [0x96, 0x04, 0x00, 0x00, 0x01, 0x00, b'q'];
    let options = DisasmOptions {
        strings: StringFormat::LengthPrefixed,
        ..DisasmOptions::default()
    };
    assert_eq!(disassemble_with_options(&bytes, options).unwrap(), "  push \"q\"\n");
    assert!(disassemble(&bytes).is_err());
}

#[test]
fn truncated_input_is_an_error() {
    let mut bytes = Asm::new().push_str("abc").build();
    bytes.truncate(bytes.len() - 2);
    assert!(disassemble(&bytes).is_err());
}

#[test]
fn reencoded_stream_renders_the_same() {
    let bytes = Asm::new()
        .pool(&["k"])
        .function("f", &["a"], Asm::new().push_const(0).branch(IF, -10).op(RETURN))
        .branch(JUMP, 0)
        .op(0x00)
        .build();
    let stream = decode_actions(&bytes, StringFormat::NulTerminated).unwrap();
    let encoded = encode_actions(&stream, StringFormat::NulTerminated).unwrap();
    assert_eq!(encoded, bytes);
    let again = decode_actions(&encoded, StringFormat::NulTerminated).unwrap();
    assert_eq!(render_stream(&again), render_stream(&stream));
}

#[test]
fn unread_payload_bytes_survive_reencoding() {
    // a call with two stray payload bytes sits between the jump and its target
    let bytes = Asm::new()
        .branch(JUMP, 5)
        .rec(0x9e, &[0xaa, 0xbb])
        .op(STOP)
        .op(0x00)
        .build();
    let stream = decode_actions(&bytes, StringFormat::NulTerminated).unwrap();
    assert_eq!(render_stream(&stream), "  jump L1\n  call\nL1:\n  stop\n");

    let encoded = encode_actions(&stream, StringFormat::NulTerminated).unwrap();
    assert_eq!(encoded, bytes);
    let again = decode_actions(&encoded, StringFormat::NulTerminated).unwrap();
    assert_eq!(render_stream(&again), render_stream(&stream));

    let call = [0x9e, 0x02, 0x00, 0xaa, 0xbb, 0x00];
    let stream = decode_actions(&call, StringFormat::NulTerminated).unwrap();
    assert_eq!(encode_actions(&stream, StringFormat::NulTerminated).unwrap(), call);
}

#[test]
fn invalid_utf8_string_is_not_reencoded() {
    let bytes = Asm::new()
        .branch(JUMP, 6)
        .rec(0x96, &[0x00, 0xff, 0x00])
        .op(STOP)
        .op(0x00)
        .build();
    let stream = decode_actions(&bytes, StringFormat::NulTerminated).unwrap();
    assert_eq!(render_stream(&stream), "  jump L1\n  push \"\u{fffd}\"\nL1:\n  stop\n");

    let err = encode_actions(&stream, StringFormat::NulTerminated).unwrap_err();
    assert!(matches!(err, DeavmError::LossyString { code: 0x96, pos: 5 }));
}
