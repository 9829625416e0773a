//! Unknown opcode rejection at the wire boundary.

use rosette_vm::Op;

#[test]
fn unrecognized_opcode_fails_to_decode() {
    let json = r#"{"Trampoline":{"target":1}}"#;
    let decoded: Result<Op, _> = serde_json::from_str(json);
    assert!(decoded.is_err(), "unrecognized opcode should be rejected");
}

#[test]
fn known_opcode_round_trips() {
    let op = Op::JmpCut { target: 4, cut: 2 };
    let json = serde_json::to_string(&op).unwrap();
    let back: Op = serde_json::from_str(&json).unwrap();
    assert_eq!(back, op);
}

#[test]
fn explicit_unknown_is_a_legal_encoding() {
    // `Unknown` is a real (fatal) opcode, distinct from a decode error.
    let json = serde_json::to_string(&Op::Unknown).unwrap();
    let back: Op = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Op::Unknown);
}
