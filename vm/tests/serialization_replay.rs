//! Snapshot/restore: a serialized machine resumes identically.

#[allow(dead_code)]
mod helpers;

use rosette_vm::{Op, PrimTable, VM};

use helpers::boot;

fn sample_program() -> Vec<Op> {
    vec![
        Op::Alloc { n: 2 },
        Op::ImmediateLitToRslt { value: 5 },
        Op::XferRsltToArg { arg: 0 },
        Op::Fork { target: 6 },
        Op::Nxt,
        Op::Halt,
        Op::ImmediateLitToRslt { value: 8 },
        Op::Halt,
    ]
}

#[test]
fn snapshot_round_trip_is_identical() {
    let mut vm = boot(sample_program(), vec![]);
    let table = PrimTable::new();
    for _ in 0..3 {
        vm.step(&table);
    }

    let json = serde_json::to_string(&vm).expect("serialize");
    let restored: VM = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(restored, vm);
}

#[test]
fn restored_machine_resumes_identically() {
    let mut original = boot(sample_program(), vec![]);
    let table = PrimTable::new();
    for _ in 0..3 {
        original.step(&table);
    }

    let json = serde_json::to_string(&original).expect("serialize");
    let mut restored: VM = serde_json::from_str(&json).expect("deserialize");

    original.run(&table, 50);
    restored.run(&table, 50);

    assert_eq!(restored, original);
    assert_eq!(restored.exit_code(), original.exit_code());
    assert_eq!(restored.ctxt().rslt, original.ctxt().rslt);
    assert_eq!(restored.bytecodes(), original.bytecodes());
}
