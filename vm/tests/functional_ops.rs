//! Functional opcode tests against the public machine surface.

#[allow(dead_code)]
mod helpers;

use rosette_types::{Location, Ob, RblError, SysCode, Template, Tuple, RBLFALSE, RBLTRUE};
use rosette_vm::{GlobalEnv, Op, OpCode, Pc, PrimTable, StepOutcome, VMConfig, VM};

use helpers::{boot, boot_debug, code, one_prim, ConstPrim, FailingPrim, RecordingPrim};

#[test]
fn halt_reports_clean_exit() {
    let mut vm = boot(vec![Op::Halt], vec![]);
    assert_eq!(vm.run(&PrimTable::new(), 10), StepOutcome::Exited);
    assert_eq!(vm.exit_code(), 0);
    assert_eq!(vm.pc(), Pc::new(1));
    assert_eq!(vm.bytecodes()[&OpCode::Halt], 1);
}

#[test]
fn dispatch_counts_accumulate_per_opcode() {
    let mut vm = boot(
        vec![
            Op::Alloc { n: 1 },
            Op::ImmediateLitToRslt { value: 1 },
            Op::XferRsltToArg { arg: 0 },
            Op::ImmediateLitToRslt { value: 2 },
            Op::Halt,
        ],
        vec![],
    );
    vm.run(&PrimTable::new(), 10);

    assert_eq!(vm.bytecodes()[&OpCode::ImmediateLitToRslt], 2);
    assert_eq!(vm.bytecodes()[&OpCode::Alloc], 1);
    assert_eq!(vm.bytecodes()[&OpCode::XferRsltToArg], 1);
    assert_eq!(vm.bytecodes()[&OpCode::Halt], 1);
}

#[test]
fn alloc_then_reads_yield_niv() {
    let mut vm = boot(
        vec![Op::Alloc { n: 4 }, Op::XferArgToRslt { arg: 3 }, Op::Halt],
        vec![],
    );
    vm.run(&PrimTable::new(), 10);
    assert_eq!(vm.ctxt().rslt, Ob::Niv);
}

#[test]
fn machine_literal_table_reaches_all_entries() {
    // One opcode per machine literal, spread across the argvec.
    let mut ops = vec![Op::Alloc { n: 12 }];
    for i in 0..12u16 {
        ops.push(Op::ImmediateLitToArg { value: i, arg: i });
    }
    ops.push(Op::Halt);
    let mut vm = boot(ops, vec![]);
    vm.run(&PrimTable::new(), 20);

    let argvec = &vm.ctxt().argvec;
    assert_eq!(argvec.elem(0), Some(&Ob::Fixnum(0)));
    assert_eq!(argvec.elem(7), Some(&Ob::Fixnum(7)));
    assert_eq!(argvec.elem(8), Some(&RBLTRUE));
    assert_eq!(argvec.elem(9), Some(&RBLFALSE));
    assert_eq!(argvec.elem(10), Some(&Ob::Tuple(Tuple::NIL)));
    assert_eq!(argvec.elem(11), Some(&Ob::Niv));
}

#[test]
fn jmp_false_drives_a_two_way_branch() {
    // rslt = #f, branch taken to the true-arm halt.
    let mut vm = boot(
        vec![
            Op::ImmediateLitToRslt { value: 9 },
            Op::JmpFalse { target: 4 },
            Op::ImmediateLitToRslt { value: 0 },
            Op::Halt,
            Op::ImmediateLitToRslt { value: 1 },
            Op::Halt,
        ],
        vec![],
    );
    vm.run(&PrimTable::new(), 10);
    assert_eq!(vm.ctxt().rslt, Ob::Fixnum(1));

    // rslt = #t, fall through.
    let mut vm = boot(
        vec![
            Op::ImmediateLitToRslt { value: 8 },
            Op::JmpFalse { target: 4 },
            Op::ImmediateLitToRslt { value: 0 },
            Op::Halt,
            Op::ImmediateLitToRslt { value: 1 },
            Op::Halt,
        ],
        vec![],
    );
    vm.run(&PrimTable::new(), 10);
    assert_eq!(vm.ctxt().rslt, Ob::Fixnum(0));
}

#[test]
fn fork_runs_before_older_work_after_nxt() {
    // The forked strand sets rslt and halts; the forking strand yields.
    let mut vm = boot(
        vec![
            Op::Fork { target: 2 },
            Op::Nxt,
            Op::ImmediateLitToRslt { value: 8 },
            Op::Halt,
        ],
        vec![],
    );
    vm.run(&PrimTable::new(), 10);
    assert_eq!(vm.ctxt().rslt, RBLTRUE);
    assert_eq!(vm.exit_code(), 0);
}

#[test]
fn nxt_with_no_work_halts_cleanly() {
    let mut vm = boot(vec![Op::Nxt, Op::Unknown], vec![]);
    assert_eq!(vm.run(&PrimTable::new(), 10), StepOutcome::Exited);
    assert_eq!(vm.exit_code(), 0);
    assert!(!vm.bytecodes().contains_key(&OpCode::Unknown));
}

#[test]
fn apply_cmd_discards_result_but_calls_prim() {
    let prim = RecordingPrim::new(Ob::Fixnum(99));
    let mut table = PrimTable::new();
    let calls_view = std::sync::Arc::new(prim);
    // PrimTable owns boxes; keep a shared view for assertions.
    struct Shared(std::sync::Arc<RecordingPrim>);
    impl rosette_vm::Prim for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn dispatch_helper(
            &self,
            ctxt: &mut rosette_vm::Ctxt,
        ) -> Result<Ob, rosette_types::RblError> {
            self.0.dispatch_helper(ctxt)
        }
    }
    table.install(Box::new(Shared(std::sync::Arc::clone(&calls_view))));

    let rslt_before = Ob::symbol("untouched");
    let mut vm = boot(
        vec![
            Op::ApplyCmd {
                unwind: false,
                next: false,
                nargs: 2,
                prim: 0,
            },
            Op::Halt,
        ],
        vec![],
    );
    vm.ctxt_mut().rslt = rslt_before.clone();
    vm.ctxt_mut().argvec = Tuple::filled(2);
    vm.run(&table, 10);

    assert_eq!(*calls_view.calls.lock().unwrap(), vec![2]);
    assert_eq!(vm.ctxt().rslt, rslt_before);
}

#[test]
fn apply_prim_next_flag_yields_after_store() {
    // With an empty pool, the post-store yield drains the machine.
    let table = one_prim(Box::new(ConstPrim(Ob::Fixnum(1))));
    let mut vm = boot(
        vec![
            Op::Alloc { n: 1 },
            Op::ApplyPrimArg {
                unwind: false,
                next: true,
                nargs: 0,
                prim: 0,
                arg: 0,
            },
            Op::Unknown,
        ],
        vec![],
    );
    let outcome = vm.run(&table, 10);

    assert_eq!(outcome, StepOutcome::Exited);
    assert_eq!(vm.exit_code(), 0);
    assert_eq!(vm.ctxt().argvec.elem(0), Some(&Ob::Fixnum(1)));
    assert!(!vm.bytecodes().contains_key(&OpCode::Unknown));
}

#[test]
fn prim_mismatch_is_a_recorded_vm_error() {
    let table = one_prim(Box::new(FailingPrim(RblError::PrimMismatch(
        "wanted a fixnum".into(),
    ))));
    let mut vm = boot_debug(
        vec![
            Op::ApplyCmd {
                unwind: false,
                next: false,
                nargs: 0,
                prim: 0,
            },
            Op::Halt,
        ],
        vec![],
    );
    vm.run(&table, 10);

    assert!(vm
        .debug_info()
        .iter()
        .any(|note| note.contains("wanted a fixnum")));
}

#[test]
fn suspend_sysval_is_quiet_then_yields() {
    let table = one_prim(Box::new(ConstPrim(Ob::Sysval(SysCode::Suspend))));
    let mut vm = boot(
        vec![
            Op::ApplyCmd {
                unwind: false,
                next: false,
                nargs: 0,
                prim: 0,
            },
            Op::Halt,
        ],
        vec![],
    );
    // Suspend's default hook does nothing; the strand yields and the
    // machine drains.
    assert_eq!(vm.run(&table, 10), StepOutcome::Exited);
    assert_eq!(vm.exit_code(), 0);
}

#[test]
fn sleep_sysval_round_trips_through_sleeper_pool() {
    let table = one_prim(Box::new(ConstPrim(Ob::Sysval(SysCode::Sleep))));
    let mut vm = boot(
        vec![
            Op::ApplyCmd {
                unwind: false,
                next: false,
                nargs: 0,
                prim: 0,
            },
            Op::ImmediateLitToRslt { value: 8 },
            Op::Halt,
        ],
        vec![],
    );
    vm.step(&table);
    // The sleeper was woken in the same reconciliation because the
    // ready pool was empty.
    assert_eq!(vm.sleeper_count(), 0);

    vm.run(&table, 10);
    assert_eq!(vm.ctxt().rslt, RBLTRUE);
    assert_eq!(vm.exit_code(), 0);
}

#[test]
fn lookup_to_reg_reads_self_env() {
    let mut vm = boot(
        vec![Op::LookupToReg { reg: 0, lit: 0 }, Op::Halt],
        vec![Ob::symbol("greeting")],
    );
    vm.ctxt_mut().self_env = Ob::Env(Box::new(rosette_types::Env::with_bindings(
        vec![Ob::symbol("greeting")],
        vec![Ob::symbol("hello")],
    )));
    vm.run(&PrimTable::new(), 10);

    assert_eq!(vm.ctxt().rslt, Ob::symbol("hello"));
    assert_eq!(vm.exit_code(), 0);
}

#[test]
fn lookup_through_upcall_meta_yields() {
    let mut vm = boot(
        vec![Op::LookupToReg { reg: 0, lit: 0 }, Op::Unknown],
        vec![Ob::symbol("anything")],
    );
    vm.ctxt_mut().self_env = Ob::Env(Box::new(rosette_types::Env::upcall_frame()));
    vm.run(&PrimTable::new(), 10);

    // The upcall yielded; with an empty pool the machine drained
    // without reaching the poisoned opcode.
    assert_eq!(vm.exit_code(), 0);
    assert!(!vm.bytecodes().contains_key(&OpCode::Unknown));
}

#[test]
fn extend_rest_template_collects_tail() {
    let template = Template::id_vec_rest(vec![Ob::symbol("head"), Ob::symbol("tail")]);
    let mut vm = boot(
        vec![
            Op::Alloc { n: 3 },
            Op::ImmediateLitToArg { value: 1, arg: 0 },
            Op::ImmediateLitToArg { value: 2, arg: 1 },
            Op::ImmediateLitToArg { value: 3, arg: 2 },
            Op::Nargs { n: 3 },
            Op::Extend { lit: 0 },
            Op::Halt,
        ],
        vec![Ob::Template(Box::new(template))],
    );
    vm.run(&PrimTable::new(), 10);

    let env = vm.ctxt().env_frame().expect("env frame");
    assert_eq!(env.lookup_obo(&Ob::symbol("head")), Ok(Ob::Fixnum(1)));
    assert_eq!(
        env.lookup_obo(&Ob::symbol("tail")),
        Ok(Ob::Tuple(Tuple::from_elems(vec![
            Ob::Fixnum(2),
            Ob::Fixnum(3)
        ])))
    );
}

#[test]
fn xfer_lex_indirect_reads_actor_extension() {
    let mut frame = rosette_types::Env::with_bindings(vec![Ob::symbol("k")], vec![Ob::Fixnum(1)]);
    frame.extension = Some(Box::new(rosette_types::Env::with_bindings(
        vec![Ob::symbol("hidden")],
        vec![Ob::Fixnum(42)],
    )));

    let mut vm = boot(
        vec![
            Op::XferLexToReg {
                level: 0,
                indirect: true,
                offset: 0,
                reg: 0,
            },
            Op::XferLexToReg {
                level: 0,
                indirect: false,
                offset: 0,
                reg: 1,
            },
            Op::Halt,
        ],
        vec![],
    );
    vm.ctxt_mut().env = Ob::Env(Box::new(frame));
    vm.run(&PrimTable::new(), 10);

    assert_eq!(vm.ctxt().rslt, Ob::Fixnum(42));
    assert_eq!(vm.ctxt().trgt, Ob::Fixnum(1));
}

#[test]
fn xfer_arg_to_arg_copies_slots() {
    let mut vm = boot(
        vec![
            Op::Alloc { n: 2 },
            Op::ImmediateLitToArg { value: 6, arg: 0 },
            Op::XferArgToArg { dst: 1, src: 0 },
            Op::Halt,
        ],
        vec![],
    );
    vm.run(&PrimTable::new(), 10);
    assert_eq!(vm.ctxt().argvec.elem(1), Some(&Ob::Fixnum(6)));
}

#[test]
fn global_entries_are_opcode_addressable() {
    let mut vm = VM::new(
        VMConfig::default(),
        code(
            vec![
                Op::XferGlobalToReg { global: 1, reg: 0 },
                Op::Halt,
            ],
            vec![],
        ),
        GlobalEnv::new(vec![Ob::Niv, Ob::symbol("globally-bound")]),
    );
    vm.run(&PrimTable::new(), 10);
    assert_eq!(vm.ctxt().rslt, Ob::symbol("globally-bound"));
}

#[test]
fn rtn_arg_delivers_into_parent_argvec() {
    // Parent allocates, pushes a child, records where the result goes;
    // the child computes and returns.
    let mut vm = boot(
        vec![
            Op::Alloc { n: 1 },
            Op::Outstanding { target: 5, count: 1 },
            Op::Push,
            Op::ImmediateLitToRslt { value: 7 },
            Op::RtnArg {
                next: true,
                arg: 0,
            },
            Op::XferArgToRslt { arg: 0 },
            Op::Halt,
        ],
        vec![],
    );
    vm.run(&PrimTable::new(), 20);

    // The parent resumed at its outstanding target and read the
    // delivered value back out of its argvec.
    assert_eq!(vm.ctxt().rslt, Ob::Fixnum(7));
    assert_eq!(vm.exit_code(), 0);
}

#[test]
fn rtn_reg_delivers_into_parent_register() {
    let mut vm = boot(
        vec![
            Op::Outstanding { target: 4, count: 1 },
            Op::Push,
            Op::ImmediateLitToRslt { value: 3 },
            Op::RtnReg { next: true, reg: 1 },
            Op::XferRegToRslt { reg: 1 },
            Op::Halt,
        ],
        vec![],
    );
    vm.run(&PrimTable::new(), 20);

    assert_eq!(vm.ctxt().rslt, Ob::Fixnum(3));
    assert_eq!(vm.exit_code(), 0);
}

#[test]
fn rtn_tag_stores_through_location_literal() {
    let mut vm = boot(
        vec![
            Op::Alloc { n: 1 },
            Op::Outstanding { target: 5, count: 1 },
            Op::Push,
            Op::ImmediateLitToRslt { value: 2 },
            Op::RtnTag { next: true, lit: 0 },
            Op::XferArgToRslt { arg: 0 },
            Op::Halt,
        ],
        vec![Ob::Location(Box::new(Location::ArgReg(0)))],
    );
    vm.run(&PrimTable::new(), 20);

    assert_eq!(vm.ctxt().rslt, Ob::Fixnum(2));
}

#[test]
fn async_wait_hands_control_to_host() {
    let mut vm = boot(vec![Op::Nxt, Op::Halt], vec![]);
    vm.post_signal();
    assert_eq!(vm.run(&PrimTable::new(), 10), StepOutcome::AwaitSignals);
    assert!(!vm.is_exited());

    vm.consume_signal();
    vm.clear_async_wait();
    assert_eq!(vm.run(&PrimTable::new(), 10), StepOutcome::Exited);
    assert_eq!(vm.exit_code(), 0);
}
