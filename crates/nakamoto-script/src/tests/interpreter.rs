use crate::signature_checker::NoSignatureCheck;
use crate::stack::{Stack, StackError};
use crate::{
    Error, NumError, Opcode, Operation, Program, RuleForks, Script, ScriptVersion,
    TransactionSignatureChecker,
};
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{OutPoint, ScriptBuf, Sequence, Transaction, TxIn, Witness};
use std::sync::Arc;

struct EvalResult {
    /// Verdict of the evaluated program, without the clean stack rule.
    result: Result<bool, Error>,
    /// Primary stack after the evaluation if no error occurs.
    expected_stack: Option<Stack>,
}

impl EvalResult {
    fn ok(success: bool, stack: Vec<Vec<u8>>) -> Self {
        Self {
            result: Ok(success),
            expected_stack: Some(Stack::from(stack)),
        }
    }

    fn err(err: impl Into<Error>) -> Self {
        Self {
            result: Err(err.into()),
            expected_stack: None,
        }
    }
}

fn run(
    script: &str,
    forks: RuleForks,
    transaction: Arc<Transaction>,
) -> (Result<bool, Error>, Stack) {
    let script: Script = script.parse().expect("valid mnemonic");
    let mut checker = TransactionSignatureChecker::new(transaction.clone(), 0, 0);
    let mut program = Program::with_transaction(
        Arc::new(script),
        transaction,
        0,
        forks,
        0,
        ScriptVersion::Unversioned,
    );
    let result = program
        .evaluate(&mut checker)
        .map(|()| program.stack_result(false));
    (result, program.into_stack())
}

fn basic_test(script: &str, eval_result: EvalResult) {
    let EvalResult {
        result: expected,
        expected_stack,
    } = eval_result;

    let script: Script = script.parse().expect("valid mnemonic");
    let mut program = Program::new(script);
    let result = program
        .evaluate(&mut NoSignatureCheck)
        .map(|()| program.stack_result(false));

    assert_eq!(result, expected);
    if expected.is_ok() {
        let expected_stack =
            expected_stack.expect("Expected stack must be Some if eval result is ok");
        assert_eq!(program.stack(), &expected_stack);
    }
}

fn spending_transaction(version: i32, lock_time: u32, sequence: u32) -> Arc<Transaction> {
    Arc::new(Transaction {
        version: Version(version),
        lock_time: LockTime::from_consensus(lock_time),
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence(sequence),
            witness: Witness::new(),
        }],
        output: Vec::new(),
    })
}

#[test]
fn test_equal() {
    basic_test("[04] [04] OP_EQUAL", EvalResult::ok(true, vec![vec![1]]));
    basic_test("[04] [03] OP_EQUAL", EvalResult::ok(false, vec![vec![]]));
    basic_test("[04] OP_EQUAL", EvalResult::err(StackError::InvalidOperation));
}

#[test]
fn test_equal_verify() {
    basic_test("[04] [04] OP_EQUALVERIFY", EvalResult::ok(false, vec![]));
    basic_test(
        "[04] [03] OP_EQUALVERIFY",
        EvalResult::err(Error::Verify(Opcode::OP_EQUALVERIFY)),
    );
}

#[test]
fn test_size() {
    basic_test("[0102] OP_SIZE", EvalResult::ok(true, vec![vec![1, 2], vec![2]]));
    basic_test("OP_0 OP_SIZE", EvalResult::ok(false, vec![vec![], vec![]]));
    basic_test("OP_SIZE", EvalResult::err(StackError::InvalidOperation));
}

#[test]
fn test_hashes() {
    basic_test(
        "OP_0 OP_SHA256",
        EvalResult::ok(
            true,
            vec![hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap()],
        ),
    );
    basic_test(
        "OP_0 OP_HASH256",
        EvalResult::ok(
            true,
            vec![hex::decode("5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456")
                .unwrap()],
        ),
    );
    basic_test(
        "OP_0 OP_RIPEMD160",
        EvalResult::ok(
            true,
            vec![hex::decode("9c1185a5c5e9fc54612808977ee8f548b2258d31").unwrap()],
        ),
    );
    basic_test(
        "OP_0 OP_SHA1",
        EvalResult::ok(
            true,
            vec![hex::decode("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap()],
        ),
    );
    basic_test(
        "OP_0 OP_HASH160",
        EvalResult::ok(
            true,
            vec![hex::decode("b472a266d0bd89c13706a4132ccfb16f7c3b9fcb").unwrap()],
        ),
    );
    basic_test("OP_HASH160", EvalResult::err(StackError::InvalidOperation));
}

#[test]
fn test_unary_arithmetic() {
    basic_test("5 OP_1ADD", EvalResult::ok(true, vec![vec![6]]));
    basic_test("5 OP_1SUB", EvalResult::ok(true, vec![vec![4]]));
    basic_test("-1 OP_1ADD", EvalResult::ok(false, vec![vec![]]));
    basic_test("5 OP_NEGATE", EvalResult::ok(true, vec![vec![0x85]]));
    basic_test("-5 OP_NEGATE", EvalResult::ok(true, vec![vec![5]]));
    basic_test("-5 OP_ABS", EvalResult::ok(true, vec![vec![5]]));
    basic_test("OP_0 OP_NOT", EvalResult::ok(true, vec![vec![1]]));
    basic_test("7 OP_NOT", EvalResult::ok(false, vec![vec![]]));
    basic_test("7 OP_0NOTEQUAL", EvalResult::ok(true, vec![vec![1]]));
    basic_test("OP_1ADD", EvalResult::err(StackError::InvalidOperation));
}

#[test]
fn test_binary_arithmetic() {
    basic_test("2 3 OP_ADD", EvalResult::ok(true, vec![vec![5]]));
    basic_test("2 3 OP_SUB", EvalResult::ok(true, vec![vec![0x81]]));
    basic_test("2 OP_0 OP_BOOLAND", EvalResult::ok(false, vec![vec![]]));
    basic_test("2 OP_0 OP_BOOLOR", EvalResult::ok(true, vec![vec![1]]));
    basic_test("2 2 OP_NUMEQUAL", EvalResult::ok(true, vec![vec![1]]));
    basic_test("2 3 OP_NUMNOTEQUAL", EvalResult::ok(true, vec![vec![1]]));
    basic_test("2 3 OP_LESSTHAN", EvalResult::ok(true, vec![vec![1]]));
    basic_test("2 3 OP_GREATERTHAN", EvalResult::ok(false, vec![vec![]]));
    basic_test("3 3 OP_LESSTHANOREQUAL", EvalResult::ok(true, vec![vec![1]]));
    basic_test("2 3 OP_GREATERTHANOREQUAL", EvalResult::ok(false, vec![vec![]]));
    basic_test("2 3 OP_MIN", EvalResult::ok(true, vec![vec![2]]));
    basic_test("2 3 OP_MAX", EvalResult::ok(true, vec![vec![3]]));
    basic_test("2 OP_ADD", EvalResult::err(StackError::InvalidOperation));
}

#[test]
fn test_within() {
    basic_test("2 2 3 OP_WITHIN", EvalResult::ok(true, vec![vec![1]]));
    basic_test("3 2 3 OP_WITHIN", EvalResult::ok(false, vec![vec![]]));
    basic_test("-1 -2 0 OP_WITHIN", EvalResult::ok(true, vec![vec![1]]));
}

#[test]
fn test_numeric_operands_are_four_bytes() {
    basic_test(
        "[0100000001] OP_1ADD",
        EvalResult::err(StackError::Num(NumError::Overflow)),
    );
    // Results may grow to five bytes, they just cannot be used as operands.
    basic_test(
        "[ffffff7f] OP_1ADD",
        EvalResult::ok(true, vec![vec![0x00, 0x00, 0x00, 0x80, 0x00]]),
    );
    basic_test(
        "[ffffff7f] OP_1ADD OP_1ADD",
        EvalResult::err(StackError::Num(NumError::Overflow)),
    );
}

#[test]
fn test_stack_shuffles() {
    basic_test("1 2 OP_SWAP", EvalResult::ok(true, vec![vec![2], vec![1]]));
    basic_test("1 2 3 OP_ROT", EvalResult::ok(true, vec![vec![2], vec![3], vec![1]]));
    basic_test("1 2 OP_OVER", EvalResult::ok(true, vec![vec![1], vec![2], vec![1]]));
    basic_test("1 2 OP_NIP", EvalResult::ok(true, vec![vec![2]]));
    basic_test("1 2 OP_TUCK", EvalResult::ok(true, vec![vec![2], vec![1], vec![2]]));
    basic_test(
        "1 2 OP_2DUP",
        EvalResult::ok(true, vec![vec![1], vec![2], vec![1], vec![2]]),
    );
    basic_test(
        "1 2 3 4 OP_2SWAP",
        EvalResult::ok(true, vec![vec![3], vec![4], vec![1], vec![2]]),
    );
    basic_test("1 2 3 OP_2DROP", EvalResult::ok(true, vec![vec![1]]));
    basic_test("1 2 3 OP_DEPTH", EvalResult::ok(true, vec![vec![1], vec![2], vec![3], vec![3]]));
    basic_test("OP_0 OP_IFDUP", EvalResult::ok(false, vec![vec![]]));
    basic_test("2 OP_IFDUP", EvalResult::ok(true, vec![vec![2], vec![2]]));
    basic_test("1 OP_2DUP", EvalResult::err(StackError::InvalidOperation));
}

#[test]
fn test_pick_and_roll() {
    basic_test("1 2 3 2 OP_PICK", EvalResult::ok(true, vec![vec![1], vec![2], vec![3], vec![1]]));
    basic_test("1 2 3 2 OP_ROLL", EvalResult::ok(true, vec![vec![2], vec![3], vec![1]]));
    basic_test("1 2 3 OP_0 OP_ROLL", EvalResult::ok(true, vec![vec![1], vec![2], vec![3]]));
    basic_test("1 2 3 3 OP_PICK", EvalResult::err(StackError::InvalidOperation));
    basic_test("1 2 -1 OP_ROLL", EvalResult::err(StackError::InvalidOperation));
}

#[test]
fn test_alt_stack() {
    basic_test(
        "1 2 OP_TOALTSTACK 3 OP_FROMALTSTACK",
        EvalResult::ok(true, vec![vec![1], vec![3], vec![2]]),
    );
    basic_test("1 OP_FROMALTSTACK", EvalResult::err(Error::InvalidAltStackOperation));
}

#[test]
fn test_nested_conditionals() {
    basic_test(
        "1 OP_IF 0 OP_IF 2 OP_ELSE 3 OP_ENDIF OP_ELSE 4 OP_ENDIF",
        EvalResult::ok(true, vec![vec![3]]),
    );
    basic_test(
        "0 OP_NOTIF 5 OP_ELSE OP_RETURN OP_ENDIF",
        EvalResult::ok(true, vec![vec![5]]),
    );
    // Each OP_ELSE flips the branch again.
    basic_test(
        "1 OP_IF 2 OP_ELSE 3 OP_ELSE 4 OP_ENDIF",
        EvalResult::ok(true, vec![vec![2], vec![4]]),
    );
}

#[test]
fn test_unbalanced_conditionals() {
    basic_test("1 OP_IF 1", EvalResult::err(Error::UnbalancedConditional));
    basic_test("0 OP_IF 1 OP_ELSE", EvalResult::err(Error::UnbalancedConditional));
    basic_test("1 OP_ENDIF", EvalResult::err(Error::UnbalancedConditional));
    basic_test("1 OP_ELSE 1 OP_ENDIF", EvalResult::err(Error::UnbalancedConditional));
    basic_test("OP_IF 1 OP_ENDIF", EvalResult::err(StackError::InvalidOperation));
}

#[test]
fn test_single_push_succeeds_with_clean_stack() {
    let mut program = Program::new("[2a]".parse().unwrap());
    program.evaluate(&mut NoSignatureCheck).unwrap();
    assert!(program.stack_result(true));

    let mut program = Program::new("[2a] [2a]".parse().unwrap());
    program.evaluate(&mut NoSignatureCheck).unwrap();
    assert!(program.stack_result(false));
    assert!(!program.stack_result(true));

    // Negative zero is false.
    let mut program = Program::new("[80]".parse().unwrap());
    program.evaluate(&mut NoSignatureCheck).unwrap();
    assert!(!program.stack_result(true));
}

#[test]
fn test_stack_size_limit() {
    let fill = |n: usize| vec!["1"; n].join(" ");

    basic_test(&fill(1000), EvalResult::ok(true, vec![vec![1]; 1000]));
    basic_test(&fill(1001), EvalResult::err(Error::StackSize));

    // The alternate stack counts as well.
    let script = format!("{} OP_TOALTSTACK 1 1", fill(999));
    basic_test(&script, EvalResult::err(Error::StackSize));
}

#[test]
fn test_operation_count_limit() {
    let nops = |n: usize| vec!["OP_NOP"; n].join(" ");

    basic_test(&format!("{} 1", nops(201)), EvalResult::ok(true, vec![vec![1]]));
    basic_test(&format!("{} 1", nops(202)), EvalResult::err(Error::OpCount));

    // Unexecuted operations are counted too.
    basic_test(
        &format!("0 OP_IF {} OP_ENDIF 1", nops(200)),
        EvalResult::err(Error::OpCount),
    );

    // Multisig public keys are charged against the same budget.
    let keys = vec!["[aa]"; 11].join(" ");
    basic_test(
        &format!("{} 0 0 {keys} 11 OP_CHECKMULTISIG", nops(190)),
        EvalResult::err(Error::OpCount),
    );
    basic_test(
        &format!("{} 0 0 {keys} 11 OP_CHECKMULTISIG", nops(189)),
        EvalResult::ok(true, vec![vec![1]]),
    );
}

#[test]
fn test_push_size_limit() {
    // OP_PUSHDATA2 of 521 bytes does not decode, even inside an unexecuted branch.
    let mut bytes = vec![0x00, 0x63, 0x4d, 0x09, 0x02];
    bytes.extend([0xab; 521]);
    bytes.extend([0x68, 0x51]);
    let mut program = Program::new(Script::from_bytes(&bytes));
    assert_eq!(program.evaluate(&mut NoSignatureCheck), Err(Error::InvalidOperation));

    let oversized = Script::from_operations(vec![Operation::push(vec![0xab; 521])]);
    assert!(!oversized.is_valid_operations());
    let mut program = Program::new(oversized);
    assert_eq!(program.evaluate(&mut NoSignatureCheck), Err(Error::InvalidOperation));

    let data = "ab".repeat(520);
    basic_test(&format!("[{data}] OP_SIZE OP_NIP"), EvalResult::ok(true, vec![vec![0x08, 0x02]]));
}

#[test]
fn test_script_size_limit() {
    let mut bytes = vec![0x61; 10_000];
    let mut program = Program::new(Script::from_bytes(&bytes));
    assert_eq!(program.evaluate(&mut NoSignatureCheck), Err(Error::OpCount));

    bytes.push(0x61);
    let mut program = Program::new(Script::from_bytes(&bytes));
    assert_eq!(program.evaluate(&mut NoSignatureCheck), Err(Error::ScriptSize));
}

#[test]
fn test_multisig_with_no_signature_check() {
    // No dummy element left to consume.
    basic_test(
        "[aa] [bb] 2 [dd] [ee] 2 OP_CHECKMULTISIG",
        EvalResult::err(StackError::InvalidOperation),
    );
    basic_test(
        "0 [aa] [bb] 2 [dd] [ee] 2 OP_CHECKMULTISIG",
        EvalResult::ok(true, vec![vec![1]]),
    );
    basic_test(
        "0 [aa] [bb] 3 [dd] [ee] 2 OP_CHECKMULTISIG",
        EvalResult::err(Error::SigCount(2)),
    );
    basic_test(
        "0 21 OP_CHECKMULTISIG",
        EvalResult::err(Error::PubkeyCount),
    );
}

#[test]
fn test_multisig_null_dummy() {
    let tx = spending_transaction(1, 0, 0);
    let script = "1 0 0 OP_CHECKMULTISIG";

    // Without any signature to check the verdict is true.
    let (result, _) = run(script, RuleForks::empty(), tx.clone());
    assert_eq!(result, Ok(true));

    let (result, _) = run(script, RuleForks::BIP147, tx);
    assert_eq!(result, Err(Error::SigNullDummy(1)));
}

#[test]
fn test_check_sig_encoding() {
    let tx = spending_transaction(1, 0, 0);
    let script = "[300602010102010101] [02] OP_CHECKSIG";

    // A well formed but wrong signature is a false verdict, not an error.
    let (result, stack) = run(script, RuleForks::BIP66, tx.clone());
    assert_eq!(result, Ok(false));
    assert_eq!(stack.len(), 1);

    let script = "[3006020101020101] [02] OP_CHECKSIG";
    let (result, _) = run(script, RuleForks::BIP66, tx.clone());
    assert!(matches!(result, Err(Error::SignatureEncoding(_))));

    let (result, _) = run(script, RuleForks::empty(), tx.clone());
    assert_eq!(result, Ok(false));

    // The empty signature always passes the encoding check.
    let (result, _) = run("0 [02] OP_CHECKSIG", RuleForks::BIP66, tx);
    assert_eq!(result, Ok(false));
}

#[test]
fn test_check_lock_time_verify() {
    let tx = spending_transaction(1, 500, 0);

    let (result, stack) = run("500 OP_CHECKLOCKTIMEVERIFY", RuleForks::BIP65, tx.clone());
    assert_eq!(result, Ok(true));
    // The operand is left on the stack.
    assert_eq!(stack.len(), 1);

    let (result, _) = run("501 OP_CHECKLOCKTIMEVERIFY", RuleForks::BIP65, tx.clone());
    assert_eq!(result, Err(Error::UnsatisfiedLocktime));

    let (result, _) = run("-1 OP_CHECKLOCKTIMEVERIFY", RuleForks::BIP65, tx.clone());
    assert_eq!(result, Err(Error::NegativeLocktime));

    let (result, _) = run("OP_CHECKLOCKTIMEVERIFY", RuleForks::BIP65, tx.clone());
    assert_eq!(result, Err(StackError::InvalidOperation.into()));

    // NOP2 before activation.
    let (result, _) = run("501 OP_CHECKLOCKTIMEVERIFY", RuleForks::empty(), tx.clone());
    assert_eq!(result, Ok(true));

    // Five byte operands are allowed.
    let tx = spending_transaction(1, u32::MAX, 0);
    let (result, _) = run("[ffffffff00] OP_CHECKLOCKTIMEVERIFY", RuleForks::BIP65, tx);
    assert_eq!(result, Ok(true));
}

#[test]
fn test_check_sequence_verify() {
    let tx = spending_transaction(2, 0, 10);

    let (result, _) = run("10 OP_CHECKSEQUENCEVERIFY", RuleForks::BIP112, tx.clone());
    assert_eq!(result, Ok(true));

    let (result, _) = run("11 OP_CHECKSEQUENCEVERIFY", RuleForks::BIP112, tx.clone());
    assert_eq!(result, Err(Error::UnsatisfiedLocktime));

    let (result, _) = run("-1 OP_CHECKSEQUENCEVERIFY", RuleForks::BIP112, tx.clone());
    assert_eq!(result, Err(Error::NegativeLocktime));

    // The disable flag turns the check into a NOP.
    let (result, _) = run("[0000008000] OP_CHECKSEQUENCEVERIFY", RuleForks::BIP112, tx.clone());
    assert_eq!(result, Ok(true));

    let (result, _) = run("11 OP_CHECKSEQUENCEVERIFY", RuleForks::empty(), tx);
    assert_eq!(result, Ok(true));

    // Version 1 transactions cannot satisfy a relative lock time.
    let tx = spending_transaction(1, 0, 10);
    let (result, _) = run("10 OP_CHECKSEQUENCEVERIFY", RuleForks::BIP112, tx);
    assert_eq!(result, Err(Error::UnsatisfiedLocktime));
}

#[test]
fn test_code_separator_moves_subscript() {
    let mut program = Program::new("1 OP_CODESEPARATOR 2 OP_CODESEPARATOR 3".parse().unwrap());
    program.evaluate(&mut NoSignatureCheck).unwrap();
    assert_eq!(program.subscript().to_string(), "OP_3");

    // Separators in an unexecuted branch do not move it.
    let mut program = Program::new("0 OP_IF OP_CODESEPARATOR OP_ENDIF 1".parse().unwrap());
    program.evaluate(&mut NoSignatureCheck).unwrap();
    assert_eq!(
        program.subscript().to_string(),
        "OP_0 OP_IF OP_CODESEPARATOR OP_ENDIF OP_1"
    );
}
