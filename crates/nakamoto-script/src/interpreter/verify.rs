use crate::constants::{
    MAX_SCRIPT_ELEMENT_SIZE, WITNESS_V0_KEYHASH_SIZE, WITNESS_V0_SCRIPTHASH_SIZE,
};
use crate::error::Error;
use crate::flags::{RuleForks, ScriptVersion};
use crate::opcode::Opcode;
use crate::operation::Operation;
use crate::program::Program;
use crate::script::{Script, WitnessProgram};
use crate::signature_checker::{SignatureChecker, TransactionSignatureChecker};
use crate::stack::Stack;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::{Transaction, Witness};
use std::sync::Arc;

/// Verifies input `input_index` of `transaction` against the output it spends.
pub fn verify_input(
    transaction: &Arc<Transaction>,
    input_index: usize,
    forks: RuleForks,
    prevout_script: &Script,
    value: u64,
) -> Result<(), Error> {
    let input = transaction
        .input
        .get(input_index)
        .ok_or(Error::InputIndex(input_index))?;

    let mut checker = TransactionSignatureChecker::new(transaction.clone(), input_index, value);

    let input_program = Program::with_transaction(
        Arc::new(Script::from(input.script_sig.as_script())),
        transaction.clone(),
        input_index,
        forks,
        value,
        ScriptVersion::Unversioned,
    );

    verify_script(
        input_program,
        Arc::new(prevout_script.clone()),
        &input.witness,
        &mut checker,
    )
}

/// Evaluates the input script held by `input`, then `prevout_script` on the resulting
/// stack, followed by the P2SH and witness stages when the output script calls for them.
pub fn verify_script(
    mut input: Program,
    prevout_script: Arc<Script>,
    witness: &Witness,
    checker: &mut impl SignatureChecker,
) -> Result<(), Error> {
    let forks = input.forks();
    let input_script = input.script().clone();

    input.evaluate(checker)?;

    // The input stack is kept for the P2SH stage, the output script runs on a copy.
    let mut output = Program::from_previous(prevout_script.clone(), &input);
    output.evaluate(checker)?;

    if !output.stack_result(false) {
        return Err(Error::EvalFalse);
    }

    let mut had_witness = false;

    if forks.contains(RuleForks::BIP141) {
        if let Some(program) = prevout_script.witness_program() {
            if !input_script.is_empty() {
                return Err(Error::WitnessMalleated);
            }

            had_witness = true;
            verify_witness_program(&output, program, witness, checker)?;
        }
    }

    if forks.contains(RuleForks::BIP16) && prevout_script.is_pay_to_script_hash() {
        if !input_script.is_push_only() {
            return Err(Error::SigPushOnly);
        }

        // Not empty, the output script hashed and compared the top element.
        let redeem_bytes = input.stack_mut().pop()?;
        let redeem = Arc::new(Script::from_bytes(&redeem_bytes));

        let mut embedded = Program::from_moved(redeem.clone(), input);
        embedded.evaluate(checker)?;

        if !embedded.stack_result(false) {
            return Err(Error::EvalFalse);
        }

        if forks.contains(RuleForks::BIP141) {
            if let Some(program) = redeem.witness_program() {
                // Anything but a single push of the redeem script would be malleable.
                if input_script.operations() != [Operation::push(redeem_bytes)] {
                    return Err(Error::WitnessMalleatedP2SH);
                }

                had_witness = true;
                verify_witness_program(&embedded, program, witness, checker)?;
            }
        }
    }

    if forks.contains(RuleForks::BIP141) && !had_witness && !witness.is_empty() {
        return Err(Error::WitnessUnexpected);
    }

    Ok(())
}

fn verify_witness_program(
    context: &Program,
    witness_program: WitnessProgram<'_>,
    witness: &Witness,
    checker: &mut impl SignatureChecker,
) -> Result<(), Error> {
    // Other versions are reserved for future soft forks and succeed unconditionally.
    if witness_program.version != 0 {
        return Ok(());
    }

    let program = witness_program.program;
    let mut stack = witness.to_vec();

    let script = match program.len() {
        WITNESS_V0_SCRIPTHASH_SIZE => {
            // P2WSH: the last witness element is the script, committed to by its SHA256.
            let script_bytes = stack.pop().ok_or(Error::WitnessProgramWitnessEmpty)?;

            if sha256::Hash::hash(&script_bytes).as_byte_array().as_slice() != program {
                return Err(Error::WitnessProgramMismatch);
            }

            Script::from_bytes(&script_bytes)
        }
        WITNESS_V0_KEYHASH_SIZE => {
            // P2WPKH: exactly a signature and a public key.
            if stack.len() != 2 {
                return Err(Error::WitnessProgramMismatch);
            }

            Script::from_operations(vec![
                Opcode::OP_DUP.into(),
                Opcode::OP_HASH160.into(),
                Operation::push(program.to_vec()),
                Opcode::OP_EQUALVERIFY.into(),
                Opcode::OP_CHECKSIG.into(),
            ])
        }
        _ => return Err(Error::WitnessProgramWrongLength),
    };

    if stack.iter().any(|element| element.len() > MAX_SCRIPT_ELEMENT_SIZE) {
        return Err(Error::PushSize);
    }

    let mut program = Program::with_stack(
        Arc::new(script),
        context.transaction().clone(),
        context.input_index(),
        context.forks(),
        context.value(),
        ScriptVersion::Zero,
        Stack::from(stack),
    );

    program.evaluate(checker)?;

    // Witness scripts implicitly require a clean stack.
    if program.stack().len() != 1 {
        return Err(Error::CleanStack);
    }

    if !program.stack_result(true) {
        return Err(Error::EvalFalse);
    }

    Ok(())
}
