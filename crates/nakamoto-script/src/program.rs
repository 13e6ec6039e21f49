//! Script execution context.

use crate::constants::{MAX_OPS_PER_SCRIPT, MAX_STACK_SIZE};
use crate::error::Error;
use crate::flags::{RuleForks, ScriptVersion};
use crate::interpreter;
use crate::operation::Operation;
use crate::script::Script;
use crate::signature_checker::SignatureChecker;
use crate::stack::{cast_to_bool, Stack};
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::Transaction;
use std::sync::Arc;

/// Machine state of one script evaluation.
///
/// The script and the enclosing transaction are shared immutable values, so a program can be
/// handed around or outlive the caller's references without dangling.
#[derive(Debug, Clone)]
pub struct Program {
    script: Arc<Script>,
    transaction: Arc<Transaction>,
    input_index: usize,
    forks: RuleForks,
    value: u64,
    version: ScriptVersion,

    /// Number of open branches currently evaluating to false.
    negative_count: usize,
    operation_count: usize,
    /// Index of the first operation of the signature script code.
    jump: usize,
    primary: Stack,
    alternate: Stack,
    condition: Vec<bool>,
}

impl Program {
    /// Program without transaction context, no rule forks and an unknown input value.
    pub fn new(script: Script) -> Self {
        let transaction = Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: Vec::new(),
            output: Vec::new(),
        };

        Self::with_transaction(
            Arc::new(script),
            Arc::new(transaction),
            0,
            RuleForks::empty(),
            u64::MAX,
            ScriptVersion::Unversioned,
        )
    }

    pub fn with_transaction(
        script: Arc<Script>,
        transaction: Arc<Transaction>,
        input_index: usize,
        forks: RuleForks,
        value: u64,
        version: ScriptVersion,
    ) -> Self {
        Self::with_stack(
            script,
            transaction,
            input_index,
            forks,
            value,
            version,
            Stack::default(),
        )
    }

    /// Program starting from a prepared stack, as witness evaluation does.
    pub fn with_stack(
        script: Arc<Script>,
        transaction: Arc<Transaction>,
        input_index: usize,
        forks: RuleForks,
        value: u64,
        version: ScriptVersion,
        stack: Stack,
    ) -> Self {
        Self {
            script,
            transaction,
            input_index,
            forks,
            value,
            version,
            negative_count: 0,
            operation_count: 0,
            jump: 0,
            primary: stack,
            alternate: Stack::default(),
            condition: Vec::new(),
        }
    }

    /// Program running `script` on a copy of the primary stack left by `other`.
    pub fn from_previous(script: Arc<Script>, other: &Program) -> Self {
        Self::with_stack(
            script,
            other.transaction.clone(),
            other.input_index,
            other.forks,
            other.value,
            other.version,
            other.primary.clone(),
        )
    }

    /// Program running `script` on the primary stack taken over from `other`.
    pub fn from_moved(script: Arc<Script>, other: Program) -> Self {
        Self::with_stack(
            script,
            other.transaction,
            other.input_index,
            other.forks,
            other.value,
            other.version,
            other.primary,
        )
    }

    /// Runs the script to completion.
    pub fn evaluate(&mut self, checker: &mut impl SignatureChecker) -> Result<(), Error> {
        interpreter::run(self, checker)
    }

    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn forks(&self) -> RuleForks {
        self.forks
    }

    pub fn is_enabled(&self, forks: RuleForks) -> bool {
        self.forks.contains(forks)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn version(&self) -> ScriptVersion {
        self.version
    }

    /// The script failed to decode and can not run.
    pub fn is_invalid(&self) -> bool {
        !self.script.is_valid_operations()
    }

    pub fn operation_count(&self) -> usize {
        self.operation_count
    }

    /// Charges `operation` against the operation budget.
    pub fn increment_operation_count(&mut self, operation: &Operation) -> Result<(), Error> {
        if operation.is_counted() {
            self.charge(1)?;
        }
        Ok(())
    }

    /// Charges the public keys of a multisig against the operation budget.
    pub fn increment_multisig_public_keys(&mut self, count: usize) -> Result<(), Error> {
        self.charge(count)
    }

    fn charge(&mut self, count: usize) -> Result<(), Error> {
        self.operation_count += count;
        if self.operation_count > MAX_OPS_PER_SCRIPT {
            return Err(Error::OpCount);
        }
        Ok(())
    }

    /// Moves the start of the signature script code past the code separator at `index`.
    pub fn set_jump_register(&mut self, index: usize) {
        self.jump = index + 1;
    }

    /// Script code committed to by signatures: everything after the last executed
    /// code separator.
    pub fn subscript(&self) -> Script {
        self.script.subscript(self.jump)
    }

    pub fn stack(&self) -> &Stack {
        &self.primary
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.primary
    }

    pub fn alternate(&self) -> &Stack {
        &self.alternate
    }

    pub fn alternate_mut(&mut self) -> &mut Stack {
        &mut self.alternate
    }

    pub fn into_stack(self) -> Stack {
        self.primary
    }

    /// Combined depth of both stacks is over the limit.
    pub fn is_stack_overflow(&self) -> bool {
        self.primary.len() + self.alternate.len() > MAX_STACK_SIZE
    }

    /// Opens a branch.
    pub fn open(&mut self, value: bool) {
        self.condition.push(value);
        if !value {
            self.negative_count += 1;
        }
    }

    /// Flips the innermost open branch.
    pub fn negate(&mut self) -> Result<(), Error> {
        let top = self
            .condition
            .last_mut()
            .ok_or(Error::UnbalancedConditional)?;

        if *top {
            self.negative_count += 1;
        } else {
            self.negative_count -= 1;
        }
        *top = !*top;

        Ok(())
    }

    /// Closes the innermost open branch.
    pub fn close(&mut self) -> Result<(), Error> {
        let top = self.condition.pop().ok_or(Error::UnbalancedConditional)?;
        if !top {
            self.negative_count -= 1;
        }
        Ok(())
    }

    /// No branch is open.
    pub fn is_closed(&self) -> bool {
        self.condition.is_empty()
    }

    /// Every open branch is true.
    pub fn is_succeeding(&self) -> bool {
        self.negative_count == 0
    }

    /// Whether `operation` runs in the current branch state.
    ///
    /// Flow control always runs so that nesting is tracked inside false branches.
    pub fn is_executable(&self, operation: &Operation) -> bool {
        operation.is_conditional() || self.is_succeeding()
    }

    /// Final verdict of an evaluated program: a true top element, and nothing else on the
    /// stack when `clean` is required.
    pub fn stack_result(&self, clean: bool) -> bool {
        if clean && self.primary.len() != 1 {
            return false;
        }

        self.primary.last().is_ok_and(|top| cast_to_bool(top))
    }
}
