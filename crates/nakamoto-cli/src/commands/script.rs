use crate::commands::decode_hex;
use crate::{Error, Result};
use nakamoto_script::{Error as ScriptError, NoSignatureCheck, Program, Script, Stack};

/// Decode a raw script.
#[derive(Debug, clap::Args)]
pub struct DecodeScript {
    /// Hex encoded script.
    #[arg(index = 1)]
    script: String,
}

impl DecodeScript {
    pub fn run(self) -> Result<()> {
        let script = Script::from_bytes(&decode_hex(&self.script)?);

        println!("asm:               {script}");
        println!("size:              {}", script.serialized_size());
        println!("valid:             {}", script.is_valid_operations());
        println!("push only:         {}", script.is_push_only());
        println!("pattern:           {}", script.pattern().name());
        println!("sigops:            {}", script.signature_operations(false));
        println!("sigops (accurate): {}", script.signature_operations(true));
        println!("unspendable:       {}", script.is_unspendable());

        Ok(())
    }
}

/// Evaluate a script with every signature check passing.
#[derive(Debug, clap::Args)]
pub struct EvalScript {
    /// Hex encoded script or its mnemonic form, e.g. `"1 2 OP_ADD 3 OP_EQUAL"`.
    #[arg(index = 1)]
    script: String,

    /// Require exactly one element left on the stack.
    #[arg(long)]
    clean_stack: bool,
}

impl EvalScript {
    pub fn run(self) -> Result<()> {
        let script = parse_script(&self.script)?;
        tracing::debug!(%script, "Evaluating script");

        let stack = evaluate(script, self.clean_stack)?;

        println!("result: true");
        print_stack(&stack);

        Ok(())
    }
}

/// Hex is tried first, anything else is read as mnemonics. A lone `16` is therefore the
/// byte `0x16`, write `OP_16` for the number.
fn parse_script(input: &str) -> Result<Script> {
    match decode_hex(input) {
        Ok(bytes) => Ok(Script::from_bytes(&bytes)),
        Err(_) => input
            .parse::<Script>()
            .map_err(|err| Error::Input(format!("Invalid script: {err}"))),
    }
}

fn evaluate(script: Script, clean_stack: bool) -> Result<Stack> {
    let mut program = Program::new(script);

    if let Err(err) = program.evaluate(&mut NoSignatureCheck) {
        print_stack(program.stack());
        return Err(err.into());
    }

    if !program.stack_result(false) {
        print_stack(program.stack());
        return Err(ScriptError::EvalFalse.into());
    }

    if !program.stack_result(clean_stack) {
        print_stack(program.stack());
        return Err(ScriptError::CleanStack.into());
    }

    Ok(program.into_stack())
}

fn print_stack(stack: &Stack) {
    println!("stack:");
    for element in stack.iter().rev() {
        println!("  {}", hex::encode(element));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        assert_eq!(parse_script("0x5187").unwrap().to_string(), "OP_1 OP_EQUAL");
        assert_eq!(
            parse_script("1 1 OP_EQUAL").unwrap().to_bytes(),
            vec![0x51, 0x51, 0x87]
        );
        assert!(matches!(parse_script("OP_NOPE"), Err(Error::Input(_))));
    }

    #[test]
    fn test_evaluate() {
        let stack = evaluate(parse_script("2 3 OP_ADD 5 OP_EQUAL").unwrap(), true).unwrap();
        assert_eq!(stack.len(), 1);

        assert!(matches!(
            evaluate(parse_script("2 3 OP_ADD 6 OP_EQUAL").unwrap(), false),
            Err(Error::Script(ScriptError::EvalFalse))
        ));

        assert!(matches!(
            evaluate(parse_script("1 1").unwrap(), true),
            Err(Error::Script(ScriptError::CleanStack))
        ));

        assert!(matches!(
            evaluate(parse_script("OP_RETURN").unwrap(), false),
            Err(Error::Script(ScriptError::OpReturn))
        ));
    }
}
