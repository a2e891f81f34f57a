//! The handheld console's boot code: a three-instruction machine with an
//! accumulator, an instruction pointer, and a record of every instruction it
//! has executed so far.

use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub type Word = isize;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Op {
    Acc,
    Jmp,
    Nop,
}

static OP_BY_MNEMONIC: &[(&str, Op)] = &[("acc", Op::Acc), ("jmp", Op::Jmp), ("nop", Op::Nop)];

impl Op {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Acc => "acc",
            Op::Jmp => "jmp",
            Op::Nop => "nop",
        }
    }

    /// True for the operations a single corrupted instruction could have
    /// been swapped with.
    pub fn is_flippable(self) -> bool {
        self.flipped().is_some()
    }

    pub fn flipped(self) -> Option<Op> {
        match self {
            Op::Jmp => Some(Op::Nop),
            Op::Nop => Some(Op::Jmp),
            Op::Acc => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str(self.mnemonic())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Insn {
    pub op: Op,
    pub arg: Word,
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{} {:+}", self.op, self.arg)
    }
}

#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum MachineError {
    #[fail(display = "line {}: malformed instruction: {:?}", line, text)]
    MalformedInstruction { line: usize, text: String },

    #[fail(display = "line {}: unknown operation: {:?}", line, mnemonic)]
    UnknownOpCode { line: usize, mnemonic: String },

    #[fail(display = "jump from instruction {:?} to {} leaves the program", from, target)]
    JumpOutOfRange { from: Option<usize>, target: Word },

    #[fail(display = "arithmetic overflow at instruction {}", at)]
    Overflow { at: usize },

    #[fail(display = "no single flipped instruction lets the program finish ({} attempts)", attempts)]
    Unrepairable { attempts: usize },

    #[fail(display = "self-test of part {} failed: expected {}, got {}", part, expected, actual)]
    SelfTestFailure { part: usize, expected: Word, actual: Word },
}

/// Parse one line of boot code, like `acc +7` or `jmp -3`. `line` is only
/// used for error reporting.
fn parse_insn(line: usize, text: &str) -> Result<Insn, MachineError> {
    let malformed = || MachineError::MalformedInstruction {
        line,
        text: text.to_owned(),
    };

    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(malformed());
    }

    let op = OP_BY_MNEMONIC
        .iter()
        .find(|(name, _op)| *name == fields[0])
        .map(|(_name, op)| *op)
        .ok_or_else(|| MachineError::UnknownOpCode {
            line,
            mnemonic: fields[0].to_owned(),
        })?;
    let arg = Word::from_str(fields[1]).map_err(|_| malformed())?;

    Ok(Insn { op, arg })
}

impl FromStr for Insn {
    type Err = MachineError;
    fn from_str(s: &str) -> Result<Insn, MachineError> {
        parse_insn(1, s)
    }
}

/// A fixed-length list of instructions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Program(Vec<Insn>);

impl FromStr for Program {
    type Err = MachineError;
    fn from_str(s: &str) -> Result<Program, MachineError> {
        let mut insns = Vec::new();
        for (i, line) in s.lines().enumerate() {
            let line_text = line.trim();
            if line_text.is_empty() {
                continue;
            }
            insns.push(parse_insn(i + 1, line_text)?);
        }
        Ok(Program(insns))
    }
}

impl Program {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Insn> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Insn> {
        self.0.iter()
    }

    /// Return the indexes of all `jmp` and `nop` instructions, in order.
    pub fn flippable(&self) -> Vec<usize> {
        self.iter().positions(|insn| insn.op.is_flippable()).collect()
    }

    /// Swap the instruction at `index` between `jmp` and `nop`, keeping its
    /// argument. Return false, leaving the program alone, if there's no such
    /// instruction or it's an `acc`.
    pub fn flip(&mut self, index: usize) -> bool {
        match self.0.get_mut(index) {
            Some(insn) => match insn.op.flipped() {
                Some(op) => {
                    insn.op = op;
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Return a copy of this program with the instruction at `index` flipped.
    pub fn patched(&self, index: usize) -> Option<Program> {
        let mut patched = self.clone();
        if patched.flip(index) {
            Some(patched)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct State {
    pub acc: Word,
    /// Index of the instruction to execute next. This is signed because a
    /// bad jump can send it below zero.
    pub ip: Word,
    trace: Vec<usize>,
    seen: HashSet<usize>,
}

impl State {
    /// Indexes of the instructions executed so far, oldest first. No index
    /// appears twice.
    pub fn trace(&self) -> &[usize] {
        &self.trace
    }

    pub fn visited(&self, index: usize) -> bool {
        self.seen.contains(&index)
    }

    pub fn reset(&mut self) {
        self.acc = 0;
        self.ip = 0;
        self.trace.clear();
        self.seen.clear();
    }

    fn record(&mut self, index: usize) {
        let fresh = self.seen.insert(index);
        assert!(fresh, "instruction {} executed twice", index);
        self.trace.push(index);
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "ip {:4}   acc {:8}   ({} executed)",
            self.ip,
            self.acc,
            self.trace.len()
        )
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The instruction pointer landed just past the last instruction.
    Completed,
    /// The next instruction had already been executed.
    LoopDetected,
}

pub struct Machine<'p> {
    program: &'p Program,
    state: State,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program) -> Machine<'p> {
        Machine::with_state(program, State::default())
    }

    pub fn with_state(program: &'p Program, state: State) -> Machine<'p> {
        Machine { program, state }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn into_state(self) -> State {
        self.state
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Execute a single instruction. Return `Some` if the machine has
    /// stopped instead, without touching the state.
    pub fn step(&mut self) -> Result<Option<Outcome>, MachineError> {
        let len = self.program.len() as Word;
        let ip = self.state.ip;

        if ip >= 0 && self.state.visited(ip as usize) {
            return Ok(Some(Outcome::LoopDetected));
        }
        if ip == len {
            return Ok(Some(Outcome::Completed));
        }
        if ip < 0 || ip > len {
            return Err(MachineError::JumpOutOfRange {
                from: self.state.trace.last().cloned(),
                target: ip,
            });
        }

        let index = ip as usize;
        let insn = self.program.0[index];
        trace!("{:4}  {}    acc {}", index, insn, self.state.acc);
        self.state.record(index);

        match insn.op {
            Op::Acc => {
                self.state.acc = self
                    .state
                    .acc
                    .checked_add(insn.arg)
                    .ok_or(MachineError::Overflow { at: index })?;
                self.state.ip = ip + 1;
            }
            Op::Jmp => {
                self.state.ip = ip
                    .checked_add(insn.arg)
                    .ok_or(MachineError::Overflow { at: index })?;
            }
            Op::Nop => {
                self.state.ip = ip + 1;
            }
        }

        Ok(None)
    }

    /// Run until the program completes or is about to repeat an instruction.
    /// On error, the state is left as it was at the faulting instruction.
    pub fn run(&mut self) -> Result<Outcome, MachineError> {
        loop {
            if let Some(outcome) = self.step()? {
                debug!("{:?}: {}", outcome, self.state);
                return Ok(outcome);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use failure::Error;

    static EXAMPLE: &str = "
        nop +0
        acc +1
        jmp +4
        acc +3
        jmp -3
        acc -99
        acc +1
        jmp -4
        acc +6
    ";

    fn run(program: &Program) -> Result<(Outcome, State), MachineError> {
        let mut machine = Machine::new(program);
        let outcome = machine.run()?;
        Ok((outcome, machine.into_state()))
    }

    #[test]
    fn test_parse_insn() -> Result<(), Error> {
        assert_eq!(Insn::from_str("acc +7")?, Insn { op: Op::Acc, arg: 7 });
        assert_eq!(Insn::from_str("jmp -3")?, Insn { op: Op::Jmp, arg: -3 });
        assert_eq!(Insn::from_str("nop 0")?, Insn { op: Op::Nop, arg: 0 });
        assert_eq!(Insn::from_str("  acc   -99 ")?, Insn { op: Op::Acc, arg: -99 });
        Ok(())
    }

    #[test]
    #[rustfmt::skip]
    fn test_parse_errors() {
        assert_eq!(Insn::from_str("acc"),
                   Err(MachineError::MalformedInstruction { line: 1, text: "acc".to_owned() }));
        assert_eq!(Insn::from_str("acc +1 +2"),
                   Err(MachineError::MalformedInstruction { line: 1, text: "acc +1 +2".to_owned() }));
        assert_eq!(Insn::from_str("acc +x"),
                   Err(MachineError::MalformedInstruction { line: 1, text: "acc +x".to_owned() }));
        assert_eq!(Insn::from_str("mul +2"),
                   Err(MachineError::UnknownOpCode { line: 1, mnemonic: "mul".to_owned() }));

        // Blank lines still count toward the line number.
        assert_eq!(Program::from_str("nop +0\n\nfoo +1\n"),
                   Err(MachineError::UnknownOpCode { line: 3, mnemonic: "foo".to_owned() }));
    }

    #[test]
    fn test_display() -> Result<(), Error> {
        assert_eq!(Insn::from_str("acc 7")?.to_string(), "acc +7");
        assert_eq!(Insn::from_str("jmp -3")?.to_string(), "jmp -3");
        assert_eq!(Insn::from_str("nop +0")?.to_string(), "nop +0");
        Ok(())
    }

    #[test]
    fn test_flippable() -> Result<(), Error> {
        let program = Program::from_str(EXAMPLE)?;
        assert_eq!(program.len(), 9);
        assert_eq!(program.flippable(), vec![0, 2, 4, 7]);
        Ok(())
    }

    #[test]
    fn test_patched() -> Result<(), Error> {
        let program = Program::from_str(EXAMPLE)?;
        let patched = program.patched(7).expect("jmp should flip");
        assert_eq!(patched.get(7), Some(&Insn { op: Op::Nop, arg: -4 }));
        assert_eq!(program.get(7), Some(&Insn { op: Op::Jmp, arg: -4 }));

        assert_eq!(program.patched(1), None);
        assert_eq!(program.patched(9), None);

        let mut program = program;
        assert!(program.flip(0));
        assert_eq!(program.get(0), Some(&Insn { op: Op::Jmp, arg: 0 }));
        assert!(program.flip(0));
        assert_eq!(program.get(0), Some(&Insn { op: Op::Nop, arg: 0 }));
        assert!(!program.flip(5));
        Ok(())
    }

    #[test]
    fn test_example_loops() -> Result<(), Error> {
        let program = Program::from_str(EXAMPLE)?;
        let (outcome, state) = run(&program)?;
        assert_eq!(outcome, Outcome::LoopDetected);
        assert_eq!(state.acc, 5);
        assert_eq!(state.ip, 1);
        assert_eq!(state.trace(), &[0, 1, 2, 6, 7, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_flipped_example_completes() -> Result<(), Error> {
        let program = Program::from_str(EXAMPLE)?.patched(7).expect("flip");
        let (outcome, state) = run(&program)?;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(state.acc, 8);
        assert_eq!(state.ip, 9);
        assert_eq!(state.trace(), &[0, 1, 2, 6, 7, 8]);
        Ok(())
    }

    #[test]
    fn test_run_is_idempotent() -> Result<(), Error> {
        let program = Program::from_str(EXAMPLE)?;
        let first = run(&program)?;
        let second = run(&program)?;
        assert_eq!(first, second);

        let mut machine = Machine::new(&program);
        assert_eq!(machine.run()?, first.0);
        machine.reset();
        assert_eq!(machine.state(), &State::default());
        assert_eq!(machine.run()?, first.0);
        assert_eq!(machine.state(), &first.1);
        Ok(())
    }

    #[test]
    fn test_trace_never_repeats() -> Result<(), Error> {
        let program = Program::from_str(EXAMPLE)?;
        let mut machine = Machine::new(&program);
        while machine.step()?.is_none() {
            let trace = machine.state().trace();
            assert!(trace.len() <= program.len());
            let distinct: HashSet<_> = trace.iter().collect();
            assert_eq!(distinct.len(), trace.len());
        }
        Ok(())
    }

    #[test]
    fn test_all_acc_completes() -> Result<(), Error> {
        let program = Program::from_str("acc +1\nacc +2\nacc -4")?;
        assert!(program.flippable().is_empty());
        let (outcome, state) = run(&program)?;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(state.acc, -1);
        Ok(())
    }

    #[test]
    fn test_empty_program_completes() -> Result<(), Error> {
        let program = Program::from_str("\n")?;
        assert!(program.is_empty());
        assert_eq!(run(&program)?.0, Outcome::Completed);
        Ok(())
    }

    #[test]
    #[rustfmt::skip]
    fn test_jump_out_of_range() -> Result<(), Error> {
        let program = Program::from_str("jmp -1")?;
        assert_eq!(run(&program),
                   Err(MachineError::JumpOutOfRange { from: Some(0), target: -1 }));

        let program = Program::from_str("nop +0\njmp +5")?;
        let mut machine = Machine::new(&program);
        assert_eq!(machine.run(),
                   Err(MachineError::JumpOutOfRange { from: Some(1), target: 6 }));
        assert_eq!(machine.state().trace(), &[0, 1]);

        let mut state = State::default();
        state.ip = 3;
        let mut machine = Machine::with_state(&program, state);
        assert_eq!(machine.run(),
                   Err(MachineError::JumpOutOfRange { from: None, target: 3 }));

        // Landing exactly one past the end is a normal finish.
        let program = Program::from_str("jmp +2\nacc +1")?;
        assert_eq!(run(&program)?.0, Outcome::Completed);
        Ok(())
    }

    #[test]
    fn test_overflow() -> Result<(), Error> {
        let program = Program::from_str(&format!("acc +{}\nacc +1", Word::max_value()))?;
        assert_eq!(run(&program), Err(MachineError::Overflow { at: 1 }));
        Ok(())
    }
}
