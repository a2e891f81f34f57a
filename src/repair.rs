//! Finding the one corrupted instruction.
//!
//! Exactly one `jmp` or `nop` in the boot code has been swapped for the
//! other, and that is what makes the program loop forever. Both searches here
//! look for the index whose flip lets the program run off its end, and
//! report the accumulator it finishes with. Neither modifies the caller's
//! program.

use machine::{Machine, MachineError, Outcome, Program, State, Word};
use std::collections::HashSet;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Repair {
    /// The index of the instruction that was flipped, or `None` if the
    /// program completed without any help.
    pub flipped: Option<usize>,
    /// The accumulator when the repaired program completed.
    pub acc: Word,
    /// How many flipped variants were run.
    pub attempts: usize,
}

/// Run `machine` to the end, treating a runaway jump like a loop: either way,
/// this variant of the program doesn't finish.
fn completes(machine: &mut Machine) -> Result<bool, MachineError> {
    match machine.run() {
        Ok(Outcome::Completed) => Ok(true),
        Ok(Outcome::LoopDetected) => Ok(false),
        Err(MachineError::JumpOutOfRange { from, target }) => {
            debug!("jump from {:?} to {} left the program", from, target);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Run the unmodified program. If it completes, there's nothing to repair.
fn unmodified(program: &Program) -> Result<Result<Repair, State>, MachineError> {
    let mut machine = Machine::new(program);
    match machine.run()? {
        Outcome::Completed => Ok(Ok(Repair {
            flipped: None,
            acc: machine.state().acc,
            attempts: 0,
        })),
        Outcome::LoopDetected => Ok(Err(machine.into_state())),
    }
}

/// Search for the corrupted instruction by following the execution trace.
///
/// The most recently executed `jmp` or `nop` that we haven't already ruled out
/// is flipped, and the program is rerun. If it still fails, the flip is
/// undone, that index is ruled out, and the next candidate is taken from the
/// trace of the run that just failed. Only instructions the program actually
/// reaches are ever considered, so this usually needs just a few attempts.
///
/// At most one attempt is made per flippable instruction. If none works, this
/// returns `MachineError::Unrepairable`.
pub fn repair(program: &Program) -> Result<Repair, MachineError> {
    let mut state = match unmodified(program)? {
        Ok(repair) => return Ok(repair),
        Err(state) => state,
    };

    let budget = program.flippable().len();
    let mut working = program.clone();
    let mut ruled_out = HashSet::new();
    let mut attempts = 0;

    while attempts < budget {
        let candidate = state.trace().iter().rev().cloned().find(|index| {
            !ruled_out.contains(index)
                && working.get(*index).map_or(false, |insn| insn.op.is_flippable())
        });
        let candidate = match candidate {
            Some(index) => index,
            None => break,
        };

        working.flip(candidate);
        attempts += 1;
        debug!("attempt {}: flipping instruction {}", attempts, candidate);

        state.reset();
        let mut machine = Machine::with_state(&working, state);
        let finished = completes(&mut machine)?;
        state = machine.into_state();

        if finished {
            info!("flipping instruction {} repairs the program", candidate);
            return Ok(Repair {
                flipped: Some(candidate),
                acc: state.acc,
                attempts,
            });
        }

        working.flip(candidate);
        ruled_out.insert(candidate);
    }

    Err(MachineError::Unrepairable { attempts })
}

/// Search for the corrupted instruction by trying every `jmp` and `nop` in
/// program order, returning the first flip that completes.
pub fn repair_exhaustive(program: &Program) -> Result<Repair, MachineError> {
    if let Ok(repair) = unmodified(program)? {
        return Ok(repair);
    }

    let mut attempts = 0;
    for index in program.flippable() {
        let patched = match program.patched(index) {
            Some(patched) => patched,
            None => continue,
        };
        attempts += 1;

        let mut machine = Machine::new(&patched);
        if completes(&mut machine)? {
            info!("flipping instruction {} repairs the program", index);
            return Ok(Repair {
                flipped: Some(index),
                acc: machine.state().acc,
                attempts,
            });
        }
    }

    Err(MachineError::Unrepairable { attempts })
}
