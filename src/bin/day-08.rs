extern crate advent_of_code_2020 as aoc;
extern crate env_logger;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

use aoc::machine::{Machine, MachineError, Outcome, Program, Word};
use aoc::repair::repair;
use failure::Error;
use std::str::FromStr;

static TEST_INPUT: &str = include_str!("day-08.test");
static INPUT: &str = include_str!("day-08.input");

// Expected answers for TEST_INPUT.
const TEST_LOOP_ACC: Word = 5;
const TEST_REPAIRED_ACC: Word = 8;

/// Return the accumulator just before `program` would execute some
/// instruction a second time.
fn part1(program: &Program) -> Result<Word, Error> {
    let mut machine = Machine::new(program);
    match machine.run()? {
        Outcome::LoopDetected => Ok(machine.state().acc),
        Outcome::Completed => Err(format_err!(
            "program completed without looping, acc {}",
            machine.state().acc
        )),
    }
}

fn part2(program: &Program) -> Result<Word, Error> {
    Ok(repair(program)?.acc)
}

fn check(part: usize, expected: Word, actual: Word) -> Result<(), MachineError> {
    if actual != expected {
        return Err(MachineError::SelfTestFailure {
            part,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Make sure the machine gets the worked example right before trusting it
/// with the real boot code.
fn self_test() -> Result<(), Error> {
    let program = Program::from_str(TEST_INPUT)?;
    check(1, TEST_LOOP_ACC, part1(&program)?)?;
    check(2, TEST_REPAIRED_ACC, part2(&program)?)?;
    info!("self-test passed");
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();

    self_test()?;

    let program = Program::from_str(INPUT)?;
    info!("boot code has {} instructions", program.len());
    println!("{}", part1(&program)?);
    println!("{}", part2(&program)?);

    Ok(())
}

#[test]
fn test_self_test() -> Result<(), Error> {
    self_test()
}

#[test]
fn test_check() {
    assert!(check(1, 5, 5).is_ok());
    assert_eq!(
        check(2, 8, 7),
        Err(MachineError::SelfTestFailure {
            part: 2,
            expected: 8,
            actual: 7
        })
    );
}

#[test]
fn test_part1_rejects_finishing_program() -> Result<(), Error> {
    let program = Program::from_str("acc +1\njmp +1")?;
    assert!(part1(&program).is_err());
    Ok(())
}

#[test]
fn test_puzzle_answers() -> Result<(), Error> {
    let program = Program::from_str(INPUT)?;
    assert_eq!(program.len(), 636);
    assert_eq!(part1(&program)?, 1501);
    assert_eq!(part2(&program)?, 509);
    Ok(())
}

#[test]
fn test_searches_agree_on_puzzle() -> Result<(), Error> {
    use aoc::repair::repair_exhaustive;

    let program = Program::from_str(INPUT)?;
    let guided = repair(&program)?;
    let exhaustive = repair_exhaustive(&program)?;
    assert_eq!(guided.flipped, Some(216));
    assert_eq!(exhaustive.flipped, Some(216));
    assert_eq!(guided.acc, exhaustive.acc);
    assert!(guided.attempts <= program.flippable().len());
    Ok(())
}
