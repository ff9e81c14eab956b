use assert_cmd::Command;
use predicates::str::contains;

fn debug(file: &str, commands: &str) -> Command {
    let mut cmd = Command::cargo_bin("wmach").unwrap();
    cmd.arg("debug")
        .arg(file)
        .arg("--minimal")
        .arg("--command")
        .arg(commands);
    cmd
}

#[test]
fn runs_to_halt() {
    debug("tests/files/countdown.asm", "run")
        .assert()
        .success()
        .stderr(contains("Machine halted."));
}

#[test]
fn stops_at_label_breakpoint() {
    debug(
        "tests/files/countdown.asm",
        "break add done; run; registers; memory n",
    )
    .assert()
    .success()
    .stderr(contains("Added breakpoint at 0x0005."))
    .stderr(contains("Reached breakpoint at 0x0005."))
    .stderr(contains("AK 0\nJM "))
    .stderr(contains("PC 5.0\nFL Z-\n"))
    .stderr(contains("0x0006  0"));
}

#[test]
fn continues_past_breakpoint() {
    debug("tests/files/countdown.asm", "b a 3\nrun\ncontinue\nb rm 3\ncontinue")
        .assert()
        .success()
        .stderr(contains("Reached breakpoint at 0x0003."))
        .stderr(contains("Removed breakpoint at 0x0003."))
        .stderr(contains("Machine halted."));
}

#[test]
fn steps_phases_and_instructions() {
    debug("tests/files/countdown.asm", "step 2; registers; instr; registers")
        .assert()
        .success()
        .stderr(contains("PC 0.2"))
        .stderr(contains("PC 1.0"))
        .stderr(contains("AK 3"));
}

#[test]
fn reset_restores_memory() {
    debug("tests/files/countdown.asm", "run; reset; memory n")
        .assert()
        .success()
        .stderr(contains("Reset machine to initial state."))
        .stderr(contains("0x0006  3"));
}

#[test]
fn queues_input_and_prints_output() {
    let mut cmd = debug("tests/files/echo.asm", "input ok; run");
    cmd.arg("--features").arg("io");
    cmd.assert()
        .success()
        .stdout(contains("ok"))
        .stderr(contains("Queued 2 input byte(s)."));
}

#[test]
fn reports_bad_commands() {
    debug("tests/files/countdown.asm", "jump 4; break; irq 9; quit")
        .assert()
        .success()
        .stderr(contains("Not a command: `jump`."))
        .stderr(contains("Missing subcommand: `break (...)`."))
        .stderr(contains("Interrupt line 9 does not exist"));
}

#[test]
fn unknown_label() {
    debug("tests/files/countdown.asm", "break add nowhere")
        .assert()
        .success()
        .stderr(contains("Label not found named `nowhere`."));
}

#[test]
fn auto_run_stops_on_breakpoint() {
    debug("tests/files/countdown.asm", "break add 1; auto 1; log")
        .assert()
        .success()
        .stderr(contains("Auto-running every 1 ms."))
        .stderr(contains("Reached breakpoint at 0x0001."))
        .stderr(contains("phase    0.0: czyt wei il"));
}

#[test]
fn prints_help_message() {
    debug("tests/files/countdown.asm", "help")
        .assert()
        .success()
        .stderr(contains("break add <addr|label>"));
}

#[test]
fn run_respects_phase_limit() {
    let mut cmd = debug("tests/files/echo.asm", "run");
    cmd.arg("--features").arg("io").arg("--max-phases").arg("3");
    cmd.assert()
        .success()
        .stderr(contains("Reached phase limit."));
}
