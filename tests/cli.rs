//! End-to-end tests driving the `stackvm` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::tempdir;

fn write_program(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

fn stackvm(args: &[&str], trace: bool) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stackvm"))
        .args(args)
        .env("STACKVM_TRACE", if trace { "1" } else { "0" })
        .env_remove("STACKVM_LOG")
        .env_remove("STACKVM_LOG_TIMESTAMP")
        .output()
        .unwrap()
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).unwrap()
}

#[test]
fn no_argument_prints_usage() {
    let output = stackvm(&[], true);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.starts_with("Usage: "));
    assert!(stdout.contains("sample_int.asm"));
    assert!(stdout.contains("sample_float.asm"));
}

#[test]
fn runs_program_with_trace() {
    let dir = tempdir().unwrap();
    let path = write_program(dir.path(), "add.asm", "PUSH 2\nPUSH 3\nADD\nPRINT\n");

    let output = stackvm(&[path.to_str().unwrap()], true);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(
        stdout_of(&output),
        "Assembled 12 bytes.\n\
         TRACE ip=0000 PUSH   2 [stack: ]\n\
         TRACE ip=0005 PUSH   3 [stack: 2 ]\n\
         TRACE ip=0010 ADD    [stack: 2 3 ]\n\
         TRACE ip=0011 PRINT  [stack: 5 ]\n\
         5\n"
    );
}

#[test]
fn extra_arguments_are_ignored() {
    let dir = tempdir().unwrap();
    let path = write_program(dir.path(), "one.asm", "PUSH 1\nPRINT\n");

    let output = stackvm(&[path.to_str().unwrap(), "extra", "--verbose"], false);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "Assembled 6 bytes.\n1\n");
}

#[test]
fn dash_h_is_a_program_path() {
    let dir = tempdir().unwrap();
    write_program(dir.path(), "-h", "PUSH 7\nPRINT\n");

    let output = Command::new(env!("CARGO_BIN_EXE_stackvm"))
        .arg("-h")
        .current_dir(dir.path())
        .env("STACKVM_TRACE", "0")
        .env_remove("STACKVM_LOG")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "Assembled 6 bytes.\n7\n");
}

#[test]
fn trace_can_be_disabled() {
    let dir = tempdir().unwrap();
    let path = write_program(
        dir.path(),
        "skip.asm",
        "PUSH 10\nPUSH 0\nJZ skip\nPUSH 99\nPRINT\nskip:\nPRINT\nHALT\n",
    );

    let output = stackvm(&[path.to_str().unwrap()], false);
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "Assembled 23 bytes.\n10\n");
}

#[test]
fn missing_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.asm");

    let output = stackvm(&[path.to_str().unwrap()], false);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).is_empty());
    assert!(stderr_of(&output).contains("absent.asm"));
}

#[test]
fn assembly_error_reports_location() {
    let dir = tempdir().unwrap();
    let path = write_program(dir.path(), "bad.asm", "PUSH 1\nJMP nowhere\n");

    let output = stackvm(&[path.to_str().unwrap()], false);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).is_empty());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("undefined label: nowhere"));
    assert!(stderr.contains("bad.asm:2:5"));
}

#[test]
fn runtime_error_after_output() {
    let dir = tempdir().unwrap();
    let path = write_program(dir.path(), "div.asm", "PUSH 1\nPRINT\nPUSH 1\nPUSH 0\nDIV\n");

    let output = stackvm(&[path.to_str().unwrap()], false);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_of(&output), "Assembled 17 bytes.\n1\n");
    assert!(stderr_of(&output).contains("division by zero at ip=0016"));
}

#[test]
fn invalid_config_fails() {
    let dir = tempdir().unwrap();
    let path = write_program(dir.path(), "ok.asm", "HALT\n");

    let output = Command::new(env!("CARGO_BIN_EXE_stackvm"))
        .arg(&path)
        .env("STACKVM_STACK_SIZE", "huge")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("STACKVM_STACK_SIZE"));
}

#[test]
fn debug_log_lists_program() {
    let dir = tempdir().unwrap();
    let path = write_program(dir.path(), "list.asm", "PUSH 1\nPRINT\nHALT\n");

    let output = Command::new(env!("CARGO_BIN_EXE_stackvm"))
        .arg(&path)
        .env("STACKVM_TRACE", "0")
        .env("STACKVM_LOG", "debug")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "Assembled 7 bytes.\n1\n");
    let stderr = stderr_of(&output);
    assert!(stderr.contains("Disassembly:"));
    assert!(stderr.contains("0000: PUSH 1\n0005: PRINT\n0006: HALT"));
}

#[test]
fn log_timestamp_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.asm");

    let plain = stackvm(&[path.to_str().unwrap()], false);
    assert!(!stderr_of(&plain).contains(" [ERROR] "));

    let stamped = Command::new(env!("CARGO_BIN_EXE_stackvm"))
        .arg(&path)
        .env("STACKVM_LOG_TIMESTAMP", "1")
        .env_remove("STACKVM_LOG")
        .output()
        .unwrap();
    assert_eq!(stamped.status.code(), Some(1));
    let stderr = stderr_of(&stamped);
    // `YYYY-MM-DD HH:MM:SS.mmm [ERROR] ...`
    assert!(stderr.contains(" [ERROR] "), "stderr: {stderr}");
    assert!(stderr.contains("absent.asm"));
}

#[test]
fn demo_programs() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");

    let int = stackvm(&[root.join("sample_int.asm").to_str().unwrap()], false);
    assert!(int.status.success(), "stderr: {}", stderr_of(&int));
    assert!(stdout_of(&int).ends_with("120\n256\n-1\n"));

    let float = stackvm(&[root.join("sample_float.asm").to_str().unwrap()], false);
    assert!(float.status.success(), "stderr: {}", stderr_of(&float));
    assert!(stdout_of(&float).ends_with("2\n2.5\n"));
}
