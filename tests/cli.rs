use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

fn ish() -> Command {
	Command::new(env!("CARGO_BIN_EXE_ish"))
}

#[test]
fn command_flag_runs_one_line() {
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out.txt");
	let status = ish().arg("-c").arg(format!("echo hi | cat > {}", out.display())).status().unwrap();
	assert!(status.success());
	assert_eq!(fs::read_to_string(&out).unwrap(), "hi\n");
}

#[test]
fn command_flag_reports_status() {
	assert_eq!(ish().args(["-c", "false"]).status().unwrap().code(), Some(1));
	assert_eq!(ish().args(["-c", "a |  | b"]).status().unwrap().code(), Some(2));

	let output = ish().args(["-c", "ish-no-such-program-here"]).output().unwrap();
	assert_eq!(output.status.code(), Some(127));
	assert!(String::from_utf8_lossy(&output.stderr).contains("ish-no-such-program-here: command not found"));
}

#[test]
fn missing_input_file_is_reported() {
	let dir = tempfile::tempdir().unwrap();
	let missing = dir.path().join("missing.txt");
	let output = ish().arg("-c").arg(format!("cat < {}", missing.display())).output().unwrap();
	assert_eq!(output.status.code(), Some(1));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains(&format!("ish: {}: ", missing.display())), "stderr: {}", stderr);
}

#[test]
fn non_executable_file_exits_126() {
	use std::os::unix::fs::PermissionsExt;

	let dir = tempfile::tempdir().unwrap();
	let script = dir.path().join("not-executable");
	fs::write(&script, "#!/bin/sh\necho nope\n").unwrap();
	fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
	let output = ish().arg("-c").arg(script.to_str().unwrap()).output().unwrap();
	assert_eq!(output.status.code(), Some(126));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains(script.to_str().unwrap()), "stderr: {}", stderr);
	assert!(output.stdout.is_empty());
}

#[test]
fn background_marker_is_honoured() {
	let output = ish().args(["-c", "sleep 0 &"]).output().unwrap();
	assert!(output.status.success());
	assert!(String::from_utf8_lossy(&output.stdout).starts_with("Background process with PID "));
}

#[test]
fn interactive_session() {
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out.txt");
	let mut child = ish()
		.args(["--prompt", "$ "])
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.unwrap();
	{
		let stdin = child.stdin.as_mut().unwrap();
		writeln!(stdin, "echo one > {}", out.display()).unwrap();
		writeln!(stdin, "sleep 0 &").unwrap();
		writeln!(stdin, "").unwrap();
		writeln!(stdin, "myjobs").unwrap();
		writeln!(stdin, "exit").unwrap();
	}
	let output = child.wait_with_output().unwrap();
	assert!(output.status.success());
	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(stdout.starts_with("$ "));
	assert!(stdout.contains("Background process with PID "));
	assert!(stdout.contains("Running background processes:\nPID: "));
	assert_eq!(fs::read_to_string(&out).unwrap(), "one\n");
}
