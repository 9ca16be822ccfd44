// tests/local_session.rs

#![cfg(unix)]

use shellctl::{
    ConnectionFileSystem, FileKind, FilePath, SessionState, ShellDialect, ShellError, ShellRuntime,
    system::shells_config::RuntimeConfig,
};
use std::{
    io::Write,
    thread,
    time::{Duration, Instant},
};

fn runtime() -> ShellRuntime {
    ShellRuntime::from_config(RuntimeConfig {
        local_dialect: Some(ShellDialect::Sh),
        ..RuntimeConfig::default()
    })
}

// --- Lifecycle ---

#[test]
fn test_start_is_idempotent() {
    // --- Setup ---
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));

    // --- Execute ---
    shell.start().unwrap();
    let transport = shell.transport_id();
    let pid = shell.execute_simple_command("echo $$").unwrap();
    shell.start().unwrap();

    // --- Assert ---
    assert_eq!(shell.state(), SessionState::Running);
    assert_eq!(shell.transport_id(), transport);
    assert_eq!(shell.execute_simple_command("echo $$").unwrap(), pid);
    shell.close();
}

#[test]
fn test_commands_start_the_session_lazily() {
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));
    assert_eq!(shell.state(), SessionState::NotStarted);

    assert_eq!(shell.execute_simple_command("echo lazy").unwrap(), "lazy");

    assert_eq!(shell.state(), SessionState::Running);
    shell.close();
}

#[test]
fn test_closed_session_rejects_commands() {
    // --- Setup ---
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));
    shell.start().unwrap();

    // --- Execute ---
    shell.close();
    let command_err = shell.execute_simple_command("echo hi").unwrap_err();
    let start_err = shell.start().unwrap_err();

    // --- Assert ---
    assert_eq!(shell.state(), SessionState::Closed);
    assert!(matches!(command_err, ShellError::SessionClosed(_)));
    assert!(matches!(start_err, ShellError::SessionClosed(_)));
    assert!(runtime.registry().live_sessions().is_empty());
}

#[test]
fn test_kill_from_another_thread_interrupts_a_running_command() {
    // --- Setup ---
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));
    shell.start().unwrap();
    let handle = shell.kill_handle().unwrap();

    // --- Execute ---
    let killer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        handle.kill();
    });
    let started = Instant::now();
    let err = shell.execute_simple_command("sleep 30").unwrap_err();
    killer.join().unwrap();

    // --- Assert ---
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(err.is_transport_failure(), "unexpected error: {}", err);
    assert!(shell.execute_simple_command("echo again").is_err());
}

// --- Commands ---

#[test]
fn test_checks_distinguish_false_from_malformed() {
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));

    assert!(shell.execute_and_check("test -d /").unwrap());
    assert!(!shell.execute_and_check("test -d /definitely/not/here").unwrap());
    let err = shell.execute_and_check("(exit 2)").unwrap_err();

    assert!(matches!(err, ShellError::MalformedCommand { exit_code: 2, .. }));
    // The session survives a malformed check.
    assert_eq!(shell.execute_simple_command("echo fine").unwrap(), "fine");
    shell.close();
}

#[test]
fn test_failed_command_reports_exit_code_and_stderr() {
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));

    let err = shell
        .execute_simple_command("echo oops >&2; exit_code=3; (exit $exit_code)")
        .unwrap_err();

    assert!(
        matches!(&err, ShellError::ProcessOutput { exit_code: 3, stderr, .. } if stderr.trim() == "oops"),
        "unexpected error: {}",
        err
    );
    assert_eq!(shell.state(), SessionState::Running);
    shell.close();
}

// --- File system ---

#[test]
fn test_stream_write_then_query() {
    // --- Setup ---
    let dir = tempfile::tempdir().unwrap();
    let root = FilePath::of(dir.path().to_string_lossy().into_owned());
    let file = root.join("payload.bin");
    let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));
    let mut fs = ConnectionFileSystem::new(&mut shell);

    // --- Execute ---
    let mut output = fs.open_output(&file, payload.len() as u64).unwrap();
    output.write_all(&payload).unwrap();
    output.finish().unwrap();

    // --- Assert ---
    assert!(fs.file_exists(&file).unwrap());
    assert_eq!(fs.get_file_size(&file).unwrap(), payload.len() as u64);
    assert_eq!(fs.read_all(&file).unwrap(), payload);
    assert_eq!(std::fs::read(dir.path().join("payload.bin")).unwrap(), payload);
    fs.close();
}

#[test]
fn test_directory_operations() {
    // --- Setup ---
    let dir = tempfile::tempdir().unwrap();
    let root = FilePath::of(dir.path().to_string_lossy().into_owned());
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));
    let mut fs = ConnectionFileSystem::new(&mut shell);

    // --- Execute ---
    fs.mkdirs(&root.join("a b").join("nested")).unwrap();
    fs.write_all(&root.join("it's.txt"), b"hello").unwrap();
    fs.copy(&root.join("it's.txt"), &root.join("copy.txt")).unwrap();
    fs.move_to(&root.join("copy.txt"), &root.join("a b").join("moved.txt")).unwrap();
    fs.touch(&root.join("empty")).unwrap();
    let mut entries = fs.list_files(&root).unwrap();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    // --- Assert ---
    let names: Vec<(&str, FileKind)> = entries.iter().map(|e| (e.name(), e.kind)).collect();
    assert_eq!(
        names,
        vec![
            ("a b", FileKind::Directory),
            ("empty", FileKind::File),
            ("it's.txt", FileKind::File),
        ]
    );
    assert!(fs.directory_exists(&root.join("a b").join("nested")).unwrap());
    assert!(!fs.file_exists(&root.join("copy.txt")).unwrap());
    assert_eq!(fs.read_to_string(&root.join("a b").join("moved.txt")).unwrap(), "hello");

    fs.delete(&root.join("a b")).unwrap();
    assert!(!fs.directory_exists(&root.join("a b")).unwrap());
    assert!(fs.list_roots().unwrap().contains(&FilePath::of("/")));
    fs.close();
}

#[test]
fn test_short_stream_write_fails_and_kills_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let file = FilePath::of(dir.path().join("short").to_string_lossy().into_owned());
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Sh));
    let mut fs = ConnectionFileSystem::new(&mut shell);

    let mut output = fs.open_output(&file, 10).unwrap();
    output.write_all(b"abc").unwrap();
    let err = output.finish().unwrap_err();

    assert!(matches!(err, ShellError::LengthMismatch { expected: 10, actual: 3 }));
    assert!(fs.file_exists(&file).is_err());
}

#[test]
fn test_restricted_shell_is_rejected_before_any_command() {
    let runtime = runtime();
    let mut shell = runtime.session(Some(ShellDialect::Restricted));

    let err = ConnectionFileSystem::new(&mut shell).open().unwrap_err();

    assert!(matches!(err, ShellError::NoInteraction(_)));
    assert_eq!(shell.dispatched_commands(), 0);
    assert_eq!(shell.state(), SessionState::Closed);
}

// --- Sub-shells ---

#[test]
fn test_inline_bash_sub_shell_shares_the_process() {
    // --- Setup ---
    let runtime = runtime();
    let mut parent = runtime.session(Some(ShellDialect::Sh));
    parent.start().unwrap();
    if !parent.is_application_in_path("bash").unwrap() {
        parent.close();
        return;
    }

    // --- Execute ---
    let mut child = parent.sub_shell(ShellDialect::Bash);
    child.start().unwrap();
    let version = child.execute_simple_command("echo \"$BASH_VERSION\"").unwrap();
    let quoted = child.execute_simple_command("printf '%s' \"it's\"").unwrap();

    // --- Assert ---
    assert!(!version.is_empty());
    assert_eq!(quoted, "it's");
    assert_eq!(child.transport_id(), parent.transport_id());
    assert!(!child.owns_transport());
    assert_eq!(parent.dialect(), ShellDialect::Sh);
    assert_eq!(parent.execute_simple_command("echo parent").unwrap(), "parent");
    assert!(matches!(
        child.cd(&FilePath::of("/")),
        Err(ShellError::Unsupported { .. })
    ));

    parent.close();
    assert_eq!(child.state(), SessionState::Closed);
    assert!(child.execute_simple_command("echo gone").is_err());
}

#[test]
fn test_sub_shell_of_closed_parent_fails() {
    let runtime = runtime();
    let mut parent = runtime.session(Some(ShellDialect::Sh));
    parent.start().unwrap();
    let mut child = parent.sub_shell(ShellDialect::Sh);
    parent.close();

    let err = child.start().unwrap_err();

    assert!(matches!(err, ShellError::ParentNotRunning(_)));
    assert_eq!(child.state(), SessionState::Failed);
}
