// tests/dialect_quoting.rs

use shellctl::{DialectFamily, ShellDialect, ShellError};

const SAMPLES: &[&str] = &[
    "plain",
    "",
    "two words",
    "it's",
    "\"double\"",
    "back\\slash",
    "$HOME and $(id)",
    "%PATH%",
    "semi;colon & pipe | redirect > here",
    "tab\there",
    "new\nline",
    "-starts-with-dash",
    "ünïcödé ✓",
    "`backtick`",
];

fn interactive_dialects() -> impl Iterator<Item = ShellDialect> {
    ShellDialect::ALL
        .into_iter()
        .filter(|d| d.family() != DialectFamily::Restricted)
}

#[test]
fn test_quoted_arguments_split_back_unchanged() {
    for dialect in interactive_dialects() {
        for sample in SAMPLES {
            // --- Execute ---
            let quoted = dialect.quote_argument(sample).unwrap();
            let line = format!("first {} last", quoted);
            let words = dialect.split_arguments(&line).unwrap();

            // --- Assert ---
            assert_eq!(
                words,
                vec!["first", *sample, "last"],
                "{} did not round-trip {:?} (quoted as {})",
                dialect,
                sample,
                quoted
            );
        }
    }
}

#[test]
fn test_file_operations_render_for_every_interactive_dialect() {
    let path = shellctl::FilePath::of("/tmp/with space/it's.txt");
    for dialect in interactive_dialects() {
        assert!(dialect.file_exists_command(&path).is_ok(), "{}", dialect);
        assert!(dialect.delete_file_or_directory(&path).is_ok(), "{}", dialect);
        assert!(dialect.mkdirs_command(&path).is_ok(), "{}", dialect);
        assert!(dialect.list_files(&path).is_ok(), "{}", dialect);
        assert!(dialect.query_file_size(&path).is_ok(), "{}", dialect);
        assert!(dialect.file_read_command(&path).is_ok(), "{}", dialect);
    }
}

#[test]
fn test_nul_is_rejected_everywhere() {
    for dialect in interactive_dialects() {
        let err = dialect.quote_argument("a\0b").unwrap_err();
        assert!(matches!(err, ShellError::InvalidArgument(_)), "{}", dialect);
    }
}

#[test]
fn test_restricted_dialect_refuses_everything() {
    let dialect = ShellDialect::Restricted;
    let path = shellctl::FilePath::of("/etc/hosts");

    assert!(dialect.quote_argument("x").unwrap_err().is_expected());
    assert!(dialect.file_exists_command(&path).is_err());
    assert!(dialect.dumb_mode().throw_if_unsupported().is_err());
}
