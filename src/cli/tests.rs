use super::*;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    pub(super) fn assert_optional_flag_value(
        actual: Option<&str>,
        expected: Option<&str>,
        flag_name: &str,
        argv: &[&str],
    ) {
        assert_eq!(
            actual, expected,
            "unexpected value for {flag_name} when parsing argv={argv:?}"
        );
    }
}

use test_helpers::{assert_optional_flag_value, parse_args};

#[test]
fn test_model_flag_parsing() {
    let cases: [(&[&str], Option<&str>); 5] = [
        (&["cliai", "-m", "gemini-pro"], Some("gemini-pro")),
        (&["cliai", "chat", "--model", "gpt-4o-2024-08-06"], Some("gpt-4o-2024-08-06")),
        (&["cliai", "chat", "-m"], Some("")),
        (
            &["cliai", "-m", "claude-3-5-sonnet-20241022", "chat"],
            Some("claude-3-5-sonnet-20241022"),
        ),
        (&["cliai"], None),
    ];

    for (argv, expected_model) in cases {
        let args = parse_args(argv);
        assert_optional_flag_value(args.model.as_deref(), expected_model, "model", argv);
    }
}

#[test]
fn test_system_flag_parsing() {
    let cases: [(&[&str], Option<&str>); 3] = [
        (&["cliai", "chat", "-s", "Be terse."], Some("Be terse.")),
        (&["cliai", "--system", "Answer in French."], Some("Answer in French.")),
        (&["cliai", "chat"], None),
    ];

    for (argv, expected_system) in cases {
        let args = parse_args(argv);
        assert_optional_flag_value(args.system.as_deref(), expected_system, "system", argv);
    }
}

#[test]
fn test_continue_flag_defaults_to_new_conversation() {
    assert!(!parse_args(&["cliai", "chat"]).continue_conversation);
    assert!(parse_args(&["cliai", "chat", "-c"]).continue_conversation);
    assert!(parse_args(&["cliai", "--continue"]).continue_conversation);
}

#[test]
fn test_subcommand_parsing() {
    assert_eq!(parse_args(&["cliai"]).command, None);
    assert_eq!(parse_args(&["cliai", "chat"]).command, Some(Commands::Chat));
    assert_eq!(parse_args(&["cliai", "models"]).command, Some(Commands::Models));
    assert!(Args::try_parse_from(["cliai", "auth"]).is_err());
}

#[test]
fn test_log_flag_parsing() {
    let args = parse_args(&["cliai", "chat", "--log", "/tmp/cliai.log", "-m", "gemini-pro"]);
    assert_eq!(args.log.as_deref(), Some(std::path::Path::new("/tmp/cliai.log")));
    assert_eq!(args.model.as_deref(), Some("gemini-pro"));
}

#[test]
fn test_combined_chat_flags() {
    let args = parse_args(&[
        "cliai",
        "chat",
        "-m",
        "claude-3-7-sonnet-20250219",
        "-s",
        "You are a pirate.",
        "-c",
    ]);
    assert_eq!(args.command, Some(Commands::Chat));
    assert_eq!(args.model.as_deref(), Some("claude-3-7-sonnet-20250219"));
    assert_eq!(args.system.as_deref(), Some("You are a pirate."));
    assert!(args.continue_conversation);
}
