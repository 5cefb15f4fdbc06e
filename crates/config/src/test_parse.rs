#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use crate::*; // bring Config and helpers into scope

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = load_from_str("()").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.paste_keybinding, "shift+Insert");
        assert_eq!(cfg.paste_delay().as_millis(), 300);
        assert_eq!(cfg.hotkey.modifiers, vec!["KEY_LEFTMETA", "KEY_RIGHTMETA"]);
        assert_eq!(cfg.hotkey.trigger, "KEY_SPACE");
        assert_eq!(cfg.max_user_commands, 100);
    }

    #[test]
    fn plain_values_fill_optional_keys() {
        let ron = r#"(
            paste_keybinding: "ctrl+v",
            paste_delay: 0.5,
            hotkey_device: "/dev/input/event3",
            hotkey_trigger: "KEY_P",
            ai_endpoint: direct,
            ai_user_context: {"Name": "Ada"},
            commands: [
                (id: "sig", label: "Signature", answer: "-- Ada"),
                (id: "formal", label: "Make formal", query: "Rewrite formally"),
            ],
        )"#;
        let cfg = load_from_str(ron).unwrap();
        assert_eq!(cfg.paste_keybinding, "ctrl+v");
        assert_eq!(cfg.paste_delay().as_millis(), 500);
        assert_eq!(
            cfg.hotkey.device,
            Some(PathBuf::from("/dev/input/event3"))
        );
        assert_eq!(cfg.hotkey.trigger, "KEY_P");
        assert_eq!(cfg.ai.endpoint, AiEndpoint::Direct);
        assert_eq!(cfg.ai.user_context.get("Name").map(String::as_str), Some("Ada"));
        assert_eq!(cfg.commands.len(), 2);
        assert_eq!(cfg.commands[0].answer.as_deref(), Some("-- Ada"));
        assert_eq!(cfg.commands[1].query.as_deref(), Some("Rewrite formally"));
    }

    #[test]
    fn unknown_keys_are_parse_errors_with_location() {
        let ron = "(\n  paste_delay: 0.3,\n  colour: \"red\",\n)";
        match load_from_str(ron) {
            Err(Error::Parse { line, excerpt, .. }) => {
                assert_eq!(line, 3);
                assert!(excerpt.contains("colour"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn negative_delay_is_rejected() {
        match load_from_str("(paste_delay: -1.0)") {
            Err(Error::Validation { key, .. }) => assert_eq!(key, "paste_delay"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn durations_beyond_range_are_rejected() {
        for (doc, expected) in [
            ("(task_timeout: 1e20)", "task_timeout"),
            ("(paste_delay: 1e300)", "paste_delay"),
            ("(hotkey_poll_interval: 1e30)", "hotkey_poll_interval"),
        ] {
            match load_from_str(doc) {
                Err(Error::Validation { key, .. }) => assert_eq!(key, expected),
                other => panic!("expected validation error for {doc}, got {other:?}"),
            }
        }
    }

    #[test]
    fn out_of_range_durations_saturate() {
        let cfg = Config {
            task_timeout: 1e20,
            paste_delay: f64::NAN,
            ..Config::default()
        };
        assert_eq!(cfg.task_timeout(), Duration::MAX);
        assert_eq!(cfg.paste_delay(), Duration::ZERO);
    }

    #[test]
    fn duplicate_command_ids_are_rejected() {
        let ron = r#"(commands: [
            (id: "a", label: "A", answer: "x"),
            (id: "a", label: "B", answer: "y"),
        ])"#;
        let err = load_from_str(ron).unwrap_err();
        assert!(err.to_string().contains("duplicate command id 'a'"));
    }

    #[test]
    fn command_without_query_or_answer_is_rejected() {
        let err = load_from_str(r#"(commands: [(id: "a", label: "A")])"#).unwrap_err();
        assert!(err.to_string().contains("needs a query or an answer"));
    }

    #[test]
    fn missing_explicit_path_is_a_read_error() {
        let missing = PathBuf::from("/nonexistent/pastel/config.ron");
        let err = resolve_config_path(Some(&missing)).unwrap_err();
        assert_eq!(err.path(), Some(missing.as_path()));
        assert!(err.pretty().starts_with("Read error at"));
    }
}
