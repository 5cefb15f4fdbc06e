#[cfg(test)]
mod tests {
    use ron::{Options, extensions::Extensions};

    use crate::{AiEndpoint, Config, RawConfig};

    fn raw(src: &str) -> RawConfig {
        Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .from_str(src)
            .unwrap()
    }

    #[test]
    fn overlay_keeps_fields_not_overridden() {
        let mut base = Config::default();
        base.ai.model = "llama3".into();
        base.max_user_commands = 5;

        let merged = raw("(ai_base_url: \"http://127.0.0.1:9000\", task_timeout: 5.0)")
            .apply_over(&base);

        assert_eq!(merged.ai.base_url, "http://127.0.0.1:9000");
        assert_eq!(merged.task_timeout, 5.0);
        // Fields not overridden remain from base
        assert_eq!(merged.ai.model, "llama3");
        assert_eq!(merged.max_user_commands, 5);
        assert_eq!(merged.ai.endpoint, AiEndpoint::Ollama);
    }

    #[test]
    fn overlay_replaces_lists_wholesale() {
        let merged = raw("(hotkey_modifiers: [\"KEY_LEFTCTRL\"])").into_config();
        assert_eq!(merged.hotkey.modifiers, vec!["KEY_LEFTCTRL"]);
    }
}
