//! Palette commands and the parameters that bind them to a provider.
use std::fmt;

use config::UserCommand;
use serde::{Deserialize, Serialize};

/// Which provider executes a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Sandboxed arithmetic evaluation.
    Math,
    /// Pure string transforms.
    Text,
    /// Round-trip to the AI endpoint.
    Ai,
    /// Saved prompt or fixed snippet.
    UserDefined,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Math => "math",
            Self::Text => "text",
            Self::Ai => "ai",
            Self::UserDefined => "user",
        };
        f.write_str(s)
    }
}

/// Input a math command evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathSource {
    /// The captured selection.
    Selection,
    /// The text typed into the palette.
    Query,
}

/// Built-in text transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextTransform {
    /// Uppercase everything.
    Upper,
    /// Lowercase everything.
    Lower,
    /// Uppercase the first letter of every word.
    Title,
    /// Uppercase the first character of every line.
    Capitalize,
    /// Remove trailing whitespace from every line.
    Strip,
    /// Sort lines.
    SortAscending,
    /// Sort lines, descending.
    SortDescending,
    /// Reverse line order.
    Reverse,
    /// Drop blank lines.
    RemoveEmpty,
    /// Collapse runs of identical lines.
    RemoveDuplicates,
}

impl TextTransform {
    /// Every transform, in palette order.
    pub const ALL: [Self; 10] = [
        Self::Upper,
        Self::Lower,
        Self::Title,
        Self::Capitalize,
        Self::Strip,
        Self::SortAscending,
        Self::SortDescending,
        Self::Reverse,
        Self::RemoveEmpty,
        Self::RemoveDuplicates,
    ];

    /// Stable name used in command ids.
    pub fn name(self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Title => "title",
            Self::Capitalize => "capitalize",
            Self::Strip => "strip",
            Self::SortAscending => "sort_ascending",
            Self::SortDescending => "sort_descending",
            Self::Reverse => "reverse",
            Self::RemoveEmpty => "remove_empty",
            Self::RemoveDuplicates => "remove_duplicates",
        }
    }

    /// Human label shown in the palette.
    pub fn label(self) -> &'static str {
        match self {
            Self::Upper => "Uppercase",
            Self::Lower => "Lowercase",
            Self::Title => "Title Case",
            Self::Capitalize => "Capitalize lines",
            Self::Strip => "Strip trailing whitespace",
            Self::SortAscending => "Sort lines ascending",
            Self::SortDescending => "Sort lines descending",
            Self::Reverse => "Reverse lines",
            Self::RemoveEmpty => "Remove empty lines",
            Self::RemoveDuplicates => "Remove duplicate lines",
        }
    }
}

/// Provider-specific parameters of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parameters {
    /// Evaluate `source` as an arithmetic expression.
    Math {
        /// Which text is evaluated.
        source: MathSource,
    },
    /// Apply a text transform to the selection.
    Text {
        /// Transform to apply.
        transform: TextTransform,
    },
    /// Ask the AI endpoint. `prompt` is the task; when absent the palette
    /// query is used.
    Ai {
        /// Fixed task text.
        prompt: Option<String>,
    },
    /// A user-saved command.
    UserDefined {
        /// Saved prompt sent to the AI endpoint.
        query: Option<String>,
        /// Fixed answer returned verbatim.
        answer: Option<String>,
    },
}

impl Parameters {
    /// Provider that handles these parameters.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Math { .. } => ProviderKind::Math,
            Self::Text { .. } => ProviderKind::Text,
            Self::Ai { .. } => ProviderKind::Ai,
            Self::UserDefined { .. } => ProviderKind::UserDefined,
        }
    }
}

/// An immutable palette command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Unique id, e.g. `text:upper`.
    pub id: String,
    /// Palette label.
    pub label: String,
    /// Provider binding.
    pub parameters: Parameters,
    /// Built-ins do not count against the user command limit.
    pub builtin: bool,
}

impl Command {
    /// Create a user command.
    pub fn new(id: impl Into<String>, label: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            parameters,
            builtin: false,
        }
    }

    /// Mark this command as built in.
    fn into_builtin(mut self) -> Self {
        self.builtin = true;
        self
    }

    /// Provider that executes this command.
    pub fn provider_kind(&self) -> ProviderKind {
        self.parameters.kind()
    }
}

impl From<&UserCommand> for Command {
    fn from(u: &UserCommand) -> Self {
        Self::new(
            u.id.clone(),
            u.label.clone(),
            Parameters::UserDefined {
                query: u.query.clone(),
                answer: u.answer.clone(),
            },
        )
    }
}

/// Built-in command catalog, in insertion order.
pub fn builtin_commands() -> Vec<Command> {
    let mut out = vec![
        Command::new(
            "math:evaluate",
            "Evaluate selection",
            Parameters::Math {
                source: MathSource::Selection,
            },
        )
        .into_builtin(),
        Command::new(
            "math:query",
            "Calculate",
            Parameters::Math {
                source: MathSource::Query,
            },
        )
        .into_builtin(),
    ];
    out.extend(TextTransform::ALL.into_iter().map(|t| {
        Command::new(
            format!("text:{}", t.name()),
            t.label(),
            Parameters::Text { transform: t },
        )
        .into_builtin()
    }));
    out.push(Command::new("ai:ask", "Ask AI", Parameters::Ai { prompt: None }).into_builtin());
    out
}
