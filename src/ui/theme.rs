// ANSI palettes for the transcript. Each role maps to one escape sequence; `mono` leaves every
// role empty so no escape bytes are ever written.
//
// Keep the role list small. Add a role here instead of hard-coding escapes in the renderer.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Theme {
    pub name: &'static str,
    pub description: &'static str,
    pub user: &'static str,
    pub assistant: &'static str,
    pub system: &'static str,
    pub tool_name: &'static str,
    pub tool_param: &'static str,
    pub tool_output: &'static str,
    pub error: &'static str,
    pub metadata: &'static str,
    pub timestamp: &'static str,
    pub separator: &'static str,
    pub dim: &'static str,
    pub bold: &'static str,
    pub reset: &'static str,
}

pub const DEFAULT_THEME: &str = "dark";

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

pub const DARK: Theme = Theme {
    name: "dark",
    description: "Bright colors for dark terminal backgrounds",
    user: "\x1b[36m",
    assistant: "\x1b[32m",
    system: "\x1b[33m",
    tool_name: "\x1b[35m",
    tool_param: "\x1b[94m",
    tool_output: "\x1b[92m",
    error: "\x1b[31m",
    metadata: "\x1b[90m",
    timestamp: "\x1b[90m",
    separator: "\x1b[90m",
    dim: DIM,
    bold: BOLD,
    reset: RESET,
};

pub const LIGHT: Theme = Theme {
    name: "light",
    description: "Darker colors for light terminal backgrounds",
    user: "\x1b[34m",
    assistant: "\x1b[32m",
    system: "\x1b[33m",
    tool_name: "\x1b[35m",
    tool_param: "\x1b[34m",
    tool_output: "\x1b[32m",
    error: "\x1b[31m",
    metadata: "\x1b[90m",
    timestamp: "\x1b[90m",
    separator: "\x1b[37m",
    dim: DIM,
    bold: BOLD,
    reset: RESET,
};

pub const SOLARIZED_DARK: Theme = Theme {
    name: "solarized-dark",
    description: "Solarized palette tuned for dark backgrounds",
    user: "\x1b[38;5;37m",
    assistant: "\x1b[38;5;64m",
    system: "\x1b[38;5;136m",
    tool_name: "\x1b[38;5;125m",
    tool_param: "\x1b[38;5;33m",
    tool_output: "\x1b[38;5;64m",
    error: "\x1b[38;5;160m",
    metadata: "\x1b[38;5;240m",
    timestamp: "\x1b[38;5;244m",
    separator: "\x1b[38;5;240m",
    dim: DIM,
    bold: BOLD,
    reset: RESET,
};

pub const SOLARIZED_LIGHT: Theme = Theme {
    name: "solarized-light",
    description: "Solarized palette tuned for light backgrounds",
    user: "\x1b[38;5;33m",
    assistant: "\x1b[38;5;64m",
    system: "\x1b[38;5;166m",
    tool_name: "\x1b[38;5;125m",
    tool_param: "\x1b[38;5;61m",
    tool_output: "\x1b[38;5;64m",
    error: "\x1b[38;5;160m",
    metadata: "\x1b[38;5;245m",
    timestamp: "\x1b[38;5;245m",
    separator: "\x1b[38;5;250m",
    dim: DIM,
    bold: BOLD,
    reset: RESET,
};

pub const DRACULA: Theme = Theme {
    name: "dracula",
    description: "Dracula palette (purple, pink, green)",
    user: "\x1b[38;5;117m",
    assistant: "\x1b[38;5;84m",
    system: "\x1b[38;5;228m",
    tool_name: "\x1b[38;5;212m",
    tool_param: "\x1b[38;5;141m",
    tool_output: "\x1b[38;5;84m",
    error: "\x1b[38;5;203m",
    metadata: "\x1b[38;5;61m",
    timestamp: "\x1b[38;5;61m",
    separator: "\x1b[38;5;61m",
    dim: DIM,
    bold: BOLD,
    reset: RESET,
};

pub const NORD: Theme = Theme {
    name: "nord",
    description: "Nord palette (arctic blues)",
    user: "\x1b[38;5;110m",
    assistant: "\x1b[38;5;108m",
    system: "\x1b[38;5;222m",
    tool_name: "\x1b[38;5;139m",
    tool_param: "\x1b[38;5;67m",
    tool_output: "\x1b[38;5;108m",
    error: "\x1b[38;5;167m",
    metadata: "\x1b[38;5;60m",
    timestamp: "\x1b[38;5;60m",
    separator: "\x1b[38;5;60m",
    dim: DIM,
    bold: BOLD,
    reset: RESET,
};

pub const MONO: Theme = Theme {
    name: "mono",
    description: "No colors",
    user: "",
    assistant: "",
    system: "",
    tool_name: "",
    tool_param: "",
    tool_output: "",
    error: "",
    metadata: "",
    timestamp: "",
    separator: "",
    dim: "",
    bold: "",
    reset: "",
};

pub const HIGH_CONTRAST: Theme = Theme {
    name: "high-contrast",
    description: "Bold primary colors for maximum legibility",
    user: "\x1b[1;96m",
    assistant: "\x1b[1;92m",
    system: "\x1b[1;93m",
    tool_name: "\x1b[1;95m",
    tool_param: "\x1b[1;97m",
    tool_output: "\x1b[1;92m",
    error: "\x1b[1;91m",
    metadata: "\x1b[37m",
    timestamp: "\x1b[97m",
    separator: "\x1b[97m",
    dim: "",
    bold: BOLD,
    reset: RESET,
};

pub const THEMES: [Theme; 8] = [
    DARK,
    LIGHT,
    SOLARIZED_DARK,
    SOLARIZED_LIGHT,
    DRACULA,
    NORD,
    MONO,
    HIGH_CONTRAST,
];

impl Default for Theme {
    fn default() -> Self {
        DARK
    }
}

impl Theme {
    pub fn by_name(name: &str) -> Option<Theme> {
        THEMES.into_iter().find(|theme| theme.name == name)
    }

    /// Wrap `text` in `code` and a reset. Empty codes add nothing.
    pub fn paint(&self, code: &str, text: &str) -> String {
        if code.is_empty() {
            return text.to_string();
        }
        format!("{code}{text}{}", self.reset)
    }
}
