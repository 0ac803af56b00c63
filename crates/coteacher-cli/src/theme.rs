use ratatui::style::Color;

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    pub bg: Color,
    pub fg: Color,
    pub accent: Color,
    pub muted: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub user_color: Color,
    pub assistant_color: Color,
    pub system_color: Color,
    pub border: Color,
}

impl Theme {
    /// Charcoal with soft blue highlights.
    pub fn classroom() -> Self {
        Self {
            name: "classroom",
            bg: Color::Rgb(30, 30, 30),
            fg: Color::Rgb(224, 224, 224),
            accent: Color::Rgb(138, 180, 248),
            muted: Color::Rgb(110, 110, 110),
            success: Color::Rgb(158, 206, 106),
            error: Color::Rgb(247, 118, 142),
            warning: Color::Rgb(224, 175, 104),
            user_color: Color::Rgb(93, 139, 189),
            assistant_color: Color::Rgb(138, 180, 248),
            system_color: Color::Rgb(224, 175, 104),
            border: Color::Rgb(58, 80, 107),
        }
    }

    pub fn chalkboard() -> Self {
        Self {
            name: "chalkboard",
            bg: Color::Rgb(38, 70, 83),
            fg: Color::Rgb(240, 240, 230),
            accent: Color::Rgb(233, 196, 106),
            muted: Color::Rgb(120, 150, 150),
            success: Color::Rgb(138, 201, 38),
            error: Color::Rgb(231, 111, 81),
            warning: Color::Rgb(244, 162, 97),
            user_color: Color::Rgb(233, 196, 106),
            assistant_color: Color::Rgb(240, 240, 230),
            system_color: Color::Rgb(244, 162, 97),
            border: Color::Rgb(42, 157, 143),
        }
    }

    /// Plain ANSI colors for terminals without true color.
    pub fn basic() -> Self {
        Self {
            name: "basic",
            bg: Color::Reset,
            fg: Color::Reset,
            accent: Color::Blue,
            muted: Color::DarkGray,
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            user_color: Color::Cyan,
            assistant_color: Color::Green,
            system_color: Color::Yellow,
            border: Color::DarkGray,
        }
    }

    pub fn by_name(name: &str) -> Self {
        match name {
            "chalkboard" => Self::chalkboard(),
            "basic" => Self::basic(),
            _ => Self::classroom(),
        }
    }

    pub fn all_names() -> &'static [&'static str] {
        &["classroom", "chalkboard", "basic"]
    }
}
