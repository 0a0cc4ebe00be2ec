//! Style roles for terminal output
//!
//! Each logical role maps to an optional `colored::Color`; colouring is only
//! applied when the caller says it is enabled, so there is no global state
//! beyond what `colored` itself keeps.
//!
//! ```
//! use arcai_scan::core::styles::StyleRole;
//! assert_eq!(StyleRole::Header.paint("Scanners", false), "Scanners");
//! assert!(StyleRole::Header.paint("Scanners", true).starts_with("\x1b["));
//! ```

use clap::builder::styling::AnsiColor;
use colored::Color;

macro_rules! style {
    ( $( $variant:ident => $color:expr ),+ $(,)? ) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum StyleRole { $( $variant ),+ }

        impl StyleRole {
            pub fn color(self) -> Option<Color> {
                match self { $( StyleRole::$variant => $color ),+ }
            }
        }
    }
}

style! {
    Header  => Some(Color::Yellow),
    Literal => Some(Color::Cyan),
    Id      => Some(Color::BrightGreen),
    Value   => None,
    Success => Some(Color::Green),
    Failure => Some(Color::BrightRed),
    Dim     => Some(Color::BrightBlack),
}

impl StyleRole {
    fn ansi_code(self) -> Option<&'static str> {
        Some(match self.color()? {
            Color::Black => "30",
            Color::Red => "31",
            Color::Green => "32",
            Color::Yellow => "33",
            Color::Blue => "34",
            Color::Magenta => "35",
            Color::Cyan => "36",
            Color::White => "37",
            Color::BrightBlack => "90",
            Color::BrightRed => "91",
            Color::BrightGreen => "92",
            Color::BrightYellow => "93",
            Color::BrightBlue => "94",
            Color::BrightMagenta => "95",
            Color::BrightCyan => "96",
            Color::BrightWhite => "97",
            _ => return None,
        })
    }

    pub fn paint(self, text: &str, enabled: bool) -> String {
        match self.ansi_code() {
            Some(code) if enabled => format!("\x1b[{}m{}\x1b[0m", code, text),
            _ => text.to_string(),
        }
    }

    /// prettytable cell style, e.g. `Fy` for a yellow foreground
    pub fn to_prettytable_spec(self) -> Option<&'static str> {
        Some(match self.color()? {
            Color::Red => "Fr",
            Color::Green => "Fg",
            Color::Yellow => "Fy",
            Color::Blue => "Fb",
            Color::Magenta => "Fm",
            Color::Cyan => "Fc",
            Color::White => "Fw",
            Color::BrightBlack => "FK",
            Color::BrightRed => "FR",
            Color::BrightGreen => "FG",
            Color::BrightYellow => "FY",
            Color::BrightBlue => "FB",
            Color::BrightCyan => "FC",
            _ => return None,
        })
    }

    fn clap_color(self) -> Option<AnsiColor> {
        Some(match self.color()? {
            Color::Yellow => AnsiColor::Yellow,
            Color::Cyan => AnsiColor::Cyan,
            Color::Green => AnsiColor::Green,
            Color::BrightGreen => AnsiColor::BrightGreen,
            Color::BrightRed => AnsiColor::BrightRed,
            Color::BrightBlack => AnsiColor::BrightBlack,
            _ => return None,
        })
    }
}

/// clap help styles built from the same roles
pub fn palette_to_clap(enabled: bool) -> clap::builder::Styles {
    use clap::builder::styling::{Color as ClapColor, Style};
    if !enabled {
        return clap::builder::Styles::plain();
    }

    let style = |role: StyleRole, bold: bool| {
        let mut style = Style::new();
        if let Some(color) = role.clap_color() {
            style = style.fg_color(Some(ClapColor::Ansi(color)));
        }
        if bold {
            style = style.bold();
        }
        style
    };

    clap::builder::Styles::styled()
        .header(style(StyleRole::Header, true))
        .usage(style(StyleRole::Header, true))
        .literal(style(StyleRole::Literal, false))
        .placeholder(style(StyleRole::Id, false))
        .valid(style(StyleRole::Success, false))
        .invalid(style(StyleRole::Failure, false))
        .error(style(StyleRole::Failure, true))
}
