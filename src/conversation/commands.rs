//! State-independent commands recognized in any conversation state.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalCommand {
    Register,
    Menu,
    MySaId,
    ViewProfile,
    SwitchProfile,
    Continue,
    No,
    AboutUs,
    TalkToHuman,
}

impl GlobalCommand {
    pub const ALL: [GlobalCommand; 9] = [
        GlobalCommand::Register,
        GlobalCommand::Menu,
        GlobalCommand::MySaId,
        GlobalCommand::ViewProfile,
        GlobalCommand::SwitchProfile,
        GlobalCommand::Continue,
        GlobalCommand::No,
        GlobalCommand::AboutUs,
        GlobalCommand::TalkToHuman,
    ];

    /// Match normalized (trimmed, uppercased) input exactly.
    pub fn parse(normalized: &str) -> Option<Self> {
        match normalized {
            "REGISTER" => Some(Self::Register),
            "MENU" | "MAIN MENU" => Some(Self::Menu),
            "MY SA-ID" => Some(Self::MySaId),
            "VIEW PROFILE" => Some(Self::ViewProfile),
            "SWITCH PROFILE" => Some(Self::SwitchProfile),
            "CONTINUE" => Some(Self::Continue),
            "NO" => Some(Self::No),
            "ABOUT US" => Some(Self::AboutUs),
            "TALK TO HUMAN" => Some(Self::TalkToHuman),
            _ => None,
        }
    }

    /// Canonical text, also used as quick-reply payload.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "REGISTER",
            Self::Menu => "MENU",
            Self::MySaId => "MY SA-ID",
            Self::ViewProfile => "VIEW PROFILE",
            Self::SwitchProfile => "SWITCH PROFILE",
            Self::Continue => "CONTINUE",
            Self::No => "NO",
            Self::AboutUs => "ABOUT US",
            Self::TalkToHuman => "TALK TO HUMAN",
        }
    }
}

impl fmt::Display for GlobalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_text_parses_back() {
        for command in GlobalCommand::ALL {
            assert_eq!(GlobalCommand::parse(command.as_str()), Some(command));
        }
    }

    #[test]
    fn main_menu_is_an_alias() {
        assert_eq!(GlobalCommand::parse("MAIN MENU"), Some(GlobalCommand::Menu));
    }

    #[test]
    fn matching_is_exact_on_normalized_text() {
        assert_eq!(GlobalCommand::parse("menu"), None);
        assert_eq!(GlobalCommand::parse("MENU PLEASE"), None);
        assert_eq!(GlobalCommand::parse("BACK"), None);
        assert_eq!(GlobalCommand::parse("1"), None);
    }
}
