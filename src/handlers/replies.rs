//! Quick-reply sets. Payloads are the canonical command texts, so a tap
//! normalizes to the same input as typing the command.

use crate::messenger::QuickReply;

pub const BACK: &str = "BACK";
pub const VIEW_MORE: &str = "VIEW MORE";
pub const PAYMENT_LOGS: &str = "PAYMENT LOGS";
pub const PROCEED: &str = "PROCEED";
pub const VIEW_TICKETS: &str = "VIEW TICKETS";

/// Registration standing of a messenger user, derived from stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Unregistered,
    Registered,
    LinkedPrimary,
    Deactivated,
}

pub fn for_status(status: UserStatus) -> Vec<QuickReply> {
    match status {
        UserStatus::Registered => vec![
            QuickReply::new("View Profile", "VIEW PROFILE"),
            QuickReply::new("My SA-ID", "MY SA-ID"),
            QuickReply::new("About Us", "ABOUT US"),
            QuickReply::new("Talk to Human", "TALK TO HUMAN"),
        ],
        UserStatus::LinkedPrimary => vec![
            QuickReply::new("Menu", "MENU"),
            QuickReply::new("View Profile", "VIEW PROFILE"),
            QuickReply::new("Switch Profile", "SWITCH PROFILE"),
            QuickReply::new("My SA-ID", "MY SA-ID"),
        ],
        UserStatus::Unregistered | UserStatus::Deactivated => vec![
            QuickReply::new("Register", "REGISTER"),
            QuickReply::new("About Us", "ABOUT US"),
            QuickReply::new("Talk to Human", "TALK TO HUMAN"),
        ],
    }
}

pub fn main_menu() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Switch Profile", "SWITCH PROFILE"),
        QuickReply::new("My SA-ID", "MY SA-ID"),
        QuickReply::new("Talk to Human", "TALK TO HUMAN"),
    ]
}

pub fn profile_confirmation() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Continue", "CONTINUE"),
        QuickReply::new("No", "NO"),
    ]
}

pub fn profile_management() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Continue", "CONTINUE"),
        QuickReply::new("Switch Profile", "SWITCH PROFILE"),
    ]
}

pub fn back() -> Vec<QuickReply> {
    vec![QuickReply::new("Back", BACK)]
}

pub fn payments() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Back", BACK),
        QuickReply::new("Payment Logs", PAYMENT_LOGS),
    ]
}

pub fn view_more() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Back", BACK),
        QuickReply::new("View More", VIEW_MORE),
    ]
}

pub fn confirm_switch() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Back", BACK),
        QuickReply::new("Proceed", PROCEED),
    ]
}

pub fn ask_support() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Back", BACK),
        QuickReply::new("View Tickets", VIEW_TICKETS),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{GlobalCommand, Input};

    #[test]
    fn status_payloads_are_global_commands() {
        for status in [
            UserStatus::Unregistered,
            UserStatus::Registered,
            UserStatus::LinkedPrimary,
        ] {
            for reply in for_status(status) {
                let input = Input::new(&reply.payload);
                assert!(
                    GlobalCommand::parse(&input.normalized).is_some(),
                    "payload {} is not a command",
                    reply.payload
                );
            }
        }
    }

    #[test]
    fn deactivated_users_get_the_unregistered_set() {
        assert_eq!(
            for_status(UserStatus::Deactivated),
            for_status(UserStatus::Unregistered)
        );
    }
}
