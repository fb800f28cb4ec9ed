//! Account-opening dialog.
//!
//! The flow is a small finite-state machine. [`DialogController::advance`] is
//! a pure function of `(state, slots, input)`; the caller owns the session and
//! writes the returned state and slots back.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use super::intent::IntentDetector;

pub const WELCOME_MESSAGE: &str =
    "Welcome! I can help you with general banking questions or guide you through opening an account.";
pub const START_PROMPT: &str = "Great! To get started, what is your full name?";
pub const RESTART_PROMPT: &str = "No problem. Let's start over. What is your full name?";
pub const SUBMITTED_MESSAGE: &str = "Thank you! Your account opening request has been submitted. A representative will be in touch shortly.";
pub const CLOSING_MESSAGE: &str =
    "Your request has been submitted. Feel free to ask any other questions!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogState {
    #[default]
    Idle,
    AskName,
    AskEmail,
    AskAccountType,
    Confirmation,
    Completed,
}

impl DialogState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogState::Idle => "IDLE",
            DialogState::AskName => "ASK_NAME",
            DialogState::AskEmail => "ASK_EMAIL",
            DialogState::AskAccountType => "ASK_ACCOUNT_TYPE",
            DialogState::Confirmation => "CONFIRMATION",
            DialogState::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Name,
    Email,
    AccountType,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Name => "name",
            Slot::Email => "email",
            Slot::AccountType => "account_type",
        }
    }
}

/// Collected field values, kept in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots(Vec<(Slot, String)>);

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.0
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite in place if already collected, otherwise append.
    pub fn set(&mut self, slot: Slot, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(s, _)| *s == slot) {
            Some(entry) => entry.1 = value,
            None => self.0.push((slot, value)),
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &str)> {
        self.0.iter().map(|(s, v)| (*s, v.as_str()))
    }

    fn value_or_blank(&self, slot: Slot) -> &str {
        self.get(slot).unwrap_or("")
    }
}

impl Serialize for Slots {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (slot, value) in &self.0 {
            map.serialize_entry(slot.as_str(), value)?;
        }
        map.end()
    }
}

/// Result of one dialog step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: DialogState,
    pub slots: Slots,
    pub reply: String,
}

pub struct DialogController;

impl DialogController {
    /// Enter the flow from IDLE. Leftovers from an earlier flow are dropped.
    pub fn start() -> Transition {
        Transition {
            state: DialogState::AskName,
            slots: Slots::new(),
            reply: START_PROMPT.to_string(),
        }
    }

    /// Apply one user message to the flow.
    ///
    /// Returns `None` only for IDLE input that is not an open-account request;
    /// such messages belong to the query path. Every other state consumes the
    /// message.
    pub fn advance(state: DialogState, slots: &Slots, input: &str) -> Option<Transition> {
        let value = input.trim();
        let mut slots = slots.clone();

        let (state, reply) = match state {
            DialogState::Idle => {
                if !IntentDetector::is_open_account(input) {
                    return None;
                }
                return Some(Self::start());
            }
            DialogState::AskName => {
                slots.set(Slot::Name, value);
                (
                    DialogState::AskEmail,
                    format!("Thank you, {}. What is your email address?", value),
                )
            }
            DialogState::AskEmail => {
                slots.set(Slot::Email, value);
                (
                    DialogState::AskAccountType,
                    format!(
                        "Got it, we'll reach you at {}. What type of account would you like to open? (e.g., Checking, Savings)",
                        value
                    ),
                )
            }
            DialogState::AskAccountType => {
                slots.set(Slot::AccountType, value);
                (DialogState::Confirmation, Self::confirmation_text(&slots))
            }
            DialogState::Confirmation => {
                if IntentDetector::is_affirmative(input) {
                    (DialogState::Completed, SUBMITTED_MESSAGE.to_string())
                } else {
                    // Collected values survive the restart and get overwritten
                    // as the user answers again.
                    (DialogState::AskName, RESTART_PROMPT.to_string())
                }
            }
            DialogState::Completed => {
                slots.clear();
                (DialogState::Idle, CLOSING_MESSAGE.to_string())
            }
        };

        Some(Transition {
            state,
            slots,
            reply,
        })
    }

    fn confirmation_text(slots: &Slots) -> String {
        format!(
            "Please confirm your details:\nName: {}\nEmail: {}\nAccount Type: {}\nIs this correct? (yes/no)",
            slots.value_or_blank(Slot::Name),
            slots.value_or_blank(Slot::Email),
            slots.value_or_blank(Slot::AccountType),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(state: DialogState, slots: &Slots, input: &str) -> Transition {
        DialogController::advance(state, slots, input).expect("input should be consumed")
    }

    #[test]
    fn test_full_flow_echoes_submitted_values() {
        let t = step(DialogState::Idle, &Slots::new(), "I want to open an account");
        assert_eq!(t.state, DialogState::AskName);
        assert_eq!(t.reply, START_PROMPT);

        let t = step(t.state, &t.slots, "Alice");
        assert_eq!(t.state, DialogState::AskEmail);
        assert!(t.reply.contains("Alice"));

        let t = step(t.state, &t.slots, "a@b.com");
        assert_eq!(t.state, DialogState::AskAccountType);
        assert!(t.reply.contains("a@b.com"));

        let t = step(t.state, &t.slots, "Savings");
        assert_eq!(t.state, DialogState::Confirmation);
        assert!(t.reply.contains("Name: Alice"));
        assert!(t.reply.contains("Email: a@b.com"));
        assert!(t.reply.contains("Account Type: Savings"));

        let t = step(t.state, &t.slots, "yes");
        assert_eq!(t.state, DialogState::Completed);
        assert_eq!(t.reply, SUBMITTED_MESSAGE);
        assert_eq!(t.slots.len(), 3);

        let t = step(t.state, &t.slots, "thanks!");
        assert_eq!(t.state, DialogState::Idle);
        assert_eq!(t.reply, CLOSING_MESSAGE);
        assert!(t.slots.is_empty());
    }

    #[test]
    fn test_slots_keep_collection_order() {
        let mut slots = Slots::new();
        slots.set(Slot::Name, "Alice");
        slots.set(Slot::Email, "a@b.com");
        slots.set(Slot::Name, "Bob");

        let order: Vec<_> = slots.iter().collect();
        assert_eq!(order, vec![(Slot::Name, "Bob"), (Slot::Email, "a@b.com")]);
    }

    #[test]
    fn test_rejection_restarts_without_clearing_slots() {
        let mut slots = Slots::new();
        slots.set(Slot::Name, "Alice");
        slots.set(Slot::Email, "a@b.com");
        slots.set(Slot::AccountType, "Savings");

        let t = step(DialogState::Confirmation, &slots, "no");
        assert_eq!(t.state, DialogState::AskName);
        assert_eq!(t.reply, RESTART_PROMPT);
        // Regression guard: the restart keeps what was collected.
        assert_eq!(t.slots, slots);

        let t = step(t.state, &t.slots, "Alicia");
        assert_eq!(t.slots.get(Slot::Name), Some("Alicia"));
        assert_eq!(t.slots.get(Slot::Email), Some("a@b.com"));
    }

    #[test]
    fn test_confirmation_is_case_insensitive() {
        let slots = Slots::new();
        assert_eq!(step(DialogState::Confirmation, &slots, "Y").state, DialogState::Completed);
        assert_eq!(step(DialogState::Confirmation, &slots, "CORRECT").state, DialogState::Completed);
        assert_eq!(step(DialogState::Confirmation, &slots, "nope").state, DialogState::AskName);
    }

    #[test]
    fn test_idle_ignores_other_messages() {
        assert!(DialogController::advance(DialogState::Idle, &Slots::new(), "what is APR?").is_none());
    }

    #[test]
    fn test_start_drops_previous_slots() {
        let mut slots = Slots::new();
        slots.set(Slot::Name, "Old");
        let t = step(DialogState::Idle, &slots, "open a bank account");
        assert!(t.slots.is_empty());
    }

    #[test]
    fn test_free_text_trimmed_but_otherwise_unvalidated() {
        let t = step(DialogState::AskEmail, &Slots::new(), "  not-an-email  ");
        assert_eq!(t.slots.get(Slot::Email), Some("not-an-email"));

        // Inner spacing and casing survive.
        let t = step(DialogState::AskName, &Slots::new(), "\tMary  ANN smith\n");
        assert_eq!(t.slots.get(Slot::Name), Some("Mary  ANN smith"));
    }

    #[test]
    fn test_state_and_slot_serialization() {
        assert_eq!(
            serde_json::to_string(&DialogState::AskAccountType).unwrap(),
            "\"ASK_ACCOUNT_TYPE\""
        );
        let mut slots = Slots::new();
        slots.set(Slot::Name, "Alice");
        slots.set(Slot::AccountType, "Savings");
        assert_eq!(
            serde_json::to_string(&slots).unwrap(),
            r#"{"name":"Alice","account_type":"Savings"}"#
        );
    }
}
