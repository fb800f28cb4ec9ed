/// Intent detection for messages arriving while no dialog is active.
/// Pure substring matching; anything unrecognised goes down the cache path.
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// User wants to start the account-opening flow
    /// Examples: "I want to open an account", "how do I open a bank account?"
    OpenAccount,

    /// Anything else; answered from the cache or the generator
    General,
}

const OPEN_ACCOUNT_PATTERNS: [&str; 2] = ["open an account", "open a bank account"];

/// Replies accepted as a "yes" at the confirmation step.
const AFFIRMATIVE_REPLIES: [&str; 3] = ["yes", "y", "correct"];

pub struct IntentDetector;

impl IntentDetector {
    pub fn detect(message: &str) -> Intent {
        let lower = message.to_lowercase();

        for pattern in &OPEN_ACCOUNT_PATTERNS {
            if lower.contains(pattern) {
                debug!("Detected OpenAccount intent: matched '{}'", pattern);
                return Intent::OpenAccount;
            }
        }

        Intent::General
    }

    pub fn is_open_account(message: &str) -> bool {
        Self::detect(message) == Intent::OpenAccount
    }

    /// Whole-message, case-insensitive match against the accepted confirmations.
    pub fn is_affirmative(message: &str) -> bool {
        let lower = message.trim().to_lowercase();
        AFFIRMATIVE_REPLIES.contains(&lower.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_account_phrases() {
        assert_eq!(IntentDetector::detect("I'd like to Open An Account please"), Intent::OpenAccount);
        assert_eq!(IntentDetector::detect("how to open a bank account?"), Intent::OpenAccount);
        assert_eq!(IntentDetector::detect("what are your opening hours"), Intent::General);
        assert_eq!(IntentDetector::detect("close an account"), Intent::General);
    }

    #[test]
    fn test_affirmative_replies() {
        for reply in ["yes", "Y", " Correct ", "YES"] {
            assert!(IntentDetector::is_affirmative(reply), "{reply:?} should confirm");
        }
        for reply in ["no", "yes please", "yeah", ""] {
            assert!(!IntentDetector::is_affirmative(reply), "{reply:?} should not confirm");
        }
    }
}
