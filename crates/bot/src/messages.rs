//! Fixed user-facing reply strings. Tests assert against these constants,
//! so changing a string here is a behavior change, not a cosmetic one.

pub const HELP: &str = "Hi! I can search your mailbox for you - just ask.";
pub const LOGOUT_DONE: &str = "Done, you are signed out.";
pub const LOGIN_FAILED: &str = "Login did not complete, please try again later.";
pub const LOGIN_SUCCEEDED: &str =
    "Great, you are signed in! Say 'logout' whenever you want to close the session.";
pub const NOT_UNDERSTOOD: &str = "Sorry, I did not understand that...";
pub const GREETING: &str = "Hello!";
pub const SEARCHING: &str = "Give me a moment, I am searching...";
pub const NOTHING_FOUND: &str = "I could not find anything...";
pub const COLLABORATOR_APOLOGY: &str =
    "Sorry, something went wrong on my side. Please try again shortly.";

pub fn welcome(member_name: &str) -> String {
    format!(
        "Hello {member_name}, welcome! I am MailSeek; you can ask me to find certain emails for you."
    )
}

pub fn found(count: usize) -> String {
    if count == 1 {
        "Done! I found 1 mail.".to_owned()
    } else {
        format!("Done! I found {count} mails.")
    }
}

pub fn diagnostic(intent: &str, confidence: f64) -> String {
    format!("Intent: {intent} ({confidence}).")
}
