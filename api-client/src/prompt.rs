/// Ordered system/user instruction pair sent to the chat completions
/// endpoint. Built once per request and never reused across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}
