//! User request models.
//!
//! The domain runtime may ask the operator for a value or for a choice among
//! options. These types describe the question and the answer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Arguments of a user-choice request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
pub struct UserChoiceArgs {
    pub options: Vec<String>,

    /// Free form metadata (dialog title, text, ...) as JSON.
    #[serde(default)]
    pub metadata: String,
}

/// Answer to a user-choice request.
///
/// `processed == false` means the request was not answered (cancelled,
/// dialog closed, job stopped).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
pub struct UserChoiceResult {
    pub index: usize,
    pub processed: bool,
}

/// Arguments of a user-input request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
pub struct UserInputArgs {
    /// Current value as JSON; its shape is the expected schema of the answer.
    pub value: String,

    pub description: String,
}

/// Answer to a user-input request, the new value as JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
pub struct UserInputResult {
    pub value: String,
    pub processed: bool,
}
