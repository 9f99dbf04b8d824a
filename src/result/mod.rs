//! Uniform request state for single-shot operations.
//!
//! Every operation yields [`ResultState::Loading`] once and then exactly one
//! terminal state. Failures never escape as `Err`: they are classified into an
//! [`ErrorKind`] according to a [`FailurePolicy`].

use std::fmt;
use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt};

use crate::api::{Envelope, ErrorEnvelope};
use crate::app::{Result, StorylineError};

#[derive(Debug, Clone, PartialEq)]
pub enum ResultState<T> {
    Loading,
    Success(T),
    Error(ErrorKind),
}

impl<T> ResultState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ResultState::Loading)
    }

    pub fn success(self) -> Option<T> {
        match self {
            ResultState::Success(value) => Some(value),
            _ => None,
        }
    }

}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Server-provided text, shown verbatim.
    Api(String),
    /// Client-side message resolved by the presentation layer.
    Resource(MessageKey),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Api(message) => write!(f, "{}", message),
            ErrorKind::Resource(key) => write!(f, "{}", key.default_text()),
        }
    }
}

/// Localisable message keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    AlreadyTaken,
    WrongCredentials,
    LoginFailed,
    UploadFailed,
    EmptyStory,
    InvalidEmail,
    PasswordTooShort,
}

impl MessageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::AlreadyTaken => "already_taken",
            MessageKey::WrongCredentials => "wrong_credentials",
            MessageKey::LoginFailed => "login_failed",
            MessageKey::UploadFailed => "upload_failed",
            MessageKey::EmptyStory => "empty_story",
            MessageKey::InvalidEmail => "email_valid",
            MessageKey::PasswordTooShort => "password_error_length",
        }
    }

    /// English text used when no translation is available.
    pub fn default_text(&self) -> &'static str {
        match self {
            MessageKey::AlreadyTaken => "This email is already taken",
            MessageKey::WrongCredentials => "Wrong email or password",
            MessageKey::LoginFailed => "Login failed, please try again",
            MessageKey::UploadFailed => "Upload failed, please try again",
            MessageKey::EmptyStory => "Please add a photo and a description first",
            MessageKey::InvalidEmail => "Please enter a valid email address",
            MessageKey::PasswordTooShort => "Password must be at least 8 characters",
        }
    }
}

/// How an operation's failures map onto [`ErrorKind`].
#[derive(Debug, Clone, Default)]
pub struct FailurePolicy {
    status_keys: Vec<(u16, MessageKey)>,
    transport_key: Option<MessageKey>,
}

impl FailurePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `status` with a fixed key instead of the server's message.
    pub fn on_status(mut self, status: u16, key: MessageKey) -> Self {
        self.status_keys.push((status, key));
        self
    }

    /// Key reported when the call failed without an HTTP error status:
    /// no answer at all, or a body that could not be decoded.
    pub fn on_transport(mut self, key: MessageKey) -> Self {
        self.transport_key = Some(key);
        self
    }

    pub fn register() -> Self {
        Self::new().on_status(400, MessageKey::AlreadyTaken)
    }

    pub fn login() -> Self {
        Self::new()
            .on_status(401, MessageKey::WrongCredentials)
            .on_transport(MessageKey::LoginFailed)
    }

    pub fn upload() -> Self {
        Self::new().on_transport(MessageKey::UploadFailed)
    }

    pub fn classify(&self, err: &StorylineError) -> ErrorKind {
        match err {
            StorylineError::Status { status, body } => {
                if let Some((_, key)) = self.status_keys.iter().find(|(s, _)| s == status) {
                    return ErrorKind::Resource(*key);
                }
                match serde_json::from_str::<ErrorEnvelope>(body) {
                    Ok(envelope) => ErrorKind::Api(envelope.message),
                    Err(_) => ErrorKind::Api(err.to_string()),
                }
            }
            other => match self.transport_key {
                Some(key) => ErrorKind::Resource(key),
                None => ErrorKind::Api(other.to_string()),
            },
        }
    }

    /// Turn a call outcome into the envelope or the error to report.
    pub fn interpret<R: Envelope>(&self, outcome: Result<R>) -> std::result::Result<R, ErrorKind> {
        match outcome {
            Ok(response) if response.is_error() => {
                Err(ErrorKind::Api(response.message().to_string()))
            }
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::warn!("Request failed: {}", err);
                Err(self.classify(&err))
            }
        }
    }
}

/// Await `call` and produce its terminal state.
pub async fn resolve<R, T, Fut, F>(policy: &FailurePolicy, call: Fut, finish: F) -> ResultState<T>
where
    R: Envelope,
    Fut: Future<Output = Result<R>>,
    F: FnOnce(R) -> ResultState<T>,
{
    match policy.interpret(call.await) {
        Ok(response) => finish(response),
        Err(kind) => ResultState::Error(kind),
    }
}

/// `Loading`, then the terminal state of `call`.
pub fn run<R, T, Fut, F>(policy: FailurePolicy, call: Fut, finish: F) -> BoxStream<'static, ResultState<T>>
where
    R: Envelope + Send + 'static,
    T: Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    F: FnOnce(R) -> ResultState<T> + Send + 'static,
{
    let terminal = async move { resolve(&policy, call, finish).await };

    stream::once(async { ResultState::Loading })
        .chain(stream::once(terminal))
        .boxed()
}

/// A stream that fails before any request is made.
pub fn rejected<T: Send + 'static>(kind: ErrorKind) -> BoxStream<'static, ResultState<T>> {
    stream::iter([ResultState::Loading, ResultState::Error(kind)]).boxed()
}
