use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The lifecycle of a single fetch.
///
/// Exactly one variant is active at a time. Within one request execution the
/// state only moves forward: `Unloaded -> Loading -> Loaded | Error`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum FetchState<T> {
    /// No request has been started.
    #[default]
    Unloaded,
    /// A request is in flight.
    Loading,
    /// The response body was decoded successfully.
    Loaded { data: T },
    /// The request failed. The message is never empty.
    Error { message: String },
}

/// The tag of a [`FetchState`], without its payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
pub enum FetchStatus {
    Unloaded,
    Loading,
    Loaded,
    Error,
}

impl<T> FetchState<T> {
    pub fn status(&self) -> FetchStatus {
        match self {
            Self::Unloaded => FetchStatus::Unloaded,
            Self::Loading => FetchStatus::Loading,
            Self::Loaded { .. } => FetchStatus::Loaded,
            Self::Error { .. } => FetchStatus::Error,
        }
    }

    pub fn is_unloaded(&self) -> bool {
        matches!(self, Self::Unloaded)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns true once the request has either loaded or failed.
    pub fn is_settled(&self) -> bool {
        self.is_loaded() || self.is_error()
    }

    /// The decoded payload, if loaded.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Loaded { data } => Some(data),
            _ => None,
        }
    }

    /// The failure description, if the request failed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Loaded { data } => Some(data),
            _ => None,
        }
    }
}

/// Rendering gates.
///
/// Each gate runs its closure only when the state matches, so a view can
/// write one branch per state and let the inactive ones produce nothing:
///
/// ```rust
/// use fetch_pattern::FetchState;
///
/// let state = FetchState::Loaded { data: 3 };
/// let rendered = state
///     .when_loading(|| "Loading...".to_string())
///     .or_else(|| state.when_loaded(|n| format!("{n} items")))
///     .or_else(|| state.when_error(|e| format!("Error: {e}")));
/// assert_eq!(rendered.as_deref(), Some("3 items"));
/// ```
impl<T> FetchState<T> {
    pub fn when_unloaded<R>(&self, render: impl FnOnce() -> R) -> Option<R> {
        self.is_unloaded().then(render)
    }

    pub fn when_loading<R>(&self, render: impl FnOnce() -> R) -> Option<R> {
        self.is_loading().then(render)
    }

    pub fn when_loaded<R>(&self, render: impl FnOnce(&T) -> R) -> Option<R> {
        self.data().map(render)
    }

    pub fn when_error<R>(&self, render: impl FnOnce(&str) -> R) -> Option<R> {
        self.error_message().map(render)
    }
}
