use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// One unit of work: a unique identifier plus the caller's data.
///
/// A payload with an empty identifier is a *sentinel*: it carries no data and
/// exists only to force a flush-condition check. Sentinels are never stored in
/// the pending buffer.
#[derive(Debug, Clone)]
pub struct Payload<T> {
    id: String,
    data: Option<T>,
}

impl<T> Payload<T> {
    /// Wraps `data` under the given identifier.
    pub fn new(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            data: Some(data),
        }
    }

    /// A data-less payload that only triggers a flush-condition check.
    pub fn sentinel() -> Self {
        Self {
            id: String::new(),
            data: None,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.id.is_empty()
    }

    #[inline]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub(crate) fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Source of payload identifiers and queue tags.
///
/// Injectable so the queue stays deterministic under test; must be safe to call
/// from concurrent tasks.
pub trait IdSource: Send + Sync {
    /// A globally unique identifier for one payload.
    fn payload_id(&self) -> String;

    /// A random tag of `len` characters.
    fn tag(&self, len: usize) -> String;
}

/// Default [`IdSource`]: UUID v4 payload ids and alphanumeric tags.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn payload_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn tag(&self, len: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}
