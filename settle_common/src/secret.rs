use std::{
    env,
    fmt,
    fmt::{Debug, Display},
};

/// Wraps a sensitive value (gateway keys, signing secrets) so that it is never printed in logs or debug output.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    /// Reads a secret from the environment. Unset and empty variables both yield `None`.
    pub fn from_env(name: &str) -> Option<Self> {
        env::var(name).ok().filter(|s| !s.trim().is_empty()).map(Self::new)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}
