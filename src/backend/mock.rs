//! Scripted backend for tests.

use super::{GenerationBackend, GenerationOptions};
use crate::error::BackendError;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Returns queued replies in order and records every prompt it is sent.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, BackendError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, BackendError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Backend that answers every call successfully with the given texts.
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::new("no scripted reply left")))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replies_in_order() {
        let backend = ScriptedBackend::new([
            Ok("first".to_string()),
            Err(BackendError::new("HTTP 500")),
        ]);
        let options = GenerationOptions::default();

        let first = tokio_test::block_on(backend.generate("a", &options));
        let second = tokio_test::block_on(backend.generate("b", &options));
        let third = tokio_test::block_on(backend.generate("c", &options));

        assert_eq!(first, Ok("first".to_string()));
        assert_eq!(second, Err(BackendError::new("HTTP 500")));
        assert!(third.is_err());
        assert_eq!(backend.calls(), 3);
        assert_eq!(backend.prompts(), vec!["a", "b", "c"]);
    }
}
