//! Optional backend discovery
//!
//! [`Capabilities::probe`] is meant to run once at process start; the
//! result is passed explicitly to anything that needs an optional backend.

use crate::models::sequence::SequenceBackend;
use std::fmt;
use std::sync::Arc;

/// Optional model backends available in this build
#[derive(Clone, Default)]
pub struct Capabilities {
    sequence_backend: Option<Arc<dyn SequenceBackend>>,
}

impl Capabilities {
    /// Detect compiled-in backends
    pub fn probe() -> Self {
        #[cfg(feature = "sequence")]
        {
            Self::none().with_sequence_backend(Arc::new(crate::models::sequence::lstm::LstmBackend))
        }
        #[cfg(not(feature = "sequence"))]
        {
            Self::none()
        }
    }

    /// No optional backends
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_sequence_backend(mut self, backend: Arc<dyn SequenceBackend>) -> Self {
        self.sequence_backend = Some(backend);
        self
    }

    pub fn has_sequence(&self) -> bool {
        self.sequence_backend.is_some()
    }

    pub fn sequence_backend(&self) -> Option<Arc<dyn SequenceBackend>> {
        self.sequence_backend.clone()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("sequence", &self.sequence_backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_has_no_backends() {
        assert!(!Capabilities::none().has_sequence());
    }

    #[test]
    fn test_probe_matches_features() {
        assert_eq!(Capabilities::probe().has_sequence(), cfg!(feature = "sequence"));
    }
}
