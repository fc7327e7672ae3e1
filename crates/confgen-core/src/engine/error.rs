use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;
use crate::core::chem::hydrogens::ValenceError;
use crate::core::embedding::EmbeddingError;
use crate::core::forcefield::energy::ForcefieldError;
use crate::core::io::sdf::SdfError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Got {inputs} input files but {outputs} output files")]
    PairCountMismatch { inputs: usize, outputs: usize },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: SdfError,
    },

    #[error("Hydrogen addition failed: {source}")]
    Hydrogens {
        #[from]
        source: ValenceError,
    },

    #[error("Conformer embedding failed: {source}")]
    Embedding {
        #[from]
        source: EmbeddingError,
    },

    #[error("Force field setup failed: {source}")]
    Forcefield {
        #[from]
        source: ForcefieldError,
    },

    #[error("Optimization of '{molecule}' failed: {reason}")]
    Optimization { molecule: String, reason: String },
}

impl EngineError {
    /// Whether the error concerns one molecule rather than the batch as a whole.
    ///
    /// Only these errors are absorbed by the skip failure policy.
    pub fn is_molecule_scoped(&self) -> bool {
        matches!(
            self,
            Self::Hydrogens { .. }
                | Self::Embedding { .. }
                | Self::Forcefield { .. }
                | Self::Optimization { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Element;

    #[test]
    fn molecule_errors_are_distinguished_from_batch_errors() {
        let valence = EngineError::from(ValenceError {
            serial: 1,
            element: Element::C,
            valence: 5.0,
        });
        assert!(valence.is_molecule_scoped());
        assert!(EngineError::from(EmbeddingError::EmptyMolecule).is_molecule_scoped());

        let mismatch = EngineError::PairCountMismatch {
            inputs: 2,
            outputs: 1,
        };
        assert!(!mismatch.is_molecule_scoped());
        assert_eq!(mismatch.to_string(), "Got 2 input files but 1 output files");
    }
}
