use std::{
    num::ParseIntError,
    process::{ExitCode, Termination},
};

/// Errors raised while building or slicing gene panels.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Gene symbol {0:?} has not been stored yet")]
    UnknownGene(String),
    #[error("Range [{from}, {to}) is out of bounds for panel of size {size}")]
    IndexOutOfBounds { from: i64, to: i64, size: usize },
    #[error("Invalid integer value for {name:?}: {source}")]
    InvalidInteger {
        name: String,
        #[source]
        source: ParseIntError,
    },
}

impl PanelError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        PanelError::InvalidArgument(msg.into())
    }
}

impl Termination for PanelError {
    fn report(self) -> ExitCode {
        match self {
            PanelError::InvalidArgument(_) | PanelError::InvalidInteger { .. } => ExitCode::from(2),
            PanelError::UnknownGene(_) | PanelError::IndexOutOfBounds { .. } => ExitCode::from(1),
        }
    }
}

/// Errors raised by the gene panel loading cache.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// The computed panel did not contain any gene.
    #[error("No genes associated with the provided terms")]
    Empty,
    /// Building the panel failed.
    #[error("Problem building gene panel: {0}")]
    Build(#[from] anyhow::Error),
}

#[cfg(test)]
mod test {
    use std::process::{ExitCode, Termination};

    use pretty_assertions::assert_eq;

    use super::{LoadError, PanelError};

    #[test]
    fn messages() {
        assert_eq!(
            PanelError::IndexOutOfBounds {
                from: 3,
                to: 2,
                size: 2
            }
            .to_string(),
            "Range [3, 2) is out of bounds for panel of size 2"
        );
        assert_eq!(
            PanelError::UnknownGene("SCN1A".into()).to_string(),
            "Gene symbol \"SCN1A\" has not been stored yet"
        );
        assert_eq!(
            LoadError::from(anyhow::anyhow!("boom")).to_string(),
            "Problem building gene panel: boom"
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(
            format!("{:?}", PanelError::invalid_argument("x").report()),
            format!("{:?}", ExitCode::from(2))
        );
        assert_eq!(
            format!("{:?}", PanelError::UnknownGene("x".into()).report()),
            format!("{:?}", ExitCode::from(1))
        );
    }
}
