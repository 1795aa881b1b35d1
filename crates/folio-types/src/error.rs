//! Error types for folio.

use std::io;

/// Errors produced while loading and presenting an article.
///
/// Only [`FolioError::InvalidParameters`] is meant to reach the user
/// directly; every other variant is contained by the component that
/// raised it and logged.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("construction precondition failed: {0}")]
    ConstructionPrecondition(String),

    #[error("image load failed: {0}")]
    ImageLoad(String),

    #[error("link resolution failed: {0}")]
    LinkResolution(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("bridge error: {0}")]
    Bridge(String),

    #[error("state error: {0}")]
    State(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FolioError {
    /// Whether this error is terminal for the current load and must be
    /// surfaced to the user.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, FolioError::InvalidParameters(_))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FolioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameters_display() {
        let e = FolioError::InvalidParameters("no language".into());
        assert_eq!(format!("{e}"), "invalid parameters: no language");
    }

    #[test]
    fn construction_precondition_display() {
        let e = FolioError::ConstructionPrecondition("no metadata record".into());
        assert_eq!(
            format!("{e}"),
            "construction precondition failed: no metadata record"
        );
    }

    #[test]
    fn image_load_display() {
        let e = FolioError::ImageLoad("404".into());
        assert_eq!(format!("{e}"), "image load failed: 404");
    }

    #[test]
    fn link_resolution_display() {
        let e = FolioError::LinkResolution("empty title".into());
        assert_eq!(format!("{e}"), "link resolution failed: empty title");
    }

    #[test]
    fn bridge_error_display() {
        let e = FolioError::Bridge("setup already sent".into());
        assert_eq!(format!("{e}"), "bridge error: setup already sent");
    }

    #[test]
    fn only_invalid_parameters_is_user_facing() {
        assert!(FolioError::InvalidParameters("x".into()).is_user_facing());
        assert!(!FolioError::ImageLoad("x".into()).is_user_facing());
        assert!(!FolioError::Persistence("x".into()).is_user_facing());
        assert!(!FolioError::LinkResolution("x".into()).is_user_facing());
        assert!(!FolioError::ConstructionPrecondition("x".into()).is_user_facing());
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: FolioError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: FolioError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: FolioError = json_err.into();
        assert!(format!("{e}").contains("JSON error"));
    }

    #[test]
    fn result_alias_err() {
        let r: Result<i32> = Err(FolioError::State("oops".into()));
        assert!(r.is_err());
    }
}
