//! Exposure configuration and validation.

use std::error::Error;
use std::fmt;

use quaddt_core::RegistrationError;

// ── ExposeConfig ───────────────────────────────────────────────────

/// How the quad-precision type presents itself to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExposeConfig {
    /// Scalar type name, also the name the type is looked up by.
    pub type_name: String,
    /// Descriptor kind code.
    pub kind: u8,
    /// Descriptor type character.
    pub type_char: u8,
    /// Descriptor byte order: `=` (native), `<`, `>` or `|`.
    pub byteorder: u8,
    /// Whether to register the matrix-multiply loop.
    pub register_matmul: bool,
}

impl Default for ExposeConfig {
    fn default() -> Self {
        Self {
            type_name: "real128".to_string(),
            kind: b'f',
            type_char: b'q',
            byteorder: b'=',
            register_matmul: true,
        }
    }
}

impl ExposeConfig {
    /// Check the configuration before anything is registered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.type_name.is_empty() {
            return Err(ConfigError::EmptyTypeName);
        }
        let mut chars = self.type_name.chars();
        let leading_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !leading_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::InvalidTypeName {
                name: self.type_name.clone(),
            });
        }
        for (field, code) in [("kind", self.kind), ("type_char", self.type_char)] {
            if !code.is_ascii_graphic() {
                return Err(ConfigError::InvalidCode { field, code });
            }
        }
        if !matches!(self.byteorder, b'=' | b'<' | b'>' | b'|') {
            return Err(ConfigError::InvalidByteOrder {
                code: self.byteorder,
            });
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// A rejected [`ExposeConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The type name is empty.
    EmptyTypeName,
    /// The type name is not an identifier.
    InvalidTypeName {
        /// The rejected name.
        name: String,
    },
    /// A descriptor code is not a printable ASCII character.
    InvalidCode {
        /// Which field.
        field: &'static str,
        /// The rejected byte.
        code: u8,
    },
    /// The byte-order code is not one the host understands.
    InvalidByteOrder {
        /// The rejected byte.
        code: u8,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTypeName => write!(f, "type name is empty"),
            Self::InvalidTypeName { name } => {
                write!(f, "type name '{name}' is not an identifier")
            }
            Self::InvalidCode { field, code } => {
                write!(f, "{field} code {code:#04x} is not printable ASCII")
            }
            Self::InvalidByteOrder { code } => {
                write!(f, "byte order code {code:#04x} is not one of '=', '<', '>', '|'")
            }
        }
    }
}

impl Error for ConfigError {}

impl From<ConfigError> for RegistrationError {
    fn from(e: ConfigError) -> Self {
        RegistrationError::InvalidConfig {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(ExposeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn bad_names_are_rejected() {
        let mut cfg = ExposeConfig {
            type_name: String::new(),
            ..ExposeConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyTypeName));
        cfg.type_name = "9lives".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidTypeName { .. })));
        cfg.type_name = "quad float".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidTypeName { .. })));
        cfg.type_name = "_quad2".into();
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn descriptor_codes_are_checked() {
        let cfg = ExposeConfig {
            type_char: b' ',
            ..ExposeConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvalidCode { field: "type_char", code: b' ' })
        );
        let cfg = ExposeConfig {
            byteorder: b'!',
            ..ExposeConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidByteOrder { code: b'!' }));
    }

    #[test]
    fn converts_to_a_registration_error() {
        let e: RegistrationError = ConfigError::EmptyTypeName.into();
        assert_eq!(
            e,
            RegistrationError::InvalidConfig {
                reason: "type name is empty".into()
            }
        );
    }
}
