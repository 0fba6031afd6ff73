//! Validated identifiers that appear in command payloads.
//!
//! A name that fails its grammar on the wire is not an ordinary domain error:
//! it means client and server disagree on basic types, so decoding surfaces it
//! as [`WireError::InvalidName`] and the dispatcher closes the connection.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use thiserror::Error;

use crate::codec::{WireDecode, WireEncode, WireError, WireReader, WireWriter};

/// Grammar violations for names and identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The value had the wrong length.
    #[error("{kind} '{value}' must be between {min} and {max} characters")]
    Length {
        /// What kind of name was checked.
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// Shortest accepted length.
        min: usize,
        /// Longest accepted length.
        max: usize,
    },
    /// The value contained a character outside its alphabet.
    #[error("{kind} '{value}' contains invalid character '{character}'")]
    Character {
        /// What kind of name was checked.
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// First offending character.
        character: char,
    },
    /// The value did not start with a letter.
    #[error("{kind} '{value}' must start with a lowercase letter")]
    Start {
        /// What kind of name was checked.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },
    /// A host id was negative.
    #[error("host id {0} is negative")]
    NegativeHost(i32),
}

fn check_length(kind: &'static str, value: &str, min: usize, max: usize) -> Result<(), NameError> {
    let len = value.chars().count();
    if (min..=max).contains(&len) {
        Ok(())
    } else {
        Err(NameError::Length {
            kind,
            value: value.to_owned(),
            min,
            max,
        })
    }
}

fn check_alphabet(
    kind: &'static str,
    value: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), NameError> {
    match value.chars().find(|character| !allowed(*character)) {
        Some(character) => Err(NameError::Character {
            kind,
            value: value.to_owned(),
            character,
        }),
        None => Ok(()),
    }
}

fn check_starts_with_letter(kind: &'static str, value: &str) -> Result<(), NameError> {
    if value.starts_with(|character: char| character.is_ascii_lowercase()) {
        Ok(())
    } else {
        Err(NameError::Start {
            kind,
            value: value.to_owned(),
        })
    }
}

macro_rules! string_name {
    ($(#[$meta:meta])* $name:ident, $validate:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps a value.
            ///
            /// # Errors
            ///
            /// Returns a [`NameError`] describing the first grammar violation.
            pub fn new(value: impl Into<String>) -> Result<Self, NameError> {
                let value = value.into();
                $validate(&value)?;
                Ok(Self(value))
            }

            /// Borrows the validated value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = NameError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::new(value)
            }
        }

        impl WireEncode for $name {
            fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
                out.write_utf(&self.0)
            }
        }

        impl WireDecode for $name {
            fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
                let value = input.read_utf()?;
                Ok(Self::new(value)?)
            }
        }
    };
}

fn validate_account(value: &str) -> Result<(), NameError> {
    const KIND: &str = "account name";
    check_length(KIND, value, 2, 32)?;
    check_starts_with_letter(KIND, value)?;
    check_alphabet(KIND, value, |character| {
        character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
    })
}

fn validate_user(value: &str) -> Result<(), NameError> {
    const KIND: &str = "user name";
    check_length(KIND, value, 1, 32)?;
    check_starts_with_letter(KIND, value)?;
    check_alphabet(KIND, value, |character| {
        character.is_ascii_lowercase()
            || character.is_ascii_digit()
            || matches!(character, '_' | '.' | '-' | '@')
    })
}

fn validate_domain(value: &str) -> Result<(), NameError> {
    const KIND: &str = "domain name";
    check_length(KIND, value, 1, 253)?;
    check_alphabet(KIND, value, |character| {
        character.is_ascii_lowercase()
            || character.is_ascii_digit()
            || matches!(character, '.' | '-')
    })?;
    if value.split('.').any(|label| label.is_empty() || label.len() > 63) {
        return Err(NameError::Length {
            kind: KIND,
            value: value.to_owned(),
            min: 1,
            max: 63,
        });
    }
    Ok(())
}

string_name!(
    /// Name of a business account; the unit of account-scoped invalidation.
    AccountName,
    validate_account
);

string_name!(
    /// Name of an authenticated administrator.
    UserName,
    validate_user
);

string_name!(
    /// A fully-qualified DNS zone name such as `example.com`.
    DomainName,
    validate_domain
);

/// Identifier of a managed host; the unit of host-scoped invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostId(i32);

impl HostId {
    /// Wraps a host id.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::NegativeHost`] for negative ids.
    pub const fn new(id: i32) -> Result<Self, NameError> {
        if id < 0 {
            Err(NameError::NegativeHost(id))
        } else {
            Ok(Self(id))
        }
    }

    /// Raw id.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "host#{}", self.0)
    }
}

impl WireEncode for HostId {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write_compressed_int(self.0)
    }
}

impl WireDecode for HostId {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self::new(input.read_compressed_int()?)?)
    }
}
