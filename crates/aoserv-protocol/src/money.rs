//! Monetary amounts and their two wire forms.

use std::fmt;
use std::io::{Read, Write};

use crate::codec::{WireDecode, WireEncode, WireError, WireReader, WireWriter};
use crate::version::gates;

/// Most fractional digits a money value may carry.
pub const MAX_SCALE: u8 = 18;

/// ISO 4217 currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency([u8; 3]);

impl Currency {
    /// US dollars, the only currency legacy clients can express.
    pub const USD: Self = Self(*b"USD");

    /// Parses a three-letter uppercase code.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidMoney`] for anything else.
    pub fn parse(code: &str) -> Result<Self, WireError> {
        match code.as_bytes() {
            [a, b, c] if code.bytes().all(|byte| byte.is_ascii_uppercase()) => Ok(Self([*a, *b, *c])),
            _ => Err(WireError::InvalidMoney(format!("invalid currency code '{code}'"))),
        }
    }

    /// The code as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A decimal amount in a currency, held as an unscaled integer and a scale.
///
/// `12.30 USD` is `{ unscaled: 1230, scale: 2 }`. The scale is preserved on
/// both wire forms so a value decodes exactly as it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Money {
    currency: Currency,
    unscaled: i64,
    scale: u8,
}

impl Money {
    /// Builds a money value.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidMoney`] when the scale exceeds
    /// [`MAX_SCALE`].
    pub fn new(currency: Currency, unscaled: i64, scale: u8) -> Result<Self, WireError> {
        if scale > MAX_SCALE {
            return Err(WireError::InvalidMoney(format!(
                "scale {scale} exceeds {MAX_SCALE}"
            )));
        }
        Ok(Self {
            currency,
            unscaled,
            scale,
        })
    }

    /// Parses a plain decimal string such as `-12.30`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidMoney`] when the text is not a decimal
    /// number that fits in an `i64` with at most [`MAX_SCALE`] fraction digits.
    pub fn parse_decimal(currency: Currency, text: &str) -> Result<Self, WireError> {
        let invalid = || WireError::InvalidMoney(format!("invalid decimal '{text}'"));
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));
        let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
            return Err(invalid());
        }
        if body.contains('.') && fraction.is_empty() {
            return Err(invalid());
        }
        let scale = u8::try_from(fraction.len()).map_err(|_| invalid())?;
        let magnitude: i64 = format!("{whole}{fraction}").parse().map_err(|_| invalid())?;
        let unscaled = if negative { -magnitude } else { magnitude };
        Self::new(currency, unscaled, scale)
    }

    /// Currency of the amount.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Unscaled integer value.
    #[must_use]
    pub const fn unscaled(&self) -> i64 {
        self.unscaled
    }

    /// Number of fractional digits.
    #[must_use]
    pub const fn scale(&self) -> u8 {
        self.scale
    }

    /// Formats the amount without its currency, keeping trailing zeros.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let digits = self.unscaled.unsigned_abs().to_string();
        let scale = usize::from(self.scale);
        if scale == 0 {
            return format!("{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        format!("{sign}{whole}.{fraction}")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.to_decimal_string(), self.currency)
    }
}

impl WireEncode for Money {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        if gates::MONEY_AS_UNSCALED.applies(out.version()) {
            out.write_utf(self.currency.as_str())?;
            out.write_i64(self.unscaled)?;
            out.write_u8(self.scale)
        } else if self.currency == Currency::USD {
            out.write_utf(&self.to_decimal_string())
        } else {
            Err(WireError::InvalidMoney(format!(
                "{self} cannot be sent to a {} client",
                out.version()
            )))
        }
    }
}

impl WireDecode for Money {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        if gates::MONEY_AS_UNSCALED.applies(input.version()) {
            let currency = Currency::parse(&input.read_utf()?)?;
            let unscaled = input.read_i64()?;
            let scale = input.read_u8()?;
            Self::new(currency, unscaled, scale)
        } else {
            Self::parse_decimal(Currency::USD, &input.read_utf()?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::ProtocolVersion;
    use rstest::rstest;
    use std::io::Cursor;

    fn usd(unscaled: i64, scale: u8) -> Money {
        Money::new(Currency::USD, unscaled, scale).expect("valid money")
    }

    #[rstest]
    #[case(usd(1230, 2), "12.30")]
    #[case(usd(-5, 2), "-0.05")]
    #[case(usd(7, 0), "7")]
    #[case(usd(0, 3), "0.000")]
    fn formats_decimal_strings(#[case] money: Money, #[case] expected: &str) {
        assert_eq!(money.to_decimal_string(), expected);
        assert_eq!(
            Money::parse_decimal(Currency::USD, expected).expect("parse"),
            money
        );
    }

    #[rstest]
    #[case("")]
    #[case("1.")]
    #[case(".5")]
    #[case("1.2.3")]
    #[case("abc")]
    fn rejects_malformed_decimals(#[case] text: &str) {
        Money::parse_decimal(Currency::USD, text).expect_err("malformed");
    }

    #[rstest]
    #[case(ProtocolVersion::V1_82_0)]
    #[case(ProtocolVersion::V1_83_0)]
    fn usd_round_trips_on_both_sides_of_the_gate(#[case] version: ProtocolVersion) {
        let money = usd(-123_450, 3);
        let mut out = WireWriter::new(Vec::new(), version);
        out.write(&money).expect("write");
        let decoded: Money = WireReader::new(Cursor::new(out.into_inner()), version)
            .read()
            .expect("read");
        assert_eq!(decoded, money);
    }

    #[test]
    fn legacy_clients_cannot_receive_other_currencies() {
        let euros = Money::new(Currency::parse("EUR").expect("code"), 100, 2).expect("money");
        let mut out = WireWriter::new(Vec::new(), ProtocolVersion::V1_82_0);
        let error = out.write(&euros).expect_err("not representable");
        assert!(matches!(error, WireError::InvalidMoney(_)));

        let mut modern = WireWriter::new(Vec::new(), ProtocolVersion::V1_83_0);
        modern.write(&euros).expect("modern clients accept any currency");
    }
}
