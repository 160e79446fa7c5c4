//! Crate-wide error type

use core::convert::Infallible;

use crate::application::eval::EvalError;
use crate::application::plot::PlotError;
use crate::hal::spi::SpiError;
use crate::hal::twi::BusError;
use crate::input::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Two-wire bus failure, usually the LCD backpack
    Bus(BusError),
    Spi(SpiError),
    Input(InputError),
    Eval(EvalError),
    Plot(PlotError),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Error::Bus(e)
    }
}

impl From<SpiError> for Error {
    fn from(e: SpiError) -> Self {
        Error::Spi(e)
    }
}

impl From<InputError> for Error {
    fn from(e: InputError) -> Self {
        Error::Input(e)
    }
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        Error::Eval(e)
    }
}

impl From<PlotError> for Error {
    fn from(e: PlotError) -> Self {
        match e {
            PlotError::Spi(e) => Error::Spi(e),
            other => Error::Plot(other),
        }
    }
}

impl From<Infallible> for Error {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

impl Error {
    /// Short tag for the serial log
    pub fn as_str(&self) -> &'static str {
        match self {
            Error::Bus(BusError::Timeout) => "bus timeout",
            Error::Bus(BusError::AddressNack) => "bus address nack",
            Error::Bus(BusError::DataNack) => "bus data nack",
            Error::Bus(BusError::ArbitrationLost) => "bus arbitration lost",
            Error::Bus(BusError::UnexpectedStatus(_)) => "bus status",
            Error::Spi(_) => "spi",
            Error::Input(InputError::ExpressionFull) => "expression full",
            Error::Input(InputError::InvalidToken(_)) => "invalid token",
            Error::Eval(_) => "evaluation",
            Error::Plot(PlotError::InvalidRange) => "plot range",
            Error::Plot(_) => "plot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_spi_errors_flatten() {
        assert_eq!(
            Error::from(PlotError::Spi(SpiError::Timeout)),
            Error::Spi(SpiError::Timeout)
        );
        assert_eq!(
            Error::from(PlotError::InvalidRange),
            Error::Plot(PlotError::InvalidRange)
        );
    }

    #[test]
    fn question_mark_converts() {
        fn inner() -> Result<()> {
            Err::<(), _>(BusError::AddressNack)?;
            Ok(())
        }
        assert_eq!(inner(), Err(Error::Bus(BusError::AddressNack)));
        assert_eq!(inner().unwrap_err().as_str(), "bus address nack");
    }
}
