//! Keypad calculator and function plotter for the ATmega328P
//!
//! Two 4x4 keypads type an expression into a buffer shared with the keypad
//! interrupt. The main loop evaluates it and prints the result on a 16x2
//! character LCD (I2C backpack), or samples it as a function of `x` and
//! plots it on a 160x128 ST7735 panel (SPI). A hardware switch selects the
//! mode.
//!
//! Everything above the register level builds for the host as well, which
//! is where the tests run.

#![cfg_attr(not(test), no_std)]

pub mod application;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod input;
pub mod logger;

pub use error::{Error, Result};
