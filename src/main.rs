#![cfg_attr(target_arch = "avr", no_std, no_main, feature(abi_avr_interrupt))]

// The firmware only exists for AVR; host builds get an empty binary so that
// the library and its tests build everywhere.
#[cfg(not(target_arch = "avr"))]
fn main() {}

#[cfg(target_arch = "avr")]
mod firmware {
    use panic_halt as _;

    use core::cell::{Cell, RefCell};
    use critical_section::Mutex;
    use embedded_hal::digital::v2::{InputPin, OutputPin};

    use avr_device::atmega328p::Peripherals;
    use keycalc_firmware::application::eval::{format_result, Arithmetic};
    use keycalc_firmware::application::plot::GraphicPanel;
    use keycalc_firmware::application::{Calculator, Outcome};
    use keycalc_firmware::config::{LCD_ADDR, LCD_LINES};
    use keycalc_firmware::diagnostics;
    use keycalc_firmware::drivers::{Font, KeypadScanner, TextDisplay};
    use keycalc_firmware::error::Error;
    use keycalc_firmware::hal::gpio::board::{self, Board};
    use keycalc_firmware::hal::gpio::KeypadLines;
    use keycalc_firmware::hal::{Delay, Spi, SpiMaster, TickTimer, TwiMaster, TwiSpeed};
    use keycalc_firmware::input::{InputError, InputLink, KeyInput, SharedInput};
    use keycalc_firmware::logger::{Level, Logger};

    #[cfg(feature = "debug")]
    use avr_device::atmega328p::USART0;
    #[cfg(feature = "debug")]
    use keycalc_firmware::config::SerialConfig;
    #[cfg(feature = "debug")]
    use keycalc_firmware::hal::uart::{configure, receive, SerialPort, SerialWriter, SharedSerial};
    #[cfg(not(feature = "debug"))]
    use keycalc_firmware::logger::Discard;

    type Scanner = KeypadScanner<KeypadLines, TickTimer, Delay>;

    static SCANNER: Mutex<RefCell<Option<Scanner>>> = Mutex::new(RefCell::new(None));
    static INPUT: SharedInput = Mutex::new(RefCell::new(KeyInput::new()));
    /// Set by the keypad interrupt when the input state can no longer be
    /// trusted
    static FAULT: Mutex<Cell<Option<InputError>>> = Mutex::new(Cell::new(None));

    #[cfg(feature = "debug")]
    static SERIAL: SharedSerial<USART0> = Mutex::new(RefCell::new(None));

    #[avr_device::entry]
    fn main() -> ! {
        let Some(dp) = Peripherals::take() else {
            #[allow(clippy::empty_loop)]
            loop {}
        };

        let delay = Delay::start(dp.TC2);
        let Board {
            tft_dc,
            tft_reset,
            mode_select,
            status_led,
            keypad,
        } = board::split(dp.PORTB, dp.PORTC, dp.PORTD, dp.EXINT);

        #[cfg(feature = "debug")]
        let mut log = {
            configure(&dp.USART0, &SerialConfig::DEFAULT);
            critical_section::with(|cs| {
                SERIAL.borrow(cs).replace(Some(SerialPort::new(dp.USART0)));
            });
            Logger::new(SerialWriter::new(&SERIAL), Level::Debug)
        };
        #[cfg(not(feature = "debug"))]
        let mut log = Logger::new(Discard, Level::Error);

        let twi = TwiMaster::new(dp.TWI, delay, TwiSpeed::Standard100k);
        let mut lcd = TextDisplay::new(twi, delay, LCD_ADDR);
        let lcd_ready = lcd
            .initialize(LCD_LINES, Font::Dots5x8)
            .and_then(|_| lcd.set_backlight(255));
        if let Err(e) = lcd_ready {
            log.error(Error::from(e).as_str());
            diagnostics::halt(status_led, delay);
        }

        let mut panel = GraphicPanel::new(SpiMaster::new(Spi::new(dp.SPI), tft_dc), tft_reset, delay);
        if let Err(e) = panel.initialize() {
            log.error(Error::from(e).as_str());
            diagnostics::halt(status_led, delay);
        }

        let scanner = KeypadScanner::new(keypad, TickTimer::new(dp.TC0), delay);
        critical_section::with(|cs| {
            SCANNER.borrow(cs).replace(Some(scanner));
        });

        let mut calculator = Calculator::new(lcd, panel, Arithmetic);
        if let Err(e) = calculator.start() {
            log.error(e.as_str());
            diagnostics::halt(status_led, delay);
        }

        let mut status_led = status_led;
        let input = InputLink::new(&INPUT);

        // SAFETY: all shared state is initialised above
        unsafe { avr_device::interrupt::enable() };
        log.info("ready");

        loop {
            if let Some(fault) = critical_section::with(|cs| FAULT.borrow(cs).get()) {
                log.error(Error::from(fault).as_str());
                diagnostics::halt(status_led, delay);
            }

            #[cfg(feature = "debug")]
            if let Some(level) = receive(&SERIAL).and_then(Level::from_command) {
                log.set_level(level);
                log.info("log level set");
            }

            let plot_mode = matches!(mode_select.is_high(), Ok(true));
            let _ = if plot_mode {
                status_led.set_high()
            } else {
                status_led.set_low()
            };

            match calculator.poll(input, plot_mode) {
                Ok(Outcome::Idle) => {}
                Ok(Outcome::Answer(value)) => log.pair(Level::Info, "answer", &format_result(value)),
                Ok(Outcome::NotANumber(_)) => log.warn("not a number"),
                Ok(Outcome::AwaitingRange) => log.debug("function stored"),
                Ok(Outcome::Plotted) => log.info("plotted"),
                Ok(Outcome::RangeError) => log.warn("bad range"),
                Ok(Outcome::FunctionError(_)) => log.warn("bad function"),
                Err(e) => log.error(e.as_str()),
            }
        }
    }

    fn wake() {
        critical_section::with(|cs| {
            if let Some(scanner) = SCANNER.borrow_ref_mut(cs).as_mut() {
                scanner.on_wake();
            }
        });
    }

    #[avr_device::interrupt(atmega328p)]
    fn PCINT0() {
        wake();
    }

    #[avr_device::interrupt(atmega328p)]
    fn PCINT1() {
        wake();
    }

    #[avr_device::interrupt(atmega328p)]
    fn PCINT2() {
        wake();
    }

    #[avr_device::interrupt(atmega328p)]
    fn TIMER0_OVF() {
        let event = critical_section::with(|cs| {
            SCANNER
                .borrow_ref_mut(cs)
                .as_mut()
                .and_then(|scanner| scanner.on_tick())
        });
        if let Some(event) = event {
            if let Err(e) = InputLink::new(&INPUT).on_key(event) {
                critical_section::with(|cs| FAULT.borrow(cs).set(Some(e)));
            }
        }
    }

    #[cfg(feature = "debug")]
    #[avr_device::interrupt(atmega328p)]
    fn USART_RX() {
        critical_section::with(|cs| {
            if let Some(port) = SERIAL.borrow_ref_mut(cs).as_mut() {
                port.on_receive();
            }
        });
    }

    #[cfg(feature = "debug")]
    #[avr_device::interrupt(atmega328p)]
    fn USART_UDRE() {
        critical_section::with(|cs| {
            if let Some(port) = SERIAL.borrow_ref_mut(cs).as_mut() {
                port.on_data_register_empty();
            }
        });
    }
}
