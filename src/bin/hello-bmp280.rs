#![no_main]
#![no_std]

use embedded_hal::blocking::delay::DelayMs;
use nrf52840_hal::{self as hal, clocks::Clocks, gpio::p1::Parts as P1Parts, twim, Rtc, Timer, Twim};

use thermolog::{
    self as _, // global logger + panicking-behavior + memory layout
    clock::managed::{ManagedClock, WallClock},
    delivery::Publisher,
    logic::record::TelemetryRecord,
    peripherals::BMP280,
    Config, Error, TelemetryNode,
};

/// Unix time when the board was flashed. The DK has no network, so the RTC
/// counts from here.
const FLASHED_AT: u32 = 1_700_000_000;
/// LFCLK 32768 Hz / (4095 + 1)
const RTC_PRESCALER: u32 = 4095;
const RTC_TICKS_PER_SECOND: u32 = 8;

struct RtcClock<T: hal::rtc::Instance>(Rtc<T>);

impl<T: hal::rtc::Instance> WallClock for RtcClock<T> {
    fn now(&mut self) -> u32 {
        FLASHED_AT + self.0.get_counter() / RTC_TICKS_PER_SECOND
    }
}

/// Shows what would be sent.
struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish<D: DelayMs<u32>>(&mut self, record: &TelemetryRecord<'_>, _delay: &mut D) -> Result<(), Error> {
        let payload = record.to_json()?;
        defmt::info!("Payload: {=str}", payload.as_str());
        Ok(())
    }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::println!("Hello, BMP280!");

    let board = hal::pac::Peripherals::take().unwrap();
    let pins_1 = P1Parts::new(board.P1);
    let mut timer = Timer::new(board.TIMER0);

    let _clocks = Clocks::new(board.CLOCK).start_lfclk();
    let rtc = Rtc::new(board.RTC0, RTC_PRESCALER).unwrap();
    rtc.enable_counter();

    let scl = pins_1.p1_04.into_floating_input().degrade();
    let sda = pins_1.p1_05.into_floating_input().degrade();
    let twim_pins = twim::Pins { scl, sda };
    let i2c = Twim::new(board.TWIM0, twim_pins, twim::Frequency::K100);

    let config = Config::default();
    let sensor = match BMP280::init(i2c, config.sensor_address, &mut timer) {
        Ok(sensor) => sensor,
        Err(e) => {
            defmt::error!("Sensor bring-up failed: {}", e);
            thermolog::exit()
        }
    };
    let clock = ManagedClock::new(RtcClock(rtc), config.timing.clock_sync_retry());

    let mut node = TelemetryNode::new(&config, sensor, clock, LogPublisher);
    node.run(&mut timer)
}
