//! Dimmable LED on a PWM channel.

use embassy_nrf::peripherals::PWM0;
use embassy_nrf::pwm::{Prescaler, SimplePwm};

use swift_device::config::MAX_DUTY;
use swift_device::Actuator;

/// Status LED on PWM0 channel 0. On the nRF52840-DK this is LED1, pin P0.13,
/// wired active-low.
pub struct PwmLed {
    pwm: SimplePwm<'static, PWM0>,
}

impl PwmLed {
    pub fn new(mut pwm: SimplePwm<'static, PWM0>) -> Self {
        // 16 MHz / 8191 counts, ~2 kHz: no visible flicker.
        pwm.set_prescaler(Prescaler::Div1);
        pwm.set_max_duty(MAX_DUTY);
        Self { pwm }
    }
}

impl Actuator for PwmLed {
    fn set_duty(&mut self, duty: u16) {
        self.pwm.set_duty(0, duty);
    }
}
