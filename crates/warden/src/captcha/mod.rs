//! CAPTCHA generation, verification, and throttle gating.
//!
//! Challenges are PNG images of a short phrase drawn from a bitmap
//! alphabet. The phrase lives only in the token cache, under
//! `captcha_{token}`, until the first verification attempt removes it.

mod gate;
mod generator;
mod glyphs;

pub use gate::{CaptchaGate, IssuedCaptcha};
pub use generator::CaptchaGenerator;
