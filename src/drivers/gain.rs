use std::fmt;
use std::str::FromStr;
use crate::drivers::LinkError;
/// Placeholder entry of the gain picker. Never sent to the device.
pub const GAIN_SENTINEL: &str = "GAIN";
/// Amplification mode understood by the device firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gain {
    X0,
    X10,
    X100,
    X1000,
}
impl Gain {
    pub const ALL: [Gain; 4] = [Gain::X0, Gain::X10, Gain::X100, Gain::X1000];
    pub fn token(self) -> &'static str {
        match self {
            Gain::X0 => "0",
            Gain::X10 => "10",
            Gain::X100 => "100",
            Gain::X1000 => "1000",
        }
    }
    pub fn factor(self) -> f64 {
        match self {
            Gain::X0 => 0.0,
            Gain::X10 => 10.0,
            Gain::X100 => 100.0,
            Gain::X1000 => 1000.0,
        }
    }
}
impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
impl FromStr for Gain {
    type Err = LinkError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | GAIN_SENTINEL => Err(LinkError::NoGainSelected),
            token => Gain::ALL
                .into_iter()
                .find(|g| g.token() == token)
                .ok_or_else(|| LinkError::UnknownGain(token.to_string())),
        }
    }
}
