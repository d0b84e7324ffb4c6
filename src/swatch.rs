#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Swatch {
    red: u8,
    green: u8,
    blue: u8,
    population: u32,
}

impl Swatch {
    pub fn new((red, green, blue): (u8, u8, u8), population: u32) -> Swatch {
        Self {
            red,
            green,
            blue,
            population,
        }
    }

    /// Builds a swatch from a continuous centroid, rounding each channel to the nearest integer.
    pub fn from_centroid(centroid: [f64; 3], population: u32) -> Swatch {
        let [red, green, blue] = centroid.map(round_channel);
        Self::new((red, green, blue), population)
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        (self.red, self.green, self.blue)
    }

    pub fn hsl(self) -> (f32, f32, f32) {
        crate::rgb_to_hsl(self.rgb())
    }

    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    /// The number of pixels assigned to this color's cluster.
    pub fn population(self) -> u32 {
        self.population
    }
}

fn round_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
