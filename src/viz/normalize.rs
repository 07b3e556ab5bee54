use crate::audio::analysis::Spectrum;

/// How visuals are scaled: tracked automatically, or by a fixed factor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scale {
    Automatic,
    Manual(f32),
}

impl Scale {
    pub const OPTIONS: [(&'static str, Scale); 6] = [
        ("Automatic", Scale::Automatic),
        ("0.5x", Scale::Manual(0.5)),
        ("1x", Scale::Manual(1.0)),
        ("2x", Scale::Manual(2.0)),
        ("5x", Scale::Manual(5.0)),
        ("10x", Scale::Manual(10.0)),
    ];

    pub fn label(&self) -> &'static str {
        Self::OPTIONS
            .iter()
            .find(|(_, s)| s == self)
            .map_or("Custom", |(label, _)| label)
    }

    pub fn index(&self) -> Option<usize> {
        Self::OPTIONS.iter().position(|(_, s)| s == self)
    }

    /// Accepts `auto`/`automatic` or a multiplier such as `2x` or `2.5`.
    pub fn parse(text: &str) -> Option<Scale> {
        let text = text.trim().to_lowercase();
        if text == "auto" || text == "automatic" {
            return Some(Scale::Automatic);
        }
        let factor: f32 = text.trim_end_matches('x').parse().ok()?;
        (factor.is_finite() && factor > 0.0).then_some(Scale::Manual(factor))
    }
}

/// Running peak with instant attack and exponential release.
///
/// The peak never drops below half of the latest observation nor below
/// `floor`, so silence cannot blow quiet noise up to full scale.
#[derive(Clone, Debug)]
pub struct AdaptiveGain {
    running_max: f32,
    decay: f32,
    floor: f32,
}

impl AdaptiveGain {
    pub fn new(initial: f32, decay: f32, floor: f32) -> Self {
        Self {
            running_max: initial.max(floor),
            decay,
            floor,
        }
    }

    #[cfg(test)]
    pub fn running_max(&self) -> f32 {
        self.running_max
    }

    /// Fold one frame's peak into the tracker and return the new maximum.
    pub fn update(&mut self, current_max: f32) -> f32 {
        let current_max = if current_max.is_finite() { current_max.max(0.0) } else { 0.0 };
        if current_max > self.running_max {
            self.running_max = current_max;
        } else {
            self.running_max *= self.decay;
            self.running_max = self.running_max.max(current_max * 0.5).max(self.floor);
        }
        self.running_max
    }

    /// Denominator for rescaling, never below the floor.
    pub fn divisor(&self) -> f32 {
        self.running_max.max(self.floor)
    }
}

/// Spectrum normalizer: manual multiplier or `1 / running_max`.
#[derive(Clone, Debug)]
pub struct Normalizer {
    gain: AdaptiveGain,
}

impl Normalizer {
    pub fn new(decay: f32, floor: f32) -> Self {
        Self {
            gain: AdaptiveGain::new(floor, decay, floor),
        }
    }

    #[cfg(test)]
    pub fn running_max(&self) -> f32 {
        self.gain.running_max()
    }

    pub fn apply(&mut self, spectrum: &Spectrum, scale: Scale) -> Spectrum {
        match scale {
            Scale::Manual(factor) => spectrum.map(|v| v * factor),
            Scale::Automatic => {
                self.gain.update(spectrum.max());
                let divisor = self.gain.divisor();
                spectrum.map(|v| v / divisor)
            }
        }
    }
}

/// Exponential moving average over successive spectra.
#[derive(Clone, Debug)]
pub struct Smoother {
    alpha: f32,
    previous: Option<Spectrum>,
}

impl Smoother {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            previous: None,
        }
    }

    /// `alpha * previous + (1 - alpha) * current`; resets to `current` on
    /// first use or whenever the shape changes.
    pub fn apply(&mut self, current: &Spectrum) -> Spectrum {
        let alpha = self.alpha;
        let smoothed = match self.previous.take() {
            Some(prev) if prev.channels[0].len() == current.channels[0].len()
                && prev.channels[1].len() == current.channels[1].len() =>
            {
                let blend = |p: &[f32], c: &[f32]| -> Vec<f32> {
                    p.iter().zip(c).map(|(&p, &c)| alpha * p + (1.0 - alpha) * c).collect()
                };
                Spectrum {
                    channels: [
                        blend(&prev.channels[0], &current.channels[0]),
                        blend(&prev.channels[1], &current.channels[1]),
                    ],
                }
            }
            _ => current.clone(),
        };
        self.previous = Some(smoothed.clone());
        smoothed
    }
}
