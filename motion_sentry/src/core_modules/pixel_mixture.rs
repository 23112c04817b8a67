// THEORY:
// The `PixelMixture` is the heart of the background model. It is a stateful,
// learning entity responsible for a single pixel location. Its job is to observe
// the stream of intensities at that location and decide whether the current value
// belongs to the persistent scene or is something passing through.
//
// Key architectural principles:
// 1.  **Multi-Modal Memory**: A pixel can have more than one "normal" appearance
//     (a swaying branch, a blinking light). The mixture keeps up to
//     `MAX_COMPONENTS` Gaussian components, each with a mean intensity, a
//     variance and a weight. Weights always sum to 1.
// 2.  **Adaptive Learning**: Every observation pulls the matching component
//     towards the new value and raises its weight; every other component slowly
//     decays. Components whose weight decays to nothing are dropped, and an
//     unexplained value replaces the weakest component.
// 3.  **Dominance Decides**: A value is background only if it falls close to one
//     of the heavy components that together make up the bulk
//     (`background_ratio`) of the weight. A value explained only by a young,
//     light component is still foreground.
// 4.  **Shadow Awareness**: A foreground value that looks like a uniformly darker
//     version of a dominant component is reported as `Shadow` so it can be kept
//     out of the binary mask.

/// Upper bound on components per pixel.
pub const MAX_COMPONENTS: usize = 5;

/// Tunables shared by every pixel in the model.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureParams {
    /// Weight given to the newest observation (1 / history).
    pub learning_rate: f32,
    /// Squared Mahalanobis distance under which a value counts as background.
    pub var_threshold: f32,
    /// Squared Mahalanobis distance under which a value updates a component.
    pub var_threshold_gen: f32,
    /// Fraction of total weight that is considered "the background".
    pub background_ratio: f32,
    /// Variance of a freshly created component.
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Weight prune applied every frame, as a multiple of the learning rate.
    pub complexity_reduction: f32,
    pub detect_shadows: bool,
    /// Lowest brightness ratio that still counts as a shadow.
    pub shadow_tau: f32,
}

impl MixtureParams {
    pub fn new(history: u32, var_threshold: f32, detect_shadows: bool) -> Self {
        Self {
            learning_rate: 1.0 / history.max(1) as f32,
            var_threshold,
            detect_shadows,
            ..Self::default()
        }
    }
}

impl Default for MixtureParams {
    fn default() -> Self {
        Self {
            learning_rate: 1.0 / 500.0,
            var_threshold: 16.0,
            var_threshold_gen: 9.0,
            background_ratio: 0.9,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 5.0 * 15.0,
            complexity_reduction: 0.05,
            detect_shadows: true,
            shadow_tau: 0.5,
        }
    }
}

/// One recurring appearance of a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianComponent {
    pub weight: f32,
    pub mean: f32,
    pub variance: f32,
}

/// Verdict for a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelStatus {
    Background,
    Shadow,
    Foreground,
}

impl PixelStatus {
    /// Value written into the confidence map.
    pub fn confidence(self) -> u8 {
        match self {
            PixelStatus::Background => 0,
            PixelStatus::Shadow => 127,
            PixelStatus::Foreground => 255,
        }
    }
}

/// A stateful mixture-of-Gaussians model for one pixel location.
#[derive(Debug, Clone, Default)]
pub struct PixelMixture {
    /// Kept sorted by descending weight.
    components: Vec<GaussianComponent>,
}

impl PixelMixture {
    pub fn new() -> Self {
        Self {
            components: Vec::with_capacity(MAX_COMPONENTS),
        }
    }

    pub fn components(&self) -> &[GaussianComponent] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Feeds one intensity into the model and classifies it.
    pub fn observe(&mut self, value: f32, params: &MixtureParams) -> PixelStatus {
        // Warm-up: the first observation seeds the model and is trusted.
        if self.components.is_empty() {
            self.components.push(GaussianComponent {
                weight: 1.0,
                mean: value,
                variance: params.var_init,
            });
            return PixelStatus::Background;
        }

        let alpha = params.learning_rate;
        let prune = -alpha * params.complexity_reduction;
        let mut matched = false;
        let mut background = false;
        let mut accumulated = 0.0f32;

        for component in self.components.iter_mut() {
            let mut weight = (1.0 - alpha) * component.weight + prune;

            if !matched {
                let delta = value - component.mean;
                let dist2 = delta * delta;

                if accumulated < params.background_ratio
                    && dist2 < params.var_threshold * component.variance
                {
                    background = true;
                }

                if dist2 < params.var_threshold_gen * component.variance {
                    matched = true;
                    weight += alpha;
                    let k = alpha / weight;
                    component.mean += k * delta;
                    component.variance = (component.variance + k * (dist2 - component.variance))
                        .clamp(params.var_min, params.var_max);
                }
            }

            component.weight = weight;
            accumulated += weight.max(0.0);
        }

        self.components.retain(|c| c.weight >= -prune);

        if !matched {
            self.replace_weakest(value, params);
        }

        self.normalize();
        self.components
            .sort_by(|a, b| b.weight.total_cmp(&a.weight));

        if background {
            PixelStatus::Background
        } else if params.detect_shadows && self.is_shadow(value, params) {
            PixelStatus::Shadow
        } else {
            PixelStatus::Foreground
        }
    }

    fn replace_weakest(&mut self, value: f32, params: &MixtureParams) {
        let fresh = GaussianComponent {
            weight: params.learning_rate,
            mean: value,
            variance: params.var_init,
        };

        if self.components.is_empty() {
            self.components.push(GaussianComponent { weight: 1.0, ..fresh });
            return;
        }
        if self.components.len() == MAX_COMPONENTS {
            // Sorted from the previous frame, so the last one is the weakest.
            self.components.pop();
        }

        let remaining: f32 = self.components.iter().map(|c| c.weight).sum();
        if remaining > 0.0 {
            let scale = (1.0 - fresh.weight) / remaining;
            for component in self.components.iter_mut() {
                component.weight *= scale;
            }
        }
        self.components.push(fresh);
    }

    fn normalize(&mut self) {
        let total: f32 = self.components.iter().map(|c| c.weight).sum();
        if total > 0.0 {
            for component in self.components.iter_mut() {
                component.weight /= total;
            }
        } else if let Some(first) = self.components.first_mut() {
            first.weight = 1.0;
        }
    }

    /// A value is a shadow when it is a darker copy of one of the dominant
    /// components: same "color", brightness scaled by a factor in [tau, 1].
    fn is_shadow(&self, value: f32, params: &MixtureParams) -> bool {
        let mut accumulated = 0.0f32;
        for component in &self.components {
            let numerator = component.mean * value;
            let denominator = component.mean * component.mean;
            if denominator == 0.0 {
                return false;
            }

            if numerator <= denominator && numerator >= params.shadow_tau * denominator {
                let ratio = numerator / denominator;
                let dist2 = (ratio * component.mean - value).powi(2);
                if dist2 < params.var_threshold * component.variance * ratio * ratio {
                    return true;
                }
            }

            accumulated += component.weight;
            if accumulated > params.background_ratio {
                return false;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_sum(mixture: &PixelMixture) -> f32 {
        mixture.components().iter().map(|c| c.weight).sum()
    }

    #[test]
    fn first_observation_is_background() {
        let mut mixture = PixelMixture::new();
        let status = mixture.observe(42.0, &MixtureParams::default());
        assert_eq!(status, PixelStatus::Background);
        assert_eq!(mixture.components().len(), 1);
        assert_eq!(mixture.components()[0].mean, 42.0);
    }

    #[test]
    fn steady_value_stays_background() {
        let params = MixtureParams::default();
        let mut mixture = PixelMixture::new();
        for _ in 0..50 {
            assert_eq!(mixture.observe(100.0, &params), PixelStatus::Background);
        }
        assert_eq!(mixture.components().len(), 1);
        assert!((weight_sum(&mixture) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn sudden_jump_is_foreground() {
        let params = MixtureParams::default();
        let mut mixture = PixelMixture::new();
        for _ in 0..10 {
            mixture.observe(0.0, &params);
        }
        assert_eq!(mixture.observe(255.0, &params), PixelStatus::Foreground);
        assert_eq!(mixture.components().len(), 2);
        // The intruder lives in a light component until it has been seen a lot.
        assert_eq!(mixture.observe(255.0, &params), PixelStatus::Foreground);
        assert_eq!(mixture.observe(0.0, &params), PixelStatus::Background);
    }

    #[test]
    fn weights_sum_to_one_and_components_are_bounded() {
        let params = MixtureParams::new(20, 16.0, true);
        let mut mixture = PixelMixture::new();
        for i in 0..200u32 {
            mixture.observe(((i * 53) % 256) as f32, &params);
            assert!(mixture.components().len() <= MAX_COMPONENTS);
            assert!((weight_sum(&mixture) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn components_are_sorted_by_weight() {
        let params = MixtureParams::new(10, 16.0, false);
        let mut mixture = PixelMixture::new();
        for i in 0..30 {
            mixture.observe(if i % 3 == 0 { 200.0 } else { 20.0 }, &params);
        }
        let weights: Vec<f32> = mixture.components().iter().map(|c| c.weight).collect();
        assert!(weights.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn persistent_change_is_absorbed_into_background() {
        let params = MixtureParams::new(10, 16.0, false);
        let mut mixture = PixelMixture::new();
        for _ in 0..5 {
            mixture.observe(30.0, &params);
        }
        assert_eq!(mixture.observe(220.0, &params), PixelStatus::Foreground);
        let mut absorbed = false;
        for _ in 0..100 {
            if mixture.observe(220.0, &params) == PixelStatus::Background {
                absorbed = true;
                break;
            }
        }
        assert!(absorbed);
    }

    #[test]
    fn darker_copy_of_background_is_a_shadow() {
        let params = MixtureParams::default();
        let mut mixture = PixelMixture::new();
        for _ in 0..20 {
            mixture.observe(200.0, &params);
        }
        assert_eq!(mixture.observe(140.0, &params), PixelStatus::Shadow);
    }

    #[test]
    fn shadows_are_foreground_when_detection_is_off() {
        let params = MixtureParams {
            detect_shadows: false,
            ..MixtureParams::default()
        };
        let mut mixture = PixelMixture::new();
        for _ in 0..20 {
            mixture.observe(200.0, &params);
        }
        assert_eq!(mixture.observe(140.0, &params), PixelStatus::Foreground);
    }

    #[test]
    fn confidence_values() {
        assert_eq!(PixelStatus::Background.confidence(), 0);
        assert_eq!(PixelStatus::Shadow.confidence(), 127);
        assert_eq!(PixelStatus::Foreground.confidence(), 255);
    }
}
