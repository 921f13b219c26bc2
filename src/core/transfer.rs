// Copyright @yucwang 2026

use crate::math::constants::{ Float, Vector3f, Vector4f };

/// Value types a transfer function can map density to.
pub trait TransferValue: Copy + Default {
    fn lerp(a: Self, b: Self, t: Float) -> Self;
}

impl TransferValue for Float {
    fn lerp(a: Self, b: Self, t: Float) -> Self {
        a * (1.0 - t) + b * t
    }
}

impl TransferValue for Vector4f {
    fn lerp(a: Self, b: Self, t: Float) -> Self {
        a * (1.0 - t) + b * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Constant,
    Linear,
}

/// Sorted key -> value stop table. Keys live in [0, 1]; duplicate keys are
/// retained in insertion order.
#[derive(Debug, Clone)]
pub struct PiecewiseFunction<V> {
    keys: Vec<Float>,
    values: Vec<V>,
    interpolation: Interpolation,
}

impl<V: TransferValue> PiecewiseFunction<V> {
    pub fn new(interpolation: Interpolation) -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            interpolation,
        }
    }

    pub fn add_stop(&mut self, key: Float, value: V) {
        // Insert after any equal key so repeated stops stay order-stable.
        let idx = self.keys.partition_point(|k| *k <= key);
        self.keys.insert(idx, key);
        self.values.insert(idx, value);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Extend the stop list so its domain covers [0, 1]: a missing endpoint
    /// is filled by holding the nearest stop's value.
    pub fn pad_to_unit_domain(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        if self.keys[0] > 0.0 {
            self.keys.insert(0, 0.0);
            self.values.insert(0, self.values[0]);
        }
        if self.keys[self.keys.len() - 1] < 1.0 {
            self.keys.push(1.0);
            self.values.push(self.values[self.values.len() - 1]);
        }
    }

    /// Sample the function at `sample_count` positions
    /// `p = i * last_key / sample_count`. With fewer than two stops every
    /// sample is the default value.
    pub fn evaluate(&self, sample_count: usize) -> Vec<V> {
        if self.keys.len() < 2 {
            return vec![V::default(); sample_count];
        }

        let last_key = self.keys[self.keys.len() - 1];
        let step = last_key / sample_count as Float;
        let mut evals = Vec::with_capacity(sample_count);
        let mut idx = 0usize;

        for i in 0..sample_count {
            let p = i as Float * step;
            while idx + 2 < self.keys.len() && self.keys[idx + 1] < p {
                idx += 1;
            }
            let k0 = self.keys[idx];
            let k1 = self.keys[idx + 1];
            let value = match self.interpolation {
                Interpolation::Constant => self.values[idx],
                Interpolation::Linear => {
                    let t = if k1 > k0 {
                        ((p - k0) / (k1 - k0)).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    V::lerp(self.values[idx], self.values[idx + 1], t)
                }
            };
            evals.push(value);
        }

        evals
    }
}

fn smoothstep(edge0: Float, edge1: Float, x: Float) -> Float {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Slider level in [0, 1] mapped exponentially onto opacity, so the low end
/// of the slider still resolves faint tissue.
fn level_to_opacity(level: Float) -> Float {
    1.0 / (2.0 as Float).powf((1.0 - level) * 10.0)
}

fn hsv_to_rgb(hue_degrees: Float, saturation: Float, value: Float) -> Vector3f {
    let h = (hue_degrees / 60.0).rem_euclid(6.0);
    let c = value * saturation;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = value - c;
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Vector3f::new(r + m, g + m, b + m)
}

/// One opacity "triangle": a plateau of half-width `top_width` around
/// `center`, smoothly falling to zero at half-width `bottom_width`. `overall`
/// sets the plateau's opacity level, `lowest` a floor applied wherever the
/// triangle is nonzero.
#[derive(Debug, Clone, Copy)]
pub struct OpacityTriangle {
    pub overall: Float,
    pub lowest: Float,
    pub bottom_width: Float,
    pub top_width: Float,
    pub center: Float,
}

impl OpacityTriangle {
    fn opacity_at(&self, d: Float) -> Float {
        let rise = smoothstep(self.center - self.bottom_width,
                              self.center - self.top_width, d);
        let fall = 1.0 - smoothstep(self.center + self.top_width,
                                    self.center + self.bottom_width, d);
        let a = rise.min(fall);
        if a == 0.0 {
            return 0.0;
        }
        (a * level_to_opacity(self.overall)).max(level_to_opacity(self.lowest))
    }
}

/// Opacity authoring: an explicit stop list, or a set of triangles whose
/// pointwise maximum forms the curve.
#[derive(Debug, Clone)]
pub enum OpacityCurve {
    Stops(PiecewiseFunction<Float>),
    Triangles(Vec<OpacityTriangle>),
}

impl OpacityCurve {
    pub fn evaluate(&self, sample_count: usize) -> Vec<Float> {
        match self {
            OpacityCurve::Stops(stops) => stops.evaluate(sample_count),
            OpacityCurve::Triangles(triangles) => {
                let step = 1.0 / sample_count as Float;
                (0..sample_count)
                    .map(|i| {
                        let d = i as Float * step;
                        triangles.iter()
                            .map(|triangle| triangle.opacity_at(d))
                            .fold(0.0, Float::max)
                    })
                    .collect()
            }
        }
    }
}

/// Color authoring: an explicit stop list, or the HSV scheme that sweeps the
/// hue wheel across a contrast window at fixed saturation.
#[derive(Debug, Clone)]
pub enum ColorScheme {
    Stops(PiecewiseFunction<Vector4f>),
    Hsv {
        contrast_bottom: Float,
        contrast_top: Float,
        value: Float,
    },
}

impl ColorScheme {
    pub fn evaluate(&self, sample_count: usize) -> Vec<Vector4f> {
        match self {
            ColorScheme::Stops(stops) => stops.evaluate(sample_count),
            ColorScheme::Hsv { contrast_bottom, contrast_top, value } => {
                let step = 1.0 / sample_count as Float;
                (0..sample_count)
                    .map(|i| {
                        let d = i as Float * step;
                        let hue = smoothstep(*contrast_bottom, *contrast_top, d);
                        let rgb = hsv_to_rgb(hue * 360.0, 1.0, *value);
                        Vector4f::new(rgb.x, rgb.y, rgb.z, 1.0)
                    })
                    .collect()
            }
        }
    }
}

/// Evaluated transfer function, the host-side stand-in for a 1D lookup
/// sampler. Fetches clamp to [0, 1].
#[derive(Debug, Clone)]
pub struct LookupTable<V> {
    samples: Vec<V>,
}

impl<V: TransferValue> LookupTable<V> {
    pub fn from_function(function: &PiecewiseFunction<V>, resolution: usize) -> Self {
        Self { samples: function.evaluate(resolution) }
    }

    pub fn from_samples(samples: Vec<V>) -> Self {
        Self { samples }
    }

    pub fn resolution(&self) -> usize {
        self.samples.len()
    }

    pub fn sample(&self, u: Float) -> V {
        if self.samples.is_empty() {
            return V::default();
        }
        let u = u.clamp(0.0, 1.0);
        let idx = (u * (self.samples.len() - 1) as Float).round() as usize;
        self.samples[idx]
    }
}

/// The three lookup tables the raytrace kernels bind: RGBA color, scalar
/// opacity and scalar clearcoat.
#[derive(Debug, Clone)]
pub struct TransferTables {
    pub color: LookupTable<Vector4f>,
    pub opacity: LookupTable<Float>,
    pub clearcoat: LookupTable<Float>,
}

impl TransferTables {
    pub fn new(
        color: &PiecewiseFunction<Vector4f>,
        opacity: &PiecewiseFunction<Float>,
        resolution: usize,
    ) -> Self {
        Self {
            color: LookupTable::from_function(color, resolution),
            opacity: LookupTable::from_function(opacity, resolution),
            clearcoat: LookupTable::from_function(&Self::default_clearcoat(), resolution),
        }
    }

    pub fn from_schemes(
        color: &ColorScheme,
        opacity: &OpacityCurve,
        resolution: usize,
    ) -> Self {
        Self {
            color: LookupTable::from_samples(color.evaluate(resolution)),
            opacity: LookupTable::from_samples(opacity.evaluate(resolution)),
            clearcoat: LookupTable::from_function(&Self::default_clearcoat(), resolution),
        }
    }

    /// Specular coat ramp over the densest structures (bone range).
    pub fn default_clearcoat() -> PiecewiseFunction<Float> {
        let mut clearcoat = PiecewiseFunction::new(Interpolation::Linear);
        clearcoat.add_stop(0.0, 0.0);
        clearcoat.add_stop(0.6, 0.0);
        clearcoat.add_stop(0.7, 0.5);
        clearcoat.add_stop(1.0, 0.5);
        clearcoat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_endpoints_and_monotonicity() {
        let mut function = PiecewiseFunction::new(Interpolation::Linear);
        function.add_stop(0.0, 0.0);
        function.add_stop(1.0, 1.0);

        let n = 64;
        let evals = function.evaluate(n);
        assert!(evals[0].abs() < 1e-5);
        assert!((evals[n - 1] - 1.0).abs() < 2.0 / n as Float);
        for window in evals.windows(2) {
            assert!(window[1] >= window[0]);
        }
    }

    #[test]
    fn test_constant_returns_left_value() {
        let mut function = PiecewiseFunction::new(Interpolation::Constant);
        function.add_stop(0.0, 2.0);
        function.add_stop(0.5, 5.0);
        function.add_stop(1.0, 9.0);

        let evals = function.evaluate(10);
        assert_eq!(evals[0], 2.0);
        assert_eq!(evals[9], 5.0);
    }

    #[test]
    fn test_fewer_than_two_stops_is_default() {
        let mut function: PiecewiseFunction<Float> = PiecewiseFunction::new(Interpolation::Linear);
        assert_eq!(function.evaluate(4), vec![0.0; 4]);
        function.add_stop(0.3, 7.0);
        assert_eq!(function.evaluate(4), vec![0.0; 4]);
    }

    #[test]
    fn test_duplicate_keys_are_order_stable() {
        let mut function = PiecewiseFunction::new(Interpolation::Constant);
        function.add_stop(0.5, 1.0);
        function.add_stop(0.5, 2.0);
        function.add_stop(0.0, 0.0);
        function.add_stop(1.0, 3.0);
        assert_eq!(function.len(), 4);

        // The first inserted 0.5 stop stays ahead of the second one, so the
        // segment right of the duplicates starts from the later value.
        let evals = function.evaluate(100);
        assert_eq!(evals[40], 0.0);
        assert_eq!(evals[60], 2.0);
    }

    #[test]
    fn test_pad_to_unit_domain_holds_endpoints() {
        let mut function = PiecewiseFunction::new(Interpolation::Linear);
        function.add_stop(0.25, 2.0);
        function.add_stop(0.75, 6.0);
        function.pad_to_unit_domain();

        assert_eq!(function.len(), 4);
        let evals = function.evaluate(100);
        // Held flat outside the original stops, linear in between.
        assert_eq!(evals[0], 2.0);
        assert!((evals[10] - 2.0).abs() < 1e-5);
        assert!((evals[50] - 4.0).abs() < 0.1);
        assert!((evals[90] - 6.0).abs() < 1e-5);

        // Already-covering stop lists are untouched.
        let mut full = PiecewiseFunction::new(Interpolation::Linear);
        full.add_stop(0.0, 1.0);
        full.add_stop(1.0, 3.0);
        full.pad_to_unit_domain();
        assert_eq!(full.len(), 2);
    }

    #[test]
    fn test_hsv_scheme_sweeps_contrast_window() {
        let scheme = ColorScheme::Hsv {
            contrast_bottom: 0.2,
            contrast_top: 0.8,
            value: 1.0,
        };
        let evals = scheme.evaluate(100);

        // Below the window the hue pins to red.
        assert!((evals[0] - Vector4f::new(1.0, 0.0, 0.0, 1.0)).norm() < 1e-4);
        assert!((evals[10] - Vector4f::new(1.0, 0.0, 0.0, 1.0)).norm() < 1e-4);
        // Window midpoint lands at cyan (hue 180).
        assert!((evals[50] - Vector4f::new(0.0, 1.0, 1.0, 1.0)).norm() < 1e-4);
        // Above the window the hue wraps the full wheel back to red.
        assert!((evals[90] - Vector4f::new(1.0, 0.0, 0.0, 1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_hsv_value_scales_brightness() {
        let scheme = ColorScheme::Hsv {
            contrast_bottom: 0.2,
            contrast_top: 0.8,
            value: 0.5,
        };
        let evals = scheme.evaluate(100);
        assert!((evals[0] - Vector4f::new(0.5, 0.0, 0.0, 1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_opacity_triangle_plateau_and_support() {
        let curve = OpacityCurve::Triangles(vec![OpacityTriangle {
            overall: 1.0,
            lowest: 0.0,
            bottom_width: 0.2,
            top_width: 0.05,
            center: 0.5,
        }]);
        let evals = curve.evaluate(100);

        // Zero outside the bottom width, full level across the plateau.
        assert_eq!(evals[0], 0.0);
        assert_eq!(evals[25], 0.0);
        assert!((evals[50] - 1.0).abs() < 1e-5);
        assert_eq!(evals[80], 0.0);

        // The flanks ramp between the bottom and top widths.
        assert!(evals[37] > 0.0 && evals[37] < 1.0);
    }

    #[test]
    fn test_opacity_triangles_take_pointwise_max() {
        let low = OpacityTriangle {
            overall: 0.5,
            lowest: 0.0,
            bottom_width: 0.4,
            top_width: 0.3,
            center: 0.5,
        };
        let high = OpacityTriangle {
            overall: 1.0,
            lowest: 0.0,
            bottom_width: 0.1,
            top_width: 0.05,
            center: 0.5,
        };
        let curve = OpacityCurve::Triangles(vec![low, high]);
        let evals = curve.evaluate(100);

        // The narrow full-level triangle wins at the shared center; the wide
        // half-level one (2^-5) carries the shoulders alone.
        assert!((evals[50] - 1.0).abs() < 1e-5);
        assert!((evals[25] - 1.0 / 32.0).abs() < 1e-5);
    }

    #[test]
    fn test_lookup_table_clamps() {
        let mut function = PiecewiseFunction::new(Interpolation::Linear);
        function.add_stop(0.0, 0.0);
        function.add_stop(1.0, 1.0);
        let table = LookupTable::from_function(&function, 100);

        assert!(table.sample(-1.0) <= table.sample(0.5));
        assert!(table.sample(2.0) >= table.sample(0.5));
        assert_eq!(table.resolution(), 100);
    }
}
