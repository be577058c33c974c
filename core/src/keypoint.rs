use nalgebra::Point2;

/// A detected interest point in the pixel frame of its source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f64,
    pub y: f64,
    /// Diameter of the meaningful neighbourhood, in source pixels.
    pub size: f64,
    /// Dominant orientation in degrees, `-1.0` when not computed.
    pub angle: f64,
    pub response: f64,
    pub octave: i32,
}

impl KeyPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            size: 1.0,
            angle: -1.0,
            response: 0.0,
            octave: 0,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_response(mut self, response: f64) -> Self {
        self.response = response;
        self
    }

    pub fn with_octave(mut self, octave: i32) -> Self {
        self.octave = octave;
        self
    }

    pub fn pt(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

impl Default for KeyPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A correspondence between keypoint `query_idx` of the first image and
/// keypoint `train_idx` of the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

impl FeatureMatch {
    pub fn new(query_idx: usize, train_idx: usize, distance: f32) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
        }
    }
}

/// Ordered match list. Order is whatever the matcher produced, not sorted by distance.
#[derive(Debug, Clone, Default)]
pub struct Matches {
    pub matches: Vec<FeatureMatch>,
}

impl Matches {
    pub fn new() -> Self {
        Self {
            matches: Vec::new(),
        }
    }

    pub fn push(&mut self, m: FeatureMatch) {
        self.matches.push(m);
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureMatch> {
        self.matches.iter()
    }

    /// Resolves every match into its `(query point, train point)` pair.
    ///
    /// Matches whose indices fall outside either keypoint set are skipped.
    pub fn point_pairs(
        &self,
        query: &KeyPoints,
        train: &KeyPoints,
    ) -> Vec<(Point2<f64>, Point2<f64>)> {
        self.matches
            .iter()
            .filter_map(|m| {
                let q = query.keypoints.get(m.query_idx)?;
                let t = train.keypoints.get(m.train_idx)?;
                Some((q.pt(), t.pt()))
            })
            .collect()
    }
}

impl FromIterator<FeatureMatch> for Matches {
    fn from_iter<I: IntoIterator<Item = FeatureMatch>>(iter: I) -> Self {
        Self {
            matches: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyPoints {
    pub keypoints: Vec<KeyPoint>,
}

impl KeyPoints {
    pub fn new() -> Self {
        Self {
            keypoints: Vec::new(),
        }
    }

    pub fn push(&mut self, kp: KeyPoint) {
        self.keypoints.push(kp);
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyPoint> {
        self.keypoints.iter()
    }
}

impl FromIterator<KeyPoint> for KeyPoints {
    fn from_iter<I: IntoIterator<Item = KeyPoint>>(iter: I) -> Self {
        Self {
            keypoints: iter.into_iter().collect(),
        }
    }
}
